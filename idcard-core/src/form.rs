//! Form Model - the five tracked card fields

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

/// Every field the card form tracks, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Name,
    RegNo,
    Email,
    Phone,
    Photo,
}

impl Field {
    pub const ALL: [Field; 5] = [
        Field::Name,
        Field::RegNo,
        Field::Email,
        Field::Phone,
        Field::Photo,
    ];

    /// Multipart part name used by the card-generation endpoint.
    pub fn form_key(self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::RegNo => "reg_no",
            Field::Email => "email",
            Field::Phone => "phone",
            Field::Photo => "photo",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.form_key())
    }
}

/// The four free-text fields. The photo goes through its own interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextField {
    Name,
    RegNo,
    Email,
    Phone,
}

impl TextField {
    pub const ALL: [TextField; 4] = [
        TextField::Name,
        TextField::RegNo,
        TextField::Email,
        TextField::Phone,
    ];
}

impl From<TextField> for Field {
    fn from(field: TextField) -> Self {
        match field {
            TextField::Name => Field::Name,
            TextField::RegNo => Field::RegNo,
            TextField::Email => Field::Email,
            TextField::Phone => Field::Phone,
        }
    }
}

/// A user-selected photo file.
#[derive(Clone, PartialEq, Eq)]
pub struct PhotoFile {
    pub filename: String,
    pub data: Vec<u8>,
}

impl PhotoFile {
    pub fn new(filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self { filename: filename.into(), data }
    }

    pub fn read(path: &Path) -> io::Result<Self> {
        let data = fs::read(path)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "photo".to_string());
        Ok(Self { filename, data })
    }

    /// Size in bytes, as the browser reports `File.size`.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Content type inferred from the file extension.
    pub fn content_type(&self) -> &'static str {
        let ext = self
            .filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "webp" => "image/webp",
            "bmp" => "image/bmp",
            _ => "application/octet-stream",
        }
    }
}

impl fmt::Debug for PhotoFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhotoFile")
            .field("filename", &self.filename)
            .field("size", &self.data.len())
            .finish()
    }
}

/// Current values of the form inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormInput {
    pub name: String,
    pub reg_no: String,
    pub email: String,
    pub phone: String,
    pub photo: Option<PhotoFile>,
}

impl FormInput {
    pub fn text(&self, field: TextField) -> &str {
        match field {
            TextField::Name => &self.name,
            TextField::RegNo => &self.reg_no,
            TextField::Email => &self.email,
            TextField::Phone => &self.phone,
        }
    }

    pub fn set_text(&mut self, field: TextField, value: impl Into<String>) {
        let slot = match field {
            TextField::Name => &mut self.name,
            TextField::RegNo => &mut self.reg_no,
            TextField::Email => &mut self.email,
            TextField::Phone => &mut self.phone,
        };
        *slot = value.into();
    }
}
