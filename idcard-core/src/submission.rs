//! Card Submission - multipart payload and the generation endpoint
//!
//! The transport is a trait so the form controller can be driven without a
//! network; `HttpTransport` is the real implementation.

use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::form::{Field, FormInput, PhotoFile, TextField};

pub const GENERATE_PATH: &str = "/generate";
/// File name the server recognises as an already cropped photo.
pub const PROCESSED_PHOTO_FILENAME: &str = "processed_photo.png";
pub const PROCESSED_PHOTO_CONTENT_TYPE: &str = "image/png";

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Card generation failed with HTTP {0}")]
    Status(u16),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        filename: String,
        content_type: String,
        data: Vec<u8>,
    },
}

impl Part {
    pub fn name(&self) -> &str {
        match self {
            Part::Text { name, .. } | Part::File { name, .. } => name,
        }
    }
}

/// An ordered `multipart/form-data` body.
#[derive(Debug, Clone)]
pub struct MultipartForm {
    boundary: String,
    parts: Vec<Part>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::with_boundary(format!("----idcard{}", Uuid::new_v4().simple()))
    }

    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self { boundary: boundary.into(), parts: vec![] }
    }

    pub fn text(&mut self, name: &str, value: &str) -> &mut Self {
        self.parts.push(Part::Text { name: name.to_string(), value: value.to_string() });
        self
    }

    pub fn file(
        &mut self,
        name: &str,
        filename: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> &mut Self {
        self.parts.push(Part::File {
            name: name.to_string(),
            filename: filename.to_string(),
            content_type: content_type.to_string(),
            data,
        });
        self
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn part(&self, name: &str) -> Option<&Part> {
        self.parts.iter().find(|p| p.name() == name)
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::new();
        for part in &self.parts {
            body.extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
            match part {
                Part::Text { name, value } => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                            escape_quoted(name)
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(value.as_bytes());
                }
                Part::File { name, filename, content_type, data } => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                            escape_quoted(name),
                            escape_quoted(filename),
                            content_type
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(data);
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        body
    }
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

/// Percent-encode the characters that would break a quoted header parameter.
fn escape_quoted(value: &str) -> String {
    value
        .replace('\r', "%0D")
        .replace('\n', "%0A")
        .replace('"', "%22")
}

/// Which photo bytes go into the `photo` part.
#[derive(Debug, Clone, Copy)]
pub enum PhotoPayload<'a> {
    /// The hexagon-clipped PNG produced by "apply".
    Processed(&'a [u8]),
    /// The untouched upload; the server crops it itself.
    Original(&'a PhotoFile),
}

/// Build the five-part card request body.
pub fn build_payload(input: &FormInput, photo: PhotoPayload<'_>) -> MultipartForm {
    let mut form = MultipartForm::new();
    for field in TextField::ALL {
        form.text(Field::from(field).form_key(), input.text(field));
    }
    let key = Field::Photo.form_key();
    match photo {
        PhotoPayload::Processed(png) => {
            form.file(key, PROCESSED_PHOTO_FILENAME, PROCESSED_PHOTO_CONTENT_TYPE, png.to_vec());
        }
        PhotoPayload::Original(file) => {
            form.file(key, &file.filename, file.content_type(), file.data.clone());
        }
    }
    form
}

pub fn generate_url(endpoint: &str) -> String {
    format!("{}{}", endpoint.trim_end_matches('/'), GENERATE_PATH)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends a multipart form and returns the raw response.
pub trait Transport {
    fn post(&self, url: &str, form: &MultipartForm) -> Result<HttpResponse, SubmitError>;
}

/// Blocking HTTP transport with a global request timeout.
pub struct HttpTransport {
    agent: ureq::Agent,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();
        Self { agent: config.into() }
    }
}

impl Transport for HttpTransport {
    fn post(&self, url: &str, form: &MultipartForm) -> Result<HttpResponse, SubmitError> {
        let body = form.encode();
        log::debug!("POST {} ({} bytes, {} parts)", url, body.len(), form.parts().len());

        let mut response = self
            .agent
            .post(url)
            .header("Content-Type", form.content_type())
            .send(&body[..])
            .map_err(|e| SubmitError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| SubmitError::Transport(e.to_string()))?;

        Ok(HttpResponse { status, body })
    }
}

/// POST the form and return the generated card page, failing on non-2xx.
pub fn request_card(
    transport: &dyn Transport,
    url: &str,
    form: &MultipartForm,
) -> Result<String, SubmitError> {
    let response = transport.post(url, form)?;
    if response.is_success() {
        Ok(response.body)
    } else {
        Err(SubmitError::Status(response.status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> FormInput {
        FormInput {
            name: "Grace Hopper".to_string(),
            reg_no: "NAVY-1906".to_string(),
            email: "grace@example.mil".to_string(),
            phone: "555 010 1906".to_string(),
            photo: Some(PhotoFile::new("grace.jpeg", vec![1, 2, 3])),
        }
    }

    #[test]
    fn test_processed_payload_has_fixed_photo_part() {
        let form = build_payload(&input(), PhotoPayload::Processed(&[9, 9]));
        let names: Vec<_> = form.parts().iter().map(Part::name).collect();
        assert_eq!(names, ["name", "reg_no", "email", "phone", "photo"]);
        assert_eq!(
            form.part("photo"),
            Some(&Part::File {
                name: "photo".to_string(),
                filename: "processed_photo.png".to_string(),
                content_type: "image/png".to_string(),
                data: vec![9, 9],
            })
        );
    }

    #[test]
    fn test_original_payload_keeps_upload() {
        let input = input();
        let photo = input.photo.clone().unwrap();
        let form = build_payload(&input, PhotoPayload::Original(&photo));
        match form.part("photo") {
            Some(Part::File { filename, content_type, data, .. }) => {
                assert_eq!(filename, "grace.jpeg");
                assert_eq!(content_type, "image/jpeg");
                assert_eq!(data, &vec![1, 2, 3]);
            }
            other => panic!("unexpected photo part: {other:?}"),
        }
    }

    #[test]
    fn test_encode_layout() {
        let mut form = MultipartForm::with_boundary("XYZ");
        form.text("name", "Ada").file("photo", "a\"b.png", "image/png", b"PNG".to_vec());
        let body = String::from_utf8(form.encode()).unwrap();
        assert_eq!(
            body,
            "--XYZ\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\nAda\r\n\
             --XYZ\r\nContent-Disposition: form-data; name=\"photo\"; filename=\"a%22b.png\"\r\n\
             Content-Type: image/png\r\n\r\nPNG\r\n--XYZ--\r\n"
        );
        assert_eq!(form.content_type(), "multipart/form-data; boundary=XYZ");
    }

    #[test]
    fn test_boundaries_are_unique() {
        assert_ne!(MultipartForm::new().boundary(), MultipartForm::new().boundary());
    }

    #[test]
    fn test_generate_url_joins_cleanly() {
        assert_eq!(generate_url("http://localhost:5000/"), "http://localhost:5000/generate");
        assert_eq!(generate_url("https://cards.example"), "https://cards.example/generate");
    }

    struct Canned(u16);

    impl Transport for Canned {
        fn post(&self, _url: &str, _form: &MultipartForm) -> Result<HttpResponse, SubmitError> {
            Ok(HttpResponse { status: self.0, body: "<html>body</html>".to_string() })
        }
    }

    #[test]
    fn test_request_card_maps_status() {
        let form = MultipartForm::new();
        assert_eq!(request_card(&Canned(200), "u", &form).unwrap(), "<html>body</html>");
        assert!(matches!(request_card(&Canned(413), "u", &form), Err(SubmitError::Status(413))));
        assert!(matches!(request_card(&Canned(302), "u", &form), Err(SubmitError::Status(302))));
    }
}
