//! PDF Assembly - single-page documents holding one or more raster images

use image::{ImageFormat, RgbaImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::export::ExportError;

const POINTS_PER_MM: f64 = 72.0 / 25.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageOrientation {
    Portrait,
    Landscape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Mm,
    Pt,
}

impl Unit {
    fn to_points(self, value: f64) -> f64 {
        match self {
            Unit::Mm => value * POINTS_PER_MM,
            Unit::Pt => value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageFormat {
    A4,
    A5,
    A6,
}

impl PageFormat {
    /// Portrait size in millimetres.
    fn size_mm(self) -> (f64, f64) {
        match self {
            PageFormat::A4 => (210.0, 297.0),
            PageFormat::A5 => (148.0, 210.0),
            PageFormat::A6 => (105.0, 148.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentOptions {
    pub orientation: PageOrientation,
    pub unit: Unit,
    pub format: PageFormat,
}

impl DocumentOptions {
    /// Page size in `self.unit`.
    pub fn page_size(&self) -> (f64, f64) {
        let (short, long) = self.format.size_mm();
        let (w, h) = match self.orientation {
            PageOrientation::Portrait => (short, long),
            PageOrientation::Landscape => (long, short),
        };
        match self.unit {
            Unit::Mm => (w, h),
            Unit::Pt => (w * POINTS_PER_MM, h * POINTS_PER_MM),
        }
    }
}

/// Creates empty documents.
pub trait DocumentAssembler {
    type Document: PdfDocument;

    fn new_document(&self, options: &DocumentOptions) -> Result<Self::Document, ExportError>;
}

/// One open document. Coordinates are in the document unit, origin top-left.
pub trait PdfDocument {
    fn page_size(&self) -> (f64, f64);

    fn add_image(
        &mut self,
        image: &RgbaImage,
        format: ImageFormat,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) -> Result<(), ExportError>;

    fn save(&mut self, path: &Path) -> Result<(), ExportError>;
}

/// `lopdf`-backed assembler.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfAssembler;

impl DocumentAssembler for PdfAssembler {
    type Document = LopdfDocument;

    fn new_document(&self, options: &DocumentOptions) -> Result<LopdfDocument, ExportError> {
        Ok(LopdfDocument { options: *options, images: vec![] })
    }
}

struct PlacedImage {
    width_px: u32,
    height_px: u32,
    rgb: Vec<u8>,
    alpha: Vec<u8>,
    // Page rectangle in points, PDF origin (bottom-left).
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

pub struct LopdfDocument {
    options: DocumentOptions,
    images: Vec<PlacedImage>,
}

impl PdfDocument for LopdfDocument {
    fn page_size(&self) -> (f64, f64) {
        self.options.page_size()
    }

    fn add_image(
        &mut self,
        image: &RgbaImage,
        format: ImageFormat,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) -> Result<(), ExportError> {
        if format != ImageFormat::Png {
            return Err(ExportError::UnsupportedFormat(format!("{:?}", format)));
        }
        let (width_px, height_px) = image.dimensions();
        let mut rgb = Vec::with_capacity((width_px * height_px * 3) as usize);
        let mut alpha = Vec::with_capacity((width_px * height_px) as usize);
        for pixel in image.pixels() {
            rgb.extend_from_slice(&pixel.0[..3]);
            alpha.push(pixel.0[3]);
        }

        let unit = self.options.unit;
        let (_, page_height) = self.options.page_size();
        let height_pt = unit.to_points(height);
        self.images.push(PlacedImage {
            width_px,
            height_px,
            rgb,
            alpha,
            x: unit.to_points(x),
            y: unit.to_points(page_height) - unit.to_points(y) - height_pt,
            width: unit.to_points(width),
            height: height_pt,
        });
        Ok(())
    }

    fn save(&mut self, path: &Path) -> Result<(), ExportError> {
        let mut doc = self.build()?;
        doc.compress();
        doc.save(path).map_err(|e| ExportError::Pdf(e.to_string()))?;
        log::debug!("wrote {} image(s) to {}", self.images.len(), path.display());
        Ok(())
    }
}

impl LopdfDocument {
    fn build(&self) -> Result<Document, ExportError> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut xobjects = Dictionary::new();
        let mut operations = vec![];
        for (index, placed) in self.images.iter().enumerate() {
            let smask_id = doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => placed.width_px as i64,
                    "Height" => placed.height_px as i64,
                    "ColorSpace" => "DeviceGray",
                    "BitsPerComponent" => 8,
                },
                placed.alpha.clone(),
            ));
            let image_id = doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => placed.width_px as i64,
                    "Height" => placed.height_px as i64,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8,
                    "SMask" => smask_id,
                },
                placed.rgb.clone(),
            ));

            let name = format!("Im{}", index + 1);
            xobjects.set(name.clone(), image_id);
            operations.push(Operation::new("q", vec![]));
            operations.push(Operation::new(
                "cm",
                vec![
                    Object::Real(placed.width as f32),
                    Object::Real(0.0),
                    Object::Real(0.0),
                    Object::Real(placed.height as f32),
                    Object::Real(placed.x as f32),
                    Object::Real(placed.y as f32),
                ],
            ));
            operations.push(Operation::new("Do", vec![Object::Name(name.into_bytes())]));
            operations.push(Operation::new("Q", vec![]));
        }

        let content = Content { operations }
            .encode()
            .map_err(|e| ExportError::Pdf(e.to_string()))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));

        let (page_w, page_h) = self.options.page_size();
        let unit = self.options.unit;
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! { "XObject" => xobjects },
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(unit.to_points(page_w) as f32),
                Object::Real(unit.to_points(page_h) as f32),
            ],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        Ok(doc)
    }
}

/// Largest `(width, height)` with the image's aspect that fits the page,
/// filling the width unless the height is the binding constraint.
pub fn fit_to_page(
    image_width: u32,
    image_height: u32,
    page_width: f64,
    page_height: f64,
) -> (f64, f64) {
    let ratio = f64::from(image_width) / f64::from(image_height);
    let mut width = page_width;
    let mut height = width / ratio;
    if height > page_height {
        height = page_height;
        width = height * ratio;
    }
    (width, height)
}
