//! Card Export - PNG, PDF and print from a rendered card
//!
//! Capture and document assembly sit behind traits; `CardExporter` only
//! sequences them and records what it wrote.

use chrono::{DateTime, Utc};
use image::imageops::{self, FilterType};
use image::{ImageFormat, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::hashing::sha256_hex;
use crate::pdf::{
    fit_to_page, DocumentAssembler, DocumentOptions, PageFormat, PageOrientation, PdfDocument, Unit,
};
use crate::print::PrintSpooler;

pub const PNG_FILENAME: &str = "gfg-id-card.png";
pub const PDF_FILENAME: &str = "gfg-id-card.pdf";
pub const DEFAULT_CAPTURE_SCALE: f32 = 3.0;
/// Horizontal space between card faces at 1x, in pixels.
pub const DEFAULT_FACE_GAP: u32 = 20;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("Unsupported embed format: {0}")]
    UnsupportedFormat(String),

    #[error("Nothing to capture: the card region is empty")]
    EmptyRegion,

    #[error("Invalid capture scale: {0}")]
    InvalidScale(f32),

    #[error("Print failed: {0}")]
    Print(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CaptureOptions {
    pub scale: f32,
    /// `None` keeps the background transparent.
    pub background: Option<[u8; 4]>,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self { scale: DEFAULT_CAPTURE_SCALE, background: None }
    }
}

/// Turns a region of the rendered result into a bitmap.
pub trait Rasterizer {
    type Region: ?Sized;

    fn capture(
        &self,
        region: &Self::Region,
        options: &CaptureOptions,
    ) -> Result<RgbaImage, ExportError>;
}

/// The card as shown on the result page: its faces laid out left to right.
#[derive(Debug, Clone, Default)]
pub struct CardRegion {
    pub faces: Vec<RgbaImage>,
    pub gap: u32,
}

impl CardRegion {
    pub fn new(faces: Vec<RgbaImage>) -> Self {
        Self { faces, gap: DEFAULT_FACE_GAP }
    }

    pub fn open(paths: &[PathBuf]) -> Result<Self, ExportError> {
        let faces = paths
            .iter()
            .map(|p| Ok(image::open(p)?.to_rgba8()))
            .collect::<Result<Vec<_>, ExportError>>()?;
        Ok(Self::new(faces))
    }

    /// Unscaled layout size.
    pub fn dimensions(&self) -> (u32, u32) {
        let width: u32 = self.faces.iter().map(RgbaImage::width).sum();
        let gaps = self.gap * self.faces.len().saturating_sub(1) as u32;
        let height = self.faces.iter().map(RgbaImage::height).max().unwrap_or(0);
        (width + gaps, height)
    }
}

/// Composites card faces and scales the result.
#[derive(Debug, Default, Clone, Copy)]
pub struct CardRasterizer;

impl Rasterizer for CardRasterizer {
    type Region = CardRegion;

    fn capture(
        &self,
        region: &CardRegion,
        options: &CaptureOptions,
    ) -> Result<RgbaImage, ExportError> {
        if !(options.scale.is_finite() && options.scale > 0.0) {
            return Err(ExportError::InvalidScale(options.scale));
        }
        let (width, height) = region.dimensions();
        if width == 0 || height == 0 {
            return Err(ExportError::EmptyRegion);
        }

        let fill = Rgba(options.background.unwrap_or([0, 0, 0, 0]));
        let mut canvas = RgbaImage::from_pixel(width, height, fill);
        let mut x = 0i64;
        for face in &region.faces {
            let y = i64::from((height - face.height()) / 2);
            imageops::overlay(&mut canvas, face, x, y);
            x += i64::from(face.width() + region.gap);
        }

        let scaled_w = ((width as f32 * options.scale).round() as u32).max(1);
        let scaled_h = ((height as f32 * options.scale).round() as u32).max(1);
        if (scaled_w, scaled_h) == (width, height) {
            return Ok(canvas);
        }
        Ok(imageops::resize(&canvas, scaled_w, scaled_h, FilterType::CatmullRom))
    }
}

/// Record of one file written by an export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedFile {
    pub path: PathBuf,
    pub format: String,
    pub size: [u32; 2],
    pub bytes: u64,
    pub hash: String,
    pub created_at: DateTime<Utc>,
}

impl ExportedFile {
    fn record(path: &Path, format: &str, size: [u32; 2]) -> Result<Self, ExportError> {
        let data = fs::read(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            format: format.to_string(),
            size,
            bytes: data.len() as u64,
            hash: sha256_hex(&data),
            created_at: Utc::now(),
        })
    }
}

/// The three export actions of the result page.
pub struct CardExporter<R, A, P> {
    rasterizer: R,
    assembler: A,
    spooler: P,
    output_dir: PathBuf,
    options: CaptureOptions,
}

impl<R, A, P> CardExporter<R, A, P>
where
    R: Rasterizer,
    A: DocumentAssembler,
    P: PrintSpooler,
{
    pub fn new(rasterizer: R, assembler: A, spooler: P, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            rasterizer,
            assembler,
            spooler,
            output_dir: output_dir.into(),
            options: CaptureOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CaptureOptions) -> Self {
        self.options = options;
        self
    }

    pub fn export_png(&self, region: &R::Region) -> Result<ExportedFile, ExportError> {
        let image = self.rasterizer.capture(region, &self.options)?;
        fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(PNG_FILENAME);
        image.save_with_format(&path, ImageFormat::Png)?;
        log::info!("exported card image to {}", path.display());
        ExportedFile::record(&path, "png", [image.width(), image.height()])
    }

    /// Landscape A6, image anchored top-left and fitted to the page.
    pub fn export_pdf(&self, region: &R::Region) -> Result<ExportedFile, ExportError> {
        let image = self.rasterizer.capture(region, &self.options)?;
        let mut doc = self.assembler.new_document(&DocumentOptions {
            orientation: PageOrientation::Landscape,
            unit: Unit::Mm,
            format: PageFormat::A6,
        })?;
        let (page_w, page_h) = doc.page_size();
        let (w, h) = fit_to_page(image.width(), image.height(), page_w, page_h);
        doc.add_image(&image, ImageFormat::Png, 0.0, 0.0, w, h)?;

        fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(PDF_FILENAME);
        doc.save(&path)?;
        log::info!("exported card document to {}", path.display());
        ExportedFile::record(&path, "pdf", [image.width(), image.height()])
    }

    /// Rasterize the card to a temporary PNG and hand it to the spooler.
    /// The file is removed once the spooler returns.
    pub fn print(&self, region: &R::Region) -> Result<(), ExportError> {
        let image = self.rasterizer.capture(region, &self.options)?;
        let mut file = tempfile::Builder::new()
            .prefix("idcard-print-")
            .suffix(".png")
            .tempfile()?;
        image.write_to(&mut file, ImageFormat::Png)?;
        file.flush()?;
        log::info!("sending {} to the printer", file.path().display());

        let result = self.spooler.print(file.path());
        let path = file.path().to_path_buf();
        if let Err(e) = file.close() {
            log::warn!("could not remove {}: {}", path.display(), e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(w: u32, h: u32, color: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba(color))
    }

    #[test]
    fn test_region_layout_dimensions() {
        let region =
            CardRegion::new(vec![face(10, 20, [1, 1, 1, 255]), face(30, 16, [2, 2, 2, 255])]);
        assert_eq!(region.dimensions(), (10 + DEFAULT_FACE_GAP + 30, 20));
        assert_eq!(CardRegion::default().dimensions(), (0, 0));
    }

    #[test]
    fn test_capture_scales_and_keeps_transparency() {
        let region = CardRegion {
            faces: vec![face(10, 10, [255, 0, 0, 255]), face(10, 6, [0, 255, 0, 255])],
            gap: 4,
        };
        let image = CardRasterizer.capture(&region, &CaptureOptions::default()).unwrap();
        assert_eq!(image.dimensions(), (72, 30));
        // Gap between faces stays transparent.
        assert_eq!(image.get_pixel(36, 15).0[3], 0);
        assert_eq!(image.get_pixel(5, 15).0, [255, 0, 0, 255]);
    }

    #[test]
    fn test_capture_fills_background() {
        let region = CardRegion {
            faces: vec![face(4, 4, [9, 9, 9, 255]), face(4, 2, [9, 9, 9, 255])],
            gap: 2,
        };
        let options = CaptureOptions { scale: 1.0, background: Some([255, 255, 255, 255]) };
        let image = CardRasterizer.capture(&region, &options).unwrap();
        assert_eq!(image.dimensions(), (10, 4));
        assert_eq!(image.get_pixel(5, 0).0, [255, 255, 255, 255]);
        assert_eq!(image.get_pixel(7, 0).0, [255, 255, 255, 255]);
        assert_eq!(image.get_pixel(7, 1).0, [9, 9, 9, 255]);
    }

    #[test]
    fn test_capture_rejects_bad_input() {
        let region = CardRegion::new(vec![face(2, 2, [0, 0, 0, 255])]);
        let bad = CaptureOptions { scale: 0.0, background: None };
        assert!(matches!(CardRasterizer.capture(&region, &bad), Err(ExportError::InvalidScale(_))));
        assert!(matches!(
            CardRasterizer.capture(&CardRegion::default(), &CaptureOptions::default()),
            Err(ExportError::EmptyRegion)
        ));
    }

    /// Remembers the path it was given and whether the file existed then.
    struct SeenSpooler {
        seen: std::cell::RefCell<Option<(PathBuf, bool)>>,
        fail: bool,
    }

    impl PrintSpooler for SeenSpooler {
        fn print(&self, path: &Path) -> Result<(), ExportError> {
            *self.seen.borrow_mut() = Some((path.to_path_buf(), path.exists()));
            if self.fail {
                Err(ExportError::Print("printer offline".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn print_once(fail: bool) -> (Result<(), ExportError>, PathBuf, bool) {
        let spooler = SeenSpooler { seen: std::cell::RefCell::new(None), fail };
        let dir = tempfile::tempdir().unwrap();
        let exporter =
            CardExporter::new(CardRasterizer, crate::pdf::PdfAssembler, &spooler, dir.path());
        let result = exporter.print(&CardRegion::new(vec![face(4, 4, [1, 2, 3, 255])]));
        let (path, existed) = spooler.seen.borrow_mut().take().unwrap();
        (result, path, existed)
    }

    #[test]
    fn test_print_removes_temporary_file() {
        let (result, path, existed) = print_once(false);
        assert!(result.is_ok());
        assert!(existed);
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("idcard-print-"));
        assert!(!path.exists());
    }

    #[test]
    fn test_print_failure_still_removes_temporary_file() {
        let (result, path, existed) = print_once(true);
        assert!(matches!(result, Err(ExportError::Print(_))));
        assert!(existed);
        assert!(!path.exists());
    }
}
