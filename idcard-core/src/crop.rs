//! Photo Cropping - cover-fit geometry, hexagon clip and rendering
//!
//! The geometry here must stay in lockstep with the card server, which fits
//! uploaded photos into the same 285px frame.

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use thiserror::Error;

/// Side of the live preview frame, in pixels.
pub const PREVIEW_SIZE: u32 = 200;
/// Side of the final photo slot on the card, in pixels.
pub const EXPORT_SIZE: u32 = 285;

pub const MIN_ZOOM: f32 = 0.5;
pub const MAX_ZOOM: f32 = 3.0;
/// Offsets are slider values in preview pixels, in `-MAX_OFFSET..=MAX_OFFSET`.
pub const MAX_OFFSET: i32 = 100;

/// Hexagon radius as a fraction of half the frame's shorter side.
const HEXAGON_RADIUS_RATIO: f64 = 0.7;

#[derive(Debug, Error)]
pub enum PhotoError {
    #[error("Unreadable photo: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Photo has no pixels")]
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CropSettings {
    pub zoom: f32,
    pub offset_x: i32,
    pub offset_y: i32,
}

impl Default for CropSettings {
    fn default() -> Self {
        Self { zoom: 1.0, offset_x: 0, offset_y: 0 }
    }
}

impl CropSettings {
    /// Build settings from raw slider values, clamped to the slider ranges.
    pub fn clamped(zoom: f32, offset_x: i32, offset_y: i32) -> Self {
        let zoom = if zoom.is_finite() { zoom.clamp(MIN_ZOOM, MAX_ZOOM) } else { 1.0 };
        Self {
            zoom,
            offset_x: offset_x.clamp(-MAX_OFFSET, MAX_OFFSET),
            offset_y: offset_y.clamp(-MAX_OFFSET, MAX_OFFSET),
        }
    }

    /// Zoom readout next to the slider, e.g. `1.5x`.
    pub fn zoom_label(&self) -> String {
        format!("{:.1}x", self.zoom)
    }
}

/// Where the scaled source lands inside a square frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Cover fit: the smaller image side matches the frame, the other overflows.
pub fn cover_fit(image_width: u32, image_height: u32, frame: u32) -> (f64, f64) {
    let frame = f64::from(frame);
    let aspect = f64::from(image_width) / f64::from(image_height);
    if aspect > 1.0 {
        (frame * aspect, frame)
    } else {
        (frame, frame / aspect)
    }
}

/// Position of the zoomed, offset image in a `frame`-sided square.
///
/// Offsets are expressed in preview pixels and scaled up for larger frames.
pub fn place(
    image_width: u32,
    image_height: u32,
    settings: &CropSettings,
    frame: u32,
) -> Placement {
    let (base_width, base_height) = cover_fit(image_width, image_height, frame);
    let zoom = f64::from(settings.zoom);
    let width = base_width * zoom;
    let height = base_height * zoom;

    let offset_scale = f64::from(frame) / f64::from(PREVIEW_SIZE);
    let side = f64::from(frame);
    Placement {
        x: (side - width) / 2.0 + f64::from(settings.offset_x) * offset_scale,
        y: (side - height) / 2.0 + f64::from(settings.offset_y) * offset_scale,
        width,
        height,
    }
}

/// Regular hexagon centred in a frame, flat sides top and bottom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hexagon {
    pub center_x: f64,
    pub center_y: f64,
    pub radius: f64,
}

impl Hexagon {
    pub fn inscribed(width: u32, height: u32) -> Self {
        let (w, h) = (f64::from(width), f64::from(height));
        Self {
            center_x: w / 2.0,
            center_y: h / 2.0,
            radius: w.min(h) / 2.0 * HEXAGON_RADIUS_RATIO,
        }
    }

    /// Vertices at `k * 60deg`, k = 0..5.
    pub fn vertices(&self) -> [(f64, f64); 6] {
        std::array::from_fn(|k| {
            let angle = k as f64 * std::f64::consts::PI / 3.0;
            (
                self.center_x + self.radius * angle.cos(),
                self.center_y + self.radius * angle.sin(),
            )
        })
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        polygon_contains(&self.vertices(), x, y)
    }
}

/// Convex polygon test: inside iff on the same side of every edge.
fn polygon_contains(vertices: &[(f64, f64); 6], x: f64, y: f64) -> bool {
    let mut sign = 0.0_f64;
    for k in 0..6 {
        let (ax, ay) = vertices[k];
        let (bx, by) = vertices[(k + 1) % 6];
        let cross = (bx - ax) * (y - ay) - (by - ay) * (x - ax);
        if cross == 0.0 {
            continue;
        }
        if sign == 0.0 {
            sign = cross.signum();
        } else if cross.signum() != sign {
            return false;
        }
    }
    true
}

/// Decode a photo, applying its EXIF orientation.
pub fn decode_photo(bytes: &[u8]) -> Result<DynamicImage, PhotoError> {
    let image = image::load_from_memory(bytes)?;
    if image.width() == 0 || image.height() == 0 {
        return Err(PhotoError::Empty);
    }
    Ok(apply_orientation(image, read_exif_orientation(bytes)))
}

/// EXIF orientation tag, 1 (upright) when absent.
fn read_exif_orientation(bytes: &[u8]) -> u32 {
    let mut cursor = Cursor::new(bytes);
    let Ok(reader) = exif::Reader::new().read_from_container(&mut cursor) else {
        return 1;
    };
    reader.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .unwrap_or(1)
}

fn apply_orientation(image: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => image.fliph(),
        3 => image.rotate180(),
        4 => image.flipv(),
        5 => image.rotate90().fliph(),
        6 => image.rotate90(),
        7 => image.rotate270().fliph(),
        8 => image.rotate270(),
        _ => image,
    }
}

/// Bilinear sample at normalised `(u, v)`, edge-clamped. `None` outside the image.
fn sample_bilinear(source: &RgbaImage, u: f64, v: f64) -> Option<Rgba<u8>> {
    if !(0.0..=1.0).contains(&u) || !(0.0..=1.0).contains(&v) {
        return None;
    }
    let (width, height) = source.dimensions();
    let x = (u * f64::from(width) - 0.5).clamp(0.0, f64::from(width - 1));
    let y = (v * f64::from(height) - 0.5).clamp(0.0, f64::from(height - 1));
    let (x0, y0) = (x.floor() as u32, y.floor() as u32);
    let (x1, y1) = ((x0 + 1).min(width - 1), (y0 + 1).min(height - 1));
    let (fx, fy) = (x - f64::from(x0), y - f64::from(y0));

    let p00 = source.get_pixel(x0, y0).0;
    let p10 = source.get_pixel(x1, y0).0;
    let p01 = source.get_pixel(x0, y1).0;
    let p11 = source.get_pixel(x1, y1).0;

    let mut out = [0u8; 4];
    for (c, slot) in out.iter_mut().enumerate() {
        let top = f64::from(p00[c]) * (1.0 - fx) + f64::from(p10[c]) * fx;
        let bottom = f64::from(p01[c]) * (1.0 - fx) + f64::from(p11[c]) * fx;
        *slot = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Some(Rgba(out))
}

/// Shrink `source` to the placed size so sampling sees every source pixel.
/// Lanczos3 matches the filter the card server fits with.
fn fit_source(source: RgbaImage, placement: &Placement) -> RgbaImage {
    let width = (placement.width.round().max(1.0) as u32).min(source.width());
    let height = (placement.height.round().max(1.0) as u32).min(source.height());
    if (width, height) == source.dimensions() {
        return source;
    }
    imageops::resize(&source, width, height, FilterType::Lanczos3)
}

/// Draw `source` into `canvas` at `placement`, optionally clipped to `clip`.
fn draw_placed(
    canvas: &mut RgbaImage,
    source: RgbaImage,
    placement: &Placement,
    clip: Option<&Hexagon>,
) {
    let source = fit_source(source, placement);
    let clip = clip.map(Hexagon::vertices);
    for (px, py, pixel) in canvas.enumerate_pixels_mut() {
        let cx = f64::from(px) + 0.5;
        let cy = f64::from(py) + 0.5;
        if clip.as_ref().is_some_and(|hex| !polygon_contains(hex, cx, cy)) {
            continue;
        }
        let u = (cx - placement.x) / placement.width;
        let v = (cy - placement.y) / placement.height;
        if let Some(sample) = sample_bilinear(&source, u, v) {
            *pixel = sample;
        }
    }
}

/// Live preview: the whole transformed image, unclipped.
pub fn render_preview(image: &DynamicImage, settings: &CropSettings) -> RgbaImage {
    let source = image.to_rgba8();
    let placement = place(source.width(), source.height(), settings, PREVIEW_SIZE);
    let mut canvas = RgbaImage::from_pixel(PREVIEW_SIZE, PREVIEW_SIZE, Rgba([0, 0, 0, 0]));
    draw_placed(&mut canvas, source, &placement, None);
    canvas
}

/// Final photo: export resolution, clipped to the hexagon, transparent outside.
pub fn render_export(image: &DynamicImage, settings: &CropSettings) -> RgbaImage {
    let source = image.to_rgba8();
    let placement = place(source.width(), source.height(), settings, EXPORT_SIZE);
    let hexagon = Hexagon::inscribed(EXPORT_SIZE, EXPORT_SIZE);
    let mut canvas = RgbaImage::from_pixel(EXPORT_SIZE, EXPORT_SIZE, Rgba([0, 0, 0, 0]));
    draw_placed(&mut canvas, source, &placement, Some(&hexagon));
    canvas
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
}
