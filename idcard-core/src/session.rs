//! Form Session - the single controller behind the card form
//!
//! All mutable form state lives here. Interactions are dispatched through
//! `FormSession::dispatch`; submission takes the transport explicitly.

use image::{DynamicImage, RgbaImage};
use serde::Serialize;

use crate::crop::{self, CropSettings};
use crate::form::{Field, FormInput, PhotoFile, TextField};
use crate::submission::{self, PhotoPayload, Transport};
use crate::validation::{FieldReport, FormValidator};

pub const SUBMIT_LABEL: &str = "Generate Card";
pub const SUBMIT_BUSY_LABEL: &str = "Generating...";
pub const SUBMIT_FAILURE_ALERT: &str =
    "An error occurred while generating the card. Please try again.";
pub const CROP_PENDING_STATUS: &str = "Adjust the sliders to position your photo, then click Apply";
pub const CROP_APPLIED_STATUS: &str = "✓ Photo adjustments applied and ready for card generation";

/// Where the photo crop stands for the current selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CropStage {
    NoImage,
    Loaded,
    Adjusted,
    Applied,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CropStatus {
    pub text: &'static str,
    pub applied: bool,
}

impl CropStatus {
    fn pending() -> Self {
        Self { text: CROP_PENDING_STATUS, applied: false }
    }

    fn applied() -> Self {
        Self { text: CROP_APPLIED_STATUS, applied: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitControl {
    pub enabled: bool,
    pub label: &'static str,
}

impl SubmitControl {
    fn idle(enabled: bool) -> Self {
        Self { enabled, label: SUBMIT_LABEL }
    }

    fn busy() -> Self {
        Self { enabled: false, label: SUBMIT_BUSY_LABEL }
    }
}

/// The hexagon-clipped photo produced by "apply".
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedImage {
    pub png: Vec<u8>,
    /// Crop settings at the moment "apply" was pressed.
    pub settings: CropSettings,
}

/// Every user interaction the form reacts to.
#[derive(Debug, Clone)]
pub enum Interaction {
    Text { field: TextField, value: String },
    SelectPhoto(PhotoFile),
    /// The file input was emptied.
    ClearPhoto,
    Zoom(f32),
    OffsetX(i32),
    OffsetY(i32),
    ResetCrop,
    ApplyCrop,
}

/// Result of a submit attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The server answered with a card page, which replaced the document.
    Replaced { html: String, processed: bool },
    /// The request failed; the control is usable again.
    Failed { alert: &'static str },
    /// Submit is disabled (invalid form or a request already running).
    Refused,
}

pub struct FormSession {
    validator: FormValidator,
    input: FormInput,
    reports: Vec<FieldReport>,
    original: Option<DynamicImage>,
    settings: CropSettings,
    processed: Option<ProcessedImage>,
    preview: Option<RgbaImage>,
    stage: CropStage,
    status: CropStatus,
    submit: SubmitControl,
    document: Option<String>,
}

impl FormSession {
    pub fn new() -> Self {
        Self {
            validator: FormValidator::new(),
            input: FormInput::default(),
            reports: vec![],
            original: None,
            settings: CropSettings::default(),
            processed: None,
            preview: None,
            stage: CropStage::NoImage,
            status: CropStatus::pending(),
            submit: SubmitControl::idle(false),
            document: None,
        }
    }

    /// Dispatch table: one handler per interaction kind.
    pub fn dispatch(&mut self, interaction: Interaction) {
        match interaction {
            Interaction::Text { field, value } => self.on_text(field, value),
            Interaction::SelectPhoto(file) => self.on_photo(file),
            Interaction::ClearPhoto => self.on_clear_photo(),
            Interaction::Zoom(zoom) => self.on_slider(CropSettings::clamped(
                zoom,
                self.settings.offset_x,
                self.settings.offset_y,
            )),
            Interaction::OffsetX(x) => {
                self.on_slider(CropSettings::clamped(self.settings.zoom, x, self.settings.offset_y))
            }
            Interaction::OffsetY(y) => {
                self.on_slider(CropSettings::clamped(self.settings.zoom, self.settings.offset_x, y))
            }
            Interaction::ResetCrop => self.on_reset(),
            Interaction::ApplyCrop => self.on_apply(),
        }
        self.refresh_submit_gate();
    }

    fn on_text(&mut self, field: TextField, value: String) {
        self.input.set_text(field, value);
        self.revalidate(field.into());
    }

    fn on_photo(&mut self, file: PhotoFile) {
        let decoded = crop::decode_photo(&file.data);
        self.input.photo = Some(file);
        self.revalidate(Field::Photo);

        self.settings = CropSettings::default();
        self.processed = None;
        self.status = CropStatus::pending();
        match decoded {
            Ok(image) => {
                log::debug!("photo loaded: {}x{}", image.width(), image.height());
                self.original = Some(image);
                self.stage = CropStage::Loaded;
            }
            Err(e) => {
                log::warn!("photo could not be decoded, crop disabled: {}", e);
                self.original = None;
                self.stage = CropStage::NoImage;
            }
        }
        self.redraw_preview();
    }

    fn on_clear_photo(&mut self) {
        self.input.photo = None;
        self.revalidate(Field::Photo);

        self.original = None;
        self.settings = CropSettings::default();
        self.processed = None;
        self.status = CropStatus::pending();
        self.stage = CropStage::NoImage;
        self.preview = None;
        log::debug!("photo cleared");
    }

    fn on_slider(&mut self, settings: CropSettings) {
        self.settings = settings;
        if self.original.is_some() {
            self.processed = None;
            self.status = CropStatus::pending();
            self.stage = CropStage::Adjusted;
        }
        self.redraw_preview();
    }

    fn on_reset(&mut self) {
        self.settings = CropSettings::default();
        self.processed = None;
        self.status = CropStatus::pending();
        if self.original.is_some() {
            self.stage = CropStage::Loaded;
        }
        self.redraw_preview();
    }

    fn on_apply(&mut self) {
        let Some(original) = &self.original else {
            log::debug!("apply ignored: no photo loaded");
            return;
        };
        let clipped = crop::render_export(original, &self.settings);
        match crop::encode_png(&clipped) {
            Ok(png) => {
                log::debug!("crop applied at {} ({} bytes)", self.settings.zoom_label(), png.len());
                self.processed = Some(ProcessedImage { png, settings: self.settings });
                self.status = CropStatus::applied();
                self.stage = CropStage::Applied;
            }
            Err(e) => log::error!("failed to encode cropped photo: {}", e),
        }
    }

    fn revalidate(&mut self, field: Field) {
        let report = self.validator.validate_field(field, &self.input);
        self.reports.retain(|r| r.field != field);
        self.reports.push(report);
    }

    fn refresh_submit_gate(&mut self) {
        if self.submit == SubmitControl::busy() {
            return;
        }
        self.submit = SubmitControl::idle(self.validator.is_submittable(&self.input));
    }

    fn redraw_preview(&mut self) {
        self.preview = self
            .original
            .as_ref()
            .map(|image| crop::render_preview(image, &self.settings));
    }

    /// Submit the form.
    ///
    /// With an applied crop the processed PNG is uploaded; otherwise the
    /// original photo goes up untouched and the server crops it.
    pub fn submit(&mut self, transport: &dyn Transport, endpoint: &str) -> SubmitOutcome {
        if !self.submit.enabled || !self.validator.is_submittable(&self.input) {
            return SubmitOutcome::Refused;
        }
        let Some(photo) = self.input.photo.as_ref() else {
            return SubmitOutcome::Refused;
        };

        let (payload, processed) = match &self.processed {
            Some(image) => (PhotoPayload::Processed(&image.png), true),
            None => (PhotoPayload::Original(photo), false),
        };
        let form = submission::build_payload(&self.input, payload);
        let url = submission::generate_url(endpoint);

        self.submit = SubmitControl::busy();
        log::info!("submitting card request to {} (processed photo: {})", url, processed);

        match submission::request_card(transport, &url, &form) {
            Ok(html) => {
                self.document = Some(html.clone());
                SubmitOutcome::Replaced { html, processed }
            }
            Err(e) => {
                log::error!("card generation failed: {}", e);
                self.submit = SubmitControl::idle(true);
                SubmitOutcome::Failed { alert: SUBMIT_FAILURE_ALERT }
            }
        }
    }

    pub fn input(&self) -> &FormInput {
        &self.input
    }

    /// Latest report for a field; `None` until the field was touched.
    pub fn field_report(&self, field: Field) -> Option<&FieldReport> {
        self.reports.iter().find(|r| r.field == field)
    }

    pub fn crop_settings(&self) -> CropSettings {
        self.settings
    }

    pub fn crop_stage(&self) -> CropStage {
        self.stage
    }

    pub fn crop_status(&self) -> &CropStatus {
        &self.status
    }

    pub fn processed_image(&self) -> Option<&ProcessedImage> {
        self.processed.as_ref()
    }

    pub fn preview(&self) -> Option<&RgbaImage> {
        self.preview.as_ref()
    }

    pub fn submit_control(&self) -> &SubmitControl {
        &self.submit
    }

    /// The page that replaced the form after a successful submit.
    pub fn document(&self) -> Option<&str> {
        self.document.as_deref()
    }
}

impl Default for FormSession {
    fn default() -> Self {
        Self::new()
    }
}
