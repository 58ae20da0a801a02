//! Contract Invariant Tests
//!
//! These tests drive the form controller and the exporter end to end with
//! in-memory collaborators.

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use image::{Rgba, RgbaImage};
use idcard_core::{
    crop::{self, encode_png, CropSettings},
    export::{PDF_FILENAME, PNG_FILENAME},
    form::{Field, PhotoFile, TextField},
    session::{CropStage, SUBMIT_BUSY_LABEL, SUBMIT_FAILURE_ALERT, SUBMIT_LABEL},
    submission::{HttpResponse, MultipartForm, Part, SubmitError, Transport},
    CardExporter, CardRasterizer, CardRegion, ExportError, FormSession, Interaction,
    PdfAssembler, PrintSpooler, SubmitOutcome,
};

/// Records every request and answers with a canned result.
struct RecordingTransport {
    requests: RefCell<Vec<(String, MultipartForm)>>,
    reply: Result<HttpResponse, String>,
}

impl RecordingTransport {
    fn ok(body: &str) -> Self {
        Self {
            requests: RefCell::new(vec![]),
            reply: Ok(HttpResponse { status: 200, body: body.to_string() }),
        }
    }

    fn status(status: u16) -> Self {
        Self {
            requests: RefCell::new(vec![]),
            reply: Ok(HttpResponse { status, body: String::new() }),
        }
    }

    fn rejecting() -> Self {
        Self {
            requests: RefCell::new(vec![]),
            reply: Err("connection refused".to_string()),
        }
    }
}

impl Transport for RecordingTransport {
    fn post(&self, url: &str, form: &MultipartForm) -> Result<HttpResponse, SubmitError> {
        self.requests.borrow_mut().push((url.to_string(), form.clone()));
        self.reply.clone().map_err(SubmitError::Transport)
    }
}

/// Keeps the path and the bytes it was asked to print.
struct RecordingSpooler {
    printed: RefCell<Vec<(PathBuf, Vec<u8>)>>,
}

impl PrintSpooler for RecordingSpooler {
    fn print(&self, path: &Path) -> Result<(), ExportError> {
        let bytes = std::fs::read(path)?;
        self.printed.borrow_mut().push((path.to_path_buf(), bytes));
        Ok(())
    }
}

const ENDPOINT: &str = "http://cards.test";

fn photo_png(width: u32, height: u32) -> Vec<u8> {
    encode_png(&RgbaImage::from_pixel(width, height, Rgba([120, 80, 40, 255]))).unwrap()
}

fn filled_session() -> FormSession {
    let mut session = FormSession::new();
    for (field, value) in [
        (TextField::Name, "Ada Lovelace"),
        (TextField::RegNo, "GFG-2024/001"),
        (TextField::Email, "ada@example.org"),
        (TextField::Phone, "+44 20 7946 0018"),
    ] {
        session.dispatch(Interaction::Text { field, value: value.to_string() });
    }
    session.dispatch(Interaction::SelectPhoto(PhotoFile::new("ada.png", photo_png(400, 200))));
    session
}

#[test]
fn invariant_submit_enabled_iff_all_fields_valid() {
    let mut session = FormSession::new();
    assert!(!session.submit_control().enabled);

    session.dispatch(Interaction::Text { field: TextField::Name, value: "Ada".into() });
    session.dispatch(Interaction::Text { field: TextField::RegNo, value: "REG001".into() });
    session.dispatch(Interaction::Text {
        field: TextField::Email,
        value: "ada@example.org".into(),
    });
    session.dispatch(Interaction::Text { field: TextField::Phone, value: "0123456789".into() });
    assert!(!session.submit_control().enabled, "photo still missing");

    session.dispatch(Interaction::SelectPhoto(PhotoFile::new("a.png", photo_png(10, 10))));
    assert!(session.submit_control().enabled);
    assert_eq!(session.submit_control().label, SUBMIT_LABEL);

    session.dispatch(Interaction::Text { field: TextField::Email, value: "ada@example".into() });
    assert!(!session.submit_control().enabled);
    let report = session.field_report(Field::Email).unwrap();
    assert_eq!(report.message, "Please enter a valid email address.");
}

#[test]
fn invariant_oversized_photo_blocks_submit() {
    let mut session = filled_session();
    assert!(session.submit_control().enabled);
    let oversized = PhotoFile::new("big.png", vec![0; 4 * 1024 * 1024 + 1]);
    session.dispatch(Interaction::SelectPhoto(oversized));
    assert!(!session.submit_control().enabled);

    let transport = RecordingTransport::ok("<html>OK</html>");
    assert_eq!(session.submit(&transport, ENDPOINT), SubmitOutcome::Refused);
    assert!(transport.requests.borrow().is_empty());
}

#[test]
fn invariant_cleared_photo_refuses_submit() {
    let mut session = filled_session();
    session.dispatch(Interaction::ApplyCrop);
    session.dispatch(Interaction::ClearPhoto);
    assert!(!session.submit_control().enabled);

    let transport = RecordingTransport::ok("<html>OK</html>");
    assert_eq!(session.submit(&transport, ENDPOINT), SubmitOutcome::Refused);
    assert!(transport.requests.borrow().is_empty());
}

#[test]
fn invariant_new_photo_resets_crop_and_artifact() {
    let mut session = filled_session();
    session.dispatch(Interaction::Zoom(2.0));
    session.dispatch(Interaction::OffsetX(-40));
    session.dispatch(Interaction::ApplyCrop);
    assert_eq!(session.crop_stage(), CropStage::Applied);

    session.dispatch(Interaction::SelectPhoto(PhotoFile::new("b.png", photo_png(50, 90))));
    assert_eq!(session.crop_settings(), CropSettings { zoom: 1.0, offset_x: 0, offset_y: 0 });
    assert!(session.processed_image().is_none());
    assert_eq!(session.crop_stage(), CropStage::Loaded);
}

#[test]
fn invariant_processed_submit_posts_five_parts_once() {
    let mut session = filled_session();
    session.dispatch(Interaction::ApplyCrop);
    let artifact = session.processed_image().unwrap().png.clone();

    let transport = RecordingTransport::ok("<html>OK</html>");
    let outcome = session.submit(&transport, ENDPOINT);
    assert_eq!(
        outcome,
        SubmitOutcome::Replaced { html: "<html>OK</html>".to_string(), processed: true }
    );
    assert_eq!(session.document(), Some("<html>OK</html>"));

    let requests = transport.requests.borrow();
    assert_eq!(requests.len(), 1);
    let (url, form) = &requests[0];
    assert_eq!(url, "http://cards.test/generate");
    assert_eq!(form.parts().len(), 5);
    assert_eq!(
        form.part("name"),
        Some(&Part::Text { name: "name".into(), value: "Ada Lovelace".into() })
    );
    match form.part("photo") {
        Some(Part::File { filename, content_type, data, .. }) => {
            assert_eq!(filename, "processed_photo.png");
            assert_eq!(content_type, "image/png");
            assert_eq!(data, &artifact);
        }
        other => panic!("unexpected photo part: {other:?}"),
    }

    // The page is gone; a second submit must not fire another request.
    drop(requests);
    assert_eq!(session.submit(&transport, ENDPOINT), SubmitOutcome::Refused);
    assert_eq!(transport.requests.borrow().len(), 1);
}

#[test]
fn invariant_unprocessed_submit_sends_original_photo() {
    let mut session = filled_session();
    let transport = RecordingTransport::ok("<html>server cropped</html>");
    let outcome = session.submit(&transport, ENDPOINT);
    assert!(matches!(outcome, SubmitOutcome::Replaced { processed: false, .. }));

    let requests = transport.requests.borrow();
    match requests[0].1.part("photo") {
        Some(Part::File { filename, data, .. }) => {
            assert_eq!(filename, "ada.png");
            assert_eq!(data, &photo_png(400, 200));
        }
        other => panic!("unexpected photo part: {other:?}"),
    }
}

#[test]
fn invariant_stale_artifact_not_uploaded() {
    let mut session = filled_session();
    session.dispatch(Interaction::ApplyCrop);
    session.dispatch(Interaction::Zoom(1.8));
    assert!(session.processed_image().is_none());

    let transport = RecordingTransport::ok("<html>OK</html>");
    let outcome = session.submit(&transport, ENDPOINT);
    assert!(matches!(outcome, SubmitOutcome::Replaced { processed: false, .. }));
}

#[test]
fn invariant_network_failure_restores_control() {
    let mut session = filled_session();
    session.dispatch(Interaction::ApplyCrop);

    let transport = RecordingTransport::rejecting();
    let outcome = session.submit(&transport, ENDPOINT);
    assert_eq!(outcome, SubmitOutcome::Failed { alert: SUBMIT_FAILURE_ALERT });
    assert!(session.submit_control().enabled);
    assert_eq!(session.submit_control().label, SUBMIT_LABEL);
    assert_ne!(session.submit_control().label, SUBMIT_BUSY_LABEL);
    assert!(session.document().is_none());
    // No retry.
    assert_eq!(transport.requests.borrow().len(), 1);
}

#[test]
fn invariant_http_error_is_failure() {
    let mut session = filled_session();
    let transport = RecordingTransport::status(500);
    let outcome = session.submit(&transport, ENDPOINT);
    assert_eq!(outcome, SubmitOutcome::Failed { alert: SUBMIT_FAILURE_ALERT });
    assert!(session.submit_control().enabled);
}

#[test]
fn invariant_preview_geometry_for_landscape() {
    let p = crop::place(400, 200, &CropSettings::default(), crop::PREVIEW_SIZE);
    assert_eq!((p.width, p.height), (400.0, 200.0));
    assert_eq!((p.x, p.y), (-100.0, 0.0));
}

fn card_region() -> CardRegion {
    CardRegion::new(vec![
        RgbaImage::from_pixel(60, 90, Rgba([0, 128, 0, 255])),
        RgbaImage::from_pixel(60, 90, Rgba([0, 0, 128, 255])),
    ])
}

#[test]
fn invariant_exports_are_repeatable() {
    let dir = tempfile::tempdir().unwrap();
    let spooler = RecordingSpooler { printed: RefCell::new(vec![]) };
    let exporter = CardExporter::new(CardRasterizer, PdfAssembler, spooler, dir.path());
    let region = card_region();

    let png1 = exporter.export_png(&region).unwrap();
    let png2 = exporter.export_png(&region).unwrap();
    assert_eq!(png1.path, dir.path().join(PNG_FILENAME));
    assert_eq!(png1.hash, png2.hash);
    assert_eq!(png1.size, [(60 + 20 + 60) * 3, 90 * 3]);

    let pdf = exporter.export_pdf(&region).unwrap();
    assert_eq!(pdf.path, dir.path().join(PDF_FILENAME));
    let bytes = std::fs::read(&pdf.path).unwrap();
    assert!(bytes.starts_with(b"%PDF"));
    assert_eq!(lopdf::Document::load(&pdf.path).unwrap().get_pages().len(), 1);
}

#[test]
fn invariant_print_hands_raster_to_spooler() {
    let dir = tempfile::tempdir().unwrap();
    let spooler = RecordingSpooler { printed: RefCell::new(vec![]) };
    let exporter = CardExporter::new(CardRasterizer, PdfAssembler, &spooler, dir.path());

    exporter.print(&card_region()).unwrap();
    exporter.print(&card_region()).unwrap();

    let printed = spooler.printed.borrow();
    assert_eq!(printed.len(), 2);
    let image = image::load_from_memory(&printed[0].1).unwrap();
    assert_eq!((image.width(), image.height()), (140 * 3, 90 * 3));
    // Spooled files do not outlive the print call.
    assert!(printed.iter().all(|(path, _)| !path.exists()));
}
