//! ID Card Core - form, photo crop and card export engine
//!
//! # Guarantees
//! 1. Submit is enabled iff all five field rules pass
//! 2. A new photo always resets the crop and drops the processed image
//! 3. The processed image reflects the settings at the last "apply"
//! 4. Crop geometry is deterministic and matches the card server
//! 5. Network, capture, PDF and print go through injected traits

pub mod form;
pub mod validation;
pub mod crop;
pub mod session;
pub mod submission;
pub mod export;
pub mod pdf;
pub mod print;
pub mod hashing;
pub mod config;

pub use form::{Field, FormInput, PhotoFile, TextField};
pub use validation::{FieldReport, FieldState, FormValidator, ValidationResult};
pub use crop::{CropSettings, Hexagon, Placement, PhotoError};
pub use session::{CropStage, FormSession, Interaction, SubmitOutcome};
pub use submission::{HttpTransport, MultipartForm, SubmitError, Transport};
pub use export::{
    CaptureOptions, CardExporter, CardRasterizer, CardRegion, ExportError, ExportedFile, Rasterizer,
};
pub use pdf::{DocumentAssembler, PdfAssembler, PdfDocument};
pub use print::{PrintSpooler, SystemSpooler};
pub use config::{CardConfig, ConfigError};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
