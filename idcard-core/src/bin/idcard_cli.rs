//! ID Card CLI - drive the card form and exports from a terminal
//!
//! Commands: validate, crop, submit, export
//! Outputs JSON to stdout
//! Returns 2 on validation/submission failure, 1 on other errors

use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use idcard_core::{
    crop::{self, CropSettings},
    form::{FormInput, PhotoFile, TextField},
    CardConfig, CardExporter, CardRasterizer, CardRegion, FormSession, FormValidator,
    HttpTransport, Interaction, PdfAssembler, SubmitOutcome, SystemSpooler,
};

#[derive(Parser)]
#[command(name = "idcard-cli")]
#[command(about = "ID Card Creator - validate, crop, submit and export cards")]
#[command(version = idcard_core::ENGINE_VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a JSON config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate form fields
    Validate {
        /// JSON payload: {"name", "regNo", "email", "phone", "photo": <path>}
        #[arg(short, long)]
        payload: String,
    },

    /// Render the cropped photo
    Crop {
        /// Source photo
        #[arg(long)]
        photo: PathBuf,

        #[command(flatten)]
        adjust: CropArgs,

        /// Render the unclipped 200px preview instead of the final photo
        #[arg(long)]
        preview: bool,

        /// Output PNG path
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Submit the form to the card server
    Submit {
        /// JSON payload: {"name", "regNo", "email", "phone", "photo": <path>}
        #[arg(short, long)]
        payload: String,

        #[command(flatten)]
        adjust: CropArgs,

        /// Crop locally before upload; otherwise the server crops
        #[arg(long)]
        apply: bool,

        /// Where to write the returned card page (stdout when omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Export a generated card
    Export {
        /// Card face images, left to right
        #[arg(long = "face", required = true)]
        faces: Vec<PathBuf>,

        #[arg(value_enum)]
        target: ExportTarget,
    },
}

#[derive(clap::Args)]
struct CropArgs {
    #[arg(long, default_value_t = 1.0)]
    zoom: f32,

    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    offset_x: i32,

    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    offset_y: i32,
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportTarget {
    Png,
    Pdf,
    Print,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FormPayload {
    #[serde(default)]
    name: String,
    #[serde(default)]
    reg_no: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    phone: String,
    #[serde(default)]
    photo: Option<PathBuf>,
}

impl FormPayload {
    fn parse(payload: &str) -> Result<Self, String> {
        serde_json::from_str(payload).map_err(|e| format!("Invalid payload: {}", e))
    }

    fn photo_file(&self) -> Result<Option<PhotoFile>, String> {
        self.photo
            .as_deref()
            .map(|path| {
                PhotoFile::read(path)
                    .map_err(|e| format!("Cannot read photo {}: {}", path.display(), e))
            })
            .transpose()
    }

    fn text(&self, field: TextField) -> &str {
        match field {
            TextField::Name => &self.name,
            TextField::RegNo => &self.reg_no,
            TextField::Email => &self.email,
            TextField::Phone => &self.phone,
        }
    }

    fn into_input(self) -> Result<FormInput, String> {
        let photo = self.photo_file()?;
        Ok(FormInput {
            name: self.name,
            reg_no: self.reg_no,
            email: self.email,
            phone: self.phone,
            photo,
        })
    }
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("failed to serialize output: {}", e),
    }
}

fn fail(message: impl std::fmt::Display) -> ExitCode {
    print_json(&serde_json::json!({ "success": false, "error": message.to_string() }));
    ExitCode::FAILURE
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let config = match CardConfig::load_or_default(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };

    match cli.command {
        Commands::Validate { payload } => validate(&payload),
        Commands::Crop { photo, adjust, preview, out } => {
            crop_photo(&photo, &adjust, preview, &out)
        }
        Commands::Submit { payload, adjust, apply, out } => {
            submit(&config, &payload, &adjust, apply, out.as_deref())
        }
        Commands::Export { faces, target } => export(&config, &faces, target),
    }
}

fn validate(payload: &str) -> ExitCode {
    let input = match FormPayload::parse(payload).and_then(FormPayload::into_input) {
        Ok(i) => i,
        Err(e) => return fail(e),
    };

    let result = FormValidator::new().validate_form(&input);
    print_json(&serde_json::json!(result));
    if result.valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    }
}

fn crop_photo(photo: &Path, adjust: &CropArgs, preview: bool, out: &Path) -> ExitCode {
    let bytes = match fs::read(photo) {
        Ok(b) => b,
        Err(e) => return fail(format!("Cannot read photo {}: {}", photo.display(), e)),
    };
    let image = match crop::decode_photo(&bytes) {
        Ok(i) => i,
        Err(e) => return fail(e),
    };

    let settings = CropSettings::clamped(adjust.zoom, adjust.offset_x, adjust.offset_y);
    let (rendered, frame) = if preview {
        (crop::render_preview(&image, &settings), crop::PREVIEW_SIZE)
    } else {
        (crop::render_export(&image, &settings), crop::EXPORT_SIZE)
    };
    if let Err(e) = rendered.save_with_format(out, image::ImageFormat::Png) {
        return fail(e);
    }

    let placement = crop::place(image.width(), image.height(), &settings, frame);
    print_json(&serde_json::json!({
        "success": true,
        "out": out,
        "settings": settings,
        "zoomLabel": settings.zoom_label(),
        "placement": {
            "x": placement.x,
            "y": placement.y,
            "width": placement.width,
            "height": placement.height,
        },
    }));
    ExitCode::SUCCESS
}

fn submit(
    config: &CardConfig,
    payload: &str,
    adjust: &CropArgs,
    apply: bool,
    out: Option<&Path>,
) -> ExitCode {
    let payload = match FormPayload::parse(payload) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };
    let photo = match payload.photo_file() {
        Ok(p) => p,
        Err(e) => return fail(e),
    };

    let mut session = FormSession::new();
    for field in TextField::ALL {
        session.dispatch(Interaction::Text { field, value: payload.text(field).to_string() });
    }
    if let Some(photo) = photo {
        session.dispatch(Interaction::SelectPhoto(photo));
    }
    session.dispatch(Interaction::Zoom(adjust.zoom));
    session.dispatch(Interaction::OffsetX(adjust.offset_x));
    session.dispatch(Interaction::OffsetY(adjust.offset_y));
    if apply {
        session.dispatch(Interaction::ApplyCrop);
    }

    let transport = HttpTransport::new(config.timeout());
    match session.submit(&transport, &config.endpoint) {
        SubmitOutcome::Replaced { html, processed } => {
            match out {
                Some(path) => {
                    if let Err(e) = fs::write(path, &html) {
                        return fail(format!("Cannot write {}: {}", path.display(), e));
                    }
                    print_json(&serde_json::json!({
                        "success": true,
                        "processedPhoto": processed,
                        "out": path,
                    }));
                }
                None => println!("{}", html),
            }
            ExitCode::SUCCESS
        }
        SubmitOutcome::Failed { alert } => {
            print_json(&serde_json::json!({ "success": false, "error": alert }));
            ExitCode::from(2)
        }
        SubmitOutcome::Refused => {
            let result = FormValidator::new().validate_form(session.input());
            print_json(&serde_json::json!({ "success": false, "validation": result }));
            ExitCode::from(2)
        }
    }
}

fn export(config: &CardConfig, faces: &[PathBuf], target: ExportTarget) -> ExitCode {
    let region = match CardRegion::open(faces) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };
    let exporter = CardExporter::new(
        CardRasterizer,
        PdfAssembler,
        SystemSpooler::new(config.print_command()),
        &config.output_dir,
    )
    .with_options(config.capture_options());

    let result = match target {
        ExportTarget::Png => exporter.export_png(&region).map(Some),
        ExportTarget::Pdf => exporter.export_pdf(&region).map(Some),
        ExportTarget::Print => exporter.print(&region).map(|()| None),
    };

    match result {
        Ok(file) => {
            print_json(&serde_json::json!({ "success": true, "file": file }));
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}
