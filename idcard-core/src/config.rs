//! Configuration - endpoint, timeouts and export defaults
//!
//! Loaded from an optional JSON file; every key falls back to its default.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::export::{CaptureOptions, DEFAULT_CAPTURE_SCALE};
use crate::print::PrintCommand;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CardConfig {
    /// Base URL of the card-generation server.
    pub endpoint: String,
    pub timeout_secs: u64,
    pub output_dir: PathBuf,
    pub capture_scale: f32,
    /// RGBA fill behind the card; transparent when absent.
    pub capture_background: Option<[u8; 4]>,
    pub print_command: Option<PrintCommand>,
}

impl Default for CardConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:5000".to_string(),
            timeout_secs: 30,
            output_dir: PathBuf::from("."),
            capture_scale: DEFAULT_CAPTURE_SCALE,
            capture_background: None,
            print_command: None,
        }
    }
}

impl CardConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.check()?;
        Ok(config)
    }

    /// Defaults when no path is given.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid("endpoint must not be empty".into()));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeoutSecs must be at least 1".into()));
        }
        if !(self.capture_scale.is_finite() && self.capture_scale > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "captureScale must be positive, got {}",
                self.capture_scale
            )));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn capture_options(&self) -> CaptureOptions {
        CaptureOptions {
            scale: self.capture_scale,
            background: self.capture_background,
        }
    }

    pub fn print_command(&self) -> PrintCommand {
        self.print_command.clone().unwrap_or_default()
    }
}
