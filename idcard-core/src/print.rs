//! Print Spooling
//!
//! Printing is delegated to the platform: the card is written to a file and
//! handed to the system print command.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Command;

use crate::export::ExportError;

/// Sends a rendered file to a printer.
pub trait PrintSpooler {
    fn print(&self, path: &Path) -> Result<(), ExportError>;
}

impl<T: PrintSpooler + ?Sized> PrintSpooler for &T {
    fn print(&self, path: &Path) -> Result<(), ExportError> {
        (**self).print(path)
    }
}

/// The command line used to print a file; the path is appended last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl PrintCommand {
    /// Platform default: `lp` on Unix-likes, Paint's print switch on Windows.
    pub fn platform_default() -> Self {
        if cfg!(target_os = "windows") {
            Self { program: "mspaint".to_string(), args: vec!["/p".to_string()] }
        } else {
            Self { program: "lp".to_string(), args: vec![] }
        }
    }
}

impl Default for PrintCommand {
    fn default() -> Self {
        Self::platform_default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SystemSpooler {
    command: PrintCommand,
}

impl SystemSpooler {
    pub fn new(command: PrintCommand) -> Self {
        Self { command }
    }
}

impl PrintSpooler for SystemSpooler {
    fn print(&self, path: &Path) -> Result<(), ExportError> {
        let status = Command::new(&self.command.program)
            .args(&self.command.args)
            .arg(path)
            .status()
            .map_err(|e| {
                ExportError::Print(format!("failed to run {}: {}", self.command.program, e))
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(ExportError::Print(format!("{} exited with {}", self.command.program, status)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_per_platform() {
        let command = PrintCommand::platform_default();
        if cfg!(target_os = "windows") {
            assert_eq!(command.program, "mspaint");
        } else {
            assert_eq!(command.program, "lp");
            assert!(command.args.is_empty());
        }
    }

    #[test]
    fn test_missing_program_is_print_error() {
        let spooler = SystemSpooler::new(PrintCommand {
            program: "idcard-no-such-print-program".to_string(),
            args: vec![],
        });
        let err = spooler.print(Path::new("card.png")).unwrap_err();
        assert!(matches!(err, ExportError::Print(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_successful_command() {
        let spooler =
            SystemSpooler::new(PrintCommand { program: "true".to_string(), args: vec![] });
        assert!(spooler.print(Path::new("card.png")).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_command() {
        let spooler =
            SystemSpooler::new(PrintCommand { program: "false".to_string(), args: vec![] });
        assert!(matches!(spooler.print(Path::new("card.png")), Err(ExportError::Print(_))));
    }
}
