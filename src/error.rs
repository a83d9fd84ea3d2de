use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Application-wide error type for the privado CLI.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Configuration(String),

    #[error("Could not resolve path '{}': {reason}", .path.display())]
    Path { path: PathBuf, reason: String },

    #[error("Cannot fetch docker access key: {0}")]
    Access(String),

    #[error("Invalid mount source '{}': {reason}", .path.display())]
    InvalidMount { path: PathBuf, reason: String },

    #[error("Failed to launch scan container: {0}")]
    Launch(String),

    #[error("A scan is already running for this engine")]
    AlreadyRunning,

    #[error("Scan engine exited with status {code}")]
    ChildExecution { code: i32 },

    #[error("Scan interrupted{}", forced_suffix(.forced))]
    Interrupted { forced: bool },

    #[error("Terminating..")]
    Cancelled,

    #[error("Failed to launch editor: {0}")]
    Editor(String),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Failed to write configuration: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("Failed to write user configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Prompt failed: {0}")]
    Prompt(dialoguer::Error),
}

impl AppError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        AppError::Configuration(msg.into())
    }

    pub fn launch<S: Into<String>>(msg: S) -> Self {
        AppError::Launch(msg.into())
    }

    /// Process exit code for this error category.
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Configuration(_)
            | AppError::Path { .. }
            | AppError::Access(_)
            | AppError::InvalidMount { .. }
            | AppError::Editor(_)
            | AppError::ConfigParse(_)
            | AppError::ConfigSerialize(_)
            | AppError::Json(_) => 2,
            AppError::Io(_) | AppError::Launch(_) | AppError::AlreadyRunning | AppError::Prompt(_) => 3,
            AppError::ChildExecution { .. } => 4,
            AppError::Cancelled => 5,
            AppError::Interrupted { .. } => 130,
        }
    }

    /// Operator-initiated terminations are reported, not treated as failures.
    pub fn is_failure(&self) -> bool {
        !matches!(self, AppError::Cancelled | AppError::Interrupted { .. })
    }
}

impl From<dialoguer::Error> for AppError {
    /// Ctrl-C inside an interactive prompt surfaces as an interrupted read.
    fn from(err: dialoguer::Error) -> Self {
        match err {
            dialoguer::Error::IO(io) if io.kind() == io::ErrorKind::Interrupted => {
                AppError::Interrupted { forced: false }
            }
            other => AppError::Prompt(other),
        }
    }
}

fn forced_suffix(forced: &bool) -> &'static str {
    if *forced { " (container was force-killed)" } else { "" }
}
