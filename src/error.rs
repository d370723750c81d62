//! Error types for the hunter

use thiserror::Error;

use crate::core::{FaultKind, RunStatus};

/// Result type used across the crate
pub type Result<T> = std::result::Result<T, HunterError>;

/// Error type for configuration, collaborator and lifecycle failures
#[derive(Debug, Error)]
pub enum HunterError {
    /// Invalid or incomplete configuration (empty reference set, empty
    /// timeline, out-of-range threshold, ...)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Key injection failed
    #[error("Input actuation failed: {0}")]
    Actuation(String),

    /// Frame source failed to produce an image
    #[error("Capture failed: {0}")]
    Capture(String),

    /// A run is already in progress
    #[error("Hunter already running")]
    AlreadyRunning,

    /// The requested operation is not valid in the current run status
    #[error("Operation not allowed while {0}")]
    InvalidState(RunStatus),

    /// A cancellable wait was interrupted by a stop request
    #[error("Cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML write error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HunterError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn actuation(message: impl Into<String>) -> Self {
        Self::Actuation(message.into())
    }

    pub fn capture(message: impl Into<String>) -> Self {
        Self::Capture(message.into())
    }

    /// Map this error onto the fault category reported to the operator.
    ///
    /// Lifecycle errors and cancellation are not faults and return `None`.
    pub fn fault_kind(&self) -> Option<FaultKind> {
        match self {
            HunterError::Configuration(_)
            | HunterError::TomlDe(_)
            | HunterError::TomlSer(_)
            | HunterError::Json(_) => Some(FaultKind::Configuration),
            HunterError::Actuation(_) => Some(FaultKind::Actuation),
            HunterError::Capture(_) | HunterError::Image(_) | HunterError::Io(_) => {
                Some(FaultKind::Capture)
            }
            HunterError::AlreadyRunning
            | HunterError::InvalidState(_)
            | HunterError::Cancelled => None,
        }
    }
}
