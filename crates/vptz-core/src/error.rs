//! Error types for vPTZ.

use thiserror::Error;

/// Main error type for validation and geometric failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VptzError {
    #[error("invalid CAM id \"{0}\"")]
    InvalidCamera(String),

    #[error("invalid PTZ id \"{0}\"")]
    InvalidPreset(String),

    #[error("invalid VPTZ id \"{0}\"")]
    InvalidFraming(String),

    #[error("invalid operation \"{0}\"")]
    InvalidOperation(String),

    #[error("invalid argument \"{0}\"")]
    InvalidArgument(String),

    #[error("invalid speed \"{0}\"")]
    InvalidSpeed(String),

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("invalid path calculated ({0} steps)")]
    EmptyPath(usize),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl VptzError {
    /// Whether this error belongs to the validation class (never retried).
    pub fn is_validation(&self) -> bool {
        !matches!(self, Self::Config(_))
    }
}

/// Result type alias for vPTZ core operations.
pub type Result<T> = std::result::Result<T, VptzError>;
