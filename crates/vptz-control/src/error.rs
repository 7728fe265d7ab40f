//! Error types for control operations.

use thiserror::Error;
use vptz_core::VptzError;
use vptz_store::StoreError;

/// Errors surfaced to callers of control operations.
#[derive(Debug, Error)]
pub enum ControlError {
    /// Unknown identifier, operation, argument or impossible geometry.
    #[error(transparent)]
    Invalid(#[from] VptzError),

    /// The store failed or stayed busy past the retry cap.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The animation task went away without reporting a result.
    #[error("animation ended without reporting a result")]
    Interrupted,
}

impl ControlError {
    /// Whether the caller sent something unacceptable (vs. an internal failure).
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Invalid(e) if e.is_validation())
    }
}

/// Result type alias for control operations.
pub type ControlResult<T> = std::result::Result<T, ControlError>;
