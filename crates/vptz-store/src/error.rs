//! Error types for the framing store.

use thiserror::Error;

/// Errors that can occur while reading or committing store state.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Transient contention; the transaction is retried.
    #[error("store is busy")]
    Busy,

    /// Retries ran out while the store stayed busy.
    #[error("store still busy after {attempts} attempts")]
    Exhausted { attempts: u32 },

    /// Document written by a newer version.
    #[error("unsupported store document version {found} (supported: {supported})")]
    Version { found: u32, supported: u32 },

    /// Store configuration problem (e.g. no presets configured).
    #[error("store configuration error: {0}")]
    Config(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Whether retrying the transaction may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Busy)
    }
}

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
