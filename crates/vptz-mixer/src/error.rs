//! Error types for the mixer protocol layer.

use thiserror::Error;

/// Errors raised while talking to a mixer instance.
#[derive(Debug, Error)]
pub enum MixerError {
    /// Tally payload that is not a string of tally digits.
    #[error("malformed tally payload: {0}")]
    MalformedTally(String),

    /// XML snapshot that could not be parsed.
    #[error("malformed XML snapshot: {0}")]
    MalformedXml(String),

    /// Inbound protocol line that violates the framing rules.
    #[error("malformed protocol frame: {0}")]
    MalformedFrame(String),

    /// Declared or buffered frame larger than the configured limit.
    #[error("inbound frame of {len} bytes exceeds the {limit} byte limit")]
    FrameTooLarge { len: usize, limit: usize },

    /// Connection attempt did not complete in time.
    #[error("connect to {endpoint} timed out")]
    ConnectTimeout { endpoint: String },

    /// The transport task has gone away.
    #[error("transport to {endpoint} is closed")]
    Closed { endpoint: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<quick_xml::Error> for MixerError {
    fn from(e: quick_xml::Error) -> Self {
        Self::MalformedXml(e.to_string())
    }
}

/// Result type alias for mixer operations.
pub type MixerResult<T> = std::result::Result<T, MixerError>;
