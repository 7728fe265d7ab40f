//! vPTZ Store - durable framing state
//!
//! Keeps the current preset of each camera and the saved geometry of each
//! (camera, preset, framing) in a single versioned document. Writes go
//! through transactions that are retried with backoff while the store is busy.

pub mod backend;
pub mod document;
pub mod error;
pub mod retry;
pub mod store;

pub use backend::{JsonFileBackend, MemoryBackend, StoreBackend};
pub use document::{Document, FramingKey, FramingRecord, DOCUMENT_VERSION};
pub use error::{StoreError, StoreResult};
pub use retry::RetryPolicy;
pub use store::{FramingStore, Tx};
