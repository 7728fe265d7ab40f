//! vPTZ Core - Foundation types for virtual camera framing
//!
//! This crate provides the fundamental types used throughout vPTZ:
//! - Identifiers for cameras, physical presets and virtual framings
//! - Configuration (identifier sets, input naming, timing, geometry limits)
//! - Framing geometry and the canvas-containment invariant
//! - Easing functions and the eased path engine used by drive transitions
//! - The state snapshot handed to notification subscribers

pub mod config;
pub mod easing;
pub mod error;
pub mod geometry;
pub mod ids;
pub mod path;
pub mod snapshot;

pub use config::{GeometryConfig, InputNaming, MixerConfig, SpeedTable, TimingConfig, VptzConfig};
pub use easing::Ease;
pub use error::{Result, VptzError};
pub use geometry::{PanScale, Xyz};
pub use ids::{CameraId, FramingId, PresetId, Speed};
pub use path::{compute_path, compute_path_with, step_count, PathOptions};
pub use snapshot::{CameraScope, CameraState, FramingState, StateSnapshot};

/// Floating point tolerance used when checking geometric invariants.
pub const GEOMETRY_EPSILON: f64 = 1e-6;
