//! vPTZ Control - the operations a front end invokes
//!
//! This crate sits on top of the mixer session and the framing store:
//! - The optimistic framing cache
//! - Preset, nudge, absolute-set, preview, cut and drive operations
//! - Cancellable tick loops with at most one animation per framing
//! - Coalesced change notification
//! - The bridge from session events to the control surface

pub mod bridge;
pub mod cache;
pub mod error;
pub mod notify;
pub mod ops;
pub mod scheduler;
pub mod surface;

pub use bridge::{run_bridge, spawn_bridge};
pub use cache::FramingCache;
pub use error::{ControlError, ControlResult};
pub use notify::{BroadcastSink, CollectingSink, Notification, NotificationSink, Notifier};
pub use ops::{Adjustment, Direction, PanMove, ZoomMove};
pub use scheduler::{AnimationHandle, AnimationRegistry, Debouncer, Finish, TickLoop};
pub use surface::ControlSurface;
