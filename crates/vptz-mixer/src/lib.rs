//! vPTZ Mixer - protocol client and session state
//!
//! This crate talks to one or two video-mixer instances:
//! - Command records and the line-oriented wire codec
//! - Tally and XML roster parsing
//! - TCP transport with reconnect, plus an in-process link
//! - The fire-and-forget command channel
//! - The session manager that owns the links and the mixer-derived caches

pub mod channel;
pub mod command;
pub mod connection;
pub mod error;
pub mod instance;
pub mod session;
pub mod state;
pub mod tally;
pub mod wire;
pub mod xml;

pub use channel::send;
pub use command::{geometry_commands, CommandBatch, MixerCommand};
pub use connection::{MemoryLink, MixerLink, TcpMixerConnection, TransportEvent, TransportOptions};
pub use error::{MixerError, MixerResult};
pub use instance::{Instance, PerInstance};
pub use session::{EventReceivers, SessionEvent, SessionManager};
pub use state::{LinkState, MixerState};
pub use tally::Tally;
pub use xml::{RosterInput, RosterSnapshot};
