//! Integration test crate for vPTZ.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! It wires the mixer session, the framing store and the control surface
//! together over in-process links.

#[cfg(test)]
mod harness;

#[cfg(test)]
mod scenarios;

#[cfg(test)]
mod session;

#[cfg(test)]
mod persistence;
