//! Core types for the weft kernel.
//!
//! This module contains the fundamental types used throughout the kernel:
//!
//! - [`id`]: the strand identifier type
//! - [`state`]: the strand lifecycle state machine
//! - [`value`]: the resume currency carried through the suspend/resume
//!   contract

pub mod id;
pub mod state;
pub mod value;

pub use id::StrandId;
pub use state::StrandState;
pub use value::Value;
