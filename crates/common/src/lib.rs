//! Stopframe Common Utilities
//!
//! Shared infrastructure for all Stopframe crates:
//! - Error types and result aliases
//! - Frame cadence helpers for the live pump and playback loops
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
