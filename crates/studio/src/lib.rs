//! Stopframe Studio
//!
//! The controller a front end drives: one [`Studio`] holds the capture
//! session, the open project, the onion-skin toggle, and playback state,
//! and routes user actions to them in the right order.

pub mod error;
pub mod studio;

pub use error::*;
pub use studio::*;
