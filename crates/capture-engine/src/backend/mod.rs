//! Capture backends.

pub mod synthetic;
pub mod v4l2;

use std::sync::Arc;

use stopframe_common::config::{BackendKind, CaptureDefaults};

use crate::device::CaptureBackend;

pub use synthetic::SyntheticBackend;
pub use v4l2::V4l2Backend;

/// Build the backend selected in configuration.
pub fn backend_for(config: &CaptureDefaults) -> Arc<dyn CaptureBackend> {
    match config.backend {
        BackendKind::V4l2 => Arc::new(V4l2Backend::from_config(config)),
        BackendKind::Synthetic => Arc::new(SyntheticBackend::new([0])),
    }
}
