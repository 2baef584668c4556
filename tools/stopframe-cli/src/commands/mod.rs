pub mod devices;
pub mod export;
pub mod info;
pub mod init;
pub mod shoot;
pub mod validate;

use std::sync::Arc;

use stopframe_capture_engine::backend::backend_for;
use stopframe_capture_engine::CaptureBackend;
use stopframe_common::config::{AppConfig, BackendKind};

/// Backend from config, overridden by `--synthetic`.
pub fn select_backend(config: &AppConfig, synthetic: bool) -> Arc<dyn CaptureBackend> {
    let mut capture = config.capture.clone();
    if synthetic {
        capture.backend = BackendKind::Synthetic;
    }
    backend_for(&capture)
}
