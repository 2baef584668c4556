//! Capture device contracts.

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use stopframe_common::error::StopframeResult;

/// A device found by a scan. Enumerated on demand, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaptureDevice {
    /// Backend-specific device index.
    pub id: u32,

    /// Human-readable name, stable across rescans of the same hardware.
    pub display_name: String,
}

impl CaptureDevice {
    pub fn new(id: u32, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
        }
    }

    /// Fallback name for devices that do not report one.
    pub fn generic(id: u32) -> Self {
        Self::new(id, format!("Camera {id}"))
    }
}

/// An open, exclusive reference to a capture device.
///
/// Dropping a handle releases the device; `release` does the same eagerly
/// and must be idempotent.
pub trait DeviceHandle: Send {
    /// The device this handle is open on.
    fn device(&self) -> &CaptureDevice;

    /// Read and decode one frame, converted to RGBA.
    fn read_frame(&mut self) -> StopframeResult<RgbaImage>;

    /// Give the device back.
    fn release(&mut self);
}

/// Platform access to capture devices.
pub trait CaptureBackend: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Open the device at `index`. Fails with `DeviceUnavailable` when no
    /// usable device sits at that index.
    fn open(&self, index: u32) -> StopframeResult<Box<dyn DeviceHandle>>;
}
