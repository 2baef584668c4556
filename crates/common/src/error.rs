//! Error types shared across Stopframe crates.

use std::path::PathBuf;

/// Top-level error type for Stopframe operations.
#[derive(Debug, thiserror::Error)]
pub enum StopframeError {
    #[error("Capture error: {message}")]
    Capture { message: String },

    #[error("Device unavailable: {message}")]
    DeviceUnavailable { message: String },

    #[error("Project error: {message}")]
    Project { message: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using StopframeError.
pub type StopframeResult<T> = Result<T, StopframeError>;

impl StopframeError {
    pub fn capture(msg: impl Into<String>) -> Self {
        Self::Capture {
            message: msg.into(),
        }
    }

    pub fn device_unavailable(msg: impl Into<String>) -> Self {
        Self::DeviceUnavailable {
            message: msg.into(),
        }
    }

    pub fn project(msg: impl Into<String>) -> Self {
        Self::Project {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    /// Whether this error means the device list is stale or the device is gone.
    pub fn is_device_unavailable(&self) -> bool {
        matches!(self, Self::DeviceUnavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_render_messages() {
        let err = StopframeError::device_unavailable("camera 3 is busy");
        assert_eq!(err.to_string(), "Device unavailable: camera 3 is busy");
        assert!(err.is_device_unavailable());
        assert!(!StopframeError::render("x").is_device_unavailable());
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: StopframeError = io.into();
        assert!(matches!(err, StopframeError::Io(_)));
    }
}
