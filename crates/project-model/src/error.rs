//! Errors raised by timeline and history edits.

use std::path::PathBuf;

use crate::project::ProjectError;

/// Failure of a workspace edit.
///
/// Every variant is raised before the in-memory timeline changes, or after
/// the change has been rolled back, so the timeline never disagrees with
/// the files on disk.
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("No live frame available to capture")]
    NoLiveFrame,

    #[error("Frame file missing on disk: {path}")]
    MissingSourceFile { path: PathBuf },

    #[error("Frame is no longer in the undo cache: {path}")]
    StagedFileMissing { path: PathBuf },

    #[error("Frame index {index} out of range (timeline has {len} frames)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Storage failure at {path}: {source}")]
    Storage {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to encode frame {path}: {source}")]
    Encode {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("Delete was not confirmed")]
    Cancelled,

    #[error(transparent)]
    Project(#[from] ProjectError),
}

impl WorkspaceError {
    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }
}
