//! Studio-level errors.

use stopframe_common::error::StopframeError;
use stopframe_project_model::WorkspaceError;

/// Failure of a studio action. Gate failures leave everything untouched.
#[derive(Debug, thiserror::Error)]
pub enum StudioError {
    #[error("No project is open")]
    NoActiveProject,

    #[error("No live frame available to capture")]
    NoLiveFrame,

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error(transparent)]
    Engine(#[from] StopframeError),
}

pub type StudioResult<T> = Result<T, StudioError>;
