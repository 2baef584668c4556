//! Project metadata and directory layout.
//!
//! A project is a plain directory:
//!
//! ```text
//! my-animation/
//! ├── frame_0000.png
//! ├── frame_0001.png
//! ├── frame_0003.png      (numbers may have gaps after edits)
//! ├── project_meta.json
//! └── .undo_cache/        (soft-deleted frames, emptied on save)
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Metadata file name inside the project directory.
pub const META_FILE: &str = "project_meta.json";

/// Staging directory for soft-deleted frames.
pub const UNDO_CACHE_DIR: &str = ".undo_cache";

const FRAME_PREFIX: &str = "frame_";
const FRAME_EXTENSION: &str = ".png";

/// Legal playback rates.
pub const FPS_RANGE: (u32, u32) = (1, 60);
/// Legal onion opacity percentages.
pub const ONION_OPACITY_RANGE: (u8, u8) = (0, 100);
/// Legal onion layer counts.
pub const ONION_LAYER_RANGE: (u8, u8) = (1, 10);

/// File name for the frame captured when the timeline had `n` entries.
pub fn frame_file_name(n: usize) -> String {
    format!("{FRAME_PREFIX}{n:04}{FRAME_EXTENSION}")
}

/// Whether a directory entry looks like a captured frame.
pub fn is_frame_file_name(name: &str) -> bool {
    name.starts_with(FRAME_PREFIX) && name.ends_with(FRAME_EXTENSION)
}

/// Per-project settings (`project_meta.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectMetadata {
    /// Schema version.
    pub version: String,

    /// Creation timestamp (RFC 3339).
    pub created_at: String,

    /// Last save timestamp (RFC 3339).
    pub modified_at: String,

    /// Playback and export frame rate, 1-60.
    pub fps: u32,

    /// Onion-skin base opacity in percent, 0-100.
    pub onion_opacity: u8,

    /// Number of previous frames shown by the onion skin, 1-10.
    pub onion_layer_count: u8,

    /// Whether playback wraps around at the end of the timeline.
    pub loop_playback: bool,

    /// Named UI theme.
    pub theme: String,

    /// Optional color overrides keyed by role (e.g. `"background" -> "#101010"`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_theme: Option<BTreeMap<String, String>>,
}

impl Default for ProjectMetadata {
    fn default() -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            version: "1.0".to_string(),
            created_at: now.clone(),
            modified_at: now,
            fps: 12,
            onion_opacity: 50,
            onion_layer_count: 3,
            loop_playback: true,
            theme: "default".to_string(),
            custom_theme: None,
        }
    }
}

impl ProjectMetadata {
    /// Clamp every numeric field into its legal range.
    pub fn sanitize(&mut self) {
        self.fps = self.fps.clamp(FPS_RANGE.0, FPS_RANGE.1);
        self.onion_opacity = self
            .onion_opacity
            .clamp(ONION_OPACITY_RANGE.0, ONION_OPACITY_RANGE.1);
        self.onion_layer_count = self
            .onion_layer_count
            .clamp(ONION_LAYER_RANGE.0, ONION_LAYER_RANGE.1);
    }

    /// Onion opacity as a blend weight in `[0.0, 1.0]`.
    pub fn onion_opacity_fraction(&self) -> f32 {
        self.onion_opacity.min(ONION_OPACITY_RANGE.1) as f32 / 100.0
    }

    /// Load metadata from a project directory.
    ///
    /// A project without a metadata file gets defaults. Out-of-range values
    /// are clamped rather than rejected.
    pub fn load(root: impl AsRef<Path>) -> Result<Self, ProjectError> {
        let path = root.as_ref().join(META_FILE);
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No project metadata, using defaults");
            return Ok(Self::default());
        }

        let json = std::fs::read_to_string(&path).map_err(|e| ProjectError::IoError {
            path: path.clone(),
            source: e,
        })?;
        let mut meta: Self =
            serde_json::from_str(&json).map_err(|e| ProjectError::ParseError { path, source: e })?;
        meta.sanitize();
        Ok(meta)
    }

    /// Write metadata into a project directory.
    pub fn save(&self, root: impl AsRef<Path>) -> Result<(), ProjectError> {
        let path = root.as_ref().join(META_FILE);
        let json = serde_json::to_string_pretty(self).map_err(|e| ProjectError::ParseError {
            path: path.clone(),
            source: e,
        })?;
        std::fs::write(&path, json).map_err(|e| ProjectError::IoError { path, source: e })
    }

    /// Stamp the modification time.
    pub fn touch(&mut self) {
        self.modified_at = chrono::Utc::now().to_rfc3339();
    }
}

/// List the frame files of a project directory in name order.
pub fn list_frame_files(root: impl AsRef<Path>) -> Result<Vec<PathBuf>, ProjectError> {
    let root = root.as_ref();
    let entries = std::fs::read_dir(root).map_err(|e| ProjectError::IoError {
        path: root.to_path_buf(),
        source: e,
    })?;

    let mut frames: Vec<PathBuf> = entries
        .flatten()
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter(|entry| is_frame_file_name(&entry.file_name().to_string_lossy()))
        .map(|entry| entry.path())
        .collect();
    frames.sort();
    Ok(frames)
}

/// Errors that can occur when working with projects.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid project: {message}")]
    ValidationError { message: String },
}
