//! The open-project context.
//!
//! A `Workspace` exists exactly while a project is open. It owns the
//! metadata, timeline, history, and undo cache of that project, and every
//! edit goes through it. Edits must be serialized by the caller; the type
//! is deliberately not shared across threads.

use std::path::{Path, PathBuf};

use image::RgbaImage;

use crate::error::WorkspaceError;
use crate::history::{DeleteReport, History, HistoryEntry};
use crate::project::{frame_file_name, list_frame_files, ProjectError, ProjectMetadata};
use crate::staging::StagingCache;
use crate::timeline::{Frame, Timeline};

/// An open project.
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    metadata: ProjectMetadata,
    timeline: Timeline,
    history: History,
    cache: StagingCache,
}

impl Workspace {
    /// Create a new project in `root` (created if needed) with default
    /// metadata and an empty undo cache. Existing frame files are ignored.
    pub fn create(root: impl AsRef<Path>) -> Result<Self, WorkspaceError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root).map_err(|e| ProjectError::IoError {
            path: root.clone(),
            source: e,
        })?;

        let metadata = ProjectMetadata::default();
        metadata.save(&root)?;

        let workspace = Self::assemble(root, metadata, Timeline::new())?;
        tracing::info!(root = %workspace.root.display(), "Project created");
        Ok(workspace)
    }

    /// Open an existing project directory.
    ///
    /// Frames are loaded in file-name order; unreadable frames are dropped.
    /// Anything left in the undo cache from an earlier session is discarded.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, WorkspaceError> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(ProjectError::ValidationError {
                message: format!("{} is not a directory", root.display()),
            }
            .into());
        }

        let metadata = ProjectMetadata::load(&root)?;
        let timeline = Timeline::from_paths(list_frame_files(&root)?);
        let mut workspace = Self::assemble(root, metadata, timeline)?;
        let dropped = workspace.refresh();

        tracing::info!(
            root = %workspace.root.display(),
            frames = workspace.timeline.len(),
            dropped = dropped.len(),
            "Project opened"
        );
        Ok(workspace)
    }

    fn assemble(
        root: PathBuf,
        metadata: ProjectMetadata,
        timeline: Timeline,
    ) -> Result<Self, WorkspaceError> {
        let cache = StagingCache::for_project(&root);
        cache
            .reset()
            .map_err(|e| WorkspaceError::storage(cache.dir(), e))?;
        Ok(Self {
            root,
            metadata,
            timeline,
            history: History::new(),
            cache,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn metadata(&self) -> &ProjectMetadata {
        &self.metadata
    }

    /// Change metadata in memory; values are clamped into range. Written
    /// to disk on the next save.
    pub fn update_metadata(&mut self, update: impl FnOnce(&mut ProjectMetadata)) {
        update(&mut self.metadata);
        self.metadata.sanitize();
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn staging(&self) -> &StagingCache {
        &self.cache
    }

    /// Write `live` as a new frame at the end of the timeline.
    ///
    /// An empty image fails with `NoLiveFrame` before anything is written.
    pub fn capture(&mut self, live: &RgbaImage) -> Result<Frame, WorkspaceError> {
        if live.width() == 0 || live.height() == 0 {
            return Err(WorkspaceError::NoLiveFrame);
        }

        let path = self.next_frame_path();
        image::DynamicImage::ImageRgba8(live.clone())
            .to_rgb8()
            .save_with_format(&path, image::ImageFormat::Png)
            .map_err(|e| WorkspaceError::Encode {
                path: path.clone(),
                source: e,
            })?;

        let at = self.timeline.len();
        let index = self
            .history
            .do_add(&mut self.timeline, &self.cache, path.clone(), at);
        tracing::info!(index, path = %path.display(), "Frame captured");
        Ok(Frame::new(path))
    }

    /// Copy the frame at `index` and insert the copy right after it.
    pub fn duplicate(&mut self, index: usize) -> Result<Frame, WorkspaceError> {
        let source = self
            .timeline
            .get(index)
            .cloned()
            .ok_or(WorkspaceError::IndexOutOfRange {
                index,
                len: self.timeline.len(),
            })?;
        if !source.exists() {
            return Err(WorkspaceError::MissingSourceFile {
                path: source.path().to_path_buf(),
            });
        }

        let path = self.next_frame_path();
        std::fs::copy(source.path(), &path).map_err(|e| WorkspaceError::storage(&path, e))?;

        let at = self
            .history
            .do_add(&mut self.timeline, &self.cache, path.clone(), index + 1);
        tracing::info!(from = index, to = at, path = %path.display(), "Frame duplicated");
        Ok(Frame::new(path))
    }

    /// Soft-delete the frames at `indices`.
    ///
    /// `confirm` sees the affected paths and must approve before any file
    /// moves; declining yields `Cancelled`.
    pub fn delete(
        &mut self,
        indices: &[usize],
        confirm: impl FnOnce(&[PathBuf]) -> bool,
    ) -> Result<DeleteReport, WorkspaceError> {
        let targets: Vec<PathBuf> = indices
            .iter()
            .filter_map(|&i| self.timeline.get(i))
            .map(|f| f.path().to_path_buf())
            .collect();
        if !confirm(&targets) {
            return Err(WorkspaceError::Cancelled);
        }

        let report = self
            .history
            .do_delete(&mut self.timeline, &self.cache, indices);
        tracing::info!(
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "Frames deleted"
        );
        Ok(report)
    }

    pub fn undo(&mut self) -> Result<Option<HistoryEntry>, WorkspaceError> {
        self.history.undo(&mut self.timeline, &self.cache)
    }

    pub fn redo(&mut self) -> Result<Option<HistoryEntry>, WorkspaceError> {
        self.history.redo(&mut self.timeline, &self.cache)
    }

    /// Re-validate every frame against disk and drop unreadable ones.
    /// Returns the dropped paths. File names are never renumbered.
    pub fn refresh(&mut self) -> Vec<PathBuf> {
        self.timeline.refresh()
    }

    /// Timeline entries whose file is missing. Empty in every consistent state.
    pub fn verify(&self) -> Vec<PathBuf> {
        self.timeline.missing_on_disk()
    }

    /// Persist metadata and empty the undo cache.
    ///
    /// Saving is a commit point: deletes made before the save can no longer
    /// be undone.
    pub fn save(&mut self) -> Result<(), WorkspaceError> {
        self.metadata.touch();
        self.metadata.save(&self.root)?;
        self.cache
            .reset()
            .map_err(|e| WorkspaceError::storage(self.cache.dir(), e))?;
        tracing::info!(root = %self.root.display(), frames = self.timeline.len(), "Project saved");
        Ok(())
    }

    /// Paths of up to `count` frames, most recent first.
    pub fn recent_frame_paths(&self, count: usize) -> Vec<PathBuf> {
        self.timeline
            .recent(count)
            .map(|f| f.path().to_path_buf())
            .collect()
    }

    /// Path for the next new frame: named after the current timeline
    /// length, bumped past any name already used on disk or in the cache.
    fn next_frame_path(&self) -> PathBuf {
        let mut n = self.timeline.len();
        loop {
            let name = frame_file_name(n);
            let candidate = self.root.join(&name);
            if !candidate.exists() && !self.cache.contains(&name) {
                return candidate;
            }
            n += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid(value: u8) -> RgbaImage {
        RgbaImage::from_pixel(4, 3, Rgba([value, value, value, 255]))
    }

    fn names(ws: &Workspace) -> Vec<String> {
        ws.timeline().frames().iter().map(|f| f.file_name()).collect()
    }

    #[test]
    fn test_capture_names_follow_timeline_length() {
        let dir = tempfile::tempdir().unwrap();
        let mut ws = Workspace::create(dir.path()).unwrap();

        for v in 0..3 {
            ws.capture(&solid(v * 10)).unwrap();
        }
        assert_eq!(
            names(&ws),
            vec!["frame_0000.png", "frame_0001.png", "frame_0002.png"]
        );
        assert!(ws.verify().is_empty());
    }

    #[test]
    fn test_capture_after_delete_does_not_overwrite_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut ws = Workspace::create(dir.path()).unwrap();
        for v in 0..3 {
            ws.capture(&solid(v)).unwrap();
        }
        ws.delete(&[0], |_| true).unwrap();

        // Length is 2, but frame_0002.png is still in use.
        let frame = ws.capture(&solid(99)).unwrap();
        assert_eq!(frame.file_name(), "frame_0003.png");
        assert_eq!(
            names(&ws),
            vec!["frame_0001.png", "frame_0002.png", "frame_0003.png"]
        );
    }

    #[test]
    fn test_capture_rejects_empty_frame_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let mut ws = Workspace::create(dir.path()).unwrap();
        let err = ws.capture(&RgbaImage::new(0, 0)).unwrap_err();
        assert!(matches!(err, WorkspaceError::NoLiveFrame));
        assert!(list_frame_files(dir.path()).unwrap().is_empty());
        assert!(!ws.history().can_undo());
    }

    #[test]
    fn test_duplicate_inserts_after_source() {
        let dir = tempfile::tempdir().unwrap();
        let mut ws = Workspace::create(dir.path()).unwrap();
        ws.capture(&solid(1)).unwrap();
        ws.capture(&solid(2)).unwrap();

        let copy = ws.duplicate(0).unwrap();
        assert_eq!(copy.file_name(), "frame_0002.png");
        assert_eq!(
            names(&ws),
            vec!["frame_0000.png", "frame_0002.png", "frame_0001.png"]
        );
        assert_eq!(
            std::fs::read(dir.path().join("frame_0000.png")).unwrap(),
            std::fs::read(copy.path()).unwrap()
        );

        ws.undo().unwrap();
        ws.redo().unwrap();
        assert_eq!(ws.timeline().position(copy.path()), Some(1));
    }

    #[test]
    fn test_duplicate_missing_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut ws = Workspace::create(dir.path()).unwrap();
        let frame = ws.capture(&solid(1)).unwrap();
        std::fs::remove_file(frame.path()).unwrap();

        let err = ws.duplicate(0).unwrap_err();
        assert!(matches!(err, WorkspaceError::MissingSourceFile { .. }));
        assert_eq!(ws.timeline().len(), 1);
        assert!(matches!(
            ws.duplicate(5).unwrap_err(),
            WorkspaceError::IndexOutOfRange { index: 5, len: 1 }
        ));
    }

    #[test]
    fn test_declined_delete_moves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut ws = Workspace::create(dir.path()).unwrap();
        let frame = ws.capture(&solid(1)).unwrap();

        let mut seen = Vec::new();
        let err = ws
            .delete(&[0], |paths| {
                seen = paths.to_vec();
                false
            })
            .unwrap_err();
        assert!(matches!(err, WorkspaceError::Cancelled));
        assert_eq!(seen, vec![frame.path().to_path_buf()]);
        assert!(frame.exists());
        assert!(ws.staging().is_empty());
    }

    #[test]
    fn test_open_loads_sorted_frames_and_resets_cache() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut ws = Workspace::create(dir.path()).unwrap();
            ws.update_metadata(|m| m.fps = 24);
            for v in 0..3 {
                ws.capture(&solid(v)).unwrap();
            }
            ws.delete(&[1], |_| true).unwrap();
            ws.save().unwrap();
        }
        std::fs::write(dir.path().join("frame_0009.png"), b"garbage").unwrap();
        std::fs::write(dir.path().join(".undo_cache").join("stale.png"), b"x").unwrap();

        let ws = Workspace::open(dir.path()).unwrap();
        assert_eq!(names(&ws), vec!["frame_0000.png", "frame_0002.png"]);
        assert_eq!(ws.metadata().fps, 24);
        assert!(ws.staging().is_empty());
        assert!(!ws.history().can_undo());
    }

    #[test]
    fn test_open_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = Workspace::open(dir.path().join("nope")).unwrap_err();
        assert!(matches!(
            err,
            WorkspaceError::Project(ProjectError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_update_metadata_clamps() {
        let dir = tempfile::tempdir().unwrap();
        let mut ws = Workspace::create(dir.path()).unwrap();
        ws.update_metadata(|m| {
            m.onion_layer_count = 40;
            m.fps = 0;
        });
        assert_eq!(ws.metadata().onion_layer_count, 10);
        assert_eq!(ws.metadata().fps, 1);
    }

    #[test]
    fn test_recent_frame_paths() {
        let dir = tempfile::tempdir().unwrap();
        let mut ws = Workspace::create(dir.path()).unwrap();
        let a = ws.capture(&solid(1)).unwrap();
        let b = ws.capture(&solid(2)).unwrap();
        assert_eq!(
            ws.recent_frame_paths(5),
            vec![b.path().to_path_buf(), a.path().to_path_buf()]
        );
    }
}
