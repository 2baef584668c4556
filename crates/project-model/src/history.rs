//! Undo/redo log over the timeline and the undo cache.
//!
//! The history engine is the only code that reorders the timeline or moves
//! files in and out of the undo cache. Each edit is applied to disk first
//! and to the in-memory timeline second; when the disk step fails, the
//! timeline is left as it was.
//!
//! Undoing an `Add` parks the frame file in the undo cache so that a
//! following redo can bring it back. Parked files are destroyed as soon as
//! the redo stack is cleared by a new edit, or when the cache is emptied
//! on save.

use std::path::{Path, PathBuf};

use crate::error::WorkspaceError;
use crate::staging::StagingCache;
use crate::timeline::{Frame, Timeline};

/// One reversible edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryEntry {
    /// A frame file entered the timeline at `index`. Once the add is
    /// undone, `parked` is where the file waits in the undo cache.
    Add {
        path: PathBuf,
        index: usize,
        parked: Option<PathBuf>,
    },

    /// A frame left the timeline; its file sits at `staged_path` in the
    /// undo cache until the delete is undone or the cache is cleared.
    Delete {
        staged_path: PathBuf,
        original_path: PathBuf,
        original_index: usize,
    },
}

impl HistoryEntry {
    /// The project-side path of the frame this entry concerns.
    pub fn frame_path(&self) -> &Path {
        match self {
            Self::Add { path, .. } => path,
            Self::Delete { original_path, .. } => original_path,
        }
    }
}

/// Outcome of a multi-frame delete. Each index is handled on its own, so
/// some may succeed while others fail.
#[derive(Debug, Default)]
pub struct DeleteReport {
    /// `(index before the delete, frame path)` for each removed frame.
    pub deleted: Vec<(usize, PathBuf)>,
    /// Indices that could not be deleted, with the reason.
    pub failed: Vec<(usize, WorkspaceError)>,
}

impl DeleteReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Undo and redo stacks.
#[derive(Debug, Default)]
pub struct History {
    undo: Vec<HistoryEntry>,
    redo: Vec<HistoryEntry>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Undo stack, oldest first.
    pub fn undo_entries(&self) -> &[HistoryEntry] {
        &self.undo
    }

    /// Redo stack, oldest first.
    pub fn redo_entries(&self) -> &[HistoryEntry] {
        &self.redo
    }

    /// Forget every entry without touching disk.
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    /// Record a frame file that was just written to disk and place it in
    /// the timeline at `index` (clamped). Returns the actual position.
    pub fn do_add(
        &mut self,
        timeline: &mut Timeline,
        cache: &StagingCache,
        path: PathBuf,
        index: usize,
    ) -> usize {
        let index = timeline.insert(index, Frame::new(path.clone()));
        self.clear_redo(cache);
        self.undo.push(HistoryEntry::Add {
            path,
            index,
            parked: None,
        });
        index
    }

    /// Move the frames at `indices` into the undo cache.
    ///
    /// Indices refer to the timeline as it is before the call. They are
    /// processed from the highest down so earlier removals do not shift
    /// later targets; duplicates are ignored.
    pub fn do_delete(
        &mut self,
        timeline: &mut Timeline,
        cache: &StagingCache,
        indices: &[usize],
    ) -> DeleteReport {
        let mut targets = indices.to_vec();
        targets.sort_unstable();
        targets.dedup();

        let mut report = DeleteReport::default();
        for &index in targets.iter().rev() {
            match Self::stage_frame(timeline, cache, index) {
                Ok(entry) => {
                    report
                        .deleted
                        .push((index, entry.frame_path().to_path_buf()));
                    self.undo.push(entry);
                }
                Err(e) => {
                    tracing::warn!(index, error = %e, "Failed to delete frame");
                    report.failed.push((index, e));
                }
            }
        }

        if !report.deleted.is_empty() {
            self.clear_redo(cache);
        }
        report.deleted.reverse();
        report
    }

    /// Revert the most recent edit.
    ///
    /// Returns the entry that was undone, or `None` when there is nothing to
    /// undo. A delete whose file was purged from the cache (by a save)
    /// cannot be restored: the entry is discarded and `StagedFileMissing`
    /// returned.
    pub fn undo(
        &mut self,
        timeline: &mut Timeline,
        cache: &StagingCache,
    ) -> Result<Option<HistoryEntry>, WorkspaceError> {
        let Some(entry) = self.undo.pop() else {
            return Ok(None);
        };

        let result = match &entry {
            HistoryEntry::Add { path, index, .. } => Self::park_added(timeline, cache, path)
                .map(|parked| HistoryEntry::Add {
                    path: path.clone(),
                    index: *index,
                    parked,
                }),
            HistoryEntry::Delete {
                staged_path,
                original_path,
                original_index,
            } => Self::restore_deleted(timeline, cache, staged_path, original_path, *original_index)
                .map(|()| entry.clone()),
        };

        match result {
            Ok(undone) => {
                tracing::info!(path = %undone.frame_path().display(), "Undo");
                self.redo.push(undone.clone());
                Ok(Some(undone))
            }
            Err(e @ WorkspaceError::StagedFileMissing { .. }) => {
                tracing::warn!(error = %e, "Undo target no longer recoverable, entry dropped");
                Err(e)
            }
            Err(e) => {
                self.undo.push(entry);
                Err(e)
            }
        }
    }

    /// Re-apply the most recently undone edit.
    ///
    /// Redo of an `Add` whose file is no longer recoverable fails with
    /// `MissingSourceFile` and the entry is discarded; the timeline does not
    /// change.
    pub fn redo(
        &mut self,
        timeline: &mut Timeline,
        cache: &StagingCache,
    ) -> Result<Option<HistoryEntry>, WorkspaceError> {
        let Some(entry) = self.redo.pop() else {
            return Ok(None);
        };

        let result = match &entry {
            HistoryEntry::Add {
                path,
                index,
                parked,
            } => Self::unpark_added(timeline, cache, path, parked.as_deref(), *index).map(
                |index| HistoryEntry::Add {
                    path: path.clone(),
                    index,
                    parked: None,
                },
            ),
            HistoryEntry::Delete { original_path, .. } => {
                match timeline.position(original_path) {
                    Some(index) => Self::stage_frame(timeline, cache, index),
                    None => Err(WorkspaceError::MissingSourceFile {
                        path: original_path.clone(),
                    }),
                }
            }
        };

        match result {
            Ok(applied) => {
                tracing::info!(path = %applied.frame_path().display(), "Redo");
                self.undo.push(applied.clone());
                Ok(Some(applied))
            }
            Err(e @ WorkspaceError::MissingSourceFile { .. }) => {
                tracing::warn!(error = %e, "Redo target no longer recoverable, entry dropped");
                Err(e)
            }
            Err(e) => {
                self.redo.push(entry);
                Err(e)
            }
        }
    }

    /// Move the frame at `index` into the cache and drop it from the
    /// timeline, producing the matching `Delete` entry.
    fn stage_frame(
        timeline: &mut Timeline,
        cache: &StagingCache,
        index: usize,
    ) -> Result<HistoryEntry, WorkspaceError> {
        let frame = timeline
            .get(index)
            .cloned()
            .ok_or(WorkspaceError::IndexOutOfRange {
                index,
                len: timeline.len(),
            })?;

        let staged_path = cache
            .stage(frame.path())
            .map_err(|e| WorkspaceError::storage(frame.path(), e))?;
        timeline.remove(index);

        Ok(HistoryEntry::Delete {
            staged_path,
            original_path: frame.path().to_path_buf(),
            original_index: index,
        })
    }

    fn restore_deleted(
        timeline: &mut Timeline,
        cache: &StagingCache,
        staged_path: &Path,
        original_path: &Path,
        original_index: usize,
    ) -> Result<(), WorkspaceError> {
        if !staged_path.is_file() {
            return Err(WorkspaceError::StagedFileMissing {
                path: staged_path.to_path_buf(),
            });
        }
        cache
            .restore(staged_path, original_path)
            .map_err(|e| WorkspaceError::storage(original_path, e))?;
        timeline.insert(original_index, Frame::new(original_path));
        Ok(())
    }

    fn park_added(
        timeline: &mut Timeline,
        cache: &StagingCache,
        path: &Path,
    ) -> Result<Option<PathBuf>, WorkspaceError> {
        let parked = if path.is_file() {
            Some(
                cache
                    .stage(path)
                    .map_err(|e| WorkspaceError::storage(path, e))?,
            )
        } else {
            None
        };
        if let Some(index) = timeline.position(path) {
            timeline.remove(index);
        }
        Ok(parked)
    }

    fn unpark_added(
        timeline: &mut Timeline,
        cache: &StagingCache,
        path: &Path,
        parked: Option<&Path>,
        index: usize,
    ) -> Result<usize, WorkspaceError> {
        match parked.filter(|p| p.is_file()) {
            Some(parked) if !path.exists() => cache
                .restore(parked, path)
                .map_err(|e| WorkspaceError::storage(path, e))?,
            _ if path.is_file() => {}
            _ => {
                return Err(WorkspaceError::MissingSourceFile {
                    path: path.to_path_buf(),
                })
            }
        }

        match timeline.position(path) {
            Some(existing) => Ok(existing),
            None => Ok(timeline.insert(index, Frame::new(path))),
        }
    }

    /// Empty the redo stack, destroying files parked by undone adds.
    fn clear_redo(&mut self, cache: &StagingCache) {
        for entry in self.redo.drain(..) {
            if let HistoryEntry::Add {
                parked: Some(parked),
                ..
            } = entry
            {
                if let Err(e) = cache.discard(&parked) {
                    tracing::warn!(path = %parked.display(), error = %e, "Failed to purge undone frame");
                }
            }
        }
    }
}
