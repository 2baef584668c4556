//! The undo cache: a holding area for frames removed from the timeline.
//!
//! Deleting a frame moves its file here instead of destroying it, so the
//! delete can be undone by moving it back. The cache is emptied when a
//! project is opened or saved; after that, earlier deletes are final.
//!
//! Every staged file gets a name of its own (`<id>-<frame name>`), with ids
//! never reused for the life of the cache. A history entry that outlives a
//! reset therefore can never pick up a file staged later under the same
//! frame name.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::project::UNDO_CACHE_DIR;

/// Project-scoped staging directory (`<project>/.undo_cache`).
#[derive(Debug)]
pub struct StagingCache {
    dir: PathBuf,
    next_id: AtomicU64,
}

impl StagingCache {
    /// Cache for the project rooted at `root`. Nothing is touched on disk.
    pub fn for_project(root: impl AsRef<Path>) -> Self {
        Self {
            dir: root.as_ref().join(UNDO_CACHE_DIR),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Delete everything in the cache and recreate it empty.
    /// Returns how many files were discarded. Staging ids keep counting.
    pub fn reset(&self) -> std::io::Result<usize> {
        let discarded = self.len();
        if self.dir.exists() {
            std::fs::remove_dir_all(&self.dir)?;
        }
        std::fs::create_dir_all(&self.dir)?;
        if discarded > 0 {
            tracing::info!(discarded, dir = %self.dir.display(), "Undo cache cleared");
        }
        Ok(discarded)
    }

    /// Fresh staging location for `file`.
    fn allocate(&self, file: &Path) -> PathBuf {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.to_string_lossy().into_owned());
        self.dir.join(format!("{id:06}-{name}"))
    }

    /// Whether a file staged from a frame with this name is in the cache.
    pub fn contains(&self, file_name: &str) -> bool {
        std::fs::read_dir(&self.dir)
            .map(|entries| {
                entries.flatten().any(|entry| {
                    entry
                        .file_name()
                        .to_string_lossy()
                        .split_once('-')
                        .is_some_and(|(_, original)| original == file_name)
                })
            })
            .unwrap_or(false)
    }

    /// Move `file` into the cache and return its staged location.
    pub fn stage(&self, file: &Path) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let staged = self.allocate(file);
        move_file(file, &staged)?;
        tracing::debug!(from = %file.display(), to = %staged.display(), "Frame staged");
        Ok(staged)
    }

    /// Move a staged file back to `dest`.
    pub fn restore(&self, staged: &Path, dest: &Path) -> std::io::Result<()> {
        move_file(staged, dest)?;
        tracing::debug!(from = %staged.display(), to = %dest.display(), "Frame restored");
        Ok(())
    }

    /// Permanently remove a staged file. Missing files are not an error.
    pub fn discard(&self, staged: &Path) -> std::io::Result<()> {
        match std::fs::remove_file(staged) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    /// Number of staged files.
    pub fn len(&self) -> usize {
        std::fs::read_dir(&self.dir)
            .map(|entries| entries.flatten().count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Rename, falling back to copy-and-remove when the rename is refused
/// (for example across filesystems).
fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    match std::fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            if !from.is_file() {
                return Err(rename_err);
            }
            std::fs::copy(from, to).map_err(|_| rename_err)?;
            std::fs::remove_file(from)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_and_restore_preserve_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let cache = StagingCache::for_project(dir.path());
        cache.reset().unwrap();

        let frame = dir.path().join("frame_0001.png");
        std::fs::write(&frame, b"frame bytes").unwrap();

        let staged = cache.stage(&frame).unwrap();
        assert!(!frame.exists());
        assert!(cache.contains("frame_0001.png"));
        assert_eq!(cache.len(), 1);

        cache.restore(&staged, &frame).unwrap();
        assert_eq!(std::fs::read(&frame).unwrap(), b"frame bytes");
        assert!(cache.is_empty());
    }

    #[test]
    fn test_staged_names_are_never_reused() {
        let dir = tempfile::tempdir().unwrap();
        let cache = StagingCache::for_project(dir.path());
        cache.reset().unwrap();
        let frame = dir.path().join("frame_0001.png");

        std::fs::write(&frame, b"first").unwrap();
        let first = cache.stage(&frame).unwrap();
        cache.reset().unwrap();

        std::fs::write(&frame, b"second").unwrap();
        let second = cache.stage(&frame).unwrap();

        assert_ne!(first, second);
        assert!(!first.exists());
        assert_eq!(std::fs::read(&second).unwrap(), b"second");
        assert!(cache.contains("frame_0001.png"));
        assert!(!cache.contains("frame_0002.png"));
    }

    #[test]
    fn test_reset_empties_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = StagingCache::for_project(dir.path());
        cache.reset().unwrap();
        std::fs::write(cache.dir().join("frame_0000.png"), b"x").unwrap();
        std::fs::write(cache.dir().join("frame_0001.png"), b"y").unwrap();

        assert_eq!(cache.reset().unwrap(), 2);
        assert!(cache.dir().is_dir());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_stage_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let cache = StagingCache::for_project(dir.path());
        assert!(cache.stage(&dir.path().join("frame_0009.png")).is_err());
    }

    #[test]
    fn test_discard_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let cache = StagingCache::for_project(dir.path());
        assert!(cache.discard(&cache.dir().join("nope.png")).is_ok());
    }
}
