//! The ordered sequence of captured frames.

use std::path::{Path, PathBuf};

/// One captured frame. Identity is the file path; the position in the
/// timeline is not stored on the frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Frame {
    path: PathBuf,
}

impl Frame {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the frame file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name component, used as the key inside the undo cache.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Whether the backing file is present.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }
}

/// Ordered frames of one project.
///
/// Reads are public; reordering is reserved to the history engine and the
/// workspace so that every change is recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timeline {
    frames: Vec<Frame>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_paths(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            frames: paths.into_iter().map(Frame::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.frames.iter().map(|f| f.path.clone()).collect()
    }

    /// Current position of a frame, looked up by path.
    pub fn position(&self, path: &Path) -> Option<usize> {
        self.frames.iter().position(|f| f.path == path)
    }

    /// Up to `count` frames, most recent first.
    pub fn recent(&self, count: usize) -> impl Iterator<Item = &Frame> {
        self.frames.iter().rev().take(count)
    }

    /// Frames whose file is gone from disk.
    pub fn missing_on_disk(&self) -> Vec<PathBuf> {
        self.frames
            .iter()
            .filter(|f| !f.exists())
            .map(|f| f.path.clone())
            .collect()
    }

    /// Insert at `index`, clamped to the end. Returns the actual position.
    pub(crate) fn insert(&mut self, index: usize, frame: Frame) -> usize {
        let index = index.min(self.frames.len());
        self.frames.insert(index, frame);
        index
    }

    pub(crate) fn remove(&mut self, index: usize) -> Option<Frame> {
        (index < self.frames.len()).then(|| self.frames.remove(index))
    }

    /// Drop every entry that is missing or does not decode as an image.
    /// Surviving entries keep their relative order and file names.
    pub(crate) fn refresh(&mut self) -> Vec<PathBuf> {
        let mut dropped = Vec::new();
        self.frames.retain(|frame| {
            if is_readable_frame(&frame.path) {
                true
            } else {
                tracing::warn!(path = %frame.path.display(), "Dropping unreadable frame");
                dropped.push(frame.path.clone());
                false
            }
        });
        dropped
    }
}

/// Whether a file exists and decodes as an image.
pub fn is_readable_frame(path: &Path) -> bool {
    path.is_file() && image::open(path).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_png(path: &Path) {
        image::RgbImage::from_pixel(2, 2, image::Rgb([1, 2, 3]))
            .save(path)
            .unwrap();
    }

    #[test]
    fn test_insert_clamps_to_end() {
        let mut timeline = Timeline::from_paths(vec![PathBuf::from("a"), PathBuf::from("b")]);
        let at = timeline.insert(10, Frame::new("c"));
        assert_eq!(at, 2);
        assert_eq!(timeline.position(Path::new("c")), Some(2));
    }

    #[test]
    fn test_remove_out_of_range_is_none() {
        let mut timeline = Timeline::from_paths(vec![PathBuf::from("a")]);
        assert!(timeline.remove(1).is_none());
        assert_eq!(timeline.remove(0), Some(Frame::new("a")));
        assert!(timeline.is_empty());
    }

    #[test]
    fn test_recent_is_most_recent_first() {
        let timeline = Timeline::from_paths(["a", "b", "c"].map(PathBuf::from));
        let recent: Vec<_> = timeline.recent(2).map(|f| f.file_name()).collect();
        assert_eq!(recent, vec!["c", "b"]);
        assert_eq!(timeline.recent(10).count(), 3);
    }

    #[test]
    fn test_refresh_drops_missing_and_corrupt_frames() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("frame_0000.png");
        let corrupt = dir.path().join("frame_0001.png");
        let missing = dir.path().join("frame_0002.png");
        let good_tail = dir.path().join("frame_0003.png");
        write_png(&good);
        std::fs::write(&corrupt, b"definitely not a png").unwrap();
        write_png(&good_tail);

        let mut timeline = Timeline::from_paths(vec![
            good.clone(),
            corrupt.clone(),
            missing.clone(),
            good_tail.clone(),
        ]);
        let dropped = timeline.refresh();

        assert_eq!(dropped, vec![corrupt, missing]);
        assert_eq!(timeline.paths(), vec![good, good_tail]);
    }
}
