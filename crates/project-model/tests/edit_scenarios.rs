use std::path::Path;

use image::{Rgba, RgbaImage};
use proptest::prelude::*;
use stopframe_project_model::{HistoryEntry, Workspace, WorkspaceError};

fn pattern(seed: u8) -> RgbaImage {
    RgbaImage::from_fn(8, 6, |x, y| {
        Rgba([
            seed.wrapping_add(x as u8 * 17),
            seed.wrapping_mul(3).wrapping_add(y as u8 * 29),
            seed ^ 0x5a,
            255,
        ])
    })
}

fn names(ws: &Workspace) -> Vec<String> {
    ws.timeline().frames().iter().map(|f| f.file_name()).collect()
}

fn assert_consistent(ws: &Workspace) {
    assert!(
        ws.verify().is_empty(),
        "timeline references missing files: {:?}",
        ws.verify()
    );
}

#[test]
fn delete_undo_redo_walkthrough() {
    let dir = tempfile::tempdir().unwrap();
    let mut ws = Workspace::create(dir.path()).unwrap();
    for seed in 0..3 {
        ws.capture(&pattern(seed)).unwrap();
    }
    assert_eq!(
        names(&ws),
        vec!["frame_0000.png", "frame_0001.png", "frame_0002.png"]
    );
    let middle = dir.path().join("frame_0001.png");
    let before = std::fs::read(&middle).unwrap();

    ws.delete(&[1], |_| true).unwrap();
    assert_eq!(names(&ws), vec!["frame_0000.png", "frame_0002.png"]);
    assert!(!middle.exists());
    assert_consistent(&ws);

    ws.undo().unwrap();
    assert_eq!(
        names(&ws),
        vec!["frame_0000.png", "frame_0001.png", "frame_0002.png"]
    );
    assert_eq!(std::fs::read(&middle).unwrap(), before);
    assert_consistent(&ws);

    ws.redo().unwrap();
    assert_eq!(names(&ws), vec!["frame_0000.png", "frame_0002.png"]);
    assert!(ws.staging().contains("frame_0001.png"));
    assert_consistent(&ws);
}

#[test]
fn save_is_a_commit_point_for_deletes() {
    let dir = tempfile::tempdir().unwrap();
    let mut ws = Workspace::create(dir.path()).unwrap();
    for seed in 0..3 {
        ws.capture(&pattern(seed)).unwrap();
    }
    ws.delete(&[1], |_| true).unwrap();
    ws.save().unwrap();
    assert!(ws.staging().is_empty());

    let err = ws.undo().unwrap_err();
    assert!(matches!(err, WorkspaceError::StagedFileMissing { .. }));
    assert_eq!(names(&ws), vec!["frame_0000.png", "frame_0002.png"]);
    assert!(!dir.path().join("frame_0001.png").exists());
    assert_consistent(&ws);

    // Older captures remain undoable.
    let undone = ws.undo().unwrap();
    assert!(matches!(undone, Some(HistoryEntry::Add { .. })));
    assert_eq!(names(&ws), vec!["frame_0000.png"]);
}

#[test]
fn undo_past_save_never_restores_a_newer_frame() {
    let dir = tempfile::tempdir().unwrap();
    let mut ws = Workspace::create(dir.path()).unwrap();
    ws.capture(&pattern(10)).unwrap();
    ws.capture(&pattern(20)).unwrap();
    ws.delete(&[1], |_| true).unwrap();
    ws.save().unwrap();

    let reused = ws.capture(&pattern(99)).unwrap();
    assert_eq!(reused.file_name(), "frame_0001.png");
    let newer = std::fs::read(reused.path()).unwrap();

    ws.undo().unwrap();
    let err = ws.undo().unwrap_err();
    assert!(matches!(err, WorkspaceError::StagedFileMissing { .. }));
    assert_eq!(names(&ws), vec!["frame_0000.png"]);
    assert!(!reused.path().exists());
    assert_consistent(&ws);

    // The newer frame is still parked for redo, untouched.
    ws.redo().unwrap();
    assert_eq!(names(&ws), vec!["frame_0000.png", "frame_0001.png"]);
    assert_eq!(std::fs::read(reused.path()).unwrap(), newer);
    assert_consistent(&ws);
}

#[test]
fn add_undo_redo_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let mut ws = Workspace::create(dir.path()).unwrap();
    ws.capture(&pattern(1)).unwrap();
    let frame = ws.capture(&pattern(2)).unwrap();
    let bytes = std::fs::read(frame.path()).unwrap();

    ws.undo().unwrap();
    assert!(!frame.path().exists());
    assert_eq!(ws.timeline().len(), 1);

    ws.redo().unwrap();
    assert_eq!(ws.timeline().position(frame.path()), Some(1));
    assert_eq!(std::fs::read(frame.path()).unwrap(), bytes);
    assert_consistent(&ws);
}

#[test]
fn redo_add_after_save_fails_and_leaves_timeline() {
    let dir = tempfile::tempdir().unwrap();
    let mut ws = Workspace::create(dir.path()).unwrap();
    ws.capture(&pattern(1)).unwrap();
    let frame = ws.capture(&pattern(2)).unwrap();
    ws.undo().unwrap();
    ws.save().unwrap();

    let err = ws.redo().unwrap_err();
    assert!(matches!(err, WorkspaceError::MissingSourceFile { .. }));
    assert_eq!(ws.timeline().len(), 1);
    assert!(!frame.path().exists());
    assert!(!ws.history().can_redo());
}

#[test]
fn refresh_drops_externally_removed_frames() {
    let dir = tempfile::tempdir().unwrap();
    let mut ws = Workspace::create(dir.path()).unwrap();
    for seed in 0..3 {
        ws.capture(&pattern(seed)).unwrap();
    }
    std::fs::remove_file(dir.path().join("frame_0000.png")).unwrap();
    std::fs::write(dir.path().join("frame_0002.png"), b"truncated").unwrap();

    let dropped = ws.refresh();
    assert_eq!(dropped.len(), 2);
    assert_eq!(names(&ws), vec!["frame_0001.png"]);
    assert_consistent(&ws);
}

#[derive(Debug, Clone)]
enum Op {
    Capture,
    Duplicate(usize),
    Delete(usize),
    Undo,
    Redo,
    Save,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Capture),
        1 => (0usize..6).prop_map(Op::Duplicate),
        2 => (0usize..6).prop_map(Op::Delete),
        2 => Just(Op::Undo),
        2 => Just(Op::Redo),
        1 => Just(Op::Save),
    ]
}

fn frame_files(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .unwrap()
        .flatten()
        .filter(|e| e.file_name().to_string_lossy().starts_with("frame_"))
        .count()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn timeline_always_matches_disk(ops in proptest::collection::vec(op_strategy(), 1..24)) {
        let dir = tempfile::tempdir().unwrap();
        let mut ws = Workspace::create(dir.path()).unwrap();

        for (step, op) in ops.into_iter().enumerate() {
            let _ = match op {
                Op::Capture => ws.capture(&pattern(step as u8)).map(|_| ()),
                Op::Duplicate(i) => ws.duplicate(i).map(|_| ()),
                Op::Delete(i) => ws.delete(&[i], |_| true).map(|_| ()),
                Op::Undo => ws.undo().map(|_| ()),
                Op::Redo => ws.redo().map(|_| ()),
                Op::Save => ws.save(),
            };

            prop_assert!(ws.verify().is_empty());
            prop_assert_eq!(ws.timeline().len(), frame_files(dir.path()));
        }
    }
}
