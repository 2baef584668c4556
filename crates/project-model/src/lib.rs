//! Stopframe Project Model
//!
//! Defines the on-disk project and the editing model built on top of it:
//! - **Project:** per-project metadata and the directory layout
//! - **Timeline:** the ordered list of captured frame files
//! - **Staging:** the `.undo_cache/` holding area for soft-deleted frames
//! - **History:** the undo/redo log, sole writer of timeline order
//! - **Workspace:** the open-project context every edit goes through
//!
//! A frame's identity is its file path. File names are assigned once at
//! capture time and never renumbered, so positions in the timeline and
//! numbers in file names drift apart as the user edits.

pub mod error;
pub mod history;
pub mod project;
pub mod staging;
pub mod timeline;
pub mod workspace;

pub use error::*;
pub use history::*;
pub use project::*;
pub use staging::*;
pub use timeline::*;
pub use workspace::*;
