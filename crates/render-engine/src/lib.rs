//! Stopframe Render Engine
//!
//! Everything that turns stored frames into pixels for a viewer:
//! the onion-skin compositor for the live preview, the playback cursor,
//! and export to finished files.
//!
//! # Pipeline Architecture
//!
//! ```text
//! live frame ──────┐
//!                  ├── composite (opacity / i per layer) ──► preview
//! frame_*.png ─────┘
//!   (newest K)
//!
//! frame_*.png ──► FrameFeed (decode, skip bad, resize) ──┬── GifEncoder ──► out.gif
//!                                                        └── ffmpeg x264 ──► out.mp4
//! ```

pub mod compositor;
pub mod export;
pub mod playback;

pub use compositor::*;
pub use export::*;
pub use playback::*;
