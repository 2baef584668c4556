//! Timeline playback cursor.

use std::path::PathBuf;
use std::time::Duration;

use stopframe_common::clock::{FrameCadence, RateController};
use stopframe_project_model::{ProjectMetadata, Timeline};

/// Steps through the timeline at the project frame rate.
///
/// The cursor does not own a timer. Callers either sleep for
/// [`Playback::interval`] between calls to [`Playback::next_path`], or poll
/// [`Playback::poll`] from a faster loop.
#[derive(Debug)]
pub struct Playback {
    fps: u32,
    looping: bool,
    position: usize,
    playing: bool,
    gate: RateController,
}

impl Playback {
    pub fn new(fps: u32, looping: bool) -> Self {
        let fps = fps.max(1);
        Self {
            fps,
            looping,
            position: 0,
            playing: false,
            gate: RateController::new(fps),
        }
    }

    pub fn from_metadata(meta: &ProjectMetadata) -> Self {
        Self::new(meta.fps, meta.loop_playback)
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Index of the frame the next call will show.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Time each frame stays on screen.
    pub fn interval(&self) -> Duration {
        FrameCadence::from_fps(self.fps).interval()
    }

    /// Start from the first frame.
    pub fn start(&mut self) {
        self.position = 0;
        self.playing = true;
        self.gate.reset();
    }

    pub fn stop(&mut self) {
        self.playing = false;
    }

    /// Frame to show now, advancing the cursor.
    ///
    /// At the end of the timeline playback wraps to the first frame when
    /// looping and stops otherwise. An empty timeline stops immediately.
    pub fn next_path(&mut self, timeline: &Timeline) -> Option<PathBuf> {
        if !self.playing {
            return None;
        }
        if timeline.is_empty() {
            self.playing = false;
            return None;
        }

        if self.position >= timeline.len() {
            if self.looping {
                self.position = 0;
            } else {
                self.playing = false;
                return None;
            }
        }

        let path = timeline.get(self.position).map(|f| f.path().to_path_buf());
        self.position += 1;
        path
    }

    /// Like [`Playback::next_path`], but only once per frame interval.
    pub fn poll(&mut self, timeline: &Timeline, now_ns: u64) -> Option<PathBuf> {
        if !self.playing || !self.gate.should_tick(now_ns) {
            return None;
        }
        self.next_path(timeline)
    }
}
