//! Frame cadence utilities.
//!
//! Two loops in Stopframe run on a fixed beat: the live frame pump
//! (roughly 30 Hz) and timeline playback (the project's fps). This module
//! converts between rates and intervals and gates ticks for callers that
//! poll on their own schedule.

use std::time::Duration;

/// Lowest playback rate a project may use.
pub const MIN_FPS: u32 = 1;

/// Highest playback rate a project may use.
pub const MAX_FPS: u32 = 60;

/// A fixed frame interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCadence {
    interval: Duration,
}

impl FrameCadence {
    /// Cadence for a frame rate, clamped to `[MIN_FPS, MAX_FPS]`.
    pub fn from_fps(fps: u32) -> Self {
        let fps = fps.clamp(MIN_FPS, MAX_FPS);
        Self {
            interval: Duration::from_millis(1000 / fps as u64),
        }
    }

    /// Cadence for an explicit interval in milliseconds (minimum 1 ms).
    pub fn from_millis(ms: u64) -> Self {
        Self {
            interval: Duration::from_millis(ms.max(1)),
        }
    }

    /// Time between two frames.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Frame delay expressed as a `(numerator, denominator)` millisecond ratio,
    /// exact for every rate (1000/fps is not integral for most rates).
    pub fn delay_ratio_ms(fps: u32) -> (u32, u32) {
        (1000, fps.clamp(MIN_FPS, MAX_FPS))
    }
}

/// Tick gate for loops that poll faster than they should act.
#[derive(Debug)]
pub struct RateController {
    target_interval_ns: u64,
    last_tick_ns: Option<u64>,
}

impl RateController {
    /// Create a controller targeting the given Hz rate.
    pub fn new(target_hz: u32) -> Self {
        Self {
            target_interval_ns: 1_000_000_000 / target_hz.max(1) as u64,
            last_tick_ns: None,
        }
    }

    /// Check if enough time has passed for the next tick.
    /// Returns true and updates internal state if ready.
    /// The first call always returns true.
    pub fn should_tick(&mut self, current_ns: u64) -> bool {
        match self.last_tick_ns {
            None => {
                self.last_tick_ns = Some(current_ns);
                true
            }
            Some(last) if current_ns >= last + self.target_interval_ns => {
                self.last_tick_ns = Some(current_ns);
                true
            }
            _ => false,
        }
    }

    /// Forget the last tick so the next call fires immediately.
    pub fn reset(&mut self) {
        self.last_tick_ns = None;
    }

    /// Target interval in nanoseconds.
    pub fn interval_ns(&self) -> u64 {
        self.target_interval_ns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cadence_from_fps() {
        assert_eq!(
            FrameCadence::from_fps(12).interval(),
            Duration::from_millis(83)
        );
        assert_eq!(
            FrameCadence::from_fps(0).interval(),
            Duration::from_millis(1000)
        );
        assert_eq!(
            FrameCadence::from_fps(240).interval(),
            Duration::from_millis(16)
        );
    }

    #[test]
    fn test_cadence_from_millis_never_zero() {
        assert_eq!(
            FrameCadence::from_millis(0).interval(),
            Duration::from_millis(1)
        );
        assert_eq!(
            FrameCadence::from_millis(33).interval(),
            Duration::from_millis(33)
        );
    }

    #[test]
    fn test_delay_ratio() {
        assert_eq!(FrameCadence::delay_ratio_ms(12), (1000, 12));
        assert_eq!(FrameCadence::delay_ratio_ms(99), (1000, 60));
    }

    #[test]
    fn test_rate_controller() {
        let mut ctrl = RateController::new(12);
        assert!(ctrl.should_tick(0)); // first tick always fires
        assert!(!ctrl.should_tick(40_000_000));
        assert!(ctrl.should_tick(84_000_000));
        ctrl.reset();
        assert!(ctrl.should_tick(85_000_000));
    }
}
