//! In-process test-pattern devices.
//!
//! Each available index behaves like a camera producing a moving gradient.
//! Availability, open latency, and read failures can be changed at runtime,
//! and open handles are counted, which makes this backend the workhorse of
//! the session tests and of `--synthetic` demos.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use image::{Rgba, RgbaImage};
use stopframe_common::error::{StopframeError, StopframeResult};

use crate::device::{CaptureBackend, CaptureDevice, DeviceHandle};

#[derive(Debug, Default)]
struct SyntheticState {
    available: Mutex<BTreeSet<u32>>,
    pending_read_failures: Mutex<HashMap<u32, u32>>,
    open_delay: Mutex<Duration>,
    open_handles: AtomicUsize,
    peak_open_handles: AtomicUsize,
    open_calls: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Cloning shares the same simulated hardware.
#[derive(Debug, Clone)]
pub struct SyntheticBackend {
    state: Arc<SyntheticState>,
    width: u32,
    height: u32,
}

impl SyntheticBackend {
    /// Devices present at `indices`, producing 320x240 frames.
    pub fn new(indices: impl IntoIterator<Item = u32>) -> Self {
        let state = SyntheticState::default();
        *lock(&state.available) = indices.into_iter().collect();
        Self {
            state: Arc::new(state),
            width: 320,
            height: 240,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width.max(1);
        self.height = height.max(1);
        self
    }

    /// Make every open (including scan probes) block for `delay`.
    pub fn with_open_delay(self, delay: Duration) -> Self {
        *lock(&self.state.open_delay) = delay;
        self
    }

    /// Replace the set of present devices (simulates plugging/unplugging).
    pub fn set_available(&self, indices: impl IntoIterator<Item = u32>) {
        *lock(&self.state.available) = indices.into_iter().collect();
    }

    /// Make the next `count` reads from device `index` fail.
    pub fn fail_next_reads(&self, index: u32, count: u32) {
        lock(&self.state.pending_read_failures).insert(index, count);
    }

    /// Handles currently open.
    pub fn open_handles(&self) -> usize {
        self.state.open_handles.load(Ordering::SeqCst)
    }

    /// Highest number of handles ever open at the same time.
    pub fn peak_open_handles(&self) -> usize {
        self.state.peak_open_handles.load(Ordering::SeqCst)
    }

    /// Total open attempts, successful or not.
    pub fn open_calls(&self) -> usize {
        self.state.open_calls.load(Ordering::SeqCst)
    }
}

impl CaptureBackend for SyntheticBackend {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn open(&self, index: u32) -> StopframeResult<Box<dyn DeviceHandle>> {
        self.state.open_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *lock(&self.state.open_delay);
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        if !lock(&self.state.available).contains(&index) {
            return Err(StopframeError::device_unavailable(format!(
                "no synthetic device at index {index}"
            )));
        }

        let open = self.state.open_handles.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.peak_open_handles.fetch_max(open, Ordering::SeqCst);

        Ok(Box::new(SyntheticHandle {
            device: CaptureDevice::new(index, format!("Synthetic Camera {index}")),
            state: Arc::clone(&self.state),
            width: self.width,
            height: self.height,
            frame_no: 0,
            released: false,
        }))
    }
}

struct SyntheticHandle {
    device: CaptureDevice,
    state: Arc<SyntheticState>,
    width: u32,
    height: u32,
    frame_no: u32,
    released: bool,
}

impl SyntheticHandle {
    fn take_failure(&self) -> bool {
        let mut failures = lock(&self.state.pending_read_failures);
        match failures.get_mut(&self.device.id) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

impl DeviceHandle for SyntheticHandle {
    fn device(&self) -> &CaptureDevice {
        &self.device
    }

    fn read_frame(&mut self) -> StopframeResult<RgbaImage> {
        if self.released {
            return Err(StopframeError::capture("read from released handle"));
        }
        if self.take_failure() {
            return Err(StopframeError::capture(format!(
                "synthetic read failure on device {}",
                self.device.id
            )));
        }

        let shift = self.frame_no.wrapping_mul(4);
        let tint = (self.device.id as u8).wrapping_mul(60);
        self.frame_no = self.frame_no.wrapping_add(1);

        Ok(RgbaImage::from_fn(self.width, self.height, |x, y| {
            Rgba([
                ((x + shift) % 256) as u8,
                (y % 256) as u8,
                tint,
                255,
            ])
        }))
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.state.open_handles.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for SyntheticHandle {
    fn drop(&mut self) {
        self.release();
    }
}
