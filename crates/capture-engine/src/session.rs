//! Capture session management.
//!
//! [`CaptureManager`] owns the single exclusive device handle. Scans and
//! opens run as background tasks on the tokio runtime the manager was
//! created in; the frame pump reads the held handle on a fixed interval.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use image::RgbaImage;
use stopframe_common::config::CaptureDefaults;
use stopframe_common::error::{StopframeError, StopframeResult};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::device::{CaptureBackend, CaptureDevice, DeviceHandle};
use crate::enumerator::DeviceEnumerator;
use crate::pump;

/// Tuning for a capture session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How often the pump reads from the held device.
    pub pump_interval: Duration,

    /// Wait before re-opening after a read failure.
    pub resume_delay: Duration,

    /// Probe range and policy used by scans.
    pub enumerator: DeviceEnumerator,
}

impl SessionConfig {
    pub fn from_defaults(defaults: &CaptureDefaults) -> Self {
        Self {
            pump_interval: Duration::from_millis(defaults.pump_interval_ms.max(1)),
            resume_delay: Duration::from_millis(defaults.resume_delay_ms),
            enumerator: DeviceEnumerator::from_config(defaults),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from_defaults(&CaptureDefaults::default())
    }
}

/// State of the capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No handle held. Initial state.
    Idle,
    /// A device scan is running.
    Scanning,
    /// A device open is running.
    Opening,
    /// A handle is held and the pump is feeding frames.
    Live,
    /// Scan found nothing or an open failed.
    Error,
}

/// Notifications published to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StateChanged(SessionState),
    /// Emitted exactly once per completed scan.
    DevicesFound(Vec<CaptureDevice>),
    DeviceOpened(CaptureDevice),
    OpenFailed { index: u32, message: String },
    NoDevices,
    ReadFailed { message: String },
}

/// Which background task currently holds the device-access slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InFlight {
    None,
    Scan,
    Open,
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) struct Shared {
    runtime: Handle,
    backend: Arc<dyn CaptureBackend>,
    config: SessionConfig,
    state: watch::Sender<SessionState>,
    in_flight: Mutex<InFlight>,
    /// Held for both handle swaps and frame reads.
    pub(crate) slot: Mutex<Option<Box<dyn DeviceHandle>>>,
    latest: RwLock<Option<Arc<RgbaImage>>>,
    devices: Mutex<Vec<CaptureDevice>>,
    preferred: Mutex<Option<CaptureDevice>>,
    pub(crate) suspended: AtomicBool,
    pump: Mutex<Option<JoinHandle<()>>>,
    /// Deferred resume scheduled after a read failure, if any.
    resume: Mutex<Option<JoinHandle<()>>>,
    events: broadcast::Sender<SessionEvent>,
    frames_read: AtomicU64,
}

/// Owns the device handle and drives the Idle/Scanning/Opening/Live/Error
/// state machine.
pub struct CaptureManager {
    shared: Arc<Shared>,
}

impl CaptureManager {
    /// Create a manager bound to the current tokio runtime.
    pub fn new(backend: Arc<dyn CaptureBackend>, config: SessionConfig) -> StopframeResult<Self> {
        let runtime = Handle::try_current().map_err(|e| {
            StopframeError::capture(format!("capture manager needs a tokio runtime: {e}"))
        })?;
        let (state, _) = watch::channel(SessionState::Idle);
        let (events, _) = broadcast::channel(64);

        tracing::info!(
            backend = backend.name(),
            pump_ms = config.pump_interval.as_millis() as u64,
            "Capture manager created"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                runtime,
                backend,
                config,
                state,
                in_flight: Mutex::new(InFlight::None),
                slot: Mutex::new(None),
                latest: RwLock::new(None),
                devices: Mutex::new(Vec::new()),
                preferred: Mutex::new(None),
                suspended: AtomicBool::new(false),
                pump: Mutex::new(None),
                resume: Mutex::new(None),
                events,
                frames_read: AtomicU64::new(0),
            }),
        })
    }

    pub fn state(&self) -> SessionState {
        *self.shared.state.borrow()
    }

    /// Wait until the session reaches `target`. Returns false on timeout.
    pub async fn wait_for_state(&self, target: SessionState, timeout: Duration) -> bool {
        let mut rx = self.shared.state.subscribe();
        tokio::time::timeout(timeout, rx.wait_for(|s| *s == target))
            .await
            .map(|r| r.is_ok())
            .unwrap_or(false)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    /// Devices found by the most recent completed scan.
    pub fn devices(&self) -> Vec<CaptureDevice> {
        lock(&self.shared.devices).clone()
    }

    /// The device whose handle is currently held.
    pub fn current_device(&self) -> Option<CaptureDevice> {
        lock(&self.shared.slot).as_ref().map(|h| h.device().clone())
    }

    /// Most recent successfully read frame, whatever the current state.
    pub fn current_frame(&self) -> Option<Arc<RgbaImage>> {
        self.shared
            .latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The latest frame, but only while the session is Live.
    pub fn live_frame(&self) -> Option<Arc<RgbaImage>> {
        if self.state() == SessionState::Live {
            self.current_frame()
        } else {
            None
        }
    }

    pub fn frames_read(&self) -> u64 {
        self.shared.frames_read.load(Ordering::Relaxed)
    }

    /// Start a background scan. Returns `None` when a scan or open is
    /// already in flight; the request is dropped, not queued.
    pub fn request_scan(&self) -> Option<JoinHandle<()>> {
        Shared::request_scan(&self.shared)
    }

    /// Start a background open of device `index`. Returns `None` when a
    /// scan or open is already in flight.
    pub fn request_open(&self, index: u32) -> Option<JoinHandle<()>> {
        Shared::request_open(&self.shared, index)
    }

    /// Pause or resume pump reads. The handle stays held while suspended.
    pub fn set_suspended(&self, suspended: bool) {
        let was = self.shared.suspended.swap(suspended, Ordering::SeqCst);
        if was != suspended {
            tracing::debug!(suspended, "Frame pump suspension changed");
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.shared.suspended.load(Ordering::SeqCst)
    }

    /// Give the device back and return to Idle. A pending deferred resume
    /// is cancelled, so the device stays closed until the next request.
    pub fn release(&self) {
        let mut slot = lock(&self.shared.slot);
        if let Some(task) = lock(&self.shared.resume).take() {
            tracing::debug!("Cancelled pending capture resume");
            task.abort();
        }
        if let Some(mut handle) = slot.take() {
            tracing::info!(device = handle.device().id, "Releasing capture device");
            handle.release();
        }
        self.shared.set_state(SessionState::Idle);
    }

    /// Stop the pump, cancel any pending resume and release the device.
    pub fn shutdown(&self) {
        if let Some(task) = lock(&self.shared.pump).take() {
            task.abort();
        }
        self.release();
    }
}

impl Drop for CaptureManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Shared {
    pub(crate) fn set_state(&self, next: SessionState) {
        let changed = self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        if changed {
            tracing::debug!(state = ?next, "Capture state changed");
            self.emit(SessionEvent::StateChanged(next));
        }
    }

    pub(crate) fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    pub(crate) fn store_frame(&self, frame: RgbaImage) {
        *self.latest.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(frame));
        self.frames_read.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn pump_interval(&self) -> Duration {
        self.config.pump_interval
    }

    fn try_begin(&self, from: InFlight, to: InFlight) -> bool {
        let mut in_flight = lock(&self.in_flight);
        if *in_flight == from {
            *in_flight = to;
            true
        } else {
            false
        }
    }

    fn finish(&self) {
        *lock(&self.in_flight) = InFlight::None;
    }

    fn release_locked(slot: &mut Option<Box<dyn DeviceHandle>>) {
        if let Some(mut handle) = slot.take() {
            tracing::debug!(device = handle.device().id, "Released previous handle");
            handle.release();
        }
    }

    fn request_scan(this: &Arc<Self>) -> Option<JoinHandle<()>> {
        if !this.try_begin(InFlight::None, InFlight::Scan) {
            tracing::debug!("Scan request ignored, device task already in flight");
            return None;
        }
        this.set_state(SessionState::Scanning);

        let shared = Arc::clone(this);
        Some(this.runtime.spawn(async move {
            let worker = Arc::clone(&shared);
            let result = tokio::task::spawn_blocking(move || {
                // Probing must not collide with our own held handle.
                Self::release_locked(&mut lock(&worker.slot));
                worker.config.enumerator.scan(worker.backend.as_ref())
            })
            .await;

            let devices = match result {
                Ok(devices) => devices,
                Err(e) => {
                    tracing::error!(error = %e, "Scan task failed");
                    Vec::new()
                }
            };
            Self::on_scan_complete(&shared, devices);
        }))
    }

    fn on_scan_complete(this: &Arc<Self>, devices: Vec<CaptureDevice>) {
        *lock(&this.devices) = devices.clone();
        this.emit(SessionEvent::DevicesFound(devices.clone()));

        if devices.is_empty() {
            this.finish();
            Self::release_locked(&mut lock(&this.slot));
            tracing::warn!("No capture devices found");
            this.set_state(SessionState::Error);
            this.emit(SessionEvent::NoDevices);
            return;
        }

        let preferred = lock(&this.preferred).clone();
        let target = preferred
            .and_then(|p| devices.iter().find(|d| d.display_name == p.display_name))
            .unwrap_or(&devices[0])
            .clone();

        tracing::info!(device = target.id, name = %target.display_name, "Selected capture device");

        // Hand the in-flight slot straight from scan to open.
        if this.try_begin(InFlight::Scan, InFlight::Open) {
            Self::spawn_open(this, target.id);
        } else {
            this.finish();
        }
    }

    fn request_open(this: &Arc<Self>, index: u32) -> Option<JoinHandle<()>> {
        if !this.try_begin(InFlight::None, InFlight::Open) {
            tracing::debug!(index, "Open request ignored, device task already in flight");
            return None;
        }
        Some(Self::spawn_open(this, index))
    }

    fn spawn_open(this: &Arc<Self>, index: u32) -> JoinHandle<()> {
        this.set_state(SessionState::Opening);

        let shared = Arc::clone(this);
        this.runtime.spawn(async move {
            let worker = Arc::clone(&shared);
            let result = tokio::task::spawn_blocking(move || {
                Self::release_locked(&mut lock(&worker.slot));
                worker.backend.open(index)
            })
            .await
            .unwrap_or_else(|e| Err(StopframeError::capture(format!("open task failed: {e}"))));

            Self::on_open_complete(&shared, index, result);
        })
    }

    fn on_open_complete(
        this: &Arc<Self>,
        index: u32,
        result: StopframeResult<Box<dyn DeviceHandle>>,
    ) {
        match result {
            Ok(handle) => {
                let device = handle.device().clone();
                {
                    // The next open may begin once the handle is installed; its
                    // release-then-open waits for this lock.
                    let mut slot = lock(&this.slot);
                    Self::release_locked(&mut slot);
                    *slot = Some(handle);
                    this.finish();
                    this.set_state(SessionState::Live);
                }
                *lock(&this.preferred) = Some(device.clone());
                tracing::info!(device = device.id, name = %device.display_name, "Capture device live");
                this.emit(SessionEvent::DeviceOpened(device));
                Self::ensure_pump(this);
            }
            Err(e) if index == 0 => {
                tracing::warn!(error = %e, "Default device failed to open, rescanning");
                this.finish();
                if Self::request_scan(this).is_none() {
                    this.set_state(SessionState::Error);
                }
            }
            Err(e) => {
                tracing::error!(index, error = %e, "Failed to open capture device");
                this.set_state(SessionState::Error);
                this.finish();
                this.emit(SessionEvent::OpenFailed {
                    index,
                    message: e.to_string(),
                });
            }
        }
    }

    fn ensure_pump(this: &Arc<Self>) {
        let mut pump = lock(&this.pump);
        if pump.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }
        *pump = Some(this.runtime.spawn(pump::run(Arc::downgrade(this))));
        tracing::debug!("Frame pump started");
    }

    /// Called by the pump, still holding the slot lock, after it dropped a
    /// failed handle. Schedules at most one deferred resume.
    pub(crate) fn on_read_failure(this: &Arc<Self>, error: &StopframeError) {
        tracing::warn!(error = %error, "Frame read failed, device released");
        this.emit(SessionEvent::ReadFailed {
            message: error.to_string(),
        });

        let mut resume = lock(&this.resume);
        if resume.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }

        let shared = Arc::clone(this);
        let delay = this.config.resume_delay;
        *resume = Some(this.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            // Gone means `release` cancelled us after the sleep ended.
            if lock(&shared.resume).take().is_none() {
                return;
            }

            if !matches!(shared.state(), SessionState::Idle | SessionState::Error) {
                return;
            }
            let preferred = lock(&shared.preferred).clone();
            tracing::info!(device = ?preferred.as_ref().map(|d| d.id), "Resuming capture");
            match preferred {
                Some(device) => {
                    Self::request_open(&shared, device.id);
                }
                None => {
                    Self::request_scan(&shared);
                }
            }
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SyntheticBackend;
    use stopframe_common::config::ProbePolicy;

    fn config() -> SessionConfig {
        SessionConfig {
            pump_interval: Duration::from_millis(5),
            resume_delay: Duration::from_millis(30),
            enumerator: DeviceEnumerator::new(4, ProbePolicy::FullRange),
        }
    }

    #[test]
    fn test_new_requires_runtime() {
        let backend = Arc::new(SyntheticBackend::new([0]));
        assert!(CaptureManager::new(backend, config()).is_err());
    }

    #[tokio::test]
    async fn test_initial_state_is_idle() {
        let manager = CaptureManager::new(Arc::new(SyntheticBackend::new([0])), config()).unwrap();
        assert_eq!(manager.state(), SessionState::Idle);
        assert!(manager.current_frame().is_none());
        assert!(manager.live_frame().is_none());
    }

    #[tokio::test]
    async fn test_release_returns_to_idle() {
        let backend = SyntheticBackend::new([0]);
        let manager = CaptureManager::new(Arc::new(backend.clone()), config()).unwrap();
        manager.request_open(0).unwrap().await.unwrap();
        assert_eq!(manager.state(), SessionState::Live);

        manager.release();
        assert_eq!(manager.state(), SessionState::Idle);
        assert_eq!(backend.open_handles(), 0);
        assert!(manager.current_device().is_none());
    }

    #[test]
    fn test_session_config_from_defaults() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.pump_interval, Duration::from_millis(33));
        assert_eq!(cfg.resume_delay, Duration::from_millis(1500));
    }
}
