//! Fixed-interval live frame pump.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};

use tokio::time::MissedTickBehavior;

use crate::session::{lock, SessionState, Shared};

enum ReadOutcome {
    NoHandle,
    Frame,
    Failed,
}

/// Runs until the manager is dropped or the task is aborted.
pub(crate) async fn run(weak: Weak<Shared>) {
    let interval = match weak.upgrade() {
        Some(s) => s.pump_interval(),
        None => return,
    };
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let Some(shared) = weak.upgrade() else {
            break;
        };
        if shared.suspended.load(Ordering::SeqCst) {
            continue;
        }

        let worker = Arc::clone(&shared);
        match tokio::task::spawn_blocking(move || read_once(&worker)).await {
            Ok(ReadOutcome::Failed) => tracing::trace!("Pump read failed"),
            Ok(ReadOutcome::Frame | ReadOutcome::NoHandle) => {}
            Err(e) => tracing::error!(error = %e, "Pump read task failed"),
        }
    }

    tracing::debug!("Frame pump stopped");
}

/// One read under the handle lock. A failed handle is released and the
/// deferred resume scheduled before the lock is dropped, so neither a swap
/// nor an explicit release can slip in between.
fn read_once(shared: &Arc<Shared>) -> ReadOutcome {
    let mut slot = lock(&shared.slot);
    let Some(handle) = slot.as_mut() else {
        return ReadOutcome::NoHandle;
    };

    match handle.read_frame() {
        Ok(frame) => {
            shared.store_frame(frame);
            ReadOutcome::Frame
        }
        Err(e) => {
            if let Some(mut failed) = slot.take() {
                failed.release();
            }
            shared.set_state(SessionState::Idle);
            Shared::on_read_failure(shared, &e);
            ReadOutcome::Failed
        }
    }
}
