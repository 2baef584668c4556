//! Stopframe Capture Engine
//!
//! Discovers capture devices and keeps at most one of them open, feeding
//! decoded frames to the preview on a fixed cadence.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                    CaptureManager                      │
//! │                                                        │
//! │  request_scan ──► [scan task] ──► DeviceEnumerator     │
//! │        ▲                │                              │
//! │        │                ▼                              │
//! │  index 0 fails   request_open ──► [open task]          │
//! │        │                              │                │
//! │        └──────────────────────────────┤                │
//! │                                       ▼                │
//! │               ┌──── handle slot (one mutex) ────┐      │
//! │               │  swap: release old, install new │      │
//! │               │  read: pump tick every ~33 ms   │      │
//! │               └─────────────────────────────────┘      │
//! │                            │                           │
//! │                            ▼                           │
//! │                     latest frame ──► current_frame()   │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! Scan and open run as background tasks, each at most once at a time;
//! a request arriving while its task is in flight is dropped.

pub mod backend;
pub mod device;
pub mod enumerator;
mod pump;
pub mod session;

pub use device::*;
pub use enumerator::*;
pub use session::*;
