//! Device discovery by probing indices.

use stopframe_common::config::{CaptureDefaults, ProbePolicy};

use crate::device::{CaptureBackend, CaptureDevice};

/// Probes device indices `0..limit`, opening and immediately releasing each.
#[derive(Debug, Clone)]
pub struct DeviceEnumerator {
    limit: u32,
    policy: ProbePolicy,
}

impl DeviceEnumerator {
    pub fn new(limit: u32, policy: ProbePolicy) -> Self {
        Self { limit, policy }
    }

    pub fn from_config(config: &CaptureDefaults) -> Self {
        Self::new(config.probe_limit, config.probe_policy)
    }

    pub fn policy(&self) -> ProbePolicy {
        self.policy
    }

    /// Blocking scan. Returns every device that opened, in index order.
    pub fn scan(&self, backend: &dyn CaptureBackend) -> Vec<CaptureDevice> {
        let mut devices = Vec::new();

        for index in 0..self.limit {
            match backend.open(index) {
                Ok(mut handle) => {
                    devices.push(handle.device().clone());
                    handle.release();
                }
                Err(e) => {
                    tracing::debug!(index, error = %e, "Probe failed");
                    if self.policy == ProbePolicy::StopAtFirstGap {
                        break;
                    }
                }
            }
        }

        tracing::info!(
            backend = backend.name(),
            found = devices.len(),
            policy = ?self.policy,
            "Device scan complete"
        );
        devices
    }
}

impl Default for DeviceEnumerator {
    fn default() -> Self {
        Self::from_config(&CaptureDefaults::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SyntheticBackend;

    fn ids(devices: &[CaptureDevice]) -> Vec<u32> {
        devices.iter().map(|d| d.id).collect()
    }

    #[test]
    fn test_stop_at_first_gap_assumes_dense_numbering() {
        let backend = SyntheticBackend::new([0, 2]);
        let devices = DeviceEnumerator::new(5, ProbePolicy::StopAtFirstGap).scan(&backend);
        assert_eq!(ids(&devices), vec![0]);
    }

    #[test]
    fn test_full_range_tolerates_gaps() {
        let backend = SyntheticBackend::new([0, 2]);
        let devices = DeviceEnumerator::new(5, ProbePolicy::FullRange).scan(&backend);
        assert_eq!(ids(&devices), vec![0, 2]);
        assert_eq!(backend.open_calls(), 5);
    }

    #[test]
    fn test_probe_handles_are_released() {
        let backend = SyntheticBackend::new([0, 1, 2]);
        DeviceEnumerator::new(3, ProbePolicy::FullRange).scan(&backend);
        assert_eq!(backend.open_handles(), 0);
        assert_eq!(backend.peak_open_handles(), 1);
    }

    #[test]
    fn test_no_devices() {
        let backend = SyntheticBackend::new(std::iter::empty());
        let devices = DeviceEnumerator::new(4, ProbePolicy::FullRange).scan(&backend);
        assert!(devices.is_empty());
    }
}
