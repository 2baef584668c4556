//! List capture devices.

use stopframe_capture_engine::DeviceEnumerator;
use stopframe_common::config::{AppConfig, ProbePolicy};

use super::select_backend;

pub async fn run(
    config: &AppConfig,
    synthetic: bool,
    policy: Option<ProbePolicy>,
    limit: Option<u32>,
) -> anyhow::Result<()> {
    let backend = select_backend(config, synthetic);
    let enumerator = DeviceEnumerator::new(
        limit.unwrap_or(config.capture.probe_limit),
        policy.unwrap_or(config.capture.probe_policy),
    );

    println!(
        "Scanning {} devices ({:?})...",
        backend.name(),
        enumerator.policy()
    );

    let devices =
        tokio::task::spawn_blocking(move || enumerator.scan(backend.as_ref())).await?;

    if devices.is_empty() {
        println!("[WARN] No capture devices found");
        return Ok(());
    }

    println!("[OK] {} device(s) found:", devices.len());
    for device in &devices {
        println!("  [{}] {}", device.id, device.display_name);
    }
    Ok(())
}
