//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory where projects are created by default.
    pub projects_dir: PathBuf,

    /// Capture device settings.
    pub capture: CaptureDefaults,

    /// Onion-skin preview settings.
    pub onion: OnionDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// How the device enumerator treats gaps in device numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProbePolicy {
    /// Stop probing at the first index that fails to open.
    StopAtFirstGap,
    /// Probe every index up to the limit regardless of gaps.
    #[default]
    FullRange,
}

/// Which capture backend to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Video4Linux device nodes, frames grabbed through ffmpeg.
    #[default]
    V4l2,
    /// In-process test-pattern devices.
    Synthetic,
}

/// Default capture parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureDefaults {
    /// Highest device index (exclusive) probed during a scan.
    pub probe_limit: u32,

    /// Gap handling during a scan.
    pub probe_policy: ProbePolicy,

    /// Live frame pump interval in milliseconds.
    pub pump_interval_ms: u64,

    /// Delay before reopening a device after a failed read.
    pub resume_delay_ms: u64,

    /// Backend used to reach devices.
    pub backend: BackendKind,

    /// Frame size `[width, height]` requested from V4L2 devices. The
    /// device's own default is used when absent.
    pub video_size: Option<(u32, u32)>,
}

/// Onion-skin preview defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OnionDefaults {
    /// Whether the preview composites previous frames over the live feed.
    pub enabled: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "stopframe=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            projects_dir: dirs_default_projects(),
            capture: CaptureDefaults::default(),
            onion: OnionDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for CaptureDefaults {
    fn default() -> Self {
        Self {
            probe_limit: 20,
            probe_policy: ProbePolicy::FullRange,
            pump_interval_ms: 33,
            resume_delay_ms: 1500,
            backend: BackendKind::V4l2,
            video_size: None,
        }
    }
}

impl Default for OnionDefaults {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match Self::from_json(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Parse a config document; absent fields take their defaults.
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("stopframe").join("config.json")
}

/// Default projects directory.
fn dirs_default_projects() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    base.join("stopframe").join("projects")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_fills_defaults() {
        let config =
            AppConfig::from_json(r#"{ "capture": { "probe_policy": "stop_at_first_gap" } }"#)
                .unwrap();
        assert_eq!(config.capture.probe_policy, ProbePolicy::StopAtFirstGap);
        assert_eq!(config.capture.probe_limit, 20);
        assert_eq!(config.capture.pump_interval_ms, 33);
        assert!(config.onion.enabled);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_video_size_from_json() {
        let config =
            AppConfig::from_json(r#"{ "capture": { "video_size": [640, 480] } }"#).unwrap();
        assert_eq!(config.capture.video_size, Some((640, 480)));
        assert_eq!(AppConfig::default().capture.video_size, None);
    }

    #[test]
    fn test_backend_kind_serializes_snake_case() {
        let json = serde_json::to_string(&BackendKind::Synthetic).unwrap();
        assert_eq!(json, "\"synthetic\"");
    }
}
