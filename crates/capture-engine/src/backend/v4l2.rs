//! Video4Linux capture through `/dev/videoN` nodes.
//!
//! Opening a device holds the node open for exclusivity. Frames are grabbed
//! one at a time by shelling out to `ffmpeg`, which decodes whatever pixel
//! format the camera offers and hands back a PNG on stdout.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use image::{ImageFormat, RgbaImage};
use stopframe_common::config::CaptureDefaults;
use stopframe_common::error::{StopframeError, StopframeResult};

use crate::device::{CaptureBackend, CaptureDevice, DeviceHandle};

const DEV_ROOT: &str = "/dev";
const SYSFS_ROOT: &str = "/sys/class/video4linux";

#[derive(Debug, Clone)]
pub struct V4l2Backend {
    dev_root: PathBuf,
    sysfs_root: PathBuf,
    video_size: Option<(u32, u32)>,
}

impl V4l2Backend {
    pub fn new() -> Self {
        Self {
            dev_root: PathBuf::from(DEV_ROOT),
            sysfs_root: PathBuf::from(SYSFS_ROOT),
            video_size: None,
        }
    }

    /// Ask the driver for a specific resolution instead of its default.
    pub fn with_video_size(mut self, width: u32, height: u32) -> Self {
        self.video_size = Some((width, height));
        self
    }

    /// Backend with the frame size requested in `config`, if any.
    pub fn from_config(config: &CaptureDefaults) -> Self {
        match config.video_size {
            Some((width, height)) => Self::new().with_video_size(width, height),
            None => Self::new(),
        }
    }

    fn node_path(&self, index: u32) -> PathBuf {
        self.dev_root.join(format!("video{index}"))
    }

    fn display_name(&self, index: u32) -> String {
        let name_file = self.sysfs_root.join(format!("video{index}")).join("name");
        std::fs::read_to_string(name_file)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| CaptureDevice::generic(index).display_name)
    }
}

impl Default for V4l2Backend {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureBackend for V4l2Backend {
    fn name(&self) -> &str {
        "v4l2"
    }

    fn open(&self, index: u32) -> StopframeResult<Box<dyn DeviceHandle>> {
        let node = self.node_path(index);
        if !node.exists() {
            return Err(StopframeError::device_unavailable(format!(
                "{} does not exist",
                node.display()
            )));
        }

        let file = File::open(&node).map_err(|e| {
            StopframeError::device_unavailable(format!("cannot open {}: {e}", node.display()))
        })?;

        Ok(Box::new(V4l2Handle {
            device: CaptureDevice::new(index, self.display_name(index)),
            node,
            video_size: self.video_size,
            file: Some(file),
        }))
    }
}

struct V4l2Handle {
    device: CaptureDevice,
    node: PathBuf,
    video_size: Option<(u32, u32)>,
    file: Option<File>,
}

impl DeviceHandle for V4l2Handle {
    fn device(&self) -> &CaptureDevice {
        &self.device
    }

    fn read_frame(&mut self) -> StopframeResult<RgbaImage> {
        if self.file.is_none() {
            return Err(StopframeError::capture("read from released handle"));
        }
        if !self.node.exists() {
            return Err(StopframeError::device_unavailable(format!(
                "{} disappeared",
                self.node.display()
            )));
        }
        if !command_exists("ffmpeg") {
            return Err(StopframeError::unsupported("ffmpeg not found in PATH"));
        }

        let png = grab_png(&self.node, self.video_size)?;
        let frame = image::load_from_memory_with_format(&png, ImageFormat::Png)?;
        Ok(frame.to_rgba8())
    }

    fn release(&mut self) {
        if self.file.take().is_some() {
            tracing::debug!(device = %self.node.display(), "Released capture device");
        }
    }
}

impl Drop for V4l2Handle {
    fn drop(&mut self) {
        self.release();
    }
}

fn grab_png(node: &Path, video_size: Option<(u32, u32)>) -> StopframeResult<Vec<u8>> {
    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-loglevel", "error", "-f", "video4linux2"]);
    if let Some((w, h)) = video_size {
        cmd.arg("-video_size").arg(format!("{w}x{h}"));
    }
    cmd.arg("-i")
        .arg(node)
        .args(["-frames:v", "1", "-f", "image2pipe", "-vcodec", "png", "-"])
        .stdin(Stdio::null());

    let output = cmd
        .output()
        .map_err(|e| StopframeError::capture(format!("failed to run ffmpeg: {e}")))?;

    if !output.status.success() || output.stdout.is_empty() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(StopframeError::capture(format!(
            "ffmpeg grab from {} failed: {}",
            node.display(),
            stderr.trim()
        )));
    }

    Ok(output.stdout)
}

fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_roots() -> (tempfile::TempDir, V4l2Backend) {
        let dir = tempfile::tempdir().unwrap();
        let dev = dir.path().join("dev");
        let sys = dir.path().join("sys");
        std::fs::create_dir_all(&dev).unwrap();
        std::fs::create_dir_all(sys.join("video1")).unwrap();
        std::fs::write(dev.join("video0"), b"").unwrap();
        std::fs::write(dev.join("video1"), b"").unwrap();
        std::fs::write(sys.join("video1").join("name"), "Desk Cam\n").unwrap();

        let backend = V4l2Backend {
            dev_root: dev,
            sysfs_root: sys,
            video_size: None,
        };
        (dir, backend)
    }

    #[test]
    fn test_missing_node_is_unavailable() {
        let (_dir, backend) = fake_roots();
        let err = backend.open(7).err().unwrap();
        assert!(err.is_device_unavailable());
    }

    #[test]
    fn test_display_names() {
        let (_dir, backend) = fake_roots();
        let unnamed = backend.open(0).unwrap();
        assert_eq!(unnamed.device().display_name, "Camera 0");
        let named = backend.open(1).unwrap();
        assert_eq!(named.device().display_name, "Desk Cam");
    }

    #[test]
    fn test_video_size_from_config() {
        let mut config = CaptureDefaults::default();
        assert_eq!(V4l2Backend::from_config(&config).video_size, None);

        config.video_size = Some((1280, 720));
        let backend = V4l2Backend::from_config(&config);
        assert_eq!(backend.video_size, Some((1280, 720)));
        assert_eq!(backend.dev_root, PathBuf::from(DEV_ROOT));
    }

    #[test]
    fn test_release_is_idempotent() {
        let (_dir, backend) = fake_roots();
        let mut handle = backend.open(0).unwrap();
        handle.release();
        handle.release();
        assert!(handle.read_frame().is_err());
    }
}
