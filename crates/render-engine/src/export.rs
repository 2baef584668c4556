//! Export of the frame timeline to video and animation files.

use std::fs::File;
use std::io::{BufWriter, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use image::codecs::gif::{GifEncoder, Repeat};
use image::imageops::{self, FilterType};
use image::{Delay, Frame, ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};
use stopframe_common::clock::FrameCadence;
use stopframe_common::error::{StopframeError, StopframeResult};

/// Output container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// H.264 in MP4, encoded by ffmpeg.
    Mp4,
    /// Animated GIF, encoded in-process.
    Gif,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Gif => "gif",
        }
    }
}

/// How many times a GIF plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GifRepeat {
    #[default]
    Infinite,
    Finite(u16),
}

/// An export job ready to be rendered.
#[derive(Debug, Clone)]
pub struct ExportJob {
    /// Frame files in playback order.
    pub frames: Vec<PathBuf>,

    /// Output file path.
    pub output_path: PathBuf,

    pub format: ExportFormat,

    /// Each frame lasts `1/fps` seconds.
    pub fps: u32,

    /// Ignored for MP4.
    pub repeat: GifRepeat,
}

/// Progress callback for export rendering.
pub type ProgressCallback = Box<dyn Fn(ExportProgress) + Send>;

/// Export progress report.
#[derive(Debug, Clone)]
pub struct ExportProgress {
    /// Current progress [0.0, 1.0].
    pub progress: f64,

    /// Frames encoded so far.
    pub frames_rendered: u64,

    /// Frames in the job, readable or not.
    pub total_frames: u64,

    pub stage: ExportStage,
}

/// Stages of the export process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStage {
    Preparing,
    Rendering,
    Finalizing,
    Complete,
}

/// Result of a finished export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportReport {
    pub output: PathBuf,
    pub frames_written: usize,
    /// Frames that could not be decoded and were left out.
    pub skipped: Vec<PathBuf>,
}

/// Trait for encoders that turn a frame stream into a file.
pub trait RenderBackend: Send {
    /// Encode every frame from `feed` into `job.output_path`.
    fn render(
        &mut self,
        job: &ExportJob,
        feed: &mut FrameFeed,
        progress: Option<&ProgressCallback>,
    ) -> StopframeResult<()>;

    /// Check if this backend is available on the system.
    fn is_available(&self) -> bool;

    /// Backend name.
    fn name(&self) -> &str;
}

/// Export the timeline frames to a file.
///
/// Rendering runs on the blocking pool.
pub async fn export_frames(
    job: ExportJob,
    progress: Option<ProgressCallback>,
) -> StopframeResult<ExportReport> {
    tokio::task::spawn_blocking(move || export_frames_blocking(&job, progress))
        .await
        .map_err(|e| StopframeError::render(format!("export task failed: {e}")))?
}

/// Synchronous form of [`export_frames`].
pub fn export_frames_blocking(
    job: &ExportJob,
    progress: Option<ProgressCallback>,
) -> StopframeResult<ExportReport> {
    tracing::info!(
        output = %job.output_path.display(),
        format = ?job.format,
        frames = job.frames.len(),
        fps = job.fps,
        "Starting export"
    );

    if let Some(cb) = &progress {
        cb(ExportProgress {
            progress: 0.0,
            frames_rendered: 0,
            total_frames: job.frames.len() as u64,
            stage: ExportStage::Preparing,
        });
    }

    let mut backend: Box<dyn RenderBackend> = match job.format {
        ExportFormat::Gif => Box::new(GifBackend),
        ExportFormat::Mp4 => Box::new(FfmpegBackend),
    };
    if !backend.is_available() {
        return Err(StopframeError::unsupported(format!(
            "{} encoder not available (expected ffmpeg in PATH)",
            backend.name()
        )));
    }

    let mut feed = FrameFeed::open(&job.frames)?;

    if let Some(parent) = job.output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    tracing::info!(backend = backend.name(), "Using render backend");
    backend.render(job, &mut feed, progress.as_ref())?;

    let report = ExportReport {
        output: job.output_path.clone(),
        frames_written: feed.delivered,
        skipped: feed.skipped,
    };

    if let Some(cb) = &progress {
        cb(ExportProgress {
            progress: 1.0,
            frames_rendered: report.frames_written as u64,
            total_frames: job.frames.len() as u64,
            stage: ExportStage::Complete,
        });
    }

    tracing::info!(
        output = %report.output.display(),
        written = report.frames_written,
        skipped = report.skipped.len(),
        "Export finished"
    );
    Ok(report)
}

/// Decodes frame files in order, skipping unreadable ones and resizing every
/// frame to the size of the first readable one.
pub struct FrameFeed {
    pending: std::vec::IntoIter<PathBuf>,
    first: Option<RgbaImage>,
    size: (u32, u32),
    total: usize,
    delivered: usize,
    skipped: Vec<PathBuf>,
}

impl FrameFeed {
    /// Fails with `Render` when no frame in `paths` can be decoded.
    pub fn open(paths: &[PathBuf]) -> StopframeResult<Self> {
        let mut feed = Self {
            pending: paths.to_vec().into_iter(),
            first: None,
            size: (0, 0),
            total: paths.len(),
            delivered: 0,
            skipped: Vec::new(),
        };

        let first = feed
            .decode_next()
            .ok_or_else(|| StopframeError::render("no readable frames to export"))?;
        feed.size = first.dimensions();
        feed.first = Some(first);
        Ok(feed)
    }

    /// Output frame size.
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    fn decode_next(&mut self) -> Option<RgbaImage> {
        for path in self.pending.by_ref() {
            match image::open(&path) {
                Ok(img) => return Some(img.to_rgba8()),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable frame");
                    self.skipped.push(path);
                }
            }
        }
        None
    }

    /// Next frame at the output size.
    pub fn next_frame(&mut self) -> Option<RgbaImage> {
        let frame = match self.first.take() {
            Some(first) => first,
            None => {
                let img = self.decode_next()?;
                if img.dimensions() == self.size {
                    img
                } else {
                    imageops::resize(&img, self.size.0, self.size.1, FilterType::Triangle)
                }
            }
        };
        self.delivered += 1;
        Some(frame)
    }

    fn report(&self, stage: ExportStage) -> ExportProgress {
        let done = self.delivered + self.skipped.len();
        ExportProgress {
            progress: if self.total == 0 {
                0.0
            } else {
                (done as f64 / self.total as f64).clamp(0.0, 1.0)
            },
            frames_rendered: self.delivered as u64,
            total_frames: self.total as u64,
            stage,
        }
    }
}

struct GifBackend;

impl RenderBackend for GifBackend {
    fn render(
        &mut self,
        job: &ExportJob,
        feed: &mut FrameFeed,
        progress: Option<&ProgressCallback>,
    ) -> StopframeResult<()> {
        let (numer, denom) = FrameCadence::delay_ratio_ms(job.fps);
        let delay = Delay::from_numer_denom_ms(numer, denom);

        let file = File::create(&job.output_path)?;
        let mut encoder = GifEncoder::new(BufWriter::new(file));
        encoder.set_repeat(match job.repeat {
            GifRepeat::Infinite => Repeat::Infinite,
            GifRepeat::Finite(n) => Repeat::Finite(n),
        })?;

        while let Some(frame) = feed.next_frame() {
            encoder.encode_frame(Frame::from_parts(frame, 0, 0, delay))?;
            if let Some(cb) = progress {
                cb(feed.report(ExportStage::Rendering));
            }
        }
        Ok(())
    }

    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "gif"
    }
}

struct FfmpegBackend;

impl FfmpegBackend {
    fn command(job: &ExportJob, size: (u32, u32)) -> Command {
        let fps = FrameCadence::delay_ratio_ms(job.fps).1;
        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-y", "-loglevel", "error", "-f", "image2pipe", "-vcodec", "png"])
            .arg("-framerate")
            .arg(fps.to_string())
            .args(["-i", "-"]);

        // libx264 with yuv420p needs even dimensions.
        if size.0 % 2 != 0 || size.1 % 2 != 0 {
            cmd.args(["-vf", "scale=trunc(iw/2)*2:trunc(ih/2)*2"]);
        }

        cmd.args([
            "-c:v",
            "libx264",
            "-preset",
            "medium",
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "+faststart",
        ])
        .arg(&job.output_path)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());
        cmd
    }
}

impl RenderBackend for FfmpegBackend {
    fn render(
        &mut self,
        job: &ExportJob,
        feed: &mut FrameFeed,
        progress: Option<&ProgressCallback>,
    ) -> StopframeResult<()> {
        let mut child = Self::command(job, feed.size())
            .spawn()
            .map_err(|e| StopframeError::render(format!("Failed to start ffmpeg: {e}")))?;

        let stderr = child.stderr.take();
        let stderr_task = std::thread::spawn(move || {
            let mut out = String::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_string(&mut out);
            }
            out
        });

        let write_result = match child.stdin.take() {
            Some(stdin) => pipe_frames(stdin, feed, progress),
            None => Err(StopframeError::render("ffmpeg stdin unavailable")),
        };

        let status = child
            .wait()
            .map_err(|e| StopframeError::render(format!("Failed to wait on ffmpeg: {e}")))?;
        let stderr_output = stderr_task
            .join()
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

        if !status.success() {
            return Err(StopframeError::render(format!(
                "ffmpeg export failed (status {}): {}",
                status,
                stderr_output.trim()
            )));
        }
        write_result?;

        if let Some(cb) = progress {
            cb(feed.report(ExportStage::Finalizing));
        }
        Ok(())
    }

    fn is_available(&self) -> bool {
        command_exists("ffmpeg")
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

fn pipe_frames(
    stdin: impl Write,
    feed: &mut FrameFeed,
    progress: Option<&ProgressCallback>,
) -> StopframeResult<()> {
    let mut stdin = BufWriter::new(stdin);
    let mut png = Vec::new();

    while let Some(frame) = feed.next_frame() {
        png.clear();
        frame.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        stdin
            .write_all(&png)
            .map_err(|e| StopframeError::render(format!("Failed to feed ffmpeg: {e}")))?;
        if let Some(cb) = progress {
            cb(feed.report(ExportStage::Rendering));
        }
    }
    stdin.flush()?;
    Ok(())
}

/// Default output path next to the project: `<dir>/<dir name>.<ext>`.
pub fn default_output_path(project_dir: &Path, format: ExportFormat) -> PathBuf {
    let stem = project_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "animation".to_string());
    project_dir.join(format!("{stem}.{}", format.extension()))
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
    use image::codecs::gif::GifDecoder;
    use image::{AnimationDecoder, Rgba};
    use std::sync::{Arc, Mutex};

    fn write_frame(dir: &Path, name: &str, w: u32, h: u32, v: u8) -> PathBuf {
        let path = dir.join(name);
        RgbaImage::from_pixel(w, h, Rgba([v, v / 2, 255 - v, 255]))
            .save(&path)
            .unwrap();
        path
    }

    fn gif_job(frames: Vec<PathBuf>, output: PathBuf) -> ExportJob {
        ExportJob {
            frames,
            output_path: output,
            format: ExportFormat::Gif,
            fps: 4,
            repeat: GifRepeat::Infinite,
        }
    }

    #[test]
    fn test_gif_export_writes_every_frame() {
        let dir = tempfile::tempdir().unwrap();
        let frames = vec![
            write_frame(dir.path(), "frame_0000.png", 6, 4, 10),
            write_frame(dir.path(), "frame_0001.png", 6, 4, 120),
            write_frame(dir.path(), "frame_0002.png", 6, 4, 240),
        ];
        let out = dir.path().join("out.gif");

        let report = export_frames_blocking(&gif_job(frames, out.clone()), None).unwrap();
        assert_eq!(report.frames_written, 3);
        assert!(report.skipped.is_empty());

        let decoder = GifDecoder::new(std::io::BufReader::new(File::open(&out).unwrap())).unwrap();
        let decoded = decoder.into_frames().collect_frames().unwrap();
        assert_eq!(decoded.len(), 3);
        let (numer, denom) = decoded[0].delay().numer_denom_ms();
        assert_eq!(numer / denom, 250);
        assert_eq!(decoded[0].buffer().dimensions(), (6, 4));
    }

    #[test]
    fn test_unreadable_frames_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("frame_0000.png");
        std::fs::write(&bad, b"garbage").unwrap();
        let frames = vec![
            bad.clone(),
            write_frame(dir.path(), "frame_0001.png", 6, 4, 10),
            write_frame(dir.path(), "frame_0002.png", 3, 2, 99),
        ];

        let mut feed = FrameFeed::open(&frames).unwrap();
        assert_eq!(feed.size(), (6, 4));
        assert!(feed.next_frame().is_some());
        assert_eq!(feed.next_frame().unwrap().dimensions(), (6, 4));
        assert!(feed.next_frame().is_none());
        assert_eq!(feed.skipped, vec![bad]);
    }

    #[test]
    fn test_no_readable_frames_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("frame_0000.png");
        std::fs::write(&bad, b"garbage").unwrap();
        let out = dir.path().join("out.gif");

        let err = export_frames_blocking(&gif_job(vec![bad], out.clone()), None).unwrap_err();
        assert!(matches!(err, StopframeError::Render { .. }));
        assert!(!out.exists());
    }

    #[test]
    fn test_progress_reaches_complete() {
        let dir = tempfile::tempdir().unwrap();
        let frames = vec![
            write_frame(dir.path(), "frame_0000.png", 2, 2, 1),
            write_frame(dir.path(), "frame_0001.png", 2, 2, 2),
        ];
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: ProgressCallback = Box::new(move |p| sink.lock().unwrap().push(p.stage));

        export_frames_blocking(&gif_job(frames, dir.path().join("o.gif")), Some(callback)).unwrap();

        let stages = seen.lock().unwrap().clone();
        assert_eq!(stages.first(), Some(&ExportStage::Preparing));
        assert_eq!(stages.last(), Some(&ExportStage::Complete));
        assert_eq!(
            stages
                .iter()
                .filter(|s| **s == ExportStage::Rendering)
                .count(),
            2
        );
    }

    #[test]
    fn test_default_output_path() {
        let path = default_output_path(Path::new("/tmp/walk_cycle"), ExportFormat::Mp4);
        assert_eq!(path, PathBuf::from("/tmp/walk_cycle/walk_cycle.mp4"));
    }
}
