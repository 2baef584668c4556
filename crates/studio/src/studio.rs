//! Studio controller.

use std::path::{Path, PathBuf};
use std::time::Duration;

use image::RgbaImage;
use stopframe_capture_engine::{CaptureManager, SessionState};
use stopframe_common::config::AppConfig;
use stopframe_project_model::{DeleteReport, Frame, HistoryEntry, ProjectMetadata, Workspace};
use stopframe_render_engine::{
    export_frames, ExportFormat, ExportJob, ExportReport, GifRepeat, OnionSkin, Playback,
    ProgressCallback,
};

use crate::error::{StudioError, StudioResult};

/// What the preview area should show right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewSource {
    Playback,
    Onion,
    Live,
}

pub struct Studio {
    capture: CaptureManager,
    workspace: Option<Workspace>,
    onion_enabled: bool,
    playback: Playback,
    playback_frame: Option<RgbaImage>,
}

impl Studio {
    pub fn new(capture: CaptureManager, config: &AppConfig) -> Self {
        let defaults = ProjectMetadata::default();
        Self {
            capture,
            workspace: None,
            onion_enabled: config.onion.enabled,
            playback: Playback::from_metadata(&defaults),
            playback_frame: None,
        }
    }

    pub fn capture_manager(&self) -> &CaptureManager {
        &self.capture
    }

    pub fn workspace(&self) -> Option<&Workspace> {
        self.workspace.as_ref()
    }

    fn active(&mut self) -> StudioResult<&mut Workspace> {
        self.workspace.as_mut().ok_or(StudioError::NoActiveProject)
    }

    /// Create a project in `dir` and make it the active one.
    pub fn new_project(&mut self, dir: impl AsRef<Path>) -> StudioResult<&Workspace> {
        let workspace = Workspace::create(dir)?;
        Ok(self.activate(workspace))
    }

    /// Open the project in `dir` and make it the active one.
    pub fn open_project(&mut self, dir: impl AsRef<Path>) -> StudioResult<&Workspace> {
        let workspace = Workspace::open(dir)?;
        Ok(self.activate(workspace))
    }

    fn activate(&mut self, workspace: Workspace) -> &Workspace {
        self.stop_playback();
        self.playback = Playback::from_metadata(workspace.metadata());
        tracing::info!(
            root = %workspace.root().display(),
            frames = workspace.timeline().len(),
            "Project active"
        );
        self.workspace.insert(workspace)
    }

    /// Close the active project without saving.
    pub fn close_project(&mut self) {
        self.stop_playback();
        if let Some(ws) = self.workspace.take() {
            tracing::info!(root = %ws.root().display(), "Project closed");
        }
    }

    pub fn save(&mut self) -> StudioResult<()> {
        self.active()?.save()?;
        Ok(())
    }

    /// Store the current live frame as a new timeline frame.
    ///
    /// Fails with `NoActiveProject` or `NoLiveFrame` before anything is
    /// written. A frame only counts as live while the session is `Live`.
    pub fn capture(&mut self) -> StudioResult<Frame> {
        if self.workspace.is_none() {
            return Err(StudioError::NoActiveProject);
        }
        let live = self.capture.live_frame().ok_or(StudioError::NoLiveFrame)?;
        Ok(self.active()?.capture(&live)?)
    }

    pub fn duplicate(&mut self, index: usize) -> StudioResult<Frame> {
        Ok(self.active()?.duplicate(index)?)
    }

    pub fn delete(
        &mut self,
        indices: &[usize],
        confirm: impl FnOnce(&[PathBuf]) -> bool,
    ) -> StudioResult<DeleteReport> {
        Ok(self.active()?.delete(indices, confirm)?)
    }

    pub fn undo(&mut self) -> StudioResult<Option<HistoryEntry>> {
        Ok(self.active()?.undo()?)
    }

    pub fn redo(&mut self) -> StudioResult<Option<HistoryEntry>> {
        Ok(self.active()?.redo()?)
    }

    pub fn onion_enabled(&self) -> bool {
        self.onion_enabled
    }

    pub fn set_onion_enabled(&mut self, enabled: bool) {
        self.onion_enabled = enabled;
    }

    /// Which source [`Studio::preview`] will draw from.
    pub fn preview_source(&self) -> PreviewSource {
        if self.playback.is_playing() {
            PreviewSource::Playback
        } else if self.onion_enabled
            && self
                .workspace
                .as_ref()
                .is_some_and(|ws| !ws.timeline().is_empty())
        {
            PreviewSource::Onion
        } else {
            PreviewSource::Live
        }
    }

    /// Image for the preview area: the playback frame while playing, else the
    /// live frame with onion layers when enabled, else the bare live frame.
    pub fn preview(&self) -> Option<RgbaImage> {
        match self.preview_source() {
            PreviewSource::Playback => self.playback_frame.clone(),
            PreviewSource::Onion => {
                let live = self.capture.current_frame()?;
                let ws = self.workspace.as_ref()?;
                Some(OnionSkin::from_metadata(ws.metadata()).render(&live, ws.timeline()))
            }
            PreviewSource::Live => self.capture.current_frame().map(|f| (*f).clone()),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playback.is_playing()
    }

    /// Start playing the timeline from the first frame. The frame pump is
    /// suspended while playing; the device stays open.
    pub fn start_playback(&mut self) -> StudioResult<()> {
        let ws = self.workspace.as_ref().ok_or(StudioError::NoActiveProject)?;
        self.playback = Playback::from_metadata(ws.metadata());
        self.playback.start();
        self.playback_frame = None;
        self.capture.set_suspended(true);
        tracing::info!(
            fps = self.playback.fps(),
            frames = ws.timeline().len(),
            "Playback started"
        );
        Ok(())
    }

    pub fn stop_playback(&mut self) {
        if self.playback.is_playing() {
            tracing::info!("Playback stopped");
        }
        self.playback.stop();
        self.playback_frame = None;
        self.capture.set_suspended(false);
    }

    /// Time to wait between two [`Studio::playback_tick`] calls.
    pub fn playback_interval(&self) -> Duration {
        self.playback.interval()
    }

    /// Advance playback by one frame. Returns the frame now shown, or `None`
    /// once playback has ended (the pump is resumed at that point).
    pub fn playback_tick(&mut self) -> Option<PathBuf> {
        let ws = self.workspace.as_ref()?;
        match self.playback.next_path(ws.timeline()) {
            Some(path) => {
                match image::open(&path) {
                    Ok(img) => self.playback_frame = Some(img.to_rgba8()),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable frame in playback")
                    }
                }
                Some(path)
            }
            None => {
                self.stop_playback();
                None
            }
        }
    }

    pub fn capture_state(&self) -> SessionState {
        self.capture.state()
    }

    fn export_job(
        &self,
        format: ExportFormat,
        output: PathBuf,
        repeat: GifRepeat,
    ) -> StudioResult<ExportJob> {
        let ws = self.workspace.as_ref().ok_or(StudioError::NoActiveProject)?;
        Ok(ExportJob {
            frames: ws.timeline().paths(),
            output_path: output,
            format,
            fps: ws.metadata().fps,
            repeat,
        })
    }

    pub async fn export_mp4(
        &self,
        output: PathBuf,
        progress: Option<ProgressCallback>,
    ) -> StudioResult<ExportReport> {
        let job = self.export_job(ExportFormat::Mp4, output, GifRepeat::Infinite)?;
        Ok(export_frames(job, progress).await?)
    }

    pub async fn export_gif(
        &self,
        output: PathBuf,
        repeat: GifRepeat,
        progress: Option<ProgressCallback>,
    ) -> StudioResult<ExportReport> {
        let job = self.export_job(ExportFormat::Gif, output, repeat)?;
        Ok(export_frames(job, progress).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use stopframe_capture_engine::backend::SyntheticBackend;
    use stopframe_capture_engine::SessionConfig;

    fn studio(backend: &SyntheticBackend) -> Studio {
        let config = SessionConfig {
            pump_interval: Duration::from_millis(5),
            ..SessionConfig::default()
        };
        let manager = CaptureManager::new(Arc::new(backend.clone()), config).unwrap();
        Studio::new(manager, &AppConfig::default())
    }

    #[tokio::test]
    async fn test_capture_without_project() {
        let mut studio = studio(&SyntheticBackend::new([0]));
        assert!(matches!(studio.capture(), Err(StudioError::NoActiveProject)));
    }

    #[tokio::test]
    async fn test_capture_before_live_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut studio = studio(&SyntheticBackend::new([0]));
        studio.new_project(dir.path()).unwrap();

        assert!(matches!(studio.capture(), Err(StudioError::NoLiveFrame)));
        assert!(studio.workspace().unwrap().timeline().is_empty());
        let frames = std::fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().starts_with("frame_"))
            .count();
        assert_eq!(frames, 0);
    }

    #[tokio::test]
    async fn test_edits_require_project() {
        let mut studio = studio(&SyntheticBackend::new([0]));
        assert!(matches!(studio.undo(), Err(StudioError::NoActiveProject)));
        assert!(matches!(studio.save(), Err(StudioError::NoActiveProject)));
        assert!(matches!(
            studio.start_playback(),
            Err(StudioError::NoActiveProject)
        ));
    }

    #[tokio::test]
    async fn test_preview_source_without_frames_is_live() {
        let dir = tempfile::tempdir().unwrap();
        let mut studio = studio(&SyntheticBackend::new([0]));
        studio.new_project(dir.path()).unwrap();
        assert_eq!(studio.preview_source(), PreviewSource::Live);
        assert!(studio.preview().is_none());
    }
}
