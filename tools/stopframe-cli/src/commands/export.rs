//! Export a project to video.

use std::io::Write;
use std::path::PathBuf;

use stopframe_project_model::{list_frame_files, ProjectMetadata};
use stopframe_render_engine::{
    default_output_path, export_frames, ExportFormat, ExportJob, ExportProgress, GifRepeat,
};

pub async fn run(
    path: PathBuf,
    format: ExportFormat,
    output: Option<PathBuf>,
    fps: Option<u32>,
    loops: Option<u16>,
) -> anyhow::Result<()> {
    println!("Exporting project at: {}", path.display());

    let meta =
        ProjectMetadata::load(&path).map_err(|e| anyhow::anyhow!("Failed to load project: {e}"))?;
    let frames = list_frame_files(&path)?;
    if frames.is_empty() {
        anyhow::bail!("Project has no frames to export");
    }

    let output_path = output.unwrap_or_else(|| default_output_path(&path, format));
    let fps = fps.unwrap_or(meta.fps);

    println!("  Output: {}", output_path.display());
    println!("  Format: {:?}", format);
    println!("  Frames: {} @ {fps}fps", frames.len());

    let job = ExportJob {
        frames,
        output_path: output_path.clone(),
        format,
        fps,
        repeat: loops.map(GifRepeat::Finite).unwrap_or_default(),
    };

    let progress_cb: Box<dyn Fn(ExportProgress) + Send> = Box::new(|p| {
        print!(
            "\r  Progress: {:.1}% ({}/{} frames)  ",
            p.progress * 100.0,
            p.frames_rendered,
            p.total_frames,
        );
        let _ = std::io::stdout().flush();
    });

    match export_frames(job, Some(progress_cb)).await {
        Ok(report) => {
            println!("\nExport complete: {}", report.output.display());
            if !report.skipped.is_empty() {
                println!("  Skipped {} unreadable frame(s):", report.skipped.len());
                for skipped in &report.skipped {
                    println!("    {}", skipped.display());
                }
            }
        }
        Err(e) => {
            println!();
            anyhow::bail!("Export failed: {e}");
        }
    }

    Ok(())
}
