//! Show project information.

use std::path::PathBuf;

use stopframe_project_model::{list_frame_files, ProjectMetadata, UNDO_CACHE_DIR};

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    let meta =
        ProjectMetadata::load(&path).map_err(|e| anyhow::anyhow!("Failed to load project: {e}"))?;
    let frames = list_frame_files(&path)?;

    println!("Project: {}", path.display());
    println!("  Version: {}", meta.version);
    println!("  Created: {}", meta.created_at);
    println!("  Modified: {}", meta.modified_at);
    println!();

    println!("Playback:");
    println!("  FPS: {}", meta.fps);
    println!("  Loop: {}", meta.loop_playback);
    if !frames.is_empty() {
        println!(
            "  Duration: {:.2}s",
            frames.len() as f64 / f64::from(meta.fps.max(1))
        );
    }
    println!();

    println!("Onion skin:");
    println!("  Opacity: {}%", meta.onion_opacity);
    println!("  Layers: {}", meta.onion_layer_count);
    println!();

    println!("Theme: {}", meta.theme);
    if let Some(custom) = &meta.custom_theme {
        for (role, color) in custom {
            println!("  {role}: {color}");
        }
    }
    println!();

    println!("Frames: {}", frames.len());
    if let (Some(first), Some(last)) = (frames.first(), frames.last()) {
        println!(
            "  {} .. {}",
            first.file_name().unwrap_or_default().to_string_lossy(),
            last.file_name().unwrap_or_default().to_string_lossy()
        );
    }

    let staged = std::fs::read_dir(path.join(UNDO_CACHE_DIR))
        .map(|entries| entries.flatten().count())
        .unwrap_or(0);
    if staged > 0 {
        println!("  {staged} file(s) left in {UNDO_CACHE_DIR} (discarded on next open)");
    }

    Ok(())
}
