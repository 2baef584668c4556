//! Validate a Stopframe project directory.

use std::path::PathBuf;

use stopframe_project_model::{is_readable_frame, list_frame_files, ProjectMetadata, META_FILE};

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    println!("Validating project at: {}", path.display());

    let mut issues = Vec::new();

    if !path.join(META_FILE).exists() {
        issues.push(format!("{META_FILE} missing, defaults will be used"));
    }
    let meta =
        ProjectMetadata::load(&path).map_err(|e| anyhow::anyhow!("Failed to load project: {e}"))?;
    println!("  Version: {}", meta.version);
    println!("  FPS: {}", meta.fps);

    let frames = list_frame_files(&path)?;
    println!("  Frames: {}", frames.len());
    for frame in &frames {
        if !is_readable_frame(frame) {
            issues.push(format!(
                "{} is not a readable image and will be dropped on open",
                frame.display()
            ));
        }
    }

    if issues.is_empty() {
        println!("\nProject is valid.");
    } else {
        println!("\nValidation issues:");
        for issue in &issues {
            println!("  - {issue}");
        }
        println!(
            "\n{} issue(s) found. Project may not be fully usable.",
            issues.len()
        );
    }

    Ok(())
}
