//! Initialize a new Stopframe project.

use std::path::PathBuf;

use stopframe_project_model::{Workspace, META_FILE, UNDO_CACHE_DIR};

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    if path.join(META_FILE).exists() {
        anyhow::bail!("{} is already a Stopframe project", path.display());
    }

    println!("Creating project at {}", path.display());
    let workspace =
        Workspace::create(&path).map_err(|e| anyhow::anyhow!("Failed to create project: {e}"))?;
    let meta = workspace.metadata();

    println!("Project created successfully:");
    println!("  Directory: {}", workspace.root().display());
    println!("  FPS: {}", meta.fps);
    println!(
        "  Onion skin: {}% over {} layer(s)",
        meta.onion_opacity, meta.onion_layer_count
    );
    println!();
    println!("Directory structure:");
    println!("  {}/", path.display());
    println!("  ├── {META_FILE}   (settings)");
    println!("  ├── frame_NNNN.png      (captured frames)");
    println!("  └── {UNDO_CACHE_DIR}/         (deleted frames until the next save)");

    Ok(())
}
