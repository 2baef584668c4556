//! Interactive capture session.

use std::path::{Path, PathBuf};
use std::time::Duration;

use stopframe_capture_engine::{CaptureManager, SessionConfig, SessionEvent, SessionState};
use stopframe_common::config::AppConfig;
use stopframe_project_model::{HistoryEntry, META_FILE};
use stopframe_studio::Studio;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use super::select_backend;

const HELP: &str = "\
Commands:
  capture | c          store the live frame
  delete <i> [i ..]    delete frames (asks for confirmation)
  dup <i>              duplicate a frame
  undo | u             undo the last edit
  redo | r             redo the last undone edit
  list | ls            list frames
  onion on|off         toggle onion skin in the preview
  preview <out.png>    write the current preview image
  play                 play the timeline once through
  status               show capture state
  save | s             save settings and commit deletes
  help                 show this help
  quit | q             leave (unsaved deletes stay undoable until next open)";

pub async fn run(
    config: &AppConfig,
    path: PathBuf,
    synthetic: bool,
    device: Option<u32>,
) -> anyhow::Result<()> {
    let backend = select_backend(config, synthetic);
    let manager = CaptureManager::new(backend, SessionConfig::from_defaults(&config.capture))?;
    let mut events = manager.subscribe();

    let _ = match device {
        Some(index) => manager.request_open(index),
        None => manager.request_scan(),
    };

    let mut studio = Studio::new(manager, config);
    open_or_create(&mut studio, &path)?;

    println!("Waiting for a capture device...");
    if studio
        .capture_manager()
        .wait_for_state(SessionState::Live, Duration::from_secs(10))
        .await
    {
        if let Some(device) = studio.capture_manager().current_device() {
            println!("[OK] Live on [{}] {}", device.id, device.display_name);
        }
    } else {
        println!(
            "[WARN] No live device yet (state: {:?}). Capture stays disabled until one opens.",
            studio.capture_state()
        );
    }
    println!("Type 'help' for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        while let Ok(event) = events.try_recv() {
            report_event(&event);
        }

        print_prompt(&studio);
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&cmd, args)) = words.split_first() else {
            continue;
        };

        let result = match cmd {
            "capture" | "c" => studio.capture().map(|frame| {
                println!("Captured {}", frame.file_name());
            }),
            "delete" | "del" => match parse_indices(args) {
                Some(indices) => delete(&mut studio, &indices, &mut lines).await,
                None => {
                    println!("usage: delete <index> [index ..]");
                    Ok(())
                }
            },
            "dup" => match args.first().and_then(|a| a.parse().ok()) {
                Some(index) => studio.duplicate(index).map(|frame| {
                    println!("Duplicated into {}", frame.file_name());
                }),
                None => {
                    println!("usage: dup <index>");
                    Ok(())
                }
            },
            "undo" | "u" => studio.undo().map(|entry| describe("Undid", entry)),
            "redo" | "r" => studio.redo().map(|entry| describe("Redid", entry)),
            "list" | "ls" => {
                list(&studio);
                Ok(())
            }
            "onion" => {
                match args.first().copied() {
                    Some("on") => studio.set_onion_enabled(true),
                    Some("off") => studio.set_onion_enabled(false),
                    _ => println!("onion skin is {}", on_off(studio.onion_enabled())),
                }
                Ok(())
            }
            "preview" => {
                write_preview(&studio, args.first().copied());
                Ok(())
            }
            "play" => play(&mut studio).await,
            "status" => {
                println!(
                    "Capture: {:?}, frames read: {}",
                    studio.capture_state(),
                    studio.capture_manager().frames_read()
                );
                Ok(())
            }
            "save" | "s" => studio.save().map(|_| println!("Saved.")),
            "help" | "h" | "?" => {
                println!("{HELP}");
                Ok(())
            }
            "quit" | "q" | "exit" => break,
            other => {
                println!("Unknown command '{other}'. Type 'help'.");
                Ok(())
            }
        };

        if let Err(e) = result {
            println!("[ERR] {e}");
        }
    }

    studio.close_project();
    studio.capture_manager().shutdown();
    Ok(())
}

fn open_or_create(studio: &mut Studio, path: &Path) -> anyhow::Result<()> {
    let is_project = path.join(META_FILE).exists()
        || stopframe_project_model::list_frame_files(path)
            .map(|frames| !frames.is_empty())
            .unwrap_or(false);

    let ws = if is_project {
        studio.open_project(path)?
    } else {
        studio.new_project(path)?
    };
    println!(
        "Project {} ({} frame(s), {} fps)",
        ws.root().display(),
        ws.timeline().len(),
        ws.metadata().fps
    );
    Ok(())
}

fn print_prompt(studio: &Studio) {
    use std::io::Write;

    let frames = studio.workspace().map(|ws| ws.timeline().len()).unwrap_or(0);
    print!("[{:?} | {frames} frames] > ", studio.capture_state());
    let _ = std::io::stdout().flush();
}

fn parse_indices(args: &[&str]) -> Option<Vec<usize>> {
    if args.is_empty() {
        return None;
    }
    args.iter().map(|a| a.parse().ok()).collect()
}

async fn delete(
    studio: &mut Studio,
    indices: &[usize],
    lines: &mut Lines<BufReader<Stdin>>,
) -> Result<(), stopframe_studio::StudioError> {
    let Some(ws) = studio.workspace() else {
        return Err(stopframe_studio::StudioError::NoActiveProject);
    };
    let names: Vec<String> = indices
        .iter()
        .filter_map(|&i| ws.timeline().get(i))
        .map(|f| f.file_name())
        .collect();
    if names.is_empty() {
        println!("No frames at those indices.");
        return Ok(());
    }

    print!("Delete {}? [y/N] ", names.join(", "));
    let _ = std::io::Write::flush(&mut std::io::stdout());
    let answer = lines.next_line().await.ok().flatten().unwrap_or_default();
    let confirmed = matches!(answer.trim(), "y" | "Y" | "yes");

    match studio.delete(indices, |_| confirmed) {
        Ok(report) => {
            println!("Deleted {} frame(s).", report.deleted.len());
            for (index, error) in &report.failed {
                println!("[ERR] frame {index}: {error}");
            }
            Ok(())
        }
        Err(stopframe_studio::StudioError::Workspace(
            stopframe_project_model::WorkspaceError::Cancelled,
        )) => {
            println!("Cancelled.");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

fn describe(verb: &str, entry: Option<HistoryEntry>) {
    match entry {
        Some(HistoryEntry::Add { path, .. }) => {
            println!("{verb} add of {}", path.display());
        }
        Some(HistoryEntry::Delete { original_path, .. }) => {
            println!("{verb} delete of {}", original_path.display());
        }
        None => println!("Nothing to do."),
    }
}

fn list(studio: &Studio) {
    let Some(ws) = studio.workspace() else {
        println!("No project open.");
        return;
    };
    if ws.timeline().is_empty() {
        println!("Timeline is empty.");
        return;
    }
    for (i, frame) in ws.timeline().frames().iter().enumerate() {
        println!("  {i:>4}  {}", frame.file_name());
    }
    println!(
        "  undo: {}, redo: {}",
        ws.history().undo_entries().len(),
        ws.history().redo_entries().len()
    );
}

fn write_preview(studio: &Studio, out: Option<&str>) {
    let Some(out) = out else {
        println!("usage: preview <out.png>");
        return;
    };
    match studio.preview() {
        Some(image) => match image.save(out) {
            Ok(()) => println!("Wrote {out} ({:?})", studio.preview_source()),
            Err(e) => println!("[ERR] {e}"),
        },
        None => println!("Nothing to preview yet."),
    }
}

async fn play(studio: &mut Studio) -> Result<(), stopframe_studio::StudioError> {
    let total = studio.workspace().map(|ws| ws.timeline().len()).unwrap_or(0);
    studio.start_playback()?;

    for _ in 0..total {
        match studio.playback_tick() {
            Some(path) => println!(
                "  > {}",
                path.file_name().unwrap_or_default().to_string_lossy()
            ),
            None => break,
        }
        tokio::time::sleep(studio.playback_interval()).await;
    }

    studio.stop_playback();
    Ok(())
}

fn report_event(event: &SessionEvent) {
    match event {
        SessionEvent::DevicesFound(devices) => {
            println!("[INFO] {} device(s) found", devices.len());
        }
        SessionEvent::DeviceOpened(device) => {
            println!("[OK] Live on [{}] {}", device.id, device.display_name);
        }
        SessionEvent::OpenFailed { index, message } => {
            println!("[WARN] Could not open device {index}: {message}");
        }
        SessionEvent::NoDevices => println!("[WARN] No capture devices found"),
        SessionEvent::ReadFailed { message } => {
            println!("[WARN] Frame read failed ({message}), retrying shortly");
        }
        SessionEvent::StateChanged(_) => {}
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}
