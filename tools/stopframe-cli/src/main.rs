//! Stopframe CLI: command-line interface for stop-motion capture and export.
//!
//! Usage:
//!   stopframe init <PATH>        Create an empty project
//!   stopframe info <PATH>        Show project information
//!   stopframe validate <PATH>    Check frames and metadata on disk
//!   stopframe devices            List capture devices
//!   stopframe shoot <PATH>       Interactive capture session
//!   stopframe export <PATH>      Export a project to MP4 or GIF

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use stopframe_common::config::{AppConfig, ProbePolicy};
use stopframe_render_engine::ExportFormat;

mod commands;

#[derive(Parser)]
#[command(
    name = "stopframe",
    about = "Stop-motion capture with onion skinning and reversible edits",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    /// Stop at the first index that fails to open
    StopAtGap,
    /// Probe every index in range
    Full,
}

impl From<PolicyArg> for ProbePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::StopAtGap => ProbePolicy::StopAtFirstGap,
            PolicyArg::Full => ProbePolicy::FullRange,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Mp4,
    Gif,
}

impl From<FormatArg> for ExportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Mp4 => ExportFormat::Mp4,
            FormatArg::Gif => ExportFormat::Gif,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new empty project
    Init {
        /// Project directory (created if missing)
        path: PathBuf,
    },

    /// Show project information
    Info {
        /// Path to the project directory
        path: PathBuf,
    },

    /// Check that every frame on disk is readable
    Validate {
        /// Path to the project directory
        path: PathBuf,
    },

    /// Scan for capture devices
    Devices {
        /// Use the built-in test-pattern backend
        #[arg(long)]
        synthetic: bool,

        /// Probe policy (defaults to the configured one)
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,

        /// Number of indices to probe
        #[arg(long)]
        limit: Option<u32>,
    },

    /// Open a project and capture frames interactively
    Shoot {
        /// Project directory (created if it is not a project yet)
        path: PathBuf,

        /// Use the built-in test-pattern backend
        #[arg(long)]
        synthetic: bool,

        /// Open this device index instead of scanning
        #[arg(long)]
        device: Option<u32>,
    },

    /// Export a project to video or animated GIF
    Export {
        /// Path to the project directory
        path: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value = "mp4")]
        format: FormatArg,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Frame rate (defaults to the project's)
        #[arg(long)]
        fps: Option<u32>,

        /// GIF loop count (infinite when omitted)
        #[arg(long)]
        loops: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load();
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    stopframe_common::logging::init_logging(&config.logging);
    tracing::debug!(
        backend = ?config.capture.backend,
        probe_policy = ?config.capture.probe_policy,
        "Configuration loaded"
    );

    match cli.command {
        Commands::Init { path } => commands::init::run(path),
        Commands::Info { path } => commands::info::run(path),
        Commands::Validate { path } => commands::validate::run(path),
        Commands::Devices {
            synthetic,
            policy,
            limit,
        } => commands::devices::run(&config, synthetic, policy.map(Into::into), limit).await,
        Commands::Shoot {
            path,
            synthetic,
            device,
        } => commands::shoot::run(&config, path, synthetic, device).await,
        Commands::Export {
            path,
            format,
            output,
            fps,
            loops,
        } => commands::export::run(path, format.into(), output, fps, loops).await,
    }
}
