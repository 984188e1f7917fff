//! Cuegrid CLI: create, inspect, and rehearse shows without a screen.
//!
//! Usage:
//!   cuegrid init <NAME>          Create a new show file
//!   cuegrid info <PATH>          Show grid, settings, and playback flags
//!   cuegrid validate <PATH>      Report missing media files
//!   cuegrid devices              List audio outputs and displays
//!   cuegrid rehearse <PATH>      Walk a row through the headless engine

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use cuegrid_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "cuegrid",
    about = "Live media cueing: slot grids, trigger columns, and mirrored output",
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

#[derive(Subcommand)]
enum Commands {
    /// Create a new show file
    Init {
        /// Show name
        name: String,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Fill row 0 and trigger column 0 with placeholder media
        #[arg(long)]
        sample: bool,
    },

    /// Show grid, settings, and playback flags
    Info {
        /// Path to the show file
        path: PathBuf,

        /// Print the show as JSON
        #[arg(long)]
        json: bool,
    },

    /// Report slots whose media file is missing
    Validate {
        /// Path to the show file
        path: PathBuf,
    },

    /// List audio outputs and displays
    Devices,

    /// Play a row through the headless engine, simulating end of media
    Rehearse {
        /// Path to the show file
        path: PathBuf,

        /// Row to start from
        #[arg(long, default_value = "0")]
        row: u32,

        /// Wrap to the start of the row at its end
        #[arg(long = "loop")]
        loop_playlist: bool,

        /// Assumed length of every timed media file (seconds)
        #[arg(long, default_value = "5")]
        clip_secs: u64,

        /// Stop after this much simulated time (seconds)
        #[arg(long, default_value = "120")]
        max_secs: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load();
    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    cuegrid_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Init {
            name,
            output,
            sample,
        } => commands::init::run(name, output, sample),
        Commands::Info { path, json } => commands::info::run(path, json),
        Commands::Validate { path } => commands::validate::run(path),
        Commands::Devices => commands::devices::run(&config),
        Commands::Rehearse {
            path,
            row,
            loop_playlist,
            clip_secs,
            max_secs,
        } => commands::rehearse::run(&config, path, row, loop_playlist, clip_secs, max_secs).await,
    }
}
