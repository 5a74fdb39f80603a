mod calibrate;
mod daemon;
mod ingest_http;
mod ingest_mqtt;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "mcmotd", about = "Multi-camera multi-object tracking integration daemon")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Runs the daemon's main loop (default if no subcommand is given).
    Run,
    /// Computes a homography from point correspondences and saves it.
    Calibrate {
        /// JSON file of `{"points": [{"src": [x, y], "dst": [x, y]}, ...]}`.
        #[arg(long)]
        points: PathBuf,
        /// Where to write the fitted homography.
        #[arg(long)]
        output: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Run) {
        Command::Run => daemon::run(),
        Command::Calibrate { points, output } => calibrate::run(&points, &output),
    }
}
