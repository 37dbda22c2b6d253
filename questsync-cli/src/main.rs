//! QuestSync CLI - Command-line interface
//!
//! Inspect the configuration and replay scripted position and connectivity
//! events through the auto-sync trigger.

mod commands;
mod error;
mod logging;

use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Parser, Subcommand};

use crate::error::CliError;

#[derive(Debug, Parser)]
#[command(name = "questsync", version, about = "Automatic quest download and upload")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show the effective configuration
    Config {
        /// Configuration file (defaults to the platform config directory)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Write the defaults if the file does not exist yet
        #[arg(long)]
        init: bool,
    },

    /// Replay a script of position and connectivity events
    Replay {
        /// Script file, one event per line
        script: PathBuf,

        /// Configuration file (defaults to the platform config directory)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Config { path, init } => commands::config::run(path, init),
        Commands::Replay { script, config } => commands::replay::run(&script, config),
    }
}
