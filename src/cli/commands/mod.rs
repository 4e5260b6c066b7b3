//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod run;
mod serve;

use clap::{Parser, Subcommand};

use crate::config::Settings;

#[derive(Parser)]
#[command(name = "emisores")]
#[command(about = "Mirror of the DGII electronic invoice issuer list")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Download the list once, load it and print a sample
    Run {
        /// Number of stored rows to print afterwards
        #[arg(short, long, default_value = "5")]
        sample: usize,
    },

    /// Start the API server with scheduled refreshes
    Serve {
        /// Bind address (host:port, host, or port). Defaults to HOST/PORT
        #[arg(short, long)]
        bind: Option<String>,
    },
}

/// Parse arguments, load settings and run the selected command.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::from_env()?;

    match cli.command {
        Commands::Run { sample } => run::cmd_run(&settings, sample).await,
        Commands::Serve { bind } => serve::cmd_serve(&settings, bind.as_deref()).await,
    }
}
