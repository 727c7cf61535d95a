//! Command-line interface definitions.
//!
//! Uses clap derive API for argument parsing.

use clap::{Parser, Subcommand};

/// Multi-source seismic event ingestion and reconciliation pipeline.
#[derive(Parser, Debug)]
#[command(name = "quakeweave")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Command to run
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose debug logging
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    pub quiet: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP trigger surface (`POST /ingest`, `GET /health`)
    Serve,

    /// Run a single ingestion cycle and exit
    Run,
}
