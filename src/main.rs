//! quakeweave - multi-source seismic event ingestion and reconciliation.
//!
//! Triggered by an external scheduler (`quakeweave run`) or left running
//! as an HTTP service (`quakeweave serve`) that a scheduler calls via
//! `POST /ingest`.

use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

mod cli;

use cli::{Cli, Command};
use quakeweave::config::Config;
use quakeweave::{pipeline, server, sources, warehouse};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(run(cli.command)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<()> {
    let config = Config::from_env().context("failed to load configuration")?;
    let registry = sources::default_registry();

    let pool = warehouse::connect(&config.database_url)
        .await
        .context("failed to connect to warehouse")?;
    warehouse::run_migrations(&pool)
        .await
        .context("failed to run warehouse migrations")?;

    match command {
        Command::Run => {
            let summary = pipeline::run_cycle(&pool, &registry, &config).await?;
            info!(
                run_id = summary.run_id,
                raw_events = summary.raw_events_count,
                unified_events = summary.unified_events_count,
                dead_letters = summary.dead_letter_count,
                "cycle complete"
            );
            Ok(())
        }
        Command::Serve => {
            let bind_addr = config.bind_addr.clone();
            let state = server::AppState {
                pool,
                registry: Arc::new(registry),
                config: Arc::new(config),
            };
            let app = server::router(state);

            let listener = tokio::net::TcpListener::bind(&bind_addr)
                .await
                .with_context(|| format!("failed to bind {bind_addr}"))?;

            info!("listening on {bind_addr}");
            axum::serve(listener, app).await.context("server error")?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber.
fn init_tracing(verbose: bool, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}
