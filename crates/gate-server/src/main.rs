//! `gate` - Campus Gate access control server

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gate_core::effects::RandomEffects;
use gate_effects::RealRandomHandler;
use gate_offline::SnapshotSigner;
use gate_server::{router, start_jobs, AppState, GateConfig, Handlers, JobRegistry, JobSchedule, SeedData};
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gate")]
#[command(about = "Campus Gate - QR credential access control", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API and background jobs
    Serve,

    /// Load and validate the configuration, then exit
    CheckConfig,

    /// Print a fresh snapshot signing seed and its verifying key
    Keygen,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Serve => {
            let config = GateConfig::load(cli.config.as_deref())?;
            serve(config).await?;
        }

        Commands::CheckConfig => {
            let config = GateConfig::load(cli.config.as_deref())?;
            if let Some(seed) = &config.seed {
                SeedData::from_file(seed)?;
            }
            println!("configuration ok (listening on {})", config.server.bind_address);
        }

        Commands::Keygen => {
            let seed = RealRandomHandler::new().random_bytes_32().await;
            let signer = SnapshotSigner::from_seed(seed);
            println!("signing_seed_hex = \"{}\"", hex::encode(seed));
            println!("verifying_key_hex = \"{}\"", signer.verifier().to_hex());
        }
    }

    Ok(())
}

async fn serve(config: GateConfig) -> Result<()> {
    let state = AppState::in_memory(&config, Handlers::production())
        .context("cannot build services")?;
    if let Some(seed) = &config.seed {
        SeedData::from_file(seed)?
            .apply(&state)
            .await
            .context("cannot apply seed data")?;
    }

    let jobs = JobRegistry::new();
    start_jobs(
        &jobs,
        &state,
        JobSchedule {
            sweep_interval: Duration::from_secs(config.detection.sweep_interval_secs),
            refresh_interval: Duration::from_secs(config.offline.refresh_interval_secs),
            prewarm_scopes: config.prewarm_scopes()?,
        },
    );

    let addr = config.bind_address()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("cannot bind {addr}"))?;
    info!(%addr, "campus gate listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    jobs.shutdown();
    info!("campus gate stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(%error, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
