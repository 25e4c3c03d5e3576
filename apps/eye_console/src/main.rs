use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{SessionController, TracingDiagnostics, WebSocketConnector};
use shared::domain::SessionPhase;
use tracing::{info, warn};

mod config;
mod console;

use console::ConsolePresentation;

#[derive(Parser, Debug)]
#[command(about = "Runs one eye session against a vision backend, rendering to the log")]
struct Args {
    /// TOML settings file; defaults to ./eye.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    backend_url: Option<String>,
    #[arg(long)]
    reconnect_delay_ms: Option<u64>,
    #[arg(long)]
    seed: Option<u64>,
    /// End the session after this many seconds instead of waiting for ctrl-c.
    #[arg(long)]
    run_for: Option<u64>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();
    let args = Args::parse();

    let mut settings = config::load_settings(args.config.as_deref())?;
    if let Some(url) = args.backend_url {
        settings.backend_url = url;
    }
    if let Some(delay) = args.reconnect_delay_ms {
        settings.reconnect_delay_ms = delay;
    }
    if let Some(seed) = args.seed {
        settings.simulation_seed = Some(seed);
    }

    let presentation = Arc::new(ConsolePresentation::new());
    let (controller, handle) = SessionController::new(
        settings,
        Arc::new(WebSocketConnector),
        presentation.clone(),
        Arc::new(TracingDiagnostics),
    )
    .context("failed to build session")?;
    let controller = tokio::spawn(controller.run());

    handle.begin();
    match args.run_for {
        Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
        None => tokio::signal::ctrl_c()
            .await
            .context("failed to listen for ctrl-c")?,
    }

    let observed = handle.snapshot().events_observed;
    handle.end();
    if handle
        .wait_for(|snapshot| snapshot.phase == SessionPhase::Idle)
        .await
        .is_none()
    {
        warn!("controller stopped before teardown finished");
    }
    handle.shutdown();
    controller.await.context("session task failed")?;

    info!(events_observed = observed, pulses = ?presentation.pulse_counts(), "session finished");
    Ok(())
}
