//! Deploy hook entry point.
//!
//! This binary is the composition root. Responsibilities:
//!
//! 1. **Parse configuration**: load `deployhook.toml` (or `--config`), apply
//!    `DEPLOYHOOK_SECRET`, validate.
//! 2. **Wire observability**: `tracing-subscriber` with an `EnvFilter`, a JSON
//!    or pretty fmt layer, and an OpenTelemetry OTLP exporter when configured.
//! 3. **Construct infrastructure**: `GitCli`, `FsArtifactPublisher`,
//!    `CommandReloader` and `GitHubMetaClient`, injected into the
//!    `DeploySynchronizer` and the `WebhookGate`.
//! 4. **Serve** `/deploy` until SIGINT or SIGTERM.

mod config;
mod telemetry;

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use git::GitCli;
use github::GitHubMetaClient;
use listener::{AppState, WebhookGate};
use platform::{CommandReloader, FsArtifactPublisher};
use synchronizer::DeploySynchronizer;
use tracing::{error, info};

use crate::config::CliConfig;

#[derive(Debug, Parser)]
#[command(name = "deployhook", version, about = "GitHub push webhook that redeploys the platform")]
struct Args {
    /// Configuration file.
    #[arg(long, default_value = "deployhook.toml")]
    config: PathBuf,

    /// Overrides `server.bind`.
    #[arg(long)]
    bind: Option<SocketAddr>,
}

fn build_state(config: &CliConfig) -> anyhow::Result<AppState> {
    let ranges = GitHubMetaClient::new(
        config.github.meta_url.clone(),
        &config.github.user_agent,
        config.metadata_timeout(),
    )
    .context("building the GitHub metadata client")?;
    let gate = WebhookGate::github(Arc::new(ranges), config.gate_settings()?);

    let reloader = CommandReloader::from_command(&config.deploy.reload_command)?;
    let synchronizer = DeploySynchronizer::new(
        config.deploy_settings()?,
        Arc::new(GitCli::new()),
        Arc::new(FsArtifactPublisher::new(config.artifact_paths())),
        Arc::new(reloader),
    );

    Ok(AppState::new(gate, Arc::new(synchronizer)))
}

/// Resolves when `signal` fires. A handler that cannot be installed is
/// logged and never resolves, so the other signal still stops the server.
async fn until_signal(name: &'static str, signal: impl Future<Output = io::Result<()>>) {
    if let Err(e) = signal.await {
        error!(signal = name, error = %e, "cannot listen for signal");
        std::future::pending::<()>().await;
    }
}

async fn shutdown_signal() {
    let interrupt = until_signal("SIGINT", tokio::signal::ctrl_c());

    #[cfg(unix)]
    let terminate = until_signal("SIGTERM", async {
        use tokio::signal::unix::{signal, SignalKind};

        signal(SignalKind::terminate())?.recv().await;
        Ok::<(), io::Error>(())
    });
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {}
        _ = terminate => {}
    }
    info!("shutdown requested");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = CliConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    let _telemetry = telemetry::init(&config.telemetry)?;
    info!(config = ?config, "configuration loaded");

    let bind = args.bind.unwrap_or(config.server.bind);
    let state = build_state(&config)?;
    listener::serve(bind, state, shutdown_signal()).await?;
    Ok(())
}
