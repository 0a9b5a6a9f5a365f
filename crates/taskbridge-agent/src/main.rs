//! # taskbridge-agent
//!
//! taskbridge server binary: loads settings, installs logging and metrics,
//! and serves the bridge in front of the in-memory task engine.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use taskbridge_core::engine::NoopHost;
use taskbridge_core::engine::memory::InMemoryEngine;
use taskbridge_core::logging::{LogFormat, init_subscriber};
use taskbridge_server::BridgeServer;
use taskbridge_server::metrics::install_recorder;
use taskbridge_settings::TaskbridgeSettings;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// taskbridge server.
#[derive(Parser, Debug)]
#[command(name = "taskbridge-agent", about = "External control bridge for a task engine")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (defaults to `~/.taskbridge/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level filter (overrides settings; `RUST_LOG` wins over both).
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON log lines.
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    /// Load settings and apply command-line overrides on top.
    fn settings(&self) -> Result<TaskbridgeSettings> {
        let path = self
            .config
            .clone()
            .unwrap_or_else(taskbridge_settings::settings_path);
        let mut settings = taskbridge_settings::load_settings_from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;

        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
        if self.json_logs {
            settings.logging.format = LogFormat::Json;
        }
        settings.validate().context("Invalid command-line overrides")?;
        Ok(settings)
    }
}

async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut term = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .context("Failed to install SIGTERM handler")?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.context("Failed to listen for ctrl-c")?,
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let settings = args.settings()?;
    init_subscriber(&settings.logging.level, settings.logging.format);

    let metrics = install_recorder().context("Failed to install metrics recorder")?;
    let engine = Arc::new(InMemoryEngine::new(settings.bridge.server_version.clone()));
    let server = BridgeServer::new(&settings, engine, Arc::new(NoopHost)).with_metrics(metrics);

    let running = server.listen().await.context("Failed to bind server")?;
    tracing::info!(
        addr = %running.addr,
        version = %settings.bridge.server_version,
        "taskbridge agent listening on http://{}",
        running.addr
    );

    shutdown_signal().await?;
    tracing::info!("Shutting down...");
    running.stop(Some(SHUTDOWN_TIMEOUT)).await;
    tracing::info!("Shutdown complete");
    Ok(())
}
