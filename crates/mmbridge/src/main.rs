//! # mmbridge
//!
//! Launcher: loads settings, starts the bridge server, and runs until ctrl-c
//! or a fatal server error.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use mmbridge_core::logging::{LogFormat, init_subscriber};
use mmbridge_server::{BridgeServer, ServerConfig};
use mmbridge_settings::{BridgeSettings, load_settings, load_settings_from_path, settings_path};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Bridge JSON-RPC clients to a wallet running in a browser tab.
#[derive(Parser, Debug)]
#[command(name = "mmbridge", version, about)]
struct Cli {
    /// Loopback host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long, short)]
    port: Option<u16>,

    /// Settings file (default `~/.mmbridge/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log filter directive, e.g. `debug` or `mmbridge_broker=trace`.
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn settings_file(&self) -> PathBuf {
        self.settings.clone().unwrap_or_else(settings_path)
    }

    /// Settings from `--settings` if given, else from the default location,
    /// with flags applied on top.
    fn load_settings(&self) -> mmbridge_settings::Result<BridgeSettings> {
        let mut settings = match &self.settings {
            Some(path) => load_settings_from_path(path)?,
            None => load_settings()?,
        };
        self.apply_overrides(&mut settings);
        Ok(settings)
    }

    /// Flags win over file and environment.
    fn apply_overrides(&self, settings: &mut BridgeSettings) {
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
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = cli
        .load_settings()
        .with_context(|| format!("Failed to load settings from {}", cli.settings_file().display()))?;

    init_subscriber(&settings.logging.level, settings.logging.format);

    let server = BridgeServer::new(ServerConfig::from(&settings.server));
    let (addr, handle) = server.listen().await.context("Failed to start bridge server")?;

    tracing::info!("open http://{addr}/ in a browser with your wallet to attach the signer");

    let fatal = server.shutdown().token();
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for ctrl-c")?;
            tracing::info!("shutting down");
        }
        () = fatal.cancelled() => {
            server.stop();
            server.shutdown().graceful_shutdown(vec![handle], Some(SHUTDOWN_GRACE)).await;
            bail!("bridge server stopped unexpectedly");
        }
    }

    server.stop();
    server
        .shutdown()
        .graceful_shutdown(vec![handle], Some(SHUTDOWN_GRACE))
        .await;
    tracing::info!("shutdown complete");
    Ok(())
}
