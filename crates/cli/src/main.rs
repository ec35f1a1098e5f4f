//! Device registration forwarder entry point.
//!
//! This binary is the composition root for the entire system. Responsibilities:
//!
//! 1. **Parse configuration** — load [`ServiceConfig`] from `DEVICE_FORWARDER_*`
//!    environment variables.
//! 2. **Wire observability** — configure `tracing-subscriber` with a JSON layer
//!    and, when enabled, an OpenTelemetry OTLP exporter.
//! 3. **Load the credential** — read the GitHub token once; a missing token
//!    stops the process before anything listens or dispatches.
//! 4. **Construct infrastructure** — build the `GithubWorkflowDispatcher` and
//!    inject it into the [`EventForwarder`].
//! 5. **Select trigger mode**:
//!    - `serve` — receive App Distribution alerts over HTTP until signalled.
//!    - `dispatch` — forward one tester device payload read from a file or
//!      stdin, then exit.

mod config;
mod telemetry;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use forwarder::{Credential, DeviceRegistrationEvent, EventForwarder, TesterDevicePayload};
use github::GithubWorkflowDispatcher;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::ServiceConfig;
use crate::telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig};

#[derive(Debug, Parser)]
#[command(
    name = "device-forwarder",
    version,
    about = "Triggers the device registration workflow for new App Distribution tester devices"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Receive App Distribution alerts as CloudEvents over HTTP.
    Serve {
        /// Listen address; defaults to DEVICE_FORWARDER_BIND_ADDRESS, then 0.0.0.0:$PORT.
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Forward a single tester device payload and exit.
    Dispatch {
        /// JSON file holding the payload (`testerDeviceIdentifier`, ...); `-` reads stdin.
        #[arg(long, default_value = "-")]
        event: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match ServiceConfig::from_env().context("Failed to load configuration") {
        Ok(config) => config,
        Err(err) => return exit_before_logging(&err),
    };
    let providers = match init_telemetry(&TelemetryConfig::from(&config))
        .context("Failed to initialise telemetry")
    {
        Ok(providers) => providers,
        Err(err) => return exit_before_logging(&err),
    };

    let code = report(run(cli.command, &config).await);
    shutdown_telemetry(providers);
    code
}

/// Logging is not set up yet, so stderr is the only channel.
fn exit_before_logging(err: &anyhow::Error) -> ExitCode {
    eprintln!("device-forwarder: {err:#}");
    ExitCode::FAILURE
}

/// Logs a failed run once and turns the outcome into the exit code.
fn report(result: Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %format!("{err:#}"), "device-forwarder failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, config: &ServiceConfig) -> Result<()> {
    let credential = Credential::from_env()?;
    let dispatcher = GithubWorkflowDispatcher::new(&config.github_api_url, config.http_timeout())?;
    let forwarder = EventForwarder::new(credential, Arc::new(dispatcher));

    match command {
        Command::Serve { bind } => {
            let addr = match bind {
                Some(addr) => addr,
                None => config.listen_address(std::env::var("PORT").ok().as_deref())?,
            };
            let tcp_listener = TcpListener::bind(addr)
                .await
                .with_context(|| format!("Cannot bind to {addr}"))?;
            listener::serve(tcp_listener, forwarder, shutdown_signal()).await?;
            info!("Listener stopped");
        }
        Command::Dispatch { event } => {
            let raw = read_event(&event).await?;
            let event = parse_event(&raw)?;
            forwarder.forward(&event).await?;
        }
    }

    Ok(())
}

async fn read_event(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut raw = String::new();
        tokio::io::stdin()
            .read_to_string(&mut raw)
            .await
            .context("Failed to read event from stdin")?;
        return Ok(raw);
    }
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

fn parse_event(raw: &str) -> Result<DeviceRegistrationEvent> {
    let payload: TesterDevicePayload =
        serde_json::from_str(raw).context("Event is not a tester device payload")?;
    Ok(DeviceRegistrationEvent::try_from(payload)?)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
