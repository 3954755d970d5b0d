//! Subcommand implementations.
//!
//! Transfer and launch failures are reported through the log only; the
//! process still exits 0, matching how the relay is driven from lab scripts.

use anyhow::{Context, Result};
use pulse_core::{
    CancellationToken, EchoServer, PathMode, Relay, RelayConfig, RelayError, TransferClient,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Conventional shell exit status for a process stopped by SIGINT.
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Load configuration from `path`, or from the default location.
pub fn load_config(path: Option<&Path>) -> Result<RelayConfig> {
    let config = match path {
        Some(path) => RelayConfig::load_from(path),
        None => RelayConfig::load(),
    };
    config.context("Failed to load configuration")
}

/// Cancel `token` on the first Ctrl-C; exit on the second.
///
/// Installing the handler replaces the default SIGINT behavior, so a second
/// press must still be able to stop a process that ignores the token.
fn cancel_on_ctrl_c(token: &CancellationToken) {
    let token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        info!("Shutdown signal received");
        token.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Second interrupt, exiting");
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    });
}

fn resolve_paths(
    config: &RelayConfig,
    production: bool,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
) -> (PathBuf, PathBuf) {
    let mode = if production {
        PathMode::Production
    } else {
        PathMode::Simulation
    };
    let (default_input, default_output) = config.paths(mode);
    (
        input.unwrap_or_else(|| default_input.to_path_buf()),
        output.unwrap_or_else(|| default_output.to_path_buf()),
    )
}

pub async fn run(
    config: &RelayConfig,
    production: bool,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    timeout: Option<u64>,
) -> Result<()> {
    let (input, output) = resolve_paths(config, production, input, output);
    let token = match timeout {
        Some(secs) => CancellationToken::with_timeout(Duration::from_secs(secs)),
        None => CancellationToken::new(),
    };
    cancel_on_ctrl_c(&token);

    let relay = Relay::new(config);
    info!(
        "Relaying {} -> {} via {}",
        input.display(),
        output.display(),
        relay.endpoint()
    );

    match relay.run_with(&input, &output, &token).await {
        Ok(outcome) => {
            if outcome.transfer.is_none() {
                warn!("No response was stored");
            }
            Ok(())
        }
        Err(e) if e.is_cancellation() => {
            warn!("Stopped waiting for {}: {}", input.display(), e);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn send(config: &RelayConfig, file: &Path, output: Option<&Path>) -> Result<()> {
    let client = TransferClient::new(config.endpoint());
    match output {
        Some(output) => {
            let data = match tokio::fs::read(file).await {
                Ok(data) => data,
                Err(e) => {
                    warn!("{}", RelayError::io_with_path(e, file));
                    return Ok(());
                }
            };
            client.send_buffer_logged(data, output).await;
        }
        None => {
            client.send_file_logged(file).await;
        }
    }
    Ok(())
}

pub async fn status(config: &RelayConfig) -> Result<()> {
    let relay = Relay::new(config);
    let running = relay.launcher().probe().is_running(relay.target()).await;
    println!("{}", if running { "running" } else { "stopped" });
    Ok(())
}

pub async fn start(config: &RelayConfig) -> Result<()> {
    let relay = Relay::new(config);
    let outcome = relay.launcher().ensure_running(relay.target()).await;
    info!("Launch outcome: {:?}", outcome);
    Ok(())
}

pub async fn serve(host: &str, port: u16, once: bool) -> Result<()> {
    let server = EchoServer::bind(&format!("{}:{}", host, port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", host, port))?;

    if once {
        server.serve_one().await?;
        return Ok(());
    }

    let token = CancellationToken::new();
    cancel_on_ctrl_c(&token);
    server.serve_until(&token).await?;
    Ok(())
}
