//! The relay pipeline: ensure server up, wait for input, transfer, persist.
//!
//! Nothing here is exclusive. Two relays running at once may both start the
//! server and may both transfer the same file.

use crate::cancel::CancellationToken;
use crate::config::{Endpoint, RelayConfig, ServerTarget};
use crate::error::{RelayError, Result};
use crate::process::{CommandRunner, LaunchOutcome, ProcessLauncher, SystemRunner};
use crate::transfer::{TransferClient, TransferReport};
use crate::watcher::FileStabilityWatcher;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// What one pipeline run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayOutcome {
    pub launch: LaunchOutcome,
    /// `None` when reading the input or talking to the server failed; the
    /// failure has already been logged.
    pub transfer: Option<TransferReport>,
}

/// Wires the launcher, watcher and transfer client together.
pub struct Relay {
    target: ServerTarget,
    interval: Duration,
    launcher: ProcessLauncher,
    client: TransferClient,
}

impl Relay {
    /// Relay that runs real commands on this machine.
    pub fn new(config: &RelayConfig) -> Self {
        Self::with_runner(config, Arc::new(SystemRunner))
    }

    /// Relay whose probe/launch commands go through `runner`.
    pub fn with_runner(config: &RelayConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            target: config.server_target(),
            interval: config.check_interval(),
            launcher: ProcessLauncher::new(runner),
            client: TransferClient::new(config.endpoint()),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        self.client.endpoint()
    }

    pub fn target(&self) -> &ServerTarget {
        &self.target
    }

    pub fn launcher(&self) -> &ProcessLauncher {
        &self.launcher
    }

    /// Run the pipeline with no deadline.
    ///
    /// Only returns an error on cancellation, which the default token never
    /// triggers.
    pub async fn run(&self, input: &Path, output: &Path) -> Result<RelayOutcome> {
        self.run_with(input, output, &CancellationToken::new())
            .await
    }

    /// Run the pipeline, giving up with `Cancelled`/`DeadlineExceeded` when
    /// `token` fires. That covers a start command that has not exited, the
    /// stability wait and a transfer still in progress.
    pub async fn run_with(
        &self,
        input: &Path,
        output: &Path,
        token: &CancellationToken,
    ) -> Result<RelayOutcome> {
        let launch = self
            .launcher
            .ensure_running_with(&self.target, token)
            .await;
        if launch == LaunchOutcome::Cancelled {
            token.check()?;
            return Err(RelayError::Cancelled);
        }

        info!("Waiting for {} to become stable", input.display());
        let transfer =
            FileStabilityWatcher::watch_with(input, self.interval, token, || {
                self.forward(input, output)
            })
            .await?;

        Ok(RelayOutcome { launch, transfer })
    }

    /// Read `input` and exchange its bytes for the server's reply in `output`.
    async fn forward(&self, input: &Path, output: &Path) -> Option<TransferReport> {
        let data = match tokio::fs::read(input).await {
            Ok(data) => data,
            Err(e) => {
                error!("Failed to read {}: {}", input.display(), e);
                return None;
            }
        };
        self.client.send_buffer_logged(data, output).await
    }
}
