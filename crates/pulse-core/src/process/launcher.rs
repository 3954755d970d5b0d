//! Starting the companion server when it is not already up.

use super::probe::ProcessProbe;
use super::runner::CommandRunner;
use crate::cancel::CancellationToken;
use crate::config::{ExecutionMode, ServerTarget};
use crate::platform::{self, CommandSpec};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What `ensure_running` ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// The probe found the server; nothing was started.
    AlreadyRunning,
    /// The start command ran and exited successfully.
    Started,
    /// The token fired before the start command finished; a running start
    /// command is killed.
    Cancelled,
    /// The start command ran and exited non-zero.
    Failed {
        status: Option<i32>,
        stderr: String,
    },
    /// The start command could not be run at all.
    SpawnError(String),
}

impl LaunchOutcome {
    /// True when the server should now be up.
    pub fn is_running(&self) -> bool {
        matches!(self, LaunchOutcome::AlreadyRunning | LaunchOutcome::Started)
    }
}

/// Probe-then-start for the server process.
///
/// The two steps are not atomic: concurrent callers can both see "not
/// running" and both start the server.
#[derive(Clone)]
pub struct ProcessLauncher {
    probe: ProcessProbe,
    runner: Arc<dyn CommandRunner>,
}

impl ProcessLauncher {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            probe: ProcessProbe::new(runner.clone()),
            runner,
        }
    }

    pub fn probe(&self) -> &ProcessProbe {
        &self.probe
    }

    /// Command that starts the server for the given target.
    pub fn start_command(target: &ServerTarget) -> CommandSpec {
        match target.mode {
            ExecutionMode::Local => platform::shell_command(&target.start_command),
            ExecutionMode::Remote => {
                platform::remote_command(&target.remote_destination(), &target.start_command)
            }
        }
    }

    /// Start the server unless it is already running.
    ///
    /// Failures are logged, never returned.
    pub async fn ensure_running(&self, target: &ServerTarget) -> LaunchOutcome {
        self.ensure_running_with(target, &CancellationToken::new())
            .await
    }

    /// As `ensure_running`, but bounded by `token`.
    ///
    /// A token that has already fired skips the launch. One that fires while
    /// the start command is still running drops (and so kills) that command.
    pub async fn ensure_running_with(
        &self,
        target: &ServerTarget,
        token: &CancellationToken,
    ) -> LaunchOutcome {
        if self.probe.is_running(target).await {
            return LaunchOutcome::AlreadyRunning;
        }

        if let Err(e) = token.check() {
            warn!("Not starting server: {}", e);
            return LaunchOutcome::Cancelled;
        }

        tokio::select! {
            outcome = self.launch(target) => outcome,
            e = token.cancelled() => {
                warn!("Stopped waiting for the start command: {}", e);
                LaunchOutcome::Cancelled
            }
        }
    }

    /// Run the start command unconditionally and wait for it to exit.
    ///
    /// The command's own exit status is the only success signal; a start
    /// command that stays in the foreground blocks until the server exits.
    pub async fn launch(&self, target: &ServerTarget) -> LaunchOutcome {
        info!("{}", starting_message(target.mode));

        let spec = Self::start_command(target);
        debug!("Start command: {}", spec);

        let output = match self.runner.run(&spec).await {
            Ok(output) => output,
            Err(e) => {
                error!("Failed to start server. Error: {}", e);
                return LaunchOutcome::SpawnError(e.to_string());
            }
        };

        if output.success {
            match target.mode {
                ExecutionMode::Local => info!("Server started successfully on local machine."),
                ExecutionMode::Remote => info!("Server started successfully on remote machine."),
            }
            LaunchOutcome::Started
        } else {
            error!("Failed to start server. Error: {}", output.stderr.trim_end());
            LaunchOutcome::Failed {
                status: output.status,
                stderr: output.stderr,
            }
        }
    }
}

fn starting_message(mode: ExecutionMode) -> &'static str {
    match mode {
        ExecutionMode::Local => "Starting server locally on localhost...",
        ExecutionMode::Remote => "Starting server on remote machine...",
    }
}
