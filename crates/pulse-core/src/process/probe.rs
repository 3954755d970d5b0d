//! Detection of the companion server process.

use super::runner::CommandRunner;
use crate::config::{ExecutionMode, ServerTarget};
use crate::error::{RelayError, Result};
use crate::platform::{self, CommandSpec};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Decides whether the server process is up, locally or on the remote host.
///
/// Matching is a plain substring test against the textual process listing, so
/// a match string that also appears in an unrelated command line gives a false
/// positive.
#[derive(Clone)]
pub struct ProcessProbe {
    runner: Arc<dyn CommandRunner>,
}

impl ProcessProbe {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Command whose output is searched for the process-match string.
    pub fn listing_command(target: &ServerTarget) -> CommandSpec {
        match target.mode {
            ExecutionMode::Local => platform::process_list_command(),
            ExecutionMode::Remote => platform::remote_command(
                &target.remote_destination(),
                &platform::remote_process_filter(&target.process_match),
            ),
        }
    }

    /// Run the listing and test for the match string.
    ///
    /// The exit status is ignored: a remote `grep` that finds nothing exits
    /// non-zero, which simply means "not running".
    pub async fn probe(&self, target: &ServerTarget) -> Result<bool> {
        let spec = Self::listing_command(target);
        let output = self.runner.run(&spec).await?;
        debug!(
            "Process listing from `{}`: {} bytes, status {:?}",
            spec,
            output.stdout.len(),
            output.status
        );
        Ok(output.stdout.contains(&target.process_match))
    }

    /// Whether the server is running. Never fails: errors count as "not running".
    pub async fn is_running(&self, target: &ServerTarget) -> bool {
        let where_ = match target.mode {
            ExecutionMode::Local => "",
            ExecutionMode::Remote => " on remote machine",
        };

        match self.probe(target).await {
            Ok(true) => {
                info!("Server is already running{}.", where_);
                true
            }
            Ok(false) => {
                info!("Server is not running{}.", where_);
                false
            }
            Err(e) => {
                error!("{}", failure_message(target.mode, &e));
                false
            }
        }
    }
}

/// Console line for a listing that could not be taken.
fn failure_message(mode: ExecutionMode, err: &RelayError) -> String {
    match mode {
        ExecutionMode::Local => format!("Failed to check if server is running: {}", err),
        ExecutionMode::Remote => format!("Error while checking server status: {}", err),
    }
}
