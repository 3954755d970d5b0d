//! Server process lifecycle.
//!
//! Handles detection and launching of the companion processing server, either
//! on this machine or on the configured remote host.
//!
//! # Detection Strategy
//!
//! The server is considered running when its process-match string appears
//! anywhere in a process listing:
//! 1. **Local** - `ps aux` (or `tasklist` on Windows)
//! 2. **Remote** - `ssh user@host "ps aux | grep <match> | grep -v grep"`
//!
//! # Example
//!
//! ```rust,no_run
//! use pulse_core::process::{ProcessLauncher, SystemRunner};
//! use pulse_core::RelayConfig;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = RelayConfig::default();
//!     let launcher = ProcessLauncher::new(Arc::new(SystemRunner));
//!
//!     let outcome = launcher.ensure_running(&config.server_target()).await;
//!     println!("server up: {}", outcome.is_running());
//! }
//! ```

mod launcher;
mod probe;
pub(crate) mod runner;

pub use launcher::{LaunchOutcome, ProcessLauncher};
pub use probe::ProcessProbe;
pub use runner::{CommandOutput, CommandRunner, SystemRunner};
