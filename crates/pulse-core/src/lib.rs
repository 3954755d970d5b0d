//! Pulse Core - file relay between a simulation step and a processing server.
//!
//! The crate waits for an input file to stop growing, makes sure the companion
//! server is running (locally or over `ssh`), streams the file to it over a
//! raw TCP connection and writes the server's reply to disk.
//!
//! # Example
//!
//! ```rust,no_run
//! use pulse_core::{PathMode, Relay, RelayConfig};
//!
//! #[tokio::main]
//! async fn main() -> pulse_core::Result<()> {
//!     let config = RelayConfig::load()?;
//!     let (input, output) = config.paths(PathMode::Simulation);
//!
//!     let outcome = Relay::new(&config).run(input, output).await?;
//!     println!("reply written: {}", outcome.transfer.is_some());
//!
//!     Ok(())
//! }
//! ```

pub mod cancel;
pub mod config;
pub mod error;
pub mod platform;
pub mod process;
pub mod relay;
pub mod transfer;
pub mod watcher;

// Re-export commonly used types
pub use cancel::{CancellationToken, CancelledError};
pub use config::{Endpoint, ExecutionMode, PathMode, RelayConfig, ServerTarget, TransferConfig};
pub use error::{RelayError, Result};
pub use process::{
    CommandOutput, CommandRunner, LaunchOutcome, ProcessLauncher, ProcessProbe, SystemRunner,
};
pub use relay::{Relay, RelayOutcome};
pub use transfer::{EchoServer, TransferClient, TransferReport, TransferSource};
pub use watcher::{FileStabilityWatcher, StabilityCheck};
