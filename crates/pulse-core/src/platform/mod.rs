//! Platform abstraction layer.
//!
//! All `#[cfg]` blocks for OS-specific behavior live here rather than being
//! scattered throughout the crate.

pub mod process;

pub use process::{
    process_list_command, remote_command, remote_process_filter, shell_command, CommandSpec,
};
