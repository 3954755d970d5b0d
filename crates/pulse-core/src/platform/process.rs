//! Platform-specific command construction.
//!
//! Every external program the relay runs (process listing, local shell,
//! remote execution) is described here as a `CommandSpec`, so the rest of the
//! crate never needs its own `#[cfg]` blocks.

use std::fmt;

/// Program used for remote execution. Authentication is left to it entirely.
pub const REMOTE_EXEC_PROGRAM: &str = "ssh";

/// A program plus its arguments, ready to hand to a `CommandRunner`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.contains(char::is_whitespace) {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Command that lists every process on this machine.
///
/// # Platform Behavior
/// - **Windows**: `tasklist`
/// - **Linux/macOS**: `ps aux`
pub fn process_list_command() -> CommandSpec {
    #[cfg(windows)]
    {
        CommandSpec::new("tasklist", Vec::<String>::new())
    }

    #[cfg(not(windows))]
    {
        CommandSpec::new("ps", ["aux"])
    }
}

/// Run `command` through the local shell.
///
/// # Platform Behavior
/// - **Windows**: `cmd /C <command>`
/// - **Linux/macOS**: `sh -c <command>`
pub fn shell_command(command: &str) -> CommandSpec {
    #[cfg(windows)]
    {
        CommandSpec::new("cmd", ["/C", command])
    }

    #[cfg(not(windows))]
    {
        CommandSpec::new("sh", ["-c", command])
    }
}

/// Run `shell_command` on `destination` (`user@host`) via the remote transport.
pub fn remote_command(destination: &str, shell_command: &str) -> CommandSpec {
    CommandSpec::new(REMOTE_EXEC_PROGRAM, [destination, shell_command])
}

/// Remote pipeline that prints only the lines mentioning `process_match`.
///
/// The trailing `grep -v grep` drops the filter itself from the listing.
pub fn remote_process_filter(process_match: &str) -> String {
    format!("ps aux | grep {} | grep -v grep", process_match)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_command_shape() {
        let spec = remote_command("sdc@scanner", &remote_process_filter("external_server.py"));
        assert_eq!(spec.program, "ssh");
        assert_eq!(
            spec.args,
            vec![
                "sdc@scanner".to_string(),
                "ps aux | grep external_server.py | grep -v grep".to_string()
            ]
        );
    }

    #[test]
    fn test_display_quotes_arguments_with_spaces() {
        let spec = remote_command("sdc@scanner", "python server.py");
        assert_eq!(spec.to_string(), "ssh sdc@scanner \"python server.py\"");
    }

    #[cfg(not(windows))]
    #[test]
    fn test_unix_commands() {
        assert_eq!(process_list_command(), CommandSpec::new("ps", ["aux"]));
        assert_eq!(shell_command("true"), CommandSpec::new("sh", ["-c", "true"]));
    }
}
