//! Relay configuration.
//!
//! A single `RelayConfig` is built once at start-up and handed by reference to
//! every component. Values come from built-in defaults, optionally overridden
//! by an INI file whose location can be set with `PULSECLIENT_CONFIG`.
//!
//! ```ini
//! [settings]
//! SERVER_IP = 192.168.1.100
//! SERVER_PORT = 5000
//! CHECK_INTERVAL = 2
//! ```
//!
//! Keys are case-insensitive and unknown keys are ignored. Values are taken
//! verbatim (no quote or escape processing); only the port and the interval
//! must parse as integers. A bad host surfaces when the socket layer rejects
//! it.

use crate::error::{RelayError, Result};
use ini::{Ini, ParseOption, Properties};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV_VAR: &str = "PULSECLIENT_CONFIG";

/// File name looked up in the home directory when the variable is unset.
pub const DEFAULT_CONFIG_FILE_NAME: &str = ".pulseclient.ini";

/// Section holding every relay key.
pub const SETTINGS_SECTION: &str = "settings";

/// Transfer tuning.
pub struct TransferConfig;

impl TransferConfig {
    /// Read/write granularity for socket and file loops. Not part of the wire
    /// contract; any size is compatible with the counterpart server.
    pub const CHUNK_SIZE: usize = 1024;
    /// Prefix the bundled echo server puts in front of every reply.
    pub const ECHO_RESPONSE_PREFIX: &'static [u8] = b"Server response data: ";
}

/// Where the companion server runs and therefore how it is probed/started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Local,
    Remote,
}

/// Which pair of input/output paths from the configuration to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathMode {
    #[default]
    Simulation,
    Production,
}

/// TCP destination of a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Only the literal loopback spellings count as local.
    pub fn is_local(&self) -> bool {
        self.host == "127.0.0.1" || self.host == "localhost"
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// The companion server process: how to find it and how to start it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerTarget {
    pub mode: ExecutionMode,
    /// Remote login; ignored in local mode.
    pub remote_user: String,
    /// Remote host; ignored in local mode.
    pub remote_host: String,
    /// Shell command that starts the server.
    pub start_command: String,
    /// Literal substring identifying the server in a process listing.
    pub process_match: String,
}

impl ServerTarget {
    pub fn local(start_command: impl Into<String>, process_match: impl Into<String>) -> Self {
        Self {
            mode: ExecutionMode::Local,
            remote_user: String::new(),
            remote_host: String::new(),
            start_command: start_command.into(),
            process_match: process_match.into(),
        }
    }

    pub fn remote(
        user: impl Into<String>,
        host: impl Into<String>,
        start_command: impl Into<String>,
        process_match: impl Into<String>,
    ) -> Self {
        Self {
            mode: ExecutionMode::Remote,
            remote_user: user.into(),
            remote_host: host.into(),
            start_command: start_command.into(),
            process_match: process_match.into(),
        }
    }

    /// `user@host` destination for the remote-execution transport.
    pub fn remote_destination(&self) -> String {
        format!("{}@{}", self.remote_user, self.remote_host)
    }
}

/// Full relay configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub server_ip: String,
    pub server_port: u16,
    /// Sampling/poll interval in whole seconds.
    pub check_interval: u64,
    pub remote_server_user: String,
    pub remote_server_host: String,
    pub server_command: String,
    pub server_process_name: String,
    pub file_path_simulation: PathBuf,
    pub file_path_production: PathBuf,
    pub output_path_simulation: PathBuf,
    pub output_path_production: PathBuf,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            server_ip: "127.0.0.1".to_string(),
            server_port: 5000,
            check_interval: 2,
            remote_server_user: "sdc".to_string(),
            remote_server_host: "remote-machine-name".to_string(),
            server_command: "python /srv/nfs/psd/usr/psd/pulseq/v7/bin/external_server.py"
                .to_string(),
            server_process_name: "external_server.py".to_string(),
            file_path_simulation: PathBuf::from("params.dat"),
            file_path_production: PathBuf::from("/srv/nfs/psd/usr/psd/pulseq/v7/temp/params.dat"),
            output_path_simulation: PathBuf::from("sequence.bin"),
            output_path_production: PathBuf::from(
                "/srv/nfs/psd/usr/psd/pulseq/v7/temp/sequence.bin",
            ),
        }
    }
}

impl RelayConfig {
    /// Resolve the configuration file location.
    ///
    /// `PULSECLIENT_CONFIG` wins; otherwise `~/.pulseclient.ini`.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return PathBuf::from(path);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DEFAULT_CONFIG_FILE_NAME)
    }

    /// Load from the default location, falling back to built-in values.
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_path())
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!(
                "No config file found at {}. Using default values.",
                path.display()
            );
            return Ok(Self::default());
        }

        info!("Loading configuration from: {}", path.display());
        let contents =
            std::fs::read_to_string(path).map_err(|e| RelayError::io_with_path(e, path))?;
        Self::from_ini_str(&contents).map_err(|e| RelayError::Config {
            message: format!("{}: {}", path.display(), e),
        })
    }

    /// Parse INI text and overlay its `[settings]` section on the defaults.
    pub fn from_ini_str(contents: &str) -> Result<Self> {
        let options = ParseOption {
            enabled_quote: false,
            enabled_escape: false,
            ..ParseOption::default()
        };
        let file = Ini::load_from_str_opt(contents, options)?;
        let mut config = Self::default();
        match file.section(Some(SETTINGS_SECTION)) {
            Some(settings) => config.apply(settings)?,
            None => debug!("Config file has no [settings] section; keeping defaults"),
        }
        Ok(config)
    }

    fn apply(&mut self, settings: &Properties) -> Result<()> {
        for (key, value) in settings.iter() {
            let value = value.trim();
            match key.to_ascii_lowercase().as_str() {
                "server_ip" => self.server_ip = value.to_string(),
                "server_port" => self.server_port = parse_number(key, value)?,
                "check_interval" => self.check_interval = parse_number(key, value)?,
                "remote_server_user" => self.remote_server_user = value.to_string(),
                "remote_server_host" => self.remote_server_host = value.to_string(),
                "server_command" => self.server_command = value.to_string(),
                "server_process_name" => self.server_process_name = value.to_string(),
                "file_path_simulation" => self.file_path_simulation = PathBuf::from(value),
                "file_path_production" => self.file_path_production = PathBuf::from(value),
                "output_path_simulation" => self.output_path_simulation = PathBuf::from(value),
                "output_path_production" => self.output_path_production = PathBuf::from(value),
                _ => warn!("Ignoring unknown config key: {}", key),
            }
        }
        Ok(())
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.server_ip.clone(), self.server_port)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval)
    }

    /// Derive the server target; local iff the endpoint is loopback.
    pub fn server_target(&self) -> ServerTarget {
        let mode = if self.endpoint().is_local() {
            ExecutionMode::Local
        } else {
            ExecutionMode::Remote
        };
        ServerTarget {
            mode,
            remote_user: self.remote_server_user.clone(),
            remote_host: self.remote_server_host.clone(),
            start_command: self.server_command.clone(),
            process_match: self.server_process_name.clone(),
        }
    }

    /// `(input, output)` paths for the given mode.
    pub fn paths(&self, mode: PathMode) -> (&Path, &Path) {
        match mode {
            PathMode::Simulation => (&self.file_path_simulation, &self.output_path_simulation),
            PathMode::Production => (&self.file_path_production, &self.output_path_production),
        }
    }
}

fn parse_number<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    value.parse().map_err(|e| RelayError::Config {
        message: format!("{} = {:?}: {}", key, value, e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.endpoint(), Endpoint::new("127.0.0.1", 5000));
        assert_eq!(config.check_interval(), Duration::from_secs(2));
        assert_eq!(config.server_target().mode, ExecutionMode::Local);
    }

    #[test]
    fn test_upper_case_keys_override_defaults() {
        let config =
            RelayConfig::from_ini_str("[settings]\nSERVER_IP = 192.168.1.100\nSERVER_PORT = 12345\n")
                .unwrap();
        assert_eq!(config.server_ip, "192.168.1.100");
        assert_eq!(config.server_port, 12345);
        // Untouched keys keep their defaults
        assert_eq!(config.server_process_name, "external_server.py");
    }

    #[test]
    fn test_existing_deployment_file() {
        let contents = "\
[settings]
SERVER_IP = 10.0.0.5
SERVER_PORT = 5000
CHECK_INTERVAL = 1
REMOTE_SERVER_USER = sdc
REMOTE_SERVER_HOST = scanner
SERVER_COMMAND = python /srv/nfs/psd/usr/psd/pulseq/v7/bin/external_server.py --port 5000
SERVER_PROCESS_NAME = external_server.py
file_path_simulation = params.dat
file_path_production = /srv/nfs/psd/usr/psd/pulseq/v7/temp/params.dat
output_path_simulation = sequence.bin
output_path_production = /srv/nfs/psd/usr/psd/pulseq/v7/temp/sequence.bin
";
        let config = RelayConfig::from_ini_str(contents).unwrap();

        assert_eq!(config.endpoint(), Endpoint::new("10.0.0.5", 5000));
        assert_eq!(config.check_interval(), Duration::from_secs(1));
        assert_eq!(
            config.server_command,
            "python /srv/nfs/psd/usr/psd/pulseq/v7/bin/external_server.py --port 5000"
        );
        let target = config.server_target();
        assert_eq!(target.mode, ExecutionMode::Remote);
        assert_eq!(target.remote_destination(), "sdc@scanner");
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let config = RelayConfig::from_ini_str(
            "[settings]\ncheck_interval = 0\nFile_Path_Simulation = in.dat\n",
        )
        .unwrap();
        assert_eq!(config.check_interval(), Duration::ZERO);
        assert_eq!(config.paths(PathMode::Simulation).0, Path::new("in.dat"));
    }

    #[test]
    fn test_colon_separator_and_windows_path() {
        let config =
            RelayConfig::from_ini_str("[settings]\nfile_path_simulation: C:\\data\\params.dat\n")
                .unwrap();
        assert_eq!(
            config.file_path_simulation,
            PathBuf::from("C:\\data\\params.dat")
        );
    }

    #[test]
    fn test_missing_settings_section_keeps_defaults() {
        let config = RelayConfig::from_ini_str("[other]\nkey = 1\n").unwrap();
        assert_eq!(config, RelayConfig::default());
    }

    #[test]
    fn test_non_numeric_port_is_config_error() {
        let err = RelayConfig::from_ini_str("[settings]\nSERVER_PORT = five\n").unwrap_err();
        assert!(matches!(err, RelayError::Config { .. }));
    }

    #[test]
    fn test_load_from_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = RelayConfig::load_from(temp_dir.path().join("absent.ini")).unwrap();
        assert_eq!(config, RelayConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("pulseclient.ini");
        std::fs::write(&path, "[settings]\nREMOTE_SERVER_HOST = scanner\nSERVER_IP = 10.0.0.5\n")
            .unwrap();

        let config = RelayConfig::load_from(&path).unwrap();
        let target = config.server_target();
        assert_eq!(target.mode, ExecutionMode::Remote);
        assert_eq!(target.remote_destination(), "sdc@scanner");
    }

    #[test]
    fn test_default_file_name() {
        assert_eq!(DEFAULT_CONFIG_FILE_NAME, ".pulseclient.ini");
    }

    #[test]
    fn test_localhost_is_local() {
        assert!(Endpoint::new("localhost", 1).is_local());
        assert!(!Endpoint::new("127.0.0.2", 1).is_local());
        assert_eq!(Endpoint::new("10.0.0.1", 5000).to_string(), "10.0.0.1:5000");
    }

    #[test]
    fn test_production_paths() {
        let config = RelayConfig::default();
        let (input, output) = config.paths(PathMode::Production);
        assert!(input.ends_with("params.dat"));
        assert!(output.ends_with("sequence.bin"));
    }
}
