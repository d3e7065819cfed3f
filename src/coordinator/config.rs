//! Coordinator configuration

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default listening port of the coordinator
pub const DEFAULT_PORT: u16 = 9090;

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT))
}

/// Configuration for the barrier coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Server bind address
    pub bind_address: SocketAddr,

    /// Number of completions after which the process exits (0 = never)
    pub quota: u64,

    /// Log every admission and completion decision
    pub verbose: bool,

    /// Readiness command: program followed by its arguments
    pub readiness_command: Vec<String>,

    /// Upper bound on a single readiness probe run
    pub probe_timeout_secs: Option<u64>,

    /// Directory served for paths the barrier does not own
    pub document_root: Option<PathBuf>,

    /// Enable request logging
    pub enable_request_logging: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            quota: 0,
            verbose: false,
            readiness_command: Vec::new(),
            probe_timeout_secs: None,
            document_root: None,
            enable_request_logging: false,
        }
    }
}

impl CoordinatorConfig {
    /// Create a new config builder
    pub fn builder() -> CoordinatorConfigBuilder {
        CoordinatorConfigBuilder::default()
    }

    /// Load a configuration from a TOML file
    ///
    /// Missing keys fall back to their defaults. The result is not validated,
    /// since command-line flags usually complete it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::FileError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.readiness_command.first() {
            None => {
                return Err(ConfigError::MissingField {
                    field: "readiness_command".to_string(),
                });
            }
            Some(program) if program.trim().is_empty() => {
                return Err(ConfigError::InvalidValue {
                    field: "readiness_command".to_string(),
                    reason: "Program name must not be empty".to_string(),
                });
            }
            Some(_) => {}
        }

        if self.probe_timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "probe_timeout_secs".to_string(),
                reason: "Timeout must be at least 1 second".to_string(),
            });
        }

        if let Some(root) = &self.document_root {
            if !root.is_dir() {
                return Err(ConfigError::InvalidValue {
                    field: "document_root".to_string(),
                    reason: format!("Not a directory: {}", root.display()),
                });
            }
        }

        Ok(())
    }

    /// Readiness probe timeout, if any
    pub fn probe_timeout(&self) -> Option<Duration> {
        self.probe_timeout_secs.map(Duration::from_secs)
    }

    /// Whether the coordinator ever terminates on its own
    pub fn is_bounded(&self) -> bool {
        self.quota > 0
    }
}

/// Builder for CoordinatorConfig
#[derive(Debug, Default)]
pub struct CoordinatorConfigBuilder {
    bind_address: Option<SocketAddr>,
    quota: Option<u64>,
    verbose: Option<bool>,
    readiness_command: Vec<String>,
    probe_timeout_secs: Option<u64>,
    document_root: Option<PathBuf>,
    enable_request_logging: Option<bool>,
}

impl CoordinatorConfigBuilder {
    /// Start from an existing configuration, e.g. one loaded from a file
    pub fn from_config(config: CoordinatorConfig) -> Self {
        Self {
            bind_address: Some(config.bind_address),
            quota: Some(config.quota),
            verbose: Some(config.verbose),
            readiness_command: config.readiness_command,
            probe_timeout_secs: config.probe_timeout_secs,
            document_root: config.document_root,
            enable_request_logging: Some(config.enable_request_logging),
        }
    }

    /// Set bind address
    pub fn bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = Some(addr);
        self
    }

    /// Set bind address from string
    pub fn bind_address_str(mut self, addr: &str) -> Result<Self, ConfigError> {
        self.bind_address = Some(addr.parse().map_err(|_| ConfigError::InvalidValue {
            field: "bind_address".to_string(),
            reason: format!("Invalid address: {}", addr),
        })?);
        Ok(self)
    }

    /// Listen on all interfaces at the given port
    pub fn port(mut self, port: u16) -> Self {
        let mut addr = self.bind_address.unwrap_or_else(default_bind_address);
        addr.set_port(port);
        self.bind_address = Some(addr);
        self
    }

    /// Set completion quota
    pub fn quota(mut self, quota: u64) -> Self {
        self.quota = Some(quota);
        self
    }

    /// Enable/disable verbose decision logging
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = Some(verbose);
        self
    }

    /// Set readiness command (program followed by arguments)
    pub fn readiness_command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.readiness_command = command.into_iter().map(Into::into).collect();
        self
    }

    /// Set readiness probe timeout
    pub fn probe_timeout_secs(mut self, secs: u64) -> Self {
        self.probe_timeout_secs = Some(secs);
        self
    }

    /// Set document root for the file fallback
    pub fn document_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.document_root = Some(root.into());
        self
    }

    /// Enable/disable request logging
    pub fn enable_request_logging(mut self, enable: bool) -> Self {
        self.enable_request_logging = Some(enable);
        self
    }

    /// Build the config
    pub fn build(self) -> Result<CoordinatorConfig, ConfigError> {
        let config = CoordinatorConfig {
            bind_address: self.bind_address.unwrap_or_else(default_bind_address),
            quota: self.quota.unwrap_or(0),
            verbose: self.verbose.unwrap_or(false),
            readiness_command: self.readiness_command,
            probe_timeout_secs: self.probe_timeout_secs,
            document_root: self.document_root,
            enable_request_logging: self.enable_request_logging.unwrap_or(false),
        };

        config.validate()?;
        Ok(config)
    }
}

/// Configuration errors
#[derive(Debug, Clone)]
pub enum ConfigError {
    InvalidValue { field: String, reason: String },
    MissingField { field: String },
    FileError { path: String, reason: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid value for '{}': {}", field, reason)
            }
            Self::MissingField { field } => {
                write!(f, "Missing required field: {}", field)
            }
            Self::FileError { path, reason } => {
                write!(f, "Failed to load config '{}': {}", path, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
