//! Readiness probe
//!
//! The barrier stays in `INIT` until an external command exits with status 0.
//! A probe runs the command exactly once per call; retrying is left to the
//! clients, which keep polling `/gotime/start`.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Something that can tell whether the system under test is ready
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    /// Run the check once; failures are reported as `false`, never escalated
    async fn check(&self) -> bool;
}

/// Probe backed by an external command
#[derive(Debug, Clone)]
pub struct CommandProbe {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
    verbose: bool,
}

impl CommandProbe {
    /// Create a probe for `program` with `args`
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: None,
            verbose: false,
        }
    }

    /// Build a probe from a `[program, args...]` vector
    pub fn from_command_line(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self::new(program.clone(), args.to_vec()))
    }

    /// Kill the command if it runs longer than `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Log failed probes
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

#[async_trait]
impl ReadinessProbe for CommandProbe {
    async fn check(&self) -> bool {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let status = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, command.status()).await {
                Ok(status) => status,
                Err(_) => {
                    if self.verbose {
                        tracing::info!(
                            program = %self.program,
                            timeout_secs = limit.as_secs(),
                            "`{}' timed out",
                            self.program
                        );
                    }
                    return false;
                }
            },
            None => command.status().await,
        };

        match status {
            Ok(status) if status.success() => true,
            Ok(status) => {
                if self.verbose {
                    tracing::info!(program = %self.program, status = %status, "`{}' failed", self.program);
                }
                false
            }
            Err(e) => {
                if self.verbose {
                    tracing::info!(program = %self.program, error = %e, "`{}' could not be run", self.program);
                }
                false
            }
        }
    }
}
