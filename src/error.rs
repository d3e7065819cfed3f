//! Unified error handling for the gotime crate
//!
//! Each module keeps its own error type; [`Error`] wraps them so callers
//! crossing module boundaries can use a single `Result`.
//!
//! Barrier refusals (`NOGO`, `KO`) are protocol answers, not errors, and
//! never show up here.

use thiserror::Error;

pub use crate::coordinator::client::ClientError;
pub use crate::coordinator::config::ConfigError;
pub use crate::coordinator::server::ServerError;
pub use crate::stats::StatsError;
pub use crate::stress::StressError;

/// Unified error type for the gotime crate
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or unreadable configuration
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Coordinator failed to start or serve
    #[error("Server error: {0}")]
    Server(#[from] ServerError),

    /// Barrier client failure
    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    /// Percentile computation failure
    #[error("Stats error: {0}")]
    Stats(#[from] StatsError),

    /// Syslog stress failure
    #[error("Stress error: {0}")]
    Stress(#[from] StressError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether retrying the same operation later can succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Client(ClientError::NetworkError(_)) => true,
            Self::Client(ClientError::GaveUp { .. }) => true,
            Self::Stress(StressError::NoSyslog { .. }) => true,
            Self::Io(_) => true,
            _ => false,
        }
    }
}

/// Result type alias using the unified Error
pub type Result<T> = std::result::Result<T, Error>;
