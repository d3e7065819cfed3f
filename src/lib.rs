//! gotime - HTTP rendezvous barrier for distributed load tests
//!
//! Starts a group of remote clients at the same moment and waits for all of
//! them to finish.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`coordinator`] - The barrier server, its readiness probe and client
//! - [`stress`] - Syslog load generator run by the clients
//! - [`stats`] - Percentile report over collected timings
//! - [`utils`] - Retry helpers
//! - [`error`] - Unified error type
//!
//! # Example
//!
//! ```no_run
//! use gotime::coordinator::{CoordinatorConfig, CoordinatorServer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = CoordinatorConfig::builder()
//!         .quota(3)
//!         .readiness_command(["test", "-f", "/tmp/gotime"])
//!         .build()?;
//!     CoordinatorServer::new(config)?.start().await?;
//!     Ok(())
//! }
//! ```

pub mod coordinator;
pub mod error;
pub mod stats;
pub mod stress;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::coordinator::{
        Admission, BarrierClient, ClientConfig, Completion, CoordinatorConfig, CoordinatorServer,
        Phase,
    };
    pub use crate::error::{Error, Result};
    pub use crate::stress::{StressConfig, SyslogStress};
}

pub use error::{Error, Result};
