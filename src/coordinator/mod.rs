//! HTTP rendezvous barrier
//!
//! This module provides a coordinator that lines up independent remote
//! clients: it waits until an external readiness command succeeds, admits up
//! to `quota` clients, collects their completions and then exits the process.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                 Coordinator                   │
//! │                                               │
//! │  /gotime/start ──▶ ReadinessProbe (INIT only) │
//! │        │                                      │
//! │        ▼                                      │
//! │     Barrier  { phase, running, finished }     │
//! │        ▲                                      │
//! │        │                                      │
//! │  /gotime/finish ──▶ ShutdownSequencer         │
//! │                      (flush, close, exit)     │
//! │                                               │
//! │  anything else ──▶ file fallback              │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use gotime::coordinator::{CoordinatorConfig, CoordinatorServer};
//!
//! let config = CoordinatorConfig::builder()
//!     .quota(3)
//!     .readiness_command(["test", "-f", "/tmp/ready"])
//!     .build()?;
//! let server = CoordinatorServer::new(config)?;
//! server.start().await?;
//! ```

pub mod api;
pub mod barrier;
pub mod client;
pub mod config;
pub mod probe;
pub mod server;
pub mod shutdown;
pub mod transport;

// Re-export main types
pub use barrier::{Admission, Barrier, BarrierSnapshot, BarrierState, Completion, Phase};
pub use client::{BarrierClient, ClientConfig, ClientError, FinishReply, StartReply};
pub use config::CoordinatorConfig;
pub use probe::{CommandProbe, ReadinessProbe};
pub use server::{CoordinatorServer, ServerError};
pub use shutdown::{HardExit, ProcessExit, ShutdownSequencer};
pub use transport::{ConnectionHandle, GateListener};
