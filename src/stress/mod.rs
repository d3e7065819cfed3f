//! Syslog load generation
//!
//! Floods the local syslog daemon with random `tag: payload` messages at a
//! fixed pace. Usually run on every barrier client between `GO` and the
//! completion report.

pub mod generator;
pub mod syslog;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub use generator::PayloadGenerator;
pub use syslog::{MessageSink, SyslogSink, SYSLOG_PATHS};

/// Default payload length in bytes
pub const DEFAULT_LENGTH: usize = 256;

/// Default tag prefixed to every message
pub const DEFAULT_TAG: &str = "slstress";

/// Stress generator errors
#[derive(Error, Debug)]
pub enum StressError {
    /// None of the syslog sockets accepted a connection
    #[error("Unix syslog delivery error: no socket reachable among {}", .tried.join(", "))]
    NoSyslog { tried: Vec<String> },

    /// Writing to the socket failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stress run parameters
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// RNG seed
    pub seed: u64,

    /// Payload length (excluding the tag)
    pub length: usize,

    /// Generate words instead of arbitrary characters
    pub words: bool,

    /// Tag prefixed to every message
    pub tag: String,

    /// Pause between two messages
    pub delay: Duration,

    /// Stop after this many messages
    pub limit: Option<u64>,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            length: DEFAULT_LENGTH,
            words: false,
            tag: DEFAULT_TAG.to_string(),
            delay: Duration::from_secs(1),
            limit: None,
        }
    }
}

/// Counters reported on demand and at exit
#[derive(Debug)]
pub struct StressStats {
    sent: AtomicU64,
    length: usize,
    delay: Duration,
}

impl StressStats {
    fn new(length: usize, delay: Duration) -> Self {
        Self {
            sent: AtomicU64::new(0),
            length,
            delay,
        }
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// Format as display string
    pub fn display(&self) -> String {
        format!(
            "Messages sent: {}\n\
             String length: {}\n\
             Delay (usecs): {}",
            self.sent(),
            self.length,
            self.delay.as_micros()
        )
    }
}

/// Message pump from a [`PayloadGenerator`] into a [`MessageSink`]
pub struct SyslogStress {
    config: StressConfig,
    generator: PayloadGenerator,
    stats: Arc<StressStats>,
}

impl SyslogStress {
    pub fn new(config: StressConfig) -> Self {
        let generator = PayloadGenerator::new(config.seed, config.words);
        let stats = Arc::new(StressStats::new(config.length, config.delay));
        Self {
            config,
            generator,
            stats,
        }
    }

    /// Shared counters, readable while the pump runs
    pub fn stats(&self) -> Arc<StressStats> {
        self.stats.clone()
    }

    /// Build the next message
    pub fn next_message(&mut self) -> String {
        format!(
            "{}: {}",
            self.config.tag,
            self.generator.generate(self.config.length)
        )
    }

    /// Send messages until the limit is reached or a write fails
    pub async fn run<S: MessageSink>(mut self, mut sink: S) -> Result<(), StressError> {
        loop {
            if let Some(limit) = self.config.limit {
                if self.stats.sent() >= limit {
                    return Ok(());
                }
            }

            let message = self.next_message();
            sink.send(message.as_bytes()).await?;
            self.stats.sent.fetch_add(1, Ordering::Relaxed);

            if !self.config.delay.is_zero() {
                tokio::time::sleep(self.config.delay).await;
            }
        }
    }
}
