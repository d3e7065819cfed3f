//! Quorum-triggered process termination
//!
//! When the last expected client reports completion, the coordinator has to
//! exit. Exiting straight from the handler would race the response write, so
//! the handler only marks its connection; the connection's transport
//! ([`super::transport::TrackedStream`]) reports back here once the response
//! has been flushed and the socket shut down, and only then is the process
//! terminated. The server is never drained gracefully since other
//! clients may hold keep-alive connections open indefinitely.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::transport::ConnectionHandle;

/// Process-exit primitive
pub trait ProcessExit: Send + Sync + 'static {
    fn exit(&self, code: i32);
}

/// Terminates the process immediately
#[derive(Debug, Clone, Copy, Default)]
pub struct HardExit;

impl ProcessExit for HardExit {
    fn exit(&self, code: i32) {
        std::process::exit(code)
    }
}

/// Sequences the final response and the process exit
pub struct ShutdownSequencer {
    exit: Arc<dyn ProcessExit>,
    triggered: AtomicBool,
}

impl ShutdownSequencer {
    pub fn new(exit: Arc<dyn ProcessExit>) -> Self {
        Self {
            exit,
            triggered: AtomicBool::new(false),
        }
    }

    /// Whether the final completion has been seen
    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Arrange for the process to exit after `connection` closes
    ///
    /// Without a tracked connection (the router driven in-process) there is
    /// nothing to wait for and the exit happens right away.
    pub fn trigger(&self, connection: Option<&ConnectionHandle>) {
        if self.triggered.swap(true, Ordering::SeqCst) {
            return;
        }

        match connection {
            Some(handle) => {
                tracing::debug!(peer = %handle.peer(), "Exit scheduled after final response");
                handle.close_then_exit();
            }
            None => {
                tracing::warn!("Final response is not on a tracked connection, exiting now");
                self.exit.exit(0);
            }
        }
    }

    /// The triggering connection flushed its response and shut down
    pub(crate) fn connection_closed(&self, peer: SocketAddr) {
        tracing::info!(peer = %peer, "Shutting down");
        self.exit.exit(0);
    }

    /// The triggering connection could not be closed cleanly
    pub(crate) fn connection_failed(&self, peer: SocketAddr, reason: &str) {
        tracing::error!(peer = %peer, "error while shutting down: {}", reason);
        self.exit.exit(1);
    }
}
