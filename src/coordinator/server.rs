//! Coordinator server implementation
//!
//! This module wires the barrier, the readiness probe and the shutdown
//! sequencer into an axum server listening on tracked connections.

use std::net::SocketAddr;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Instant;

use axum::serve::Listener;
use axum::Router;
use tower_http::trace::TraceLayer;

use super::api::create_router;
use super::barrier::Barrier;
use super::config::CoordinatorConfig;
use super::probe::{CommandProbe, ReadinessProbe};
use super::shutdown::{HardExit, ProcessExit, ShutdownSequencer};
use super::transport::{ConnectionHandle, GateListener};

// ============================================================================
// App State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Barrier state machine
    pub barrier: Barrier,

    /// Exit sequencing for the final completion
    pub sequencer: Arc<ShutdownSequencer>,

    /// Requests handled by the barrier endpoints
    pub requests: Arc<AtomicU64>,

    /// Server start time
    pub start_time: Instant,

    /// Configuration
    pub config: CoordinatorConfig,
}

// ============================================================================
// Coordinator Server
// ============================================================================

/// Barrier coordinator server
pub struct CoordinatorServer {
    config: CoordinatorConfig,
    state: AppState,
}

impl CoordinatorServer {
    /// Create a coordinator probing the configured command, exiting the
    /// process when the quota is reached
    pub fn new(config: CoordinatorConfig) -> Result<Self, ServerError> {
        config.validate().map_err(|e| ServerError::ConfigError(e.to_string()))?;

        let probe = CommandProbe::from_command_line(&config.readiness_command)
            .ok_or_else(|| ServerError::ConfigError("readiness command is empty".to_string()))?
            .with_timeout(config.probe_timeout())
            .with_verbose(config.verbose);

        Self::with_parts(config, Arc::new(probe), Arc::new(HardExit))
    }

    /// Create a coordinator with an explicit probe and exit primitive
    pub fn with_parts(
        config: CoordinatorConfig,
        probe: Arc<dyn ReadinessProbe>,
        exit: Arc<dyn ProcessExit>,
    ) -> Result<Self, ServerError> {
        config.validate().map_err(|e| ServerError::ConfigError(e.to_string()))?;

        let state = AppState {
            barrier: Barrier::new(config.quota, probe),
            sequencer: Arc::new(ShutdownSequencer::new(exit)),
            requests: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
            config: config.clone(),
        };

        Ok(Self { config, state })
    }

    /// Get the application state
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let mut router = create_router(self.state.clone());

        if self.config.enable_request_logging {
            router = router.layer(TraceLayer::new_for_http());
        }

        router
    }

    /// Bind the configured address
    pub async fn bind(&self) -> Result<GateListener, ServerError> {
        GateListener::bind(self.config.bind_address, self.state.sequencer.clone())
            .await
            .map_err(|e| ServerError::BindError(format!("{}: {}", self.config.bind_address, e)))
    }

    /// Serve on an already bound listener until the process exits
    pub async fn serve(&self, listener: GateListener) -> Result<(), ServerError> {
        let router = self.build_router();
        let addr = listener
            .local_addr()
            .map_err(|e| ServerError::BindError(e.to_string()))?;

        tracing::info!("Listening on port {}", addr.port());
        if self.config.is_bounded() {
            tracing::info!("Blocking until receiving {} completions.", self.config.quota);
        } else {
            tracing::info!("Blocking forever.");
        }

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<ConnectionHandle>(),
        )
        .await
        .map_err(|e| ServerError::ServeError(e.to_string()))?;

        Ok(())
    }

    /// Bind and serve
    pub async fn start(&self) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Get server info
    pub fn info(&self) -> ServerInfo {
        ServerInfo {
            bind_address: self.config.bind_address,
            quota: self.config.quota,
            readiness_command: self.config.readiness_command.join(" "),
            document_root: self
                .config
                .document_root
                .as_ref()
                .map(|p| p.display().to_string()),
            verbose: self.config.verbose,
        }
    }
}

/// Server information
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub bind_address: SocketAddr,
    pub quota: u64,
    pub readiness_command: String,
    pub document_root: Option<String>,
    pub verbose: bool,
}

impl ServerInfo {
    /// Format as display string
    pub fn display(&self) -> String {
        format!(
            "gotime coordinator\n\
             {:-<40}\n\
             Bind Address: {}\n\
             Quota: {}\n\
             Readiness Command: {}\n\
             Document Root: {}\n\
             Verbose: {}",
            "",
            self.bind_address,
            if self.quota == 0 {
                "unlimited".to_string()
            } else {
                self.quota.to_string()
            },
            self.readiness_command,
            self.document_root.as_deref().unwrap_or("none"),
            if self.verbose { "enabled" } else { "disabled" }
        )
    }
}

// ============================================================================
// Server Errors
// ============================================================================

/// Server errors
#[derive(Debug, Clone)]
pub enum ServerError {
    /// Configuration error
    ConfigError(String),

    /// Failed to bind to address
    BindError(String),

    /// Server error
    ServeError(String),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            Self::BindError(msg) => write!(f, "Failed to bind: {}", msg),
            Self::ServeError(msg) => write!(f, "Server error: {}", msg),
        }
    }
}

impl std::error::Error for ServerError {}

// ============================================================================
// Tests
// ============================================================================
