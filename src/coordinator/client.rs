//! Barrier client
//!
//! Clients poll `/gotime/start` until they get `GO`, do their work, then
//! report to `/gotime/finish`. The coordinator never queues anybody, so the
//! polling loop lives here.

use reqwest::Client;
use std::time::Duration;
use url::Url;

use crate::utils::retry::{with_retry_if, RetryConfig};

use super::api::{FINISH_PATH, START_PATH};

// ============================================================================
// Client Configuration
// ============================================================================

/// Configuration for the barrier client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Coordinator base URL
    pub coordinator_url: String,

    /// Request timeout
    pub timeout: Duration,

    /// Backoff for transport failures
    pub retry: RetryConfig,

    /// Delay between two start polls after a `NOGO`
    pub poll_interval: Duration,

    /// Give up after this many `NOGO` answers (0 = never)
    pub max_polls: u32,
}

impl ClientConfig {
    /// Create a new client config
    pub fn new(coordinator_url: impl Into<String>) -> Self {
        Self {
            coordinator_url: coordinator_url.into(),
            timeout: Duration::from_secs(10),
            retry: RetryConfig::with_delays(3, 500, 5_000),
            poll_interval: Duration::from_secs(1),
            max_polls: 0,
        }
    }

    /// Set timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set transport retry policy
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set start polling interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the maximum number of start polls
    pub fn with_max_polls(mut self, max_polls: u32) -> Self {
        self.max_polls = max_polls;
        self
    }
}

// ============================================================================
// Replies
// ============================================================================

/// Answer to a start request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartReply {
    Go,
    NoGo,
}

/// Answer to a finish request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReply {
    Ok,
    Ko,
}

impl StartReply {
    fn parse(body: &str) -> Result<Self, ClientError> {
        match body.trim() {
            "GO" => Ok(Self::Go),
            "NOGO" => Ok(Self::NoGo),
            other => Err(ClientError::InvalidResponse(other.to_string())),
        }
    }
}

impl FinishReply {
    fn parse(body: &str) -> Result<Self, ClientError> {
        match body.trim() {
            "OK" => Ok(Self::Ok),
            "KO" => Ok(Self::Ko),
            other => Err(ClientError::InvalidResponse(other.to_string())),
        }
    }
}

// ============================================================================
// Barrier Client
// ============================================================================

/// Client for the barrier endpoints
pub struct BarrierClient {
    config: ClientConfig,
    http_client: Client,
    start_url: Url,
    finish_url: Url,
}

impl BarrierClient {
    /// Create a new barrier client
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let base = Url::parse(&config.coordinator_url)
            .map_err(|e| ClientError::InitError(format!("{}: {}", config.coordinator_url, e)))?;
        let start_url = base
            .join(START_PATH)
            .map_err(|e| ClientError::InitError(e.to_string()))?;
        let finish_url = base
            .join(FINISH_PATH)
            .map_err(|e| ClientError::InitError(e.to_string()))?;

        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::InitError(e.to_string()))?;

        Ok(Self {
            config,
            http_client,
            start_url,
            finish_url,
        })
    }

    /// Ask once for permission to start
    pub async fn start(&self) -> Result<StartReply, ClientError> {
        let body = self.fetch(&self.start_url).await?;
        StartReply::parse(&body)
    }

    /// Poll until the coordinator answers `GO`
    ///
    /// Returns the number of polls it took.
    pub async fn wait_for_go(&self) -> Result<u32, ClientError> {
        let mut polls = 0;

        loop {
            polls += 1;
            match self.start().await? {
                StartReply::Go => {
                    tracing::debug!(polls = polls, "Admitted by coordinator");
                    return Ok(polls);
                }
                StartReply::NoGo => {
                    if self.config.max_polls > 0 && polls >= self.config.max_polls {
                        return Err(ClientError::GaveUp { polls });
                    }
                    tracing::debug!(polls = polls, "Coordinator answered NOGO, polling again");
                    tokio::time::sleep(self.config.poll_interval).await;
                }
            }
        }
    }

    /// Report completion
    pub async fn finish(&self) -> Result<FinishReply, ClientError> {
        let body = self.fetch(&self.finish_url).await?;
        FinishReply::parse(&body)
    }

    // Internal: GET with backoff on transport errors only
    async fn fetch(&self, url: &Url) -> Result<String, ClientError> {
        with_retry_if(
            &self.config.retry,
            || async {
                let response = self
                    .http_client
                    .get(url.clone())
                    .send()
                    .await
                    .map_err(|e| ClientError::NetworkError(e.to_string()))?;

                let status = response.status();
                if !status.is_success() {
                    return Err(ClientError::HttpError {
                        status: status.as_u16(),
                        message: response.text().await.unwrap_or_default(),
                    });
                }

                response
                    .text()
                    .await
                    .map_err(|e| ClientError::NetworkError(e.to_string()))
            },
            |e| matches!(e, ClientError::NetworkError(_)),
        )
        .await
    }
}

// ============================================================================
// Client Errors
// ============================================================================

/// Client errors
#[derive(Debug, Clone)]
pub enum ClientError {
    /// Initialization error
    InitError(String),

    /// Network error
    NetworkError(String),

    /// HTTP error
    HttpError { status: u16, message: String },

    /// Body is not one of the protocol words
    InvalidResponse(String),

    /// Still `NOGO` after the configured number of polls
    GaveUp { polls: u32 },
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InitError(msg) => write!(f, "Initialization error: {msg}"),
            Self::NetworkError(msg) => write!(f, "Network error: {msg}"),
            Self::HttpError { status, message } => {
                write!(f, "HTTP error ({status}): {message}")
            }
            Self::InvalidResponse(body) => write!(f, "Invalid response: {body:?}"),
            Self::GaveUp { polls } => write!(f, "Not admitted after {polls} polls"),
        }
    }
}

impl std::error::Error for ClientError {}

// ============================================================================
// Tests
// ============================================================================
