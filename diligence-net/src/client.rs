//! HTTP client configuration, errors and the transport seam
//!
//! The fetcher talks to the network only through [`Transport`], so tests can
//! swap in a scripted implementation.

use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::{FetchRequest, Method, Response};

/// Fetcher configuration
#[derive(Debug, Clone, PartialEq)]
pub struct FetchConfig {
    /// Minimum spacing between two requests to the same host
    pub min_spacing: Duration,
    /// Attempts per request, including the first
    pub max_attempts: u32,
    /// Base of the exponential backoff (`base * 2^(attempt - 1)`)
    pub backoff_base: Duration,
    /// Per-attempt timeout
    pub request_timeout: Duration,
    /// Fixed user agent; a browser agent is picked when unset
    pub user_agent: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            min_spacing: Duration::from_secs(1),
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
            request_timeout: Duration::from_secs(15),
            user_agent: None,
        }
    }
}

/// Errors from the network access layer
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("Gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: Box<FetchError> },
}

impl FetchError {
    /// Connection failures, timeouts, 403 and 5xx are worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connect(_) | Self::Timeout(_) => true,
            Self::Status { status, .. } => *status == 403 || (500..600).contains(status),
            _ => false,
        }
    }

    /// HTTP status behind this error, looking through exhausted retries
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Exhausted { last, .. } => last.status(),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Failures below the HTTP layer
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {
    #[error("connection error: {0}")]
    Connect(String),

    #[error("timed out")]
    Timeout,

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Executes one HTTP request. Status codes are returned, not interpreted.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &FetchRequest, timeout: Duration) -> Result<Response, TransportError>;
}

/// Thread-safe transport handle
pub type SharedTransport = Arc<dyn Transport>;

/// User agents for rotation
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:137.0) Gecko/20100101 Firefox/137.0",
];

/// Get a random user agent
pub fn random_user_agent() -> &'static str {
    use rand::Rng;
    let idx = rand::thread_rng().gen_range(0..USER_AGENTS.len());
    USER_AGENTS[idx]
}

/// Transport backed by a pooled reqwest client
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let user_agent = config
            .user_agent
            .clone()
            .unwrap_or_else(|| random_user_agent().to_string());

        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| FetchError::ClientBuild(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: &FetchRequest, timeout: Duration) -> Result<Response, TransportError> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };
        builder = builder.query(&request.params).timeout(timeout);
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if let Some(body) = &request.json_body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.map_err(classify)?;

        Ok(Response {
            url,
            status,
            content_type,
            body,
        })
    }
}

fn classify(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else if error.is_builder() {
        TransportError::InvalidRequest(error.to_string())
    } else {
        TransportError::Connect(error.to_string())
    }
}
