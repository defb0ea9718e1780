//! Rate-limited, retrying fetcher
//!
//! Every connector goes through a single shared [`Fetcher`]. Each attempt
//! reserves a per-host slot first, so the spacing table moves on failures
//! too, then runs under the per-request timeout.

use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::{
    FetchConfig, FetchError, FetchRequest, RateLimiter, ReqwestTransport, Response, SharedTransport,
    TransportError,
};

/// Shared fetcher handle
pub type SharedFetcher = Arc<Fetcher>;

pub struct Fetcher {
    transport: SharedTransport,
    limiter: Arc<RateLimiter>,
    config: FetchConfig,
}

impl Fetcher {
    /// Create a fetcher backed by reqwest
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let transport = Arc::new(ReqwestTransport::new(&config)?);
        Ok(Self::with_transport(config, transport))
    }

    /// Create a fetcher over an arbitrary transport
    pub fn with_transport(config: FetchConfig, transport: SharedTransport) -> Self {
        let limiter = Arc::new(RateLimiter::new(config.min_spacing));
        Self {
            transport,
            limiter,
            config,
        }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Backoff before the retry that follows attempt `attempt` (zero-based).
    /// Saturates at `Duration::MAX` instead of overflowing.
    pub fn backoff(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.config.backoff_base.checked_mul(factor))
            .unwrap_or(Duration::MAX)
    }

    /// Execute a request with spacing, timeout and retries.
    ///
    /// Responses with status 400 and above become [`FetchError::Status`].
    /// Non-retryable failures return on the first attempt; retryable ones
    /// end in [`FetchError::Exhausted`] once attempts run out.
    pub async fn fetch(&self, request: FetchRequest) -> Result<Response, FetchError> {
        let host = request.host()?;
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            self.limiter.acquire(&host).await;
            debug!("Fetching {} (attempt {})", request.full_url(), attempt + 1);

            let error = match self.attempt(&request).await {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };

            if !error.is_retryable() {
                debug!("Not retrying {}: {}", request.url, error);
                return Err(error);
            }

            attempt += 1;
            if attempt >= max_attempts {
                warn!("Giving up on {} after {} attempts: {}", request.url, attempt, error);
                return Err(FetchError::Exhausted {
                    attempts: attempt,
                    last: Box::new(error),
                });
            }

            let delay = self.backoff(attempt - 1);
            warn!(
                "Attempt {} for {} failed ({}), retrying in {:?}",
                attempt, request.url, error, delay
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn attempt(&self, request: &FetchRequest) -> Result<Response, FetchError> {
        let timeout = self.config.request_timeout;
        let outcome = tokio::time::timeout(timeout, self.transport.execute(request, timeout)).await;

        let response = match outcome {
            Err(_) | Ok(Err(TransportError::Timeout)) => return Err(FetchError::Timeout(timeout)),
            Ok(Err(TransportError::Connect(msg))) => return Err(FetchError::Connect(msg)),
            Ok(Err(TransportError::InvalidRequest(msg))) => return Err(FetchError::InvalidUrl(msg)),
            Ok(Ok(response)) => response,
        };

        if response.status >= 400 {
            return Err(FetchError::Status {
                status: response.status,
                url: request.url.clone(),
            });
        }
        Ok(response)
    }

    /// GET a URL
    pub async fn get(&self, url: &str) -> Result<Response, FetchError> {
        self.fetch(FetchRequest::get(url)).await
    }

    /// Execute a request and decode the body as JSON
    pub async fn fetch_json<T: DeserializeOwned>(&self, request: FetchRequest) -> Result<T, FetchError> {
        self.fetch(request).await?.json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;
    use tokio::time::Instant;

    fn fetcher(transport: &Arc<ScriptedTransport>) -> Fetcher {
        Fetcher::with_transport(FetchConfig::default(), transport.clone())
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_is_not_retried() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond("https://api.github.com/orgs/ghost", 404, "{}");
        let fetcher = fetcher(&transport);

        let err = fetcher.get("https://api.github.com/orgs/ghost").await.unwrap_err();

        assert!(err.is_not_found());
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
        assert_eq!(transport.count("https://api.github.com/orgs/ghost"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_retried_with_growing_delay() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond("https://api.llama.fi/protocol/x", 500, "oops");
        let fetcher = fetcher(&transport);

        let err = fetcher.get("https://api.llama.fi/protocol/x").await.unwrap_err();

        assert!(matches!(err, FetchError::Exhausted { attempts: 3, .. }));
        assert_eq!(err.status(), Some(500));

        let times = transport.request_times();
        assert_eq!(times.len(), 3);
        let first_gap = times[1] - times[0];
        let second_gap = times[2] - times[1];
        assert!(first_gap >= Duration::from_secs(1));
        assert!(second_gap > first_gap);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forbidden_retried_then_succeeds() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond_sequence(
            "https://immunefi.com/bug-bounty/aave/",
            vec![(403, "slow down".to_string()), (200, "<html>ok</html>".to_string())],
        );
        let fetcher = fetcher(&transport);

        let response = fetcher.get("https://immunefi.com/bug-bounty/aave/").await.unwrap();

        assert_eq!(response.body, "<html>ok</html>");
        assert_eq!(transport.count("https://immunefi.com/bug-bounty/aave/"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_too_many_requests_not_retried() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond("https://api.github.com/search/repositories", 429, "{}");
        let fetcher = fetcher(&transport);

        let err = fetcher.get("https://api.github.com/search/repositories").await.unwrap_err();

        assert_eq!(err.status(), Some(429));
        assert_eq!(transport.count("https://api.github.com/search/repositories"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_errors_exhaust() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.fail("https://hub.snapshot.org/graphql", TransportError::Connect("refused".into()));
        let fetcher = fetcher(&transport);

        let err = fetcher.get("https://hub.snapshot.org/graphql").await.unwrap_err();

        match err {
            FetchError::Exhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, FetchError::Connect(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_host_requests_are_spaced() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond("https://api.github.com/", 200, "[]");
        let fetcher = fetcher(&transport);

        fetcher.get("https://api.github.com/orgs/aave/repos").await.unwrap();
        fetcher.get("https://api.github.com/repos/aave/aave-v3-core/commits").await.unwrap();

        let times = transport.request_times();
        assert!(times[1] - times[0] >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_hosts_are_not_delayed() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond("https://", 200, "{}");
        let fetcher = fetcher(&transport);
        let start = Instant::now();

        fetcher.get("https://api.github.com/orgs/aave").await.unwrap();
        fetcher.get("https://sourcify.dev/server/check-by-addresses").await.unwrap();
        fetcher.get("https://hub.snapshot.org/graphql").await.unwrap();

        assert_eq!(Instant::now() - start, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_same_host_calls_are_serialized() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond("https://api.github.com/", 200, "{}");
        let fetcher = fetcher(&transport);

        let (a, b, c) = tokio::join!(
            fetcher.get("https://api.github.com/a"),
            fetcher.get("https://api.github.com/b"),
            fetcher.get("https://api.github.com/c"),
        );
        assert!(a.is_ok() && b.is_ok() && c.is_ok());

        let mut times = transport.request_times();
        times.sort();
        assert!(times[1] - times[0] >= Duration::from_secs(1));
        assert!(times[2] - times[1] >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_json_decode_error() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond("https://api.llama.fi/", 200, "<html>");
        let fetcher = fetcher(&transport);

        let err = fetcher
            .fetch_json::<serde_json::Value>(FetchRequest::get("https://api.llama.fi/protocol/aave"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
    }

    #[test]
    fn test_backoff_doubles() {
        let transport: SharedTransport = Arc::new(ScriptedTransport::new());
        let fetcher = Fetcher::with_transport(FetchConfig::default(), transport);
        assert_eq!(fetcher.backoff(0), Duration::from_secs(1));
        assert_eq!(fetcher.backoff(1), Duration::from_secs(2));
        assert_eq!(fetcher.backoff(2), Duration::from_secs(4));
    }

    #[test]
    fn test_backoff_saturates() {
        let transport: SharedTransport = Arc::new(ScriptedTransport::new());
        let config = FetchConfig {
            backoff_base: Duration::from_secs(u64::MAX / 2),
            ..FetchConfig::default()
        };
        let fetcher = Fetcher::with_transport(config, transport);
        assert_eq!(fetcher.backoff(1), Duration::from_secs(u64::MAX - 1));
        assert_eq!(fetcher.backoff(2), Duration::MAX);
        assert_eq!(fetcher.backoff(40), Duration::MAX);
    }
}
