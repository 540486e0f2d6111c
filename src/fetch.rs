//! Rate-limited HTTP fetching with cache fallback
//!
//! `FetchCoordinator` is the single network-facing entry point. Every call is
//! first admitted by the [`RateLimiter`]; admitted calls go to the network and
//! successful bodies are remembered in the [`ResponseCache`]. Whenever a fresh
//! body cannot be obtained (quota exhausted, transport fault, non-2xx status or
//! cancellation) the last cached body for the URL is returned instead, flagged
//! as stale. The cache is never used to skip a call the limiter would admit.
//! Nothing is retried.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{CachedBody, ResponseCache};
use crate::rate_limit::{RateLimitConfig, RateLimitError, RateLimiter};

/// Header carrying the API credential
pub const AUTH_HEADER: &str = "X-Auth-Token";

/// Configuration for a [`FetchCoordinator`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchConfig {
    /// Request quota enforced before every network call
    pub rate_limit: RateLimitConfig,
    /// Upper bound on a single network call, including reading the body
    pub request_timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            rate_limit: RateLimitConfig::default(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Errors that can occur while setting up a coordinator
#[derive(Debug, Error)]
pub enum SetupError {
    /// The rate limit configuration was rejected
    #[error("Invalid rate limit: {0}")]
    RateLimit(#[from] RateLimitError),

    /// The HTTP client could not be built
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Errors returned when no fresh or cached body is available
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request quota is exhausted
    #[error("Rate limit exceeded and no cached response is available")]
    RateLimited,

    /// Connection, timeout or body read failure
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The upstream answered with a non-success status
    #[error("Upstream returned {0}")]
    UpstreamError(StatusCode),

    /// The caller cancelled the request while it was in flight
    #[error("Request was cancelled")]
    Cancelled,
}

impl FetchError {
    /// Why a cached body would be served in place of this error
    pub fn fallback_reason(&self) -> FallbackReason {
        match self {
            FetchError::RateLimited => FallbackReason::RateLimited,
            FetchError::Transport(_) => FallbackReason::Transport,
            FetchError::UpstreamError(status) => FallbackReason::UpstreamStatus(status.as_u16()),
            FetchError::Cancelled => FallbackReason::Cancelled,
        }
    }
}

/// The failure that caused a cached body to be served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    RateLimited,
    Transport,
    UpstreamStatus(u16),
    Cancelled,
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::RateLimited => write!(f, "rate limit exceeded"),
            FallbackReason::Transport => write!(f, "network error"),
            FallbackReason::UpstreamStatus(status) => write!(f, "upstream returned {}", status),
            FallbackReason::Cancelled => write!(f, "request cancelled"),
        }
    }
}

/// Whether a body came straight from the network or from a cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    /// Retrieved by this call
    Fresh,
    /// Served from a cache because a fresh fetch failed
    Stale {
        reason: FallbackReason,
        /// When the served body was cached
        cached_at: DateTime<Utc>,
    },
}

/// A response body along with how it was obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    /// The raw response body
    pub body: String,
    /// Staleness indicator, set on every fallback
    pub freshness: Freshness,
}

impl Fetched {
    /// A body retrieved by this call
    pub fn fresh(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            freshness: Freshness::Fresh,
        }
    }

    /// A cached body served because of `reason`
    pub fn stale(cached: CachedBody, reason: FallbackReason) -> Self {
        Self {
            body: cached.body,
            freshness: Freshness::Stale {
                reason,
                cached_at: cached.cached_at,
            },
        }
    }

    /// Whether the body was served from a cache
    pub fn is_stale(&self) -> bool {
        matches!(self.freshness, Freshness::Stale { .. })
    }
}

/// Admits, performs and caches outbound GET requests
#[derive(Debug)]
pub struct FetchCoordinator {
    http_client: Client,
    limiter: RateLimiter,
    responses: ResponseCache,
}

impl FetchCoordinator {
    /// Creates a coordinator with an HTTP client bounded by `config.request_timeout`
    pub fn new(config: FetchConfig) -> Result<Self, SetupError> {
        let http_client = Client::builder().timeout(config.request_timeout).build()?;
        Self::with_client(http_client, config.rate_limit)
    }

    /// Creates a coordinator around a custom HTTP client
    pub fn with_client(http_client: Client, rate_limit: RateLimitConfig) -> Result<Self, SetupError> {
        Ok(Self {
            http_client,
            limiter: RateLimiter::new(rate_limit)?,
            responses: ResponseCache::new(),
        })
    }

    /// The rate limiter guarding outbound calls
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// The cache of last successful bodies
    pub fn responses(&self) -> &ResponseCache {
        &self.responses
    }

    /// Fetches `url`, authenticating with `credential`
    ///
    /// # Returns
    /// * `Ok(Fetched)` - A fresh body, or a stale cached body if the fetch failed
    /// * `Err(FetchError)` - If the fetch failed and the URL was never cached
    pub async fn fetch(&self, url: &str, credential: &str) -> Result<Fetched, FetchError> {
        self.fetch_cancellable(url, credential, &CancellationToken::new())
            .await
    }

    /// Like [`fetch`](Self::fetch), but gives up on the network call once `cancel` fires
    ///
    /// A cancelled call still falls back to the cache; without a cached body it
    /// returns `FetchError::Cancelled` so the caller sees the cancellation.
    pub async fn fetch_cancellable(
        &self,
        url: &str,
        credential: &str,
        cancel: &CancellationToken,
    ) -> Result<Fetched, FetchError> {
        debug!(url, "Fetching URL");

        if !self.limiter.try_acquire() {
            warn!(url, "Rate limit exceeded, attempting to return cached response");
            return self.fall_back(url, FetchError::RateLimited);
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            result = self.request(url, credential) => result,
        };

        match outcome {
            Ok(body) => {
                self.responses.put(url, body.as_str());
                Ok(Fetched::fresh(body))
            }
            Err(error) => self.fall_back(url, error),
        }
    }

    /// Performs the GET and returns the body of a 2xx response
    async fn request(&self, url: &str, credential: &str) -> Result<String, FetchError> {
        let response = self
            .http_client
            .get(url)
            .header(AUTH_HEADER, credential)
            .send()
            .await?;

        let status = response.status();
        debug!(url, status = status.as_u16(), "Upstream responded");
        if !status.is_success() {
            return Err(FetchError::UpstreamError(status));
        }

        Ok(response.text().await?)
    }

    /// Serves the cached body for `url`, or surfaces `error` if there is none
    fn fall_back(&self, url: &str, error: FetchError) -> Result<Fetched, FetchError> {
        let reason = error.fallback_reason();
        match self.responses.get(url) {
            Some(cached) => {
                info!(url, %reason, cached_at = %cached.cached_at, "Returning cached response");
                Ok(Fetched::stale(cached, reason))
            }
            None => {
                warn!(url, error = %error, "No cached response available");
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn coordinator(max_requests: usize) -> FetchCoordinator {
        FetchCoordinator::new(FetchConfig {
            rate_limit: RateLimitConfig {
                max_requests,
                window: Duration::from_secs(60),
            },
            request_timeout: Duration::from_secs(5),
        })
        .expect("coordinator should build")
    }

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.rate_limit, RateLimitConfig::default());
        assert_eq!(config.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_new_rejects_invalid_rate_limit() {
        let result = FetchCoordinator::new(FetchConfig {
            rate_limit: RateLimitConfig {
                max_requests: 0,
                window: Duration::from_secs(60),
            },
            ..Default::default()
        });
        assert!(matches!(
            result,
            Err(SetupError::RateLimit(RateLimitError::ZeroRequests))
        ));
    }

    #[test]
    fn test_fallback_reason_display() {
        assert_eq!(FallbackReason::RateLimited.to_string(), "rate limit exceeded");
        assert_eq!(
            FallbackReason::UpstreamStatus(503).to_string(),
            "upstream returned 503"
        );
    }

    #[tokio::test]
    async fn test_success_sends_auth_header_and_caches_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/x"))
            .and(header(AUTH_HEADER, "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_string("A"))
            .expect(1)
            .mount(&server)
            .await;

        let coordinator = coordinator(10);
        let url = format!("{}/x", server.uri());
        let fetched = coordinator.fetch(&url, "secret").await.unwrap();

        assert_eq!(fetched, Fetched::fresh("A"));
        assert_eq!(coordinator.responses().get(&url).unwrap().body, "A");
    }

    #[tokio::test]
    async fn test_admitted_call_goes_to_network_even_when_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/x"))
            .respond_with(ResponseTemplate::new(200).set_body_string("A"))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/x"))
            .respond_with(ResponseTemplate::new(200).set_body_string("B"))
            .mount(&server)
            .await;

        let coordinator = coordinator(10);
        let url = format!("{}/x", server.uri());

        assert_eq!(coordinator.fetch(&url, "key").await.unwrap().body, "A");
        let second = coordinator.fetch(&url, "key").await.unwrap();
        assert_eq!(second, Fetched::fresh("B"));
        assert_eq!(coordinator.responses().get(&url).unwrap().body, "B");
    }

    #[tokio::test]
    async fn test_denied_admission_returns_cached_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/x"))
            .respond_with(ResponseTemplate::new(200).set_body_string("A"))
            .expect(1)
            .mount(&server)
            .await;

        let coordinator = coordinator(1);
        let url = format!("{}/x", server.uri());

        assert!(!coordinator.fetch(&url, "key").await.unwrap().is_stale());

        let fetched = coordinator.fetch(&url, "key").await.unwrap();
        assert_eq!(fetched.body, "A");
        assert!(matches!(
            fetched.freshness,
            Freshness::Stale {
                reason: FallbackReason::RateLimited,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_denied_admission_without_history_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("A"))
            .expect(1)
            .mount(&server)
            .await;

        let coordinator = coordinator(1);
        coordinator
            .fetch(&format!("{}/x", server.uri()), "key")
            .await
            .unwrap();

        let result = coordinator.fetch(&format!("{}/y", server.uri()), "key").await;
        assert!(matches!(result, Err(FetchError::RateLimited)));
    }

    #[tokio::test]
    async fn test_non_success_status_returns_cached_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/x"))
            .respond_with(ResponseTemplate::new(200).set_body_string("A"))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/x"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let coordinator = coordinator(10);
        let url = format!("{}/x", server.uri());

        assert_eq!(coordinator.fetch(&url, "key").await.unwrap().body, "A");

        let fetched = coordinator.fetch(&url, "key").await.unwrap();
        assert_eq!(fetched.body, "A");
        assert!(matches!(
            fetched.freshness,
            Freshness::Stale {
                reason: FallbackReason::UpstreamStatus(500),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_non_success_status_without_history_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let coordinator = coordinator(10);
        let result = coordinator.fetch(&format!("{}/x", server.uri()), "key").await;

        match result {
            Err(FetchError::UpstreamError(status)) => assert_eq!(status, StatusCode::FORBIDDEN),
            other => panic!("expected upstream error, got {:?}", other),
        }
        assert!(coordinator.responses().is_empty(), "Failures must not be cached");
    }

    /// A URL on a local port nothing is listening on
    fn unreachable_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
        let port = listener.local_addr().expect("local addr").port();
        drop(listener);
        format!("http://127.0.0.1:{}/x", port)
    }

    #[tokio::test]
    async fn test_transport_error_without_history_fails() {
        let coordinator = coordinator(10);
        let result = coordinator.fetch(&unreachable_url(), "key").await;
        assert!(matches!(result, Err(FetchError::Transport(_))));
    }

    #[tokio::test]
    async fn test_transport_error_returns_cached_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/x"))
            .respond_with(ResponseTemplate::new(200).set_body_string("A"))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/x"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let coordinator = FetchCoordinator::new(FetchConfig {
            request_timeout: Duration::from_millis(200),
            ..Default::default()
        })
        .unwrap();
        let url = format!("{}/x", server.uri());
        coordinator.fetch(&url, "key").await.unwrap();

        let fetched = coordinator.fetch(&url, "key").await.unwrap();
        assert_eq!(fetched.body, "A");
        assert!(matches!(
            fetched.freshness,
            Freshness::Stale {
                reason: FallbackReason::Transport,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_timeout_is_a_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let coordinator = FetchCoordinator::new(FetchConfig {
            request_timeout: Duration::from_millis(100),
            ..Default::default()
        })
        .unwrap();

        let result = coordinator.fetch(&format!("{}/slow", server.uri()), "key").await;
        assert!(matches!(result, Err(FetchError::Transport(_))));
    }

    #[tokio::test]
    async fn test_cancellation_without_history_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let coordinator = coordinator(10);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let result = coordinator
            .fetch_cancellable(&format!("{}/slow", server.uri()), "key", &cancel)
            .await;
        assert!(matches!(result, Err(FetchError::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancellation_returns_cached_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/x"))
            .respond_with(ResponseTemplate::new(200).set_body_string("A"))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/x"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("B")
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let coordinator = coordinator(10);
        let url = format!("{}/x", server.uri());
        coordinator.fetch(&url, "key").await.unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let fetched = coordinator
            .fetch_cancellable(&url, "key", &cancel)
            .await
            .unwrap();

        assert_eq!(fetched.body, "A");
        assert!(matches!(
            fetched.freshness,
            Freshness::Stale {
                reason: FallbackReason::Cancelled,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_concurrent_fetches_respect_quota() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(3)
            .mount(&server)
            .await;

        let coordinator = coordinator(3);
        let urls: Vec<String> = (0..8).map(|i| format!("{}/m/{}", server.uri(), i)).collect();

        let results = join_all(urls.iter().map(|url| coordinator.fetch(url, "key"))).await;

        let admitted = results.iter().filter(|r| r.is_ok()).count();
        let denied = results
            .iter()
            .filter(|r| matches!(r, Err(FetchError::RateLimited)))
            .count();
        assert_eq!(admitted, 3);
        assert_eq!(denied, 5);
    }
}
