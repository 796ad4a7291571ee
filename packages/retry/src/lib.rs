#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! HTTP retry helpers for transient errors.
//!
//! Every outbound read should go through [`send`] or [`send_json`] rather
//! than calling `reqwest::RequestBuilder::send()` directly, so that
//! timeouts, connection resets, HTTP 429 and HTTP 5xx are retried with
//! exponential backoff. [`with_backoff`] applies the same policy to a whole
//! multi-request operation (e.g. a geocoding provider path).
//!
//! # Usage
//!
//! ```ignore
//! let policy = RetryPolicy::default();
//!
//! // GET with query params -> JSON
//! let body = realmarket_retry::send_json(&policy, || client.get(&url).query(&params)).await?;
//!
//! // GET, inspect status yourself (e.g. 204 No Content)
//! let resp = realmarket_retry::send(&policy, || client.get(&url)).await?;
//! ```

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Maximum length of the response body preview included in error logs.
const BODY_PREVIEW_LEN: usize = 300;

/// Bounded exponential backoff.
///
/// Attempt `n` (1-based) waits `base_delay * 2^(n - 2)` before it runs,
/// capped at `max_delay`; the first attempt runs immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    /// Three attempts, waiting 2s then 4s (capped at 10s).
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2), Duration::from_secs(10))
    }
}

impl RetryPolicy {
    /// Creates a policy. `max_attempts` is clamped to at least one.
    #[must_use]
    pub const fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: if max_attempts == 0 { 1 } else { max_attempts },
            base_delay,
            max_delay,
        }
    }

    /// A policy that never retries.
    #[must_use]
    pub const fn single() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// Total attempts, including the first.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay to wait before `attempt` (1-based).
    #[must_use]
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(attempt - 2).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }
}

/// Errors from retried HTTP requests.
#[derive(Debug, thiserror::Error)]
pub enum RetryError {
    /// Transport failure (connect, timeout, body read).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status {
        /// Final status received.
        status: reqwest::StatusCode,
        /// Request URL (without query string).
        url: String,
    },

    /// The response body was not valid JSON.
    #[error("Invalid JSON from {url}: {message}")]
    Json {
        /// Request URL (without query string).
        url: String,
        /// Parser message and body preview.
        message: String,
    },
}

impl RetryError {
    /// Returns `true` for the error classes worth retrying: transport
    /// timeouts and connect failures, HTTP 429, and HTTP 5xx.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => is_transient_error(e),
            Self::Status { status, .. } => is_transient_status(*status),
            Self::Json { .. } => false,
        }
    }
}

/// Returns `true` if the status is rate limiting or a server error.
#[must_use]
pub fn is_transient_status(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Returns `true` if the transport error is likely transient.
#[must_use]
pub fn is_transient_error(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_request()
}

/// Runs `op` until it succeeds, fails permanently, or the policy is
/// exhausted.
///
/// `is_transient` decides which errors are retried; anything else is
/// returned immediately.
///
/// # Errors
///
/// Returns the last error produced by `op`.
pub async fn with_backoff<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    label: &str,
    is_transient: P,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.max_attempts && is_transient(&e) => {
                attempt += 1;
                let delay = policy.delay_before(attempt);
                log::warn!(
                    "{label}: transient error ({e}), retry {}/{} in {delay:?}",
                    attempt - 1,
                    policy.max_attempts - 1,
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Sends a request, retrying transient failures, and returns the first
/// successful (2xx/3xx) response.
///
/// The `build_request` closure is called on each attempt because request
/// builders are consumed by `.send()`.
///
/// # Errors
///
/// Returns [`RetryError::Status`] for 4xx responses (other than 429)
/// without retrying, or the last transient error once the policy is
/// exhausted.
pub async fn send<F>(policy: &RetryPolicy, build_request: F) -> Result<reqwest::Response, RetryError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let build_request = &build_request;
    with_backoff(policy, "HTTP", RetryError::is_transient, || async move {
        let response = build_request().send().await?;
        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(RetryError::Status {
                status,
                url: strip_query(response.url()),
            });
        }
        Ok(response)
    })
    .await
}

/// Sends a request and parses the response body as JSON.
///
/// A body that cannot be read is retried like a transport failure; a body
/// that is not JSON is returned as [`RetryError::Json`] with a preview in
/// the log.
///
/// # Errors
///
/// See [`send`]; additionally [`RetryError::Json`] for malformed bodies.
pub async fn send_json<F>(
    policy: &RetryPolicy,
    build_request: F,
) -> Result<serde_json::Value, RetryError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let build_request = &build_request;
    let (url, text) = with_backoff(policy, "HTTP body", RetryError::is_transient, || async move {
        let response = send(&RetryPolicy::single(), build_request).await?;
        let url = strip_query(response.url());
        let text = response.text().await?;
        Ok::<_, RetryError>((url, text))
    })
    .await?;

    serde_json::from_str(&text).map_err(|e| {
        let preview: String = text.chars().take(BODY_PREVIEW_LEN).collect();
        log::error!(
            "JSON parse failed\n  \
             url: {url}\n  \
             received: {} bytes\n  \
             parse error: {e}\n  \
             body preview: {preview}",
            text.len(),
        );
        RetryError::Json {
            url,
            message: e.to_string(),
        }
    })
}

/// Drops the query string, which may carry API keys.
fn strip_query(url: &reqwest::Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.to_string()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn fast() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(4))
    }

    #[test]
    fn delays_double_and_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_before(1), Duration::ZERO);
        assert_eq!(policy.delay_before(2), Duration::from_secs(2));
        assert_eq!(policy.delay_before(3), Duration::from_secs(4));
        assert_eq!(policy.delay_before(4), Duration::from_secs(8));
        assert_eq!(policy.delay_before(5), Duration::from_secs(10));
        assert_eq!(policy.delay_before(40), Duration::from_secs(10));
    }

    #[test]
    fn zero_attempts_clamps_to_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO, Duration::ZERO).max_attempts(), 1);
    }

    #[tokio::test]
    async fn backoff_retries_transient_until_success() {
        let calls = &AtomicU32::new(0);
        let result: Result<u32, String> = with_backoff(&fast(), "test", |_| true, || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 { Err(format!("fail {n}")) } else { Ok(n) }
        })
        .await;
        assert_eq!(result, Ok(3));
    }

    #[tokio::test]
    async fn backoff_gives_up_after_max_attempts() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), String> = with_backoff(&fast(), "test", |_| true, || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("down".to_string())
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn backoff_does_not_retry_permanent_errors() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), String> = with_backoff(&fast(), "test", |_| false, || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("bad input".to_string())
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn send_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/data"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[[\"a\"],[\"1\"]]"))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/data", server.uri());
        let body = send_json(&fast(), || client.get(&url)).await.unwrap();
        assert_eq!(body, serde_json::json!([["a"], ["1"]]));
    }

    #[tokio::test]
    async fn send_does_not_retry_client_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/missing?key=secret", server.uri());
        let err = send(&fast(), || client.get(&url)).await.unwrap_err();
        match err {
            RetryError::Status { status, url } => {
                assert_eq!(status, reqwest::StatusCode::NOT_FOUND);
                assert!(!url.contains("secret"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn send_gives_up_on_persistent_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .expect(3)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = server.uri();
        let err = send(&fast(), || client.get(&url)).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn malformed_json_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = server.uri();
        let err = send_json(&fast(), || client.get(&url)).await.unwrap_err();
        assert!(matches!(err, RetryError::Json { .. }));
    }
}
