//! Authenticated, cancellable HTTP transport
//!
//! This module handles all API requests for the crawler, including:
//! - Building the HTTP client with session headers
//! - Racing each request against the run's cancellation token
//! - Retrying rate-limited and server-error responses with backoff
//! - Reducing transport and decoding failures to `None`

use crate::config::{CrawlerConfig, SessionConfig};
use crate::{ConfigError, SweeperError};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE, COOKIE};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Upper bound of a single backoff sleep
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// The run was cancelled while a request was pending
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("request cancelled")]
pub struct Cancelled;

/// Result of one attempt at a request
#[derive(Debug)]
enum Attempt {
    /// Decoded response body (`Null` for an empty body)
    Done(Value),

    /// Rate limited or server error; worth another try
    Retry {
        status: StatusCode,
        retry_after: Option<Duration>,
    },

    /// Failure that another attempt will not fix
    Failed(String),
}

/// HTTP client carrying the session credentials
#[derive(Debug, Clone)]
pub struct Transport {
    client: Client,
    max_retries: u32,
    retry_base_delay: Duration,
}

/// Builds an HTTP client that attaches the session headers to every request
///
/// # Arguments
///
/// * `session` - Credentials of the acting session
/// * `crawler` - Timeout settings
pub fn build_http_client(
    session: &SessionConfig,
    crawler: &CrawlerConfig,
) -> Result<Client, SweeperError> {
    let csrf_token = session.csrf_token().ok_or_else(|| {
        ConfigError::Validation("csrf_token is missing and the cookie has no ct0 value".into())
    })?;

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, header_value(&session.authorization())?);
    headers.insert(
        HeaderName::from_static("x-csrf-token"),
        header_value(&csrf_token)?,
    );
    headers.insert(
        HeaderName::from_static("x-twitter-auth-type"),
        HeaderValue::from_static("OAuth2Session"),
    );
    headers.insert(
        HeaderName::from_static("x-twitter-active-user"),
        HeaderValue::from_static("yes"),
    );
    if !session.cookie.trim().is_empty() {
        headers.insert(COOKIE, header_value(session.cookie.trim())?);
    }

    let client = Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(crawler.request_timeout))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()?;

    Ok(client)
}

fn header_value(value: &str) -> Result<HeaderValue, ConfigError> {
    let mut header = HeaderValue::from_str(value)
        .map_err(|_| ConfigError::Validation("session value is not a valid header".into()))?;
    header.set_sensitive(true);
    Ok(header)
}

impl Transport {
    /// Creates a transport for the given session
    pub fn new(session: &SessionConfig, crawler: &CrawlerConfig) -> Result<Self, SweeperError> {
        Ok(Self {
            client: build_http_client(session, crawler)?,
            max_retries: crawler.max_retries,
            retry_base_delay: Duration::from_millis(crawler.retry_base_delay),
        })
    }

    /// Issues a request and decodes the JSON response
    ///
    /// # Returns
    ///
    /// * `Ok(Some(value))` - Decoded body (`Value::Null` when the body is empty)
    /// * `Ok(None)` - The request or decoding failed; the failure was logged
    /// * `Err(Cancelled)` - The token fired before, during, or right after
    ///   the request; any response that raced it is discarded
    pub async fn request(
        &self,
        method: Method,
        url: Url,
        body: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<Option<Value>, Cancelled> {
        let mut attempt = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(Cancelled);
            }

            let mut builder = self.client.request(method.clone(), url.clone());
            if let Some(body) = &body {
                builder = builder
                    .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(body.clone());
            }

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Cancelled),
                outcome = send(builder) => outcome,
            };

            // The response may have completed in the same instant the run was cancelled
            if cancel.is_cancelled() {
                return Err(Cancelled);
            }

            match outcome {
                Attempt::Done(value) => return Ok(Some(value)),
                Attempt::Retry {
                    status,
                    retry_after,
                } if attempt < self.max_retries => {
                    let delay = retry_after.unwrap_or_else(|| self.backoff(attempt));
                    attempt += 1;
                    tracing::warn!(
                        "{} {} returned {}, retry {}/{} in {:?}",
                        method,
                        url.path(),
                        status,
                        attempt,
                        self.max_retries,
                        delay
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Attempt::Retry { status, .. } => {
                    tracing::warn!(
                        "{} {} returned {} after {} retries, giving up",
                        method,
                        url.path(),
                        status,
                        self.max_retries
                    );
                    return Ok(None);
                }
                Attempt::Failed(error) => {
                    tracing::warn!("Error in API request to {}: {}", url.path(), error);
                    return Ok(None);
                }
            }
        }
    }

    /// Exponential backoff delay before retry number `attempt + 1`
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.retry_base_delay
            .checked_mul(factor)
            .unwrap_or(MAX_BACKOFF)
            .min(MAX_BACKOFF)
    }
}

/// Sends one request and classifies the result
async fn send(builder: RequestBuilder) -> Attempt {
    let response = match builder.send().await {
        Ok(response) => response,
        Err(e) if e.is_timeout() => return Attempt::Failed("Request timeout".to_string()),
        Err(e) if e.is_connect() => return Attempt::Failed(format!("Connection failed: {}", e)),
        Err(e) => return Attempt::Failed(e.to_string()),
    };

    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .map(|d| d.min(MAX_BACKOFF));
        return Attempt::Retry {
            status,
            retry_after,
        };
    }

    if !status.is_success() {
        return Attempt::Failed(format!("HTTP {}", status));
    }

    let bytes = match response.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => return Attempt::Failed(format!("Failed to read body: {}", e)),
    };

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Attempt::Done(Value::Null);
    }

    match serde_json::from_slice(&bytes) {
        Ok(value) => Attempt::Done(value),
        Err(e) => Attempt::Failed(format!("Invalid JSON: {}", e)),
    }
}
