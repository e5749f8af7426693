//! Image acquisition with a bounded, fixed-backoff retry loop.

use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};
use url::Url;

use super::client::{HeadInfo, HttpClient};
use super::constants::{BYTES_PER_MB, REQUEST_TIMEOUT_SECS};
use super::error::FetchError;
use super::retry::{RetryDecision, RetryPolicy};

/// Bytes of one fetched candidate plus transfer measurements.
///
/// Owned by the pipeline step that fetched it and dropped after the image has
/// been validated and written.
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// Response body.
    pub bytes: Vec<u8>,
    /// Size in bytes: `Content-Length` when announced, else bytes received.
    pub size_bytes: u64,
    /// Wall time from the first attempt until the body was complete.
    pub elapsed: Duration,
    /// Number of attempts used (1 when the first attempt succeeded).
    pub attempts: u32,
    /// Announced `Content-Type`, if any.
    pub content_type: Option<String>,
}

impl FetchResult {
    /// Number of retries that preceded the successful attempt.
    #[must_use]
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }

    /// Transfer speed in MB/s, or 0 when the elapsed time is zero.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn speed_mbps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.size_bytes as f64 / BYTES_PER_MB / secs
        } else {
            0.0
        }
    }
}

/// Fetches candidate URLs over HTTP, retrying every failed attempt.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use image_crawler_core::download::{HttpClient, ImageFetcher, RetryPolicy};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let fetcher = ImageFetcher::new(HttpClient::new()?, Duration::from_secs(10), RetryPolicy::default());
/// let fetched = fetcher.fetch("https://example.com/cat.jpg").await?;
/// println!("{} bytes in {:?}", fetched.size_bytes, fetched.elapsed);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ImageFetcher {
    client: HttpClient,
    timeout: Duration,
    policy: RetryPolicy,
}

impl ImageFetcher {
    /// Creates a fetcher with an explicit per-attempt timeout and retry policy.
    #[must_use]
    pub fn new(client: HttpClient, timeout: Duration, policy: RetryPolicy) -> Self {
        Self {
            client,
            timeout,
            policy,
        }
    }

    /// Creates a fetcher with the default 10s timeout and default retry policy.
    #[must_use]
    pub fn with_defaults(client: HttpClient) -> Self {
        Self::new(
            client,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
            RetryPolicy::default(),
        )
    }

    /// Per-attempt timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Retry policy applied to every fetch.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetches `url`, making up to `max_attempts` independent attempts.
    ///
    /// # Errors
    ///
    /// - [`FetchError::InvalidUrl`] when `url` is not an absolute http(s) URL
    /// - [`FetchError::Exhausted`] when every attempt failed
    #[instrument(skip(self), fields(max_attempts = self.policy.max_attempts()))]
    pub async fn fetch(&self, url: &str) -> Result<FetchResult, FetchError> {
        match Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            _ => return Err(FetchError::invalid_url(url)),
        }

        let started = Instant::now();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            debug!(attempt, "attempting fetch");

            match self.client.get_bytes(url, self.timeout).await {
                Ok(body) => {
                    let received = body.bytes.len() as u64;
                    let size_bytes = body.content_length.unwrap_or(received);
                    let result = FetchResult {
                        bytes: body.bytes,
                        size_bytes,
                        elapsed: started.elapsed(),
                        attempts: attempt,
                        content_type: body.content_type,
                    };
                    debug!(
                        attempt,
                        size_bytes,
                        elapsed_ms = result.elapsed.as_millis(),
                        "fetch succeeded"
                    );
                    return Ok(result);
                }
                Err(e) => match self.policy.should_retry(attempt) {
                    RetryDecision::Retry {
                        delay,
                        attempt: next_attempt,
                    } => {
                        info!(
                            url,
                            attempt = next_attempt,
                            max_attempts = self.policy.max_attempts(),
                            delay_ms = delay.as_millis(),
                            error = %e,
                            "retrying fetch"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    RetryDecision::DoNotRetry { reason } => {
                        warn!(url, attempts = attempt, %reason, error = %e, "fetch failed");
                        return Err(FetchError::exhausted(url, attempt, e));
                    }
                },
            }
        }
    }

    /// One HEAD request, no retries. `None` when the server gave no usable answer.
    #[instrument(skip(self))]
    pub async fn probe(&self, url: &str) -> Option<HeadInfo> {
        match self.client.head(url, self.timeout).await {
            Ok(info) => Some(info),
            Err(e) => {
                debug!(error = %e, "HEAD probe failed, falling back to GET");
                None
            }
        }
    }
}
