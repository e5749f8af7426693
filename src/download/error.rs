//! Error types for the download module.
//!
//! A single HTTP attempt fails with an [`AttemptError`]; the fetcher wraps the
//! last attempt's error into a [`FetchError`] once its retry budget is spent.

use thiserror::Error;

/// Failure of one HTTP attempt against a candidate URL.
#[derive(Debug, Error)]
pub enum AttemptError {
    /// Network-level error (DNS resolution, connection refused, TLS, body read).
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL being fetched.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The attempt did not finish within the per-attempt timeout.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Server answered with a non-2xx status.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },
}

impl AttemptError {
    /// Classifies a reqwest error into timeout or generic network failure.
    pub fn from_reqwest(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { url: url.into() }
        } else {
            Self::Network {
                url: url.into(),
                source,
            }
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Returns the HTTP status when the attempt got a response.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            Self::Network { .. } | Self::Timeout { .. } => None,
        }
    }
}

/// Terminal failure of [`ImageFetcher::fetch`](super::ImageFetcher::fetch).
#[derive(Debug, Error)]
pub enum FetchError {
    /// The candidate is not an absolute http(s) URL; no attempt was made.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The rejected URL string.
        url: String,
    },

    /// Every attempt failed.
    #[error("giving up on {url} after {attempts} attempt(s): {cause}")]
    Exhausted {
        /// The URL that could not be fetched.
        url: String,
        /// Number of attempts made.
        attempts: u32,
        /// Error of the final attempt.
        #[source]
        cause: AttemptError,
    },
}

impl FetchError {
    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates an exhausted-retries error.
    pub fn exhausted(url: impl Into<String>, attempts: u32, cause: AttemptError) -> Self {
        Self::Exhausted {
            url: url.into(),
            attempts,
            cause,
        }
    }

    /// Number of network attempts made before giving up.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::InvalidUrl { .. } => 0,
            Self::Exhausted { attempts, .. } => *attempts,
        }
    }
}
