//! HTTP client wrapper for fetching image bytes.
//!
//! This module provides the `HttpClient` struct, which performs exactly one GET
//! attempt per call with a per-request timeout. Retrying is the fetcher's job.

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::{
    ACCEPT, ACCEPT_LANGUAGE, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue,
};
use tracing::{debug, trace};

use super::constants::CONNECT_TIMEOUT_SECS;
use super::error::AttemptError;
use crate::user_agent;

/// HTTP client for fetching candidate images into memory.
///
/// Created once per scheduler run and cloned into every pipeline; clones share
/// the connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

/// Body and headers of one successful response.
#[derive(Debug, Clone)]
pub struct FetchedBody {
    /// Full response body.
    pub bytes: Vec<u8>,
    /// `Content-Length` as announced by the server, if any.
    pub content_length: Option<u64>,
    /// `Content-Type` as announced by the server, if any.
    pub content_type: Option<String>,
}

/// Headers of a successful `HEAD` response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadInfo {
    /// `Content-Length`, if announced.
    pub content_length: Option<u64>,
    /// `Content-Type`, if announced.
    pub content_type: Option<String>,
}

impl HttpClient {
    /// Creates a client with the default connect timeout.
    ///
    /// # Errors
    ///
    /// Returns the builder error if the TLS backend cannot be initialized.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
    }

    /// Creates a client with an explicit connect timeout.
    ///
    /// Requests carry browser-like `User-Agent`, `Accept` and `Accept-Language`
    /// headers; gzip responses are decoded transparently.
    ///
    /// # Errors
    ///
    /// Returns the builder error if the TLS backend cannot be initialized.
    pub fn with_connect_timeout(connect_timeout: Duration) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(user_agent::IMAGE_ACCEPT));
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static(user_agent::ACCEPT_LANGUAGE),
        );

        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .gzip(true)
            .user_agent(user_agent::BROWSER_USER_AGENT)
            .default_headers(headers)
            .build()?;
        Ok(Self { client })
    }

    /// Performs one GET attempt and reads the whole body.
    ///
    /// `timeout` bounds the attempt from connect until the last body byte.
    ///
    /// # Errors
    ///
    /// - [`AttemptError::HttpStatus`] for any non-2xx response
    /// - [`AttemptError::Timeout`] when `timeout` elapses
    /// - [`AttemptError::Network`] for transport failures, including mid-body
    pub async fn get_bytes(&self, url: &str, timeout: Duration) -> Result<FetchedBody, AttemptError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| AttemptError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            debug!(url, status = status.as_u16(), "non-success status");
            return Err(AttemptError::http_status(url, status.as_u16()));
        }

        let content_length = header_u64(response.headers(), CONTENT_LENGTH);
        let content_type = header_string(response.headers(), CONTENT_TYPE);

        let capacity = content_length
            .and_then(|len| usize::try_from(len).ok())
            .unwrap_or(0);
        let mut bytes = Vec::with_capacity(capacity);
        let mut stream = response.bytes_stream();
        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(|e| AttemptError::from_reqwest(url, e))?;
            bytes.extend_from_slice(&chunk);
        }
        trace!(url, received = bytes.len(), "body read");

        Ok(FetchedBody {
            bytes,
            content_length,
            content_type,
        })
    }

    /// Performs one HEAD request and returns the announced length and type.
    ///
    /// # Errors
    ///
    /// Same classification as [`HttpClient::get_bytes`].
    pub async fn head(&self, url: &str, timeout: Duration) -> Result<HeadInfo, AttemptError> {
        let response = self
            .client
            .head(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| AttemptError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            debug!(url, status = status.as_u16(), "HEAD non-success status");
            return Err(AttemptError::http_status(url, status.as_u16()));
        }

        Ok(HeadInfo {
            content_length: header_u64(response.headers(), CONTENT_LENGTH),
            content_type: header_string(response.headers(), CONTENT_TYPE),
        })
    }

    /// Returns a reference to the underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

fn header_u64(headers: &HeaderMap, name: HeaderName) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}

fn header_string(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(std::string::ToString::to_string)
}
