//! Inputs and outputs of one keyword crawl run.

use std::fmt;
use std::time::Duration;

use crate::download::constants::BYTES_PER_MB;
use crate::provider::Provider;

/// What to crawl. Immutable for the lifetime of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTaskSpec {
    /// Search keyword.
    pub keyword: String,
    /// Number of accepted images to stop at.
    pub target_count: usize,
    /// Search backend.
    pub provider: Provider,
    /// Leading candidates to discard before processing.
    pub skip: usize,
}

impl CrawlTaskSpec {
    #[must_use]
    pub fn new(keyword: impl Into<String>, target_count: usize, provider: Provider) -> Self {
        Self {
            keyword: keyword.into(),
            target_count,
            provider,
            skip: 0,
        }
    }

    #[must_use]
    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }
}

/// Terminal status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Candidates exhausted or target reached. Per-item failures may be present.
    Done,
    /// The link provider failed, or the run could not be carried out at all.
    Failed,
    /// Stopped early by the cancellation signal.
    Cancelled,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        })
    }
}

/// Where in the run an error happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStage {
    Provider,
    Records,
    Fetch,
    Decode,
    Write,
    Scheduler,
}

impl fmt::Display for ErrorStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Provider => "provider",
            Self::Records => "records",
            Self::Fetch => "fetch",
            Self::Decode => "decode",
            Self::Write => "write",
            Self::Scheduler => "scheduler",
        })
    }
}

/// One error observed during a run, with enough context to reproduce it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlError {
    pub stage: ErrorStage,
    /// Candidate being processed, when the error concerns a single item.
    pub url: Option<String>,
    pub message: String,
}

impl CrawlError {
    pub fn new(stage: ErrorStage, url: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            stage,
            url: url.map(ToString::to_string),
            message: message.into(),
        }
    }

    /// Error tied to one candidate URL.
    pub fn item(stage: ErrorStage, url: &str, message: impl Into<String>) -> Self {
        Self::new(stage, Some(url), message)
    }

    /// Error affecting the run as a whole.
    pub fn run(stage: ErrorStage, message: impl Into<String>) -> Self {
        Self::new(stage, None, message)
    }
}

impl fmt::Display for CrawlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.url {
            Some(url) => write!(f, "[{}] {url}: {}", self.stage, self.message),
            None => write!(f, "[{}] {}", self.stage, self.message),
        }
    }
}

/// Outcome of one keyword run, produced exactly once per submitted task.
#[derive(Debug, Clone)]
pub struct CrawlTaskResult {
    pub keyword: String,
    pub provider: Provider,
    pub status: TaskStatus,
    /// Images saved and recorded.
    pub accepted_count: usize,
    /// Images decoded but below the size threshold.
    pub rejected_count: usize,
    /// Candidates dropped without fetching (recorded, repeated, placeholder, size hint).
    pub skipped_count: usize,
    /// Candidates that failed to fetch, decode, or be saved as accepted images.
    pub failed_count: usize,
    /// Bytes fetched successfully over the run.
    pub total_bytes: u64,
    pub elapsed: Duration,
    /// Errors in the order they occurred.
    pub errors: Vec<CrawlError>,
}

impl CrawlTaskResult {
    /// Zeroed result for `spec`, in the `Done` state.
    #[must_use]
    pub fn empty(spec: &CrawlTaskSpec) -> Self {
        Self {
            keyword: spec.keyword.clone(),
            provider: spec.provider,
            status: TaskStatus::Done,
            accepted_count: 0,
            rejected_count: 0,
            skipped_count: 0,
            failed_count: 0,
            total_bytes: 0,
            elapsed: Duration::ZERO,
            errors: Vec::new(),
        }
    }

    /// Failed result carrying a single run-level error.
    #[must_use]
    pub fn failed(spec: &CrawlTaskSpec, error: CrawlError) -> Self {
        let mut result = Self::empty(spec);
        result.status = TaskStatus::Failed;
        result.errors.push(error);
        result
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.status == TaskStatus::Failed
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn total_mb(&self) -> f64 {
        self.total_bytes as f64 / BYTES_PER_MB
    }

    /// Average throughput over the whole run, in MB/s.
    #[must_use]
    pub fn average_speed_mbps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 { self.total_mb() / secs } else { 0.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_defaults_to_no_skip() {
        let spec = CrawlTaskSpec::new("cat", 10, Provider::Baidu);
        assert_eq!(spec.skip, 0);
        assert_eq!(spec.with_skip(5).skip, 5);
    }

    #[test]
    fn test_crawl_error_display() {
        let item = CrawlError::item(ErrorStage::Fetch, "https://a.test/1.jpg", "timed out");
        assert_eq!(item.to_string(), "[fetch] https://a.test/1.jpg: timed out");
        let run = CrawlError::run(ErrorStage::Provider, "blocked");
        assert_eq!(run.to_string(), "[provider] blocked");
    }

    #[test]
    fn test_failed_result_has_single_error() {
        let spec = CrawlTaskSpec::new("cat", 10, Provider::Bing);
        let result = CrawlTaskResult::failed(&spec, CrawlError::run(ErrorStage::Scheduler, "panicked"));
        assert!(result.is_failed());
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.accepted_count, 0);
    }

    #[test]
    fn test_average_speed() {
        let spec = CrawlTaskSpec::new("cat", 10, Provider::Bing);
        let mut result = CrawlTaskResult::empty(&spec);
        assert!(result.average_speed_mbps().abs() < f64::EPSILON);

        result.total_bytes = 4 * 1024 * 1024;
        result.elapsed = Duration::from_secs(2);
        assert!((result.total_mb() - 4.0).abs() < 1e-9);
        assert!((result.average_speed_mbps() - 2.0).abs() < 1e-9);
    }
}
