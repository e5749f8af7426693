//! Shared, read-only state for one scheduler invocation.

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::download::{ImageFetcher, sanitize_path_component};
use crate::pipeline::CrawlProgress;
use crate::provider::Provider;
use crate::record::DownloadRecordStore;
use crate::validate::ImageValidator;

/// Name of the rejected-image subdirectory inside a task directory.
pub const REJECTED_DIR_NAME: &str = "invalid";

/// Everything a keyword pipeline needs besides its link provider.
///
/// Built once per run and shared behind an `Arc`; nothing in it is global.
#[derive(Debug, Clone)]
pub struct CrawlContext {
    fetcher: ImageFetcher,
    validator: ImageValidator,
    downloads_dir: PathBuf,
    records: DownloadRecordStore,
    cancel: CancellationToken,
    progress: CrawlProgress,
}

impl CrawlContext {
    /// Creates a context with a fresh cancellation token and progress map.
    #[must_use]
    pub fn new(
        fetcher: ImageFetcher,
        validator: ImageValidator,
        downloads_dir: impl Into<PathBuf>,
        records_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            fetcher,
            validator,
            downloads_dir: downloads_dir.into(),
            records: DownloadRecordStore::new(records_dir),
            cancel: CancellationToken::new(),
            progress: CrawlProgress::new(),
        }
    }

    /// Uses `token` so an outside caller (e.g. a Ctrl-C handler) can stop the run.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Publishes progress into a map the caller already holds.
    #[must_use]
    pub fn with_progress(mut self, progress: CrawlProgress) -> Self {
        self.progress = progress;
        self
    }

    #[must_use]
    pub fn fetcher(&self) -> &ImageFetcher {
        &self.fetcher
    }

    #[must_use]
    pub fn validator(&self) -> &ImageValidator {
        &self.validator
    }

    #[must_use]
    pub fn records(&self) -> &DownloadRecordStore {
        &self.records
    }

    #[must_use]
    pub fn downloads_dir(&self) -> &Path {
        &self.downloads_dir
    }

    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    #[must_use]
    pub fn progress(&self) -> &CrawlProgress {
        &self.progress
    }

    /// `<downloads_dir>/<provider>_<keyword>`, where accepted images go.
    #[must_use]
    pub fn task_dir(&self, provider: Provider, keyword: &str) -> PathBuf {
        self.downloads_dir.join(format!(
            "{}_{}",
            provider.as_str(),
            sanitize_path_component(keyword)
        ))
    }

    /// `<task_dir>/invalid`, where below-threshold images go.
    #[must_use]
    pub fn rejected_dir(&self, provider: Provider, keyword: &str) -> PathBuf {
        self.task_dir(provider, keyword).join(REJECTED_DIR_NAME)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::download::HttpClient;

    fn context() -> CrawlContext {
        CrawlContext::new(
            ImageFetcher::with_defaults(HttpClient::new().unwrap()),
            ImageValidator::default(),
            "/data/downloads",
            "/data/records",
        )
    }

    #[test]
    fn test_task_directories() {
        let ctx = context();
        assert_eq!(
            ctx.task_dir(Provider::Baidu, "red panda"),
            PathBuf::from("/data/downloads/baidu_red_panda")
        );
        assert_eq!(
            ctx.rejected_dir(Provider::Bing, "cat"),
            PathBuf::from("/data/downloads/bing_cat/invalid")
        );
        assert_eq!(ctx.records().records_dir(), Path::new("/data/records"));
    }

    #[test]
    fn test_with_cancellation_shares_token() {
        let token = CancellationToken::new();
        let ctx = context().with_cancellation(token.clone());
        assert!(!ctx.cancellation().is_cancelled());
        token.cancel();
        assert!(ctx.cancellation().is_cancelled());
    }
}
