//! In-memory link provider with fixed per-keyword candidate lists.

use std::collections::HashMap;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;

use super::{CandidateLinkProvider, CandidateStream, CandidateUrl, LinkProviderError, Provider};

#[derive(Debug, Clone, Default)]
struct KeywordScript {
    candidates: Vec<CandidateUrl>,
    fail_on_search: Option<String>,
    fail_after_candidates: Option<String>,
}

/// Serves preconfigured candidates and scripted failures.
///
/// Keywords without a script yield an empty stream.
#[derive(Debug, Clone)]
pub struct StaticLinkProvider {
    provider: Provider,
    scripts: HashMap<String, KeywordScript>,
}

impl StaticLinkProvider {
    #[must_use]
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            scripts: HashMap::new(),
        }
    }

    /// Candidates yielded for `keyword`, in order.
    #[must_use]
    pub fn with_candidates<I, U>(mut self, keyword: &str, candidates: I) -> Self
    where
        I: IntoIterator<Item = U>,
        U: Into<CandidateUrl>,
    {
        self.scripts.entry(keyword.to_string()).or_default().candidates =
            candidates.into_iter().map(Into::into).collect();
        self
    }

    /// Searching `keyword` fails before any candidate is produced.
    #[must_use]
    pub fn with_search_failure(mut self, keyword: &str, reason: &str) -> Self {
        self.scripts.entry(keyword.to_string()).or_default().fail_on_search = Some(reason.to_string());
        self
    }

    /// The stream for `keyword` ends with an error after its candidates.
    #[must_use]
    pub fn with_trailing_failure(mut self, keyword: &str, reason: &str) -> Self {
        self.scripts.entry(keyword.to_string()).or_default().fail_after_candidates =
            Some(reason.to_string());
        self
    }
}

#[async_trait]
impl CandidateLinkProvider for StaticLinkProvider {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn next_candidates(
        &self,
        keyword: &str,
        max_count: usize,
    ) -> Result<CandidateStream, LinkProviderError> {
        let script = self.scripts.get(keyword).cloned().unwrap_or_default();
        if let Some(reason) = script.fail_on_search {
            return Err(LinkProviderError::search(self.provider, keyword, reason));
        }

        let mut items: Vec<Result<CandidateUrl, LinkProviderError>> =
            script.candidates.into_iter().take(max_count).map(Ok).collect();
        if let Some(reason) = script.fail_after_candidates {
            items.push(Err(LinkProviderError::search(self.provider, keyword, reason)));
        }
        Ok(stream::iter(items).boxed())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use futures_util::TryStreamExt;

    #[tokio::test]
    async fn test_yields_candidates_in_order_up_to_max() {
        let provider = StaticLinkProvider::new(Provider::Baidu)
            .with_candidates("cat", ["https://a.test/1.jpg", "https://a.test/2.jpg", "https://a.test/3.jpg"]);

        let urls: Vec<CandidateUrl> = provider
            .next_candidates("cat", 2)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(urls, vec![CandidateUrl::from("https://a.test/1.jpg"), CandidateUrl::from("https://a.test/2.jpg")]);
    }

    #[tokio::test]
    async fn test_unknown_keyword_is_empty() {
        let provider = StaticLinkProvider::new(Provider::Bing);
        let urls: Vec<CandidateUrl> = provider
            .next_candidates("nothing", 10)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert!(urls.is_empty());
    }

    #[tokio::test]
    async fn test_search_failure() {
        let provider = StaticLinkProvider::new(Provider::Google).with_search_failure("cat", "blocked");
        assert!(matches!(
            provider.next_candidates("cat", 10).await,
            Err(LinkProviderError::Search { .. })
        ));
    }

    #[tokio::test]
    async fn test_trailing_failure_follows_candidates() {
        let provider = StaticLinkProvider::new(Provider::Google)
            .with_candidates("cat", ["https://a.test/1.jpg"])
            .with_trailing_failure("cat", "page crashed");

        let items: Vec<_> = provider.next_candidates("cat", 10).await.unwrap().collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
    }
}
