//! Link provider backed by plain-text candidate lists on disk.
//!
//! Each `(provider, keyword)` pair reads `<dir>/<provider>_<keyword>.txt`. Any
//! http(s) URL found in the file is a candidate, so raw dumps of search
//! result pages work as well as one-URL-per-line lists.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;
use regex::Regex;
use tracing::{debug, instrument, trace};
use url::Url;

use super::{CandidateLinkProvider, CandidateStream, CandidateUrl, LinkProviderError, Provider};
use crate::download::sanitize_path_component;

/// Longest URL accepted as a candidate.
const MAX_URL_LENGTH: usize = 2000;

#[allow(clippy::expect_used)]
static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    // Stops at whitespace, angle brackets, quotes and closing square brackets,
    // so URLs embedded in HTML attributes or markdown come out clean.
    Regex::new(r#"https?://[^\s<>"'\]]+"#).expect("URL regex is valid") // Static pattern, safe to panic
});

/// Finds every valid http(s) URL in `input`, in order of appearance.
///
/// Malformed matches and non-http schemes are dropped. Duplicates are kept.
#[must_use]
pub fn extract_candidate_urls(input: &str) -> Vec<CandidateUrl> {
    URL_PATTERN
        .find_iter(input)
        .filter_map(|m| {
            let cleaned = clean_url_trailing(m.as_str());
            match normalize_url(cleaned) {
                Some(url) => {
                    trace!(url = %url, "candidate found");
                    Some(CandidateUrl::new(url))
                }
                None => {
                    debug!(url = %cleaned, "dropping malformed candidate");
                    None
                }
            }
        })
        .collect()
}

/// Strips sentence punctuation and unbalanced closing brackets captured at the end.
fn clean_url_trailing(url: &str) -> &str {
    let mut result = url;

    while let Some(last) = result.chars().last() {
        match last {
            '.' | ',' | ';' | ':' | '!' | '?' => {
                result = &result[..result.len() - 1];
            }
            ')' => {
                let opens = result.chars().filter(|&c| c == '(').count();
                let closes = result.chars().filter(|&c| c == ')').count();
                if closes > opens {
                    result = &result[..result.len() - 1];
                } else {
                    break;
                }
            }
            _ => break,
        }
    }

    result
}

fn normalize_url(raw: &str) -> Option<String> {
    if raw.len() > MAX_URL_LENGTH {
        return None;
    }
    let parsed = Url::parse(raw).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host().is_none() {
        return None;
    }
    Some(parsed.to_string())
}

/// Reads candidates from `<dir>/<provider>_<keyword>.txt`.
#[derive(Debug, Clone)]
pub struct FileLinkProvider {
    provider: Provider,
    dir: PathBuf,
}

impl FileLinkProvider {
    #[must_use]
    pub fn new(provider: Provider, dir: impl Into<PathBuf>) -> Self {
        Self {
            provider,
            dir: dir.into(),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Candidate list path for `keyword`.
    #[must_use]
    pub fn list_path(&self, keyword: &str) -> PathBuf {
        self.dir.join(format!(
            "{}_{}.txt",
            self.provider.as_str(),
            sanitize_path_component(keyword)
        ))
    }
}

#[async_trait]
impl CandidateLinkProvider for FileLinkProvider {
    fn provider(&self) -> Provider {
        self.provider
    }

    #[instrument(skip(self), fields(provider = %self.provider))]
    async fn next_candidates(
        &self,
        keyword: &str,
        max_count: usize,
    ) -> Result<CandidateStream, LinkProviderError> {
        let path = self.list_path(keyword);
        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| LinkProviderError::unreadable_list(path.clone(), e))?;

        let candidates = extract_candidate_urls(&text);
        debug!(path = %path.display(), count = candidates.len(), "candidate list read");

        let items = candidates.into_iter().take(max_count).map(Ok);
        Ok(stream::iter(items).boxed())
    }
}
