//! Candidate image URL sources, one per search backend.
//!
//! How a backend discovers image links (page scraping, scrolling, APIs) is
//! entirely behind [`CandidateLinkProvider`]; the crawl pipeline only consumes
//! the resulting stream.
//!
//! - [`Provider`] - Supported search backends
//! - [`CandidateLinkProvider`] - Async trait every backend implements
//! - [`ProviderRegistry`] - Backend → provider lookup used by the scheduler
//! - [`StaticLinkProvider`] - In-memory candidate lists
//! - [`FileLinkProvider`] - Candidate lists read from text files

mod error;
mod file;
pub mod filter;
mod static_links;

pub use error::{LinkProviderError, ParseProviderError};
pub use file::{FileLinkProvider, extract_candidate_urls};
pub use static_links::StaticLinkProvider;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

/// Supported image search backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Provider {
    Baidu,
    Bing,
    Google,
}

impl Provider {
    /// All backends, in display order.
    pub const ALL: [Provider; 3] = [Provider::Baidu, Provider::Bing, Provider::Google];

    /// Lowercase name used in paths and record file names.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Baidu => "baidu",
            Self::Bing => "bing",
            Self::Google => "google",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = ParseProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "baidu" => Ok(Self::Baidu),
            "bing" => Ok(Self::Bing),
            "google" => Ok(Self::Google),
            _ => Err(ParseProviderError(s.to_string())),
        }
    }
}

/// A URL believed to point at a full-resolution image, not yet fetched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandidateUrl(String);

impl CandidateUrl {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CandidateUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CandidateUrl {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

impl From<String> for CandidateUrl {
    fn from(url: String) -> Self {
        Self(url)
    }
}

/// Finite, lazily produced sequence of candidates. An `Err` item ends the run.
pub type CandidateStream = BoxStream<'static, Result<CandidateUrl, LinkProviderError>>;

/// Produces candidate image URLs for a keyword on one search backend.
///
/// Candidates may repeat; deduplication is the consumer's job. A stream is
/// not restartable: getting candidates again means issuing a new search.
///
/// Uses `async_trait` so providers can live behind `Arc<dyn CandidateLinkProvider>`.
#[async_trait]
pub trait CandidateLinkProvider: Send + Sync {
    /// Backend this provider searches.
    fn provider(&self) -> Provider;

    /// Starts a search for `keyword`, yielding at most `max_count` candidates.
    ///
    /// `max_count` is an upper bound the backend may use to stop early; the
    /// consumer stops pulling once it has what it needs.
    async fn next_candidates(
        &self,
        keyword: &str,
        max_count: usize,
    ) -> Result<CandidateStream, LinkProviderError>;
}

/// Registered link providers, keyed by backend.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<Provider, Arc<dyn CandidateLinkProvider>>,
}

impl ProviderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `provider` under its own backend, replacing any previous one.
    pub fn register(&mut self, provider: Arc<dyn CandidateLinkProvider>) {
        self.providers.insert(provider.provider(), provider);
    }

    /// Builder-style [`register`](Self::register).
    #[must_use]
    pub fn with(mut self, provider: Arc<dyn CandidateLinkProvider>) -> Self {
        self.register(provider);
        self
    }

    #[must_use]
    pub fn get(&self, provider: Provider) -> Option<Arc<dyn CandidateLinkProvider>> {
        self.providers.get(&provider).cloned()
    }

    #[must_use]
    pub fn contains(&self, provider: Provider) -> bool {
        self.providers.contains_key(&provider)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut registered: Vec<_> = self.providers.keys().copied().collect();
        registered.sort();
        f.debug_struct("ProviderRegistry")
            .field("providers", &registered)
            .finish()
    }
}
