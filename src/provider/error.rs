//! Error types for candidate link providers.

use std::path::PathBuf;

use thiserror::Error;

use super::Provider;

/// A link provider could not produce candidates for a keyword.
///
/// Any of these ends the keyword's run in the failed state.
#[derive(Debug, Error)]
pub enum LinkProviderError {
    /// The search backend failed (navigation, blocked page, unexpected layout).
    #[error("{provider} search for '{keyword}' failed: {reason}")]
    Search {
        /// Backend that failed.
        provider: Provider,
        /// Keyword being searched.
        keyword: String,
        /// Provider-specific description.
        reason: String,
    },

    /// A candidate list file could not be read.
    #[error("failed to read candidate list {path}: {source}")]
    Source {
        /// Candidate list path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// No provider is registered for the requested backend.
    #[error("no link provider registered for {provider}")]
    NotRegistered {
        /// Requested backend.
        provider: Provider,
    },
}

impl LinkProviderError {
    pub fn search(provider: Provider, keyword: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Search {
            provider,
            keyword: keyword.into(),
            reason: reason.into(),
        }
    }

    pub fn unreadable_list(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Source {
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn not_registered(provider: Provider) -> Self {
        Self::NotRegistered { provider }
    }
}

/// A provider name did not match any supported backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown provider '{0}' (expected one of: baidu, bing, google)")]
pub struct ParseProviderError(pub String);
