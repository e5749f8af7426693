//! Image Crawler Core Library
//!
//! Download orchestration for keyword image crawls: many keywords run
//! concurrently, each one pulls candidate URLs from a search backend, skips
//! what was already downloaded, and fetches, validates, and stores the rest.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`provider`] - Candidate link providers per search backend
//! - [`record`] - Persisted per-keyword record of downloaded URLs
//! - [`download`] - HTTP fetching with fixed-backoff retries
//! - [`validate`] - Decoding and minimum-dimension checks
//! - [`pipeline`] - Per-keyword fetch/validate/record loop
//! - [`scheduler`] - Bounded concurrent dispatch of keyword pipelines
//! - [`context`] - Shared state for one scheduler invocation

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod context;
pub mod download;
pub mod pipeline;
pub mod provider;
pub mod record;
pub mod scheduler;
pub mod user_agent;
pub mod validate;

// Re-export commonly used types
pub use context::CrawlContext;
pub use download::{FetchError, FetchResult, HttpClient, ImageFetcher, RetryPolicy};
pub use pipeline::{
    CrawlError, CrawlProgress, CrawlTaskResult, CrawlTaskSpec, ErrorStage, KeywordCrawlPipeline,
    PipelineState, TaskStatus,
};
pub use provider::{
    CandidateLinkProvider, CandidateUrl, FileLinkProvider, LinkProviderError, Provider,
    ProviderRegistry, StaticLinkProvider,
};
pub use record::{DownloadRecord, DownloadRecordStore, RecordStoreError};
pub use scheduler::{CrawlScheduler, DEFAULT_MAX_WORKERS, SchedulerError};
pub use validate::{DecodeError, ImageValidator, ValidationOutcome};
