//! HTTP acquisition of candidate images.
//!
//! # Features
//!
//! - One GET per [`HttpClient::get_bytes`] call, body read fully into memory
//! - [`ImageFetcher`] retries every failed attempt with a fixed pause
//! - Size and elapsed time captured for throughput reporting
//! - Collision-safe writes of image bytes ([`write_unique`])
//!
//! # Example
//!
//! ```no_run
//! use image_crawler_core::download::{HttpClient, ImageFetcher};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = ImageFetcher::with_defaults(HttpClient::new()?);
//! let fetched = fetcher.fetch("https://example.com/cat.jpg").await?;
//! println!("{:.2} MB/s", fetched.speed_mbps());
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod error;
mod fetcher;
pub mod filename;
mod retry;

pub use client::{FetchedBody, HeadInfo, HttpClient};
pub use error::{AttemptError, FetchError};
pub use fetcher::{FetchResult, ImageFetcher};
pub use filename::{sanitize_path_component, write_unique};
pub use retry::{DEFAULT_MAX_ATTEMPTS, RetryDecision, RetryPolicy};
