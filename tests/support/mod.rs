//! Shared helpers for integration tests: in-memory test images, fast
//! fetchers, crawl contexts rooted in a temp dir, and flaky HTTP responders.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use image::{ImageBuffer, ImageFormat, Rgb};
use image_crawler_core::{CrawlContext, HttpClient, ImageFetcher, ImageValidator, RetryPolicy};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Respond, ResponseTemplate};

/// Minimum dimension used by crawl tests.
pub const MIN_DIMENSION: u32 = 512;

/// Encodes a solid-colour PNG of the given size.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = ImageBuffer::from_pixel(width, height, Rgb([40u8, 120, 200]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)
        .expect("PNG encoding succeeds");
    out.into_inner()
}

/// Fetcher with a 1ms retry pause so retry tests run fast.
pub fn fast_fetcher(max_attempts: u32) -> ImageFetcher {
    ImageFetcher::new(
        HttpClient::new().expect("HTTP client builds"),
        Duration::from_secs(5),
        RetryPolicy::new(max_attempts, Duration::from_millis(1)),
    )
}

/// Crawl context with downloads and records under `temp`.
pub fn test_context(temp: &TempDir, max_attempts: u32) -> CrawlContext {
    CrawlContext::new(
        fast_fetcher(max_attempts),
        ImageValidator::new(MIN_DIMENSION, MIN_DIMENSION),
        temp.path().join("downloads"),
        temp.path().join("records"),
    )
}

/// Serves `body` at `route`, asserting it is requested exactly `times` times.
pub async fn mount_image(server: &MockServer, route: &str, body: Vec<u8>, times: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(body),
        )
        .expect(times)
        .mount(server)
        .await;
}

/// Number of regular files directly inside `dir` (0 if it doesn't exist).
pub fn count_files(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter(|e| e.path().is_file())
                .count()
        })
        .unwrap_or(0)
}

/// Fails the first `fail_count` requests with 500, then serves `success_body`.
pub struct FlakyResponder {
    pub request_count: Arc<AtomicUsize>,
    pub fail_count: usize,
    pub success_body: Vec<u8>,
}

impl FlakyResponder {
    pub fn new(fail_count: usize, success_body: Vec<u8>) -> Self {
        Self {
            request_count: Arc::new(AtomicUsize::new(0)),
            fail_count,
            success_body,
        }
    }
}

impl Respond for FlakyResponder {
    fn respond(&self, _request: &wiremock::Request) -> ResponseTemplate {
        let n = self.request_count.fetch_add(1, Ordering::SeqCst);
        if n < self.fail_count {
            ResponseTemplate::new(500).set_body_bytes(b"internal server error")
        } else {
            ResponseTemplate::new(200).set_body_bytes(self.success_body.clone())
        }
    }
}
