//! Integration tests for KeywordCrawlPipeline against a mock image server.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;
use image_crawler_core::provider::CandidateStream;
use image_crawler_core::{
    CandidateLinkProvider, CandidateUrl, CrawlContext, CrawlTaskSpec, ErrorStage,
    KeywordCrawlPipeline, LinkProviderError, Provider, StaticLinkProvider, TaskStatus,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod support;
use support::{count_files, mount_image, png_bytes, test_context};

fn run_pipeline(
    ctx: &Arc<CrawlContext>,
    provider: impl CandidateLinkProvider + 'static,
    spec: CrawlTaskSpec,
) -> impl std::future::Future<Output = image_crawler_core::CrawlTaskResult> {
    KeywordCrawlPipeline::new(Arc::clone(ctx), Arc::new(provider), spec).run()
}

// ==================== End-to-End ====================

#[tokio::test]
async fn test_end_to_end_accepts_and_rejects_by_size() {
    let server = MockServer::start().await;
    mount_image(&server, "/u1.png", png_bytes(256, 256), 1).await;
    mount_image(&server, "/u2.png", png_bytes(600, 600), 1).await;
    mount_image(&server, "/u3.png", png_bytes(700, 700), 1).await;
    let urls: Vec<String> = ["u1", "u2", "u3"]
        .iter()
        .map(|name| format!("{}/{name}.png", server.uri()))
        .collect();

    let temp = TempDir::new().unwrap();
    let ctx = Arc::new(test_context(&temp, 1));
    let provider = StaticLinkProvider::new(Provider::Baidu).with_candidates("x", urls.clone());

    let result = run_pipeline(&ctx, provider, CrawlTaskSpec::new("x", 2, Provider::Baidu)).await;

    assert_eq!(result.status, TaskStatus::Done);
    assert_eq!(result.accepted_count, 2);
    assert_eq!(result.rejected_count, 1);
    assert_eq!(result.failed_count, 0);
    assert!(result.errors.is_empty(), "unexpected errors: {:?}", result.errors);
    assert!(result.total_bytes > 0);

    let records = ctx.records().load(Provider::Baidu, "x").await.unwrap();
    assert_eq!(records.len(), 2);
    assert!(!records.contains(&urls[0]), "rejected image must not be recorded");
    assert!(records.contains(&urls[1]));
    assert!(records.contains(&urls[2]));

    let task_dir = ctx.task_dir(Provider::Baidu, "x");
    assert_eq!(count_files(&task_dir), 2);
    assert_eq!(count_files(&ctx.rejected_dir(Provider::Baidu, "x")), 1);

    let saved = records.get(&urls[1]).unwrap();
    assert!(task_dir.join(&saved.saved_filename).is_file());
    assert!(saved.saved_filename.ends_with(".png"));
}

#[tokio::test]
async fn test_second_run_performs_no_fetches() {
    let server = MockServer::start().await;
    // Each image may be requested once across both runs.
    mount_image(&server, "/a.png", png_bytes(600, 600), 1).await;
    mount_image(&server, "/b.png", png_bytes(640, 520), 1).await;
    let urls = vec![
        format!("{}/a.png", server.uri()),
        format!("{}/b.png", server.uri()),
    ];

    let temp = TempDir::new().unwrap();
    let ctx = Arc::new(test_context(&temp, 1));
    let spec = CrawlTaskSpec::new("cat", 2, Provider::Bing);

    let provider = StaticLinkProvider::new(Provider::Bing).with_candidates("cat", urls.clone());
    let first = run_pipeline(&ctx, provider.clone(), spec.clone()).await;
    assert_eq!(first.accepted_count, 2);

    let second = run_pipeline(&ctx, provider, spec).await;
    assert_eq!(second.status, TaskStatus::Done);
    assert_eq!(second.accepted_count, 0);
    assert_eq!(second.skipped_count, 2);
    assert_eq!(second.total_bytes, 0);
}

#[tokio::test]
async fn test_records_survive_a_new_context() {
    let server = MockServer::start().await;
    mount_image(&server, "/a.png", png_bytes(600, 600), 1).await;
    let url = format!("{}/a.png", server.uri());

    let temp = TempDir::new().unwrap();
    let provider = StaticLinkProvider::new(Provider::Google).with_candidates("cat", [url.as_str()]);
    let spec = CrawlTaskSpec::new("cat", 1, Provider::Google);

    let first = run_pipeline(&Arc::new(test_context(&temp, 1)), provider.clone(), spec.clone()).await;
    assert_eq!(first.accepted_count, 1);

    // Fresh context over the same directories, as after a process restart.
    let second = run_pipeline(&Arc::new(test_context(&temp, 1)), provider, spec).await;
    assert_eq!(second.skipped_count, 1);
    assert_eq!(second.accepted_count, 0);
}

// ==================== Candidate Handling ====================

#[tokio::test]
async fn test_stops_once_target_is_met() {
    let server = MockServer::start().await;
    mount_image(&server, "/first.png", png_bytes(600, 600), 1).await;
    mount_image(&server, "/second.png", png_bytes(600, 600), 0).await;
    let urls = vec![
        format!("{}/first.png", server.uri()),
        format!("{}/second.png", server.uri()),
    ];

    let temp = TempDir::new().unwrap();
    let ctx = Arc::new(test_context(&temp, 1));
    let provider = StaticLinkProvider::new(Provider::Baidu).with_candidates("cat", urls);

    let result = run_pipeline(&ctx, provider, CrawlTaskSpec::new("cat", 1, Provider::Baidu)).await;
    assert_eq!(result.accepted_count, 1);
    assert_eq!(result.status, TaskStatus::Done);
}

#[tokio::test]
async fn test_repeated_candidates_are_fetched_once() {
    let server = MockServer::start().await;
    mount_image(&server, "/small.png", png_bytes(100, 100), 1).await;
    let url = format!("{}/small.png", server.uri());

    let temp = TempDir::new().unwrap();
    let ctx = Arc::new(test_context(&temp, 1));
    let provider = StaticLinkProvider::new(Provider::Baidu)
        .with_candidates("cat", [url.as_str(), url.as_str(), url.as_str()]);

    let result = run_pipeline(&ctx, provider, CrawlTaskSpec::new("cat", 5, Provider::Baidu)).await;
    assert_eq!(result.rejected_count, 1);
    assert_eq!(result.skipped_count, 2);
}

#[tokio::test]
async fn test_fetch_and_decode_failures_do_not_stop_the_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone.png"))
        .respond_with(ResponseTemplate::new(404))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page.html"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string("<html><body>not an image</body></html>"),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_image(&server, "/good.png", png_bytes(600, 600), 1).await;

    let gone = format!("{}/gone.png", server.uri());
    let page = format!("{}/page.html", server.uri());
    let good = format!("{}/good.png", server.uri());

    let temp = TempDir::new().unwrap();
    let ctx = Arc::new(test_context(&temp, 2));
    let provider = StaticLinkProvider::new(Provider::Baidu)
        .with_candidates("cat", [gone.as_str(), page.as_str(), good.as_str()]);

    let result = run_pipeline(&ctx, provider, CrawlTaskSpec::new("cat", 1, Provider::Baidu)).await;

    assert_eq!(result.status, TaskStatus::Done);
    assert_eq!(result.accepted_count, 1);
    assert_eq!(result.failed_count, 2);
    assert_eq!(result.errors.len(), 2);
    assert_eq!(result.errors[0].stage, ErrorStage::Fetch);
    assert_eq!(result.errors[0].url.as_deref(), Some(gone.as_str()));
    assert_eq!(result.errors[1].stage, ErrorStage::Decode);
    assert_eq!(result.errors[1].url.as_deref(), Some(page.as_str()));

    let records = ctx.records().load(Provider::Baidu, "cat").await.unwrap();
    assert_eq!(records.len(), 1);
    assert!(records.contains(&good));
}

#[tokio::test]
async fn test_provider_failure_after_progress_fails_run() {
    let server = MockServer::start().await;
    mount_image(&server, "/a.png", png_bytes(600, 600), 1).await;
    let url = format!("{}/a.png", server.uri());

    let temp = TempDir::new().unwrap();
    let ctx = Arc::new(test_context(&temp, 1));
    let provider = StaticLinkProvider::new(Provider::Google)
        .with_candidates("cat", [url.as_str()])
        .with_trailing_failure("cat", "results page stopped loading");

    let result = run_pipeline(&ctx, provider, CrawlTaskSpec::new("cat", 5, Provider::Google)).await;

    assert_eq!(result.status, TaskStatus::Failed);
    assert_eq!(result.accepted_count, 1);
    let last = result.errors.last().unwrap();
    assert_eq!(last.stage, ErrorStage::Provider);
    assert!(last.message.contains("results page stopped loading"));

    // Progress made before the failure is kept.
    let records = ctx.records().load(Provider::Google, "cat").await.unwrap();
    assert!(records.contains(&url));
}

#[tokio::test]
async fn test_bing_candidates_announced_as_non_images_are_never_downloaded() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/landing.jpg"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "text/html"))
        .expect(1)
        .mount(&server)
        .await;
    mount_image(&server, "/landing.jpg", png_bytes(600, 600), 0).await;
    // No HEAD support: the candidate still goes through the normal GET.
    Mock::given(method("HEAD"))
        .and(path("/photo.png"))
        .respond_with(ResponseTemplate::new(405))
        .expect(1)
        .mount(&server)
        .await;
    mount_image(&server, "/photo.png", png_bytes(600, 600), 1).await;

    let landing = format!("{}/landing.jpg", server.uri());
    let photo = format!("{}/photo.png", server.uri());

    let temp = TempDir::new().unwrap();
    let ctx = Arc::new(test_context(&temp, 1));
    let provider = StaticLinkProvider::new(Provider::Bing)
        .with_candidates("cat", [landing.as_str(), photo.as_str()]);

    let result = run_pipeline(&ctx, provider, CrawlTaskSpec::new("cat", 1, Provider::Bing)).await;

    assert_eq!(result.status, TaskStatus::Done);
    assert_eq!(result.skipped_count, 1);
    assert_eq!(result.accepted_count, 1);
    assert_eq!(result.failed_count, 0);
    let records = ctx.records().load(Provider::Bing, "cat").await.unwrap();
    assert!(!records.contains(&landing));
    assert!(records.contains(&photo));
}

#[tokio::test]
async fn test_other_providers_skip_the_head_request() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "text/html"))
        .expect(0)
        .mount(&server)
        .await;
    mount_image(&server, "/a.png", png_bytes(600, 600), 1).await;
    let url = format!("{}/a.png", server.uri());

    let temp = TempDir::new().unwrap();
    let ctx = Arc::new(test_context(&temp, 1));
    let provider = StaticLinkProvider::new(Provider::Baidu).with_candidates("cat", [url.as_str()]);

    let result = run_pipeline(&ctx, provider, CrawlTaskSpec::new("cat", 1, Provider::Baidu)).await;
    assert_eq!(result.accepted_count, 1);
}

// ==================== Cancellation ====================

/// Cancels `token` as soon as the first candidate is handed out.
struct CancelAfterFirst {
    urls: Vec<String>,
    token: CancellationToken,
}

#[async_trait]
impl CandidateLinkProvider for CancelAfterFirst {
    fn provider(&self) -> Provider {
        Provider::Baidu
    }

    async fn next_candidates(
        &self,
        _keyword: &str,
        _max_count: usize,
    ) -> Result<CandidateStream, LinkProviderError> {
        let token = self.token.clone();
        let items = self.urls.clone().into_iter().enumerate().map(move |(index, url)| {
            if index == 0 {
                token.cancel();
            }
            Ok(CandidateUrl::new(url))
        });
        Ok(stream::iter(items).boxed())
    }
}

#[tokio::test]
async fn test_cancellation_is_observed_between_candidates() {
    let server = MockServer::start().await;
    mount_image(&server, "/a.png", png_bytes(600, 600), 1).await;
    mount_image(&server, "/b.png", png_bytes(600, 600), 0).await;

    let temp = TempDir::new().unwrap();
    let token = CancellationToken::new();
    let ctx = Arc::new(test_context(&temp, 1).with_cancellation(token.clone()));
    let provider = CancelAfterFirst {
        urls: vec![
            format!("{}/a.png", server.uri()),
            format!("{}/b.png", server.uri()),
        ],
        token,
    };

    let result = run_pipeline(&ctx, provider, CrawlTaskSpec::new("cat", 5, Provider::Baidu)).await;

    assert_eq!(result.status, TaskStatus::Cancelled);
    assert_eq!(result.accepted_count, 1, "in-flight candidate completes");
    assert!(result.errors.is_empty());
}
