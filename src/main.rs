//! CLI entry point for the image crawler.

use std::io::{self, IsTerminal};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::Parser;
use image_crawler_core::{
    CrawlContext, CrawlProgress, CrawlScheduler, CrawlTaskResult, CrawlTaskSpec, FileLinkProvider,
    HttpClient, ImageFetcher, ImageValidator, Provider, ProviderRegistry, RetryPolicy,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

mod app_config;
mod cli;
mod logging;
mod progress_ui;

use app_config::CrawlerConfig;
use cli::Args;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    let loaded = app_config::load_config(args.config.as_deref())?;
    let mut config = loaded.config;
    config.apply_args(&args);
    config.validate()?;

    let log_file = config
        .log_to_file
        .then(|| logging::log_file_path(&config.logs_dir));
    logging::init_tracing(args.verbose, args.quiet, log_file.as_deref())?;

    debug!(?args, "CLI arguments parsed");
    if loaded.loaded_from_file
        && let Some(path) = &loaded.path
    {
        info!(path = %path.display(), "Loaded config file");
    }
    debug!(?config, "Effective configuration");

    let tasks = build_tasks(&args, &config)?;
    info!(
        keywords = tasks.len(),
        images_per_keyword = config.images_per_keyword,
        max_workers = config.max_workers,
        engine = %config.provider,
        "Image crawler starting"
    );

    for dir in [&config.downloads_dir, &config.records_dir] {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory '{}'", dir.display()))?;
    }

    let cancel = CancellationToken::new();
    let progress = CrawlProgress::new();
    let ctx = Arc::new(
        build_context(&config)?
            .with_cancellation(cancel.clone())
            .with_progress(progress.clone()),
    );

    let mut providers = ProviderRegistry::new();
    for provider in Provider::ALL {
        providers.register(Arc::new(FileLinkProvider::new(
            provider,
            &config.candidates_dir,
        )));
    }

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current images");
            cancel.cancel();
        }
    });

    let use_spinner = !args.quiet && io::stderr().is_terminal();
    let (spinner, stop) = progress_ui::spawn_progress_ui(use_spinner, progress, tasks.len());

    let started = Instant::now();
    let scheduler = CrawlScheduler::new(ctx, providers);
    let results = scheduler.run(tasks, config.max_workers).await?;

    if let Err(e) = progress_ui::stop_progress_ui(spinner, &stop).await {
        warn!(error = %e, "Progress spinner task failed");
    }

    for result in &results {
        log_summary(result);
    }

    let failed = results.iter().filter(|r| r.is_failed()).count();
    info!(
        tasks = results.len(),
        failed,
        accepted = results.iter().map(|r| r.accepted_count).sum::<usize>(),
        elapsed = format!("{:.1}s", started.elapsed().as_secs_f64()),
        "All crawl tasks finished"
    );
    if let Some(path) = &log_file {
        info!(path = %path.display(), "Log written");
    }

    if failed > 0 {
        error!(failed, "Some keywords could not be crawled");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn build_tasks(args: &Args, config: &CrawlerConfig) -> Result<Vec<CrawlTaskSpec>> {
    let tasks: Vec<_> = args
        .keywords
        .iter()
        .map(|keyword| keyword.trim())
        .filter(|keyword| !keyword.is_empty())
        .map(|keyword| {
            CrawlTaskSpec::new(keyword, config.images_per_keyword, config.provider)
                .with_skip(args.skip)
        })
        .collect();
    if tasks.is_empty() {
        bail!("No non-empty keywords given");
    }
    Ok(tasks)
}

fn build_context(config: &CrawlerConfig) -> Result<CrawlContext> {
    let client = HttpClient::with_connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .context("Failed to build HTTP client")?;
    let fetcher = ImageFetcher::new(
        client,
        Duration::from_secs(config.request_timeout_secs),
        RetryPolicy::new(
            config.max_attempts,
            Duration::from_millis(config.retry_delay_ms),
        ),
    );
    let validator = ImageValidator::new(config.min_width, config.min_height);
    Ok(CrawlContext::new(
        fetcher,
        validator,
        &config.downloads_dir,
        &config.records_dir,
    ))
}

fn log_summary(result: &CrawlTaskResult) {
    info!(
        keyword = %result.keyword,
        engine = %result.provider,
        status = %result.status,
        accepted = result.accepted_count,
        rejected = result.rejected_count,
        skipped = result.skipped_count,
        failed = result.failed_count,
        total_mb = format!("{:.2}", result.total_mb()),
        avg_speed_mbps = format!("{:.2}", result.average_speed_mbps()),
        elapsed = format!("{:.1}s", result.elapsed.as_secs_f64()),
        "Keyword finished"
    );
    for crawl_error in &result.errors {
        if result.is_failed() {
            warn!(keyword = %result.keyword, error = %crawl_error, "Keyword error");
        } else {
            debug!(keyword = %result.keyword, error = %crawl_error, "Keyword error");
        }
    }
}
