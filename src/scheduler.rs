//! Concurrent dispatch of keyword pipelines over a fixed worker budget.
//!
//! # Concurrency Model
//!
//! - Every task runs in its own Tokio task
//! - A semaphore permit bounds how many pipelines run at once
//! - Tasks whose record file is the same also take a per-file lock first, so
//!   at most one pipeline owns a record file at any time. Keywords that only
//!   differ in characters the path encoding folds ("red panda", "red_panda")
//!   share a file and therefore a lock
//! - A panicking pipeline becomes a `Failed` result; siblings keep running

use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::context::CrawlContext;
use crate::pipeline::{
    CrawlError, CrawlTaskResult, CrawlTaskSpec, ErrorStage, KeywordCrawlPipeline, ProgressSnapshot,
    TaskStatus,
};
use crate::provider::{LinkProviderError, ProviderRegistry};

/// Minimum allowed concurrency value.
pub const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
pub const MAX_CONCURRENCY: usize = 100;

/// Default worker budget.
pub const DEFAULT_MAX_WORKERS: usize = 3;

/// Error type for scheduler operations.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },
}

/// Run locks keyed by record file path.
type KeywordLocks = DashMap<PathBuf, Arc<Mutex<()>>>;

enum Dispatched {
    Running(CrawlTaskSpec, JoinHandle<CrawlTaskResult>),
    Finished(CrawlTaskResult),
}

/// Runs keyword pipelines concurrently and collects one result per task.
#[derive(Debug)]
pub struct CrawlScheduler {
    ctx: Arc<CrawlContext>,
    providers: ProviderRegistry,
    keyword_locks: Arc<KeywordLocks>,
}

impl CrawlScheduler {
    #[must_use]
    pub fn new(ctx: Arc<CrawlContext>, providers: ProviderRegistry) -> Self {
        Self {
            ctx,
            providers,
            keyword_locks: Arc::new(DashMap::new()),
        }
    }

    #[must_use]
    pub fn context(&self) -> &Arc<CrawlContext> {
        &self.ctx
    }

    /// Runs every task and returns their results in submission order.
    ///
    /// Returns only after each task reached a terminal state. Individual task
    /// failures (provider errors, panics, unregistered providers) are reported
    /// in that task's result and never surface as an `Err` here.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConcurrency`] if `max_concurrency` is
    /// outside `1..=100`. No task is started in that case.
    #[instrument(skip(self, tasks), fields(tasks = tasks.len()))]
    pub async fn run(
        &self,
        tasks: Vec<CrawlTaskSpec>,
        max_concurrency: usize,
    ) -> Result<Vec<CrawlTaskResult>, SchedulerError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&max_concurrency) {
            return Err(SchedulerError::InvalidConcurrency {
                value: max_concurrency,
            });
        }

        info!(max_concurrency, "starting crawl tasks");
        let semaphore = Arc::new(Semaphore::new(max_concurrency));
        let dispatched: Vec<Dispatched> = tasks
            .into_iter()
            .map(|spec| self.dispatch(spec, &semaphore))
            .collect();

        let mut results = Vec::with_capacity(dispatched.len());
        for task in dispatched {
            let result = match task {
                Dispatched::Finished(result) => result,
                Dispatched::Running(spec, handle) => match handle.await {
                    Ok(result) => result,
                    Err(error) => {
                        let message = if error.is_panic() {
                            format!("crawl task panicked: {}", panic_message(error.into_panic()))
                        } else {
                            "crawl task was aborted".to_string()
                        };
                        warn!(keyword = %spec.keyword, provider = %spec.provider, %message, "crawl task died");
                        self.finish_failed(&spec, CrawlError::run(ErrorStage::Scheduler, message))
                    }
                },
            };
            results.push(result);
        }

        let failed = results.iter().filter(|r| r.is_failed()).count();
        let cancelled = results
            .iter()
            .filter(|r| r.status == TaskStatus::Cancelled)
            .count();
        info!(
            total = results.len(),
            failed,
            cancelled,
            accepted = results.iter().map(|r| r.accepted_count).sum::<usize>(),
            "crawl tasks complete"
        );
        Ok(results)
    }

    fn dispatch(&self, spec: CrawlTaskSpec, semaphore: &Arc<Semaphore>) -> Dispatched {
        let Some(provider) = self.providers.get(spec.provider) else {
            let error = LinkProviderError::not_registered(spec.provider);
            warn!(keyword = %spec.keyword, error = %error, "task not started");
            return Dispatched::Finished(
                self.finish_failed(&spec, CrawlError::run(ErrorStage::Provider, error.to_string())),
            );
        };

        let lock = Arc::clone(
            self.keyword_locks
                .entry(self.ctx.records().path_for(spec.provider, &spec.keyword))
                .or_default()
                .value(),
        );
        let semaphore = Arc::clone(semaphore);
        let ctx = Arc::clone(&self.ctx);
        let task_spec = spec.clone();

        let handle = tokio::spawn(async move {
            // Record-file lock first: a task queued behind its own file must not hold a worker slot.
            let _keyword_guard = lock.lock_owned().await;
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return CrawlTaskResult::failed(
                    &task_spec,
                    CrawlError::run(ErrorStage::Scheduler, "worker pool closed"),
                );
            };
            debug!(keyword = %task_spec.keyword, provider = %task_spec.provider, "worker slot acquired");
            KeywordCrawlPipeline::new(ctx, provider, task_spec).run().await
        });

        Dispatched::Running(spec, handle)
    }

    fn finish_failed(&self, spec: &CrawlTaskSpec, error: CrawlError) -> CrawlTaskResult {
        let result = CrawlTaskResult::failed(spec, error);
        self.ctx
            .progress()
            .publish(ProgressSnapshot::finished(&result, spec.target_count));
        result
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
