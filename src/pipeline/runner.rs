//! Sequential fetch/validate/record loop for one keyword.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tracing::{debug, info, instrument, warn};

use super::PipelineState;
use super::progress::{EtaTracker, ProgressSnapshot};
use super::task::{CrawlError, CrawlTaskResult, CrawlTaskSpec, ErrorStage, TaskStatus};
use crate::context::CrawlContext;
use crate::download::write_unique;
use crate::provider::{CandidateLinkProvider, CandidateUrl, LinkProviderError, filter};
use crate::record::KeywordRecords;
use crate::validate::ValidationOutcome;

/// Candidates requested per wanted image, leaving room for repeats, rejects and failures.
const CANDIDATE_HEADROOM: usize = 3;

/// Runs one [`CrawlTaskSpec`] to a terminal state.
///
/// Candidates are handled strictly in provider order, one at a time, so the
/// in-memory record mapping is the single source of truth for deduplication
/// during the run.
pub struct KeywordCrawlPipeline {
    ctx: Arc<CrawlContext>,
    provider: Arc<dyn CandidateLinkProvider>,
    spec: CrawlTaskSpec,
    state: PipelineState,
    result: CrawlTaskResult,
    eta: EtaTracker,
}

impl fmt::Debug for KeywordCrawlPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeywordCrawlPipeline")
            .field("spec", &self.spec)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl KeywordCrawlPipeline {
    #[must_use]
    pub fn new(
        ctx: Arc<CrawlContext>,
        provider: Arc<dyn CandidateLinkProvider>,
        spec: CrawlTaskSpec,
    ) -> Self {
        let result = CrawlTaskResult::empty(&spec);
        let eta = EtaTracker::start(spec.target_count);
        Self {
            ctx,
            provider,
            spec,
            state: PipelineState::Init,
            result,
            eta,
        }
    }

    #[must_use]
    pub fn spec(&self) -> &CrawlTaskSpec {
        &self.spec
    }

    /// Crawls until the target is met, candidates run out, the provider
    /// fails, or cancellation is requested. Never panics on item errors.
    #[instrument(skip(self), fields(keyword = %self.spec.keyword, provider = %self.spec.provider))]
    pub async fn run(mut self) -> CrawlTaskResult {
        info!(
            target = self.spec.target_count,
            skip = self.spec.skip,
            "keyword crawl started"
        );

        let status = self.crawl().await;
        self.result.status = status;
        self.result.elapsed = self.eta.elapsed();
        self.set_state(status.into());

        info!(
            status = %status,
            accepted = self.result.accepted_count,
            rejected = self.result.rejected_count,
            skipped = self.result.skipped_count,
            failed = self.result.failed_count,
            total_mb = format!("{:.2}", self.result.total_mb()),
            avg_speed_mbps = format!("{:.2}", self.result.average_speed_mbps()),
            elapsed_ms = u64::try_from(self.result.elapsed.as_millis()).unwrap_or(u64::MAX),
            "keyword crawl finished"
        );
        self.result
    }

    async fn crawl(&mut self) -> TaskStatus {
        self.set_state(PipelineState::LoadingRecords);
        let (mut records, load_error) = self
            .ctx
            .records()
            .load_or_default(self.spec.provider, &self.spec.keyword)
            .await;
        if let Some(error) = load_error {
            self.result
                .errors
                .push(CrawlError::run(ErrorStage::Records, error.to_string()));
        }
        debug!(recorded = records.len(), "download records ready");

        if self.eta.target_reached() {
            debug!("target already met, not searching");
            return TaskStatus::Done;
        }

        self.set_state(PipelineState::IteratingCandidates);
        let max_count = self
            .spec
            .skip
            .saturating_add(records.len())
            .saturating_add(self.spec.target_count.saturating_mul(CANDIDATE_HEADROOM));
        let mut candidates = match self
            .provider
            .next_candidates(&self.spec.keyword, max_count)
            .await
        {
            Ok(stream) => stream,
            Err(error) => return self.provider_failed(&error),
        };

        let cancel = self.ctx.cancellation().clone();
        let mut seen = HashSet::new();
        let mut offset_remaining = self.spec.skip;

        while !self.eta.target_reached() {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    info!(accepted = self.eta.accepted(), "cancellation requested, stopping");
                    return TaskStatus::Cancelled;
                }
                next = candidates.next() => next,
            };

            let candidate = match next {
                None => {
                    debug!("candidates exhausted");
                    break;
                }
                Some(Ok(candidate)) => candidate,
                Some(Err(error)) => return self.provider_failed(&error),
            };

            if offset_remaining > 0 {
                offset_remaining -= 1;
                continue;
            }

            if let Some(reason) = self.skip_reason(&candidate, &records, &mut seen) {
                self.result.skipped_count += 1;
                debug!(url = %candidate, reason, "candidate skipped");
                continue;
            }

            if let Some(reason) = self.head_rejection(&candidate).await {
                self.result.skipped_count += 1;
                debug!(url = %candidate, reason, "candidate skipped after HEAD");
                continue;
            }

            self.process(&candidate, &mut records).await;
            self.set_state(PipelineState::IteratingCandidates);
        }

        TaskStatus::Done
    }

    /// Why `candidate` needs no network I/O, if it doesn't.
    fn skip_reason(
        &self,
        candidate: &CandidateUrl,
        records: &KeywordRecords,
        seen: &mut HashSet<String>,
    ) -> Option<&'static str> {
        let url = candidate.as_str();
        if !seen.insert(url.to_string()) {
            return Some("repeated in this run");
        }
        if records.contains(url) {
            return Some("already downloaded");
        }
        if filter::is_known_broken(self.spec.provider, url) {
            return Some("known broken placeholder");
        }
        if let Some((width, height)) = filter::size_hint(url)
            && !self.ctx.validator().meets_threshold(width, height)
        {
            return Some("size hint below threshold");
        }
        None
    }

    /// HEAD pre-screen for providers whose links are often not images.
    async fn head_rejection(&self, candidate: &CandidateUrl) -> Option<&'static str> {
        if !filter::prescreens_with_head(self.spec.provider) {
            return None;
        }
        let head = self.ctx.fetcher().probe(candidate.as_str()).await?;
        filter::head_rejection(&head)
    }

    async fn process(&mut self, candidate: &CandidateUrl, records: &mut KeywordRecords) {
        let url = candidate.as_str();

        self.set_state(PipelineState::Fetching);
        let fetched = match self.ctx.fetcher().fetch(url).await {
            Ok(fetched) => fetched,
            Err(error) => {
                warn!(url, attempts = error.attempts(), error = %error, "fetch failed, moving on");
                self.item_failed(ErrorStage::Fetch, url, error.to_string());
                return;
            }
        };
        self.result.total_bytes += fetched.size_bytes;
        let transfer = Transfer {
            size_bytes: fetched.size_bytes,
            elapsed: fetched.elapsed,
            speed_mbps: fetched.speed_mbps(),
        };

        self.set_state(PipelineState::Validating);
        let (bytes, outcome) = match self.decode(fetched.bytes).await {
            Ok(decoded) => decoded,
            Err(message) => {
                warn!(url, error = %message, "image could not be decoded, moving on");
                self.item_failed(ErrorStage::Decode, url, message);
                return;
            }
        };

        if outcome.accepted {
            self.accept(url, &bytes, &outcome, &transfer, records).await;
        } else {
            self.reject(url, &bytes, &outcome).await;
        }
    }

    /// Full decode on the blocking pool. Hands the bytes back for writing.
    async fn decode(&self, bytes: Vec<u8>) -> Result<(Vec<u8>, ValidationOutcome), String> {
        let validator = *self.ctx.validator();
        let joined = tokio::task::spawn_blocking(move || {
            validator.validate(&bytes).map(|outcome| (bytes, outcome))
        })
        .await;

        match joined {
            Ok(Ok(decoded)) => Ok(decoded),
            Ok(Err(error)) => Err(error.to_string()),
            Err(error) => Err(format!("decoder task failed: {error}")),
        }
    }

    async fn accept(
        &mut self,
        url: &str,
        bytes: &[u8],
        outcome: &ValidationOutcome,
        transfer: &Transfer,
        records: &mut KeywordRecords,
    ) {
        self.set_state(PipelineState::Accepting);
        let dir = self.ctx.task_dir(self.spec.provider, &self.spec.keyword);
        let path = match write_unique(&dir, outcome.extension(), bytes).await {
            Ok(path) => path,
            Err(error) => {
                warn!(url, dir = %dir.display(), error = %error, "failed to save accepted image");
                self.item_failed(
                    ErrorStage::Write,
                    url,
                    format!("failed to write into {}: {error}", dir.display()),
                );
                return;
            }
        };
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.eta.record_acceptance();
        self.result.accepted_count += 1;

        if let Err(error) = records.record(url, &filename).await {
            warn!(url, error = %error, "image saved but not recorded");
            self.result
                .errors
                .push(CrawlError::item(ErrorStage::Records, url, error.to_string()));
        }

        info!(
            url,
            file = %filename,
            width = outcome.width,
            height = outcome.height,
            size_kb = transfer.size_bytes / 1024,
            speed_mbps = format!("{:.2}", transfer.speed_mbps),
            elapsed_ms = u64::try_from(transfer.elapsed.as_millis()).unwrap_or(u64::MAX),
            accepted = self.eta.accepted(),
            target = self.eta.target(),
            eta = %format_eta(self.eta.remaining_estimate()),
            "image accepted"
        );
    }

    async fn reject(&mut self, url: &str, bytes: &[u8], outcome: &ValidationOutcome) {
        self.set_state(PipelineState::Rejecting);
        self.result.rejected_count += 1;

        let dir = self.ctx.rejected_dir(self.spec.provider, &self.spec.keyword);
        match write_unique(&dir, outcome.extension(), bytes).await {
            Ok(path) => debug!(
                url,
                width = outcome.width,
                height = outcome.height,
                path = %path.display(),
                "image below size threshold, kept aside"
            ),
            Err(error) => {
                warn!(url, dir = %dir.display(), error = %error, "failed to save rejected image");
                self.result.errors.push(CrawlError::item(
                    ErrorStage::Write,
                    url,
                    format!("failed to write into {}: {error}", dir.display()),
                ));
            }
        }
    }

    fn item_failed(&mut self, stage: ErrorStage, url: &str, message: String) {
        self.result.failed_count += 1;
        self.result.errors.push(CrawlError::item(stage, url, message));
    }

    fn provider_failed(&mut self, error: &LinkProviderError) -> TaskStatus {
        warn!(error = %error, "link provider failed, ending run");
        self.result
            .errors
            .push(CrawlError::run(ErrorStage::Provider, error.to_string()));
        TaskStatus::Failed
    }

    fn set_state(&mut self, state: PipelineState) {
        self.state = state;
        self.ctx.progress().publish(ProgressSnapshot {
            keyword: self.spec.keyword.clone(),
            provider: self.spec.provider,
            state,
            accepted: self.result.accepted_count,
            target: self.spec.target_count,
            rejected: self.result.rejected_count,
            skipped: self.result.skipped_count,
            failed: self.result.failed_count,
            eta: self.eta.remaining_estimate(),
        });
    }
}

struct Transfer {
    size_bytes: u64,
    elapsed: Duration,
    speed_mbps: f64,
}

fn format_eta(eta: Option<Duration>) -> String {
    match eta {
        Some(remaining) => format!("{}s", remaining.as_secs()),
        None => "unknown".to_string(),
    }
}
