//! Run progress, ETA estimation, and live snapshots shared with the UI.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use super::PipelineState;
use super::task::CrawlTaskResult;
use crate::provider::Provider;

/// Estimated time to reach `target` given `accepted` images in `elapsed`.
///
/// `None` until the first acceptance, since there is no rate to extrapolate.
#[must_use]
pub fn estimate_remaining(elapsed: Duration, accepted: usize, target: usize) -> Option<Duration> {
    if accepted == 0 {
        return None;
    }
    let remaining = target.saturating_sub(accepted);
    let per_image = elapsed / u32::try_from(accepted).unwrap_or(u32::MAX);
    Some(per_image.saturating_mul(u32::try_from(remaining).unwrap_or(u32::MAX)))
}

/// Accepted-image counter driving the ETA of one run.
#[derive(Debug, Clone)]
pub struct EtaTracker {
    started: Instant,
    target: usize,
    accepted: usize,
}

impl EtaTracker {
    #[must_use]
    pub fn start(target: usize) -> Self {
        Self {
            started: Instant::now(),
            target,
            accepted: 0,
        }
    }

    pub fn record_acceptance(&mut self) {
        self.accepted += 1;
    }

    #[must_use]
    pub fn accepted(&self) -> usize {
        self.accepted
    }

    #[must_use]
    pub fn target(&self) -> usize {
        self.target
    }

    #[must_use]
    pub fn target_reached(&self) -> bool {
        self.accepted >= self.target
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    #[must_use]
    pub fn remaining_estimate(&self) -> Option<Duration> {
        estimate_remaining(self.elapsed(), self.accepted, self.target)
    }
}

/// Point-in-time view of one running keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub keyword: String,
    pub provider: Provider,
    pub state: PipelineState,
    pub accepted: usize,
    pub target: usize,
    pub rejected: usize,
    pub skipped: usize,
    pub failed: usize,
    pub eta: Option<Duration>,
}

impl ProgressSnapshot {
    /// Final snapshot for a run that ended without publishing its own.
    #[must_use]
    pub fn finished(result: &CrawlTaskResult, target: usize) -> Self {
        Self {
            keyword: result.keyword.clone(),
            provider: result.provider,
            state: result.status.into(),
            accepted: result.accepted_count,
            target,
            rejected: result.rejected_count,
            skipped: result.skipped_count,
            failed: result.failed_count,
            eta: None,
        }
    }
}

/// Live progress of every pipeline in a scheduler run.
///
/// Pipelines publish snapshots; a UI task polls them. Cloning shares the map.
#[derive(Debug, Clone, Default)]
pub struct CrawlProgress {
    snapshots: Arc<DashMap<(Provider, String), ProgressSnapshot>>,
}

impl CrawlProgress {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, snapshot: ProgressSnapshot) {
        self.snapshots
            .insert((snapshot.provider, snapshot.keyword.clone()), snapshot);
    }

    #[must_use]
    pub fn get(&self, provider: Provider, keyword: &str) -> Option<ProgressSnapshot> {
        self.snapshots
            .get(&(provider, keyword.to_string()))
            .map(|entry| entry.value().clone())
    }

    /// All snapshots, ordered by provider then keyword.
    #[must_use]
    pub fn snapshots(&self) -> Vec<ProgressSnapshot> {
        let mut all: Vec<_> = self.snapshots.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| (a.provider, &a.keyword).cmp(&(b.provider, &b.keyword)));
        all
    }

    /// Pipelines that have not reached a terminal state.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.snapshots
            .iter()
            .filter(|e| !e.value().state.is_terminal())
            .count()
    }

    /// Sum of accepted images across all pipelines.
    #[must_use]
    pub fn total_accepted(&self) -> usize {
        self.snapshots.iter().map(|e| e.value().accepted).sum()
    }
}
