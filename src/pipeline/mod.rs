//! Per-keyword crawl controller.
//!
//! A [`KeywordCrawlPipeline`] pulls candidates from one link provider, drops
//! the ones already downloaded, and runs fetch → validate → write → record
//! for the rest, strictly one candidate at a time. Per-item failures are
//! collected into the [`CrawlTaskResult`]; only a provider failure ends the
//! run early.
//!
//! ```text
//! Init → LoadingRecords → IteratingCandidates ─┬─> Done
//!                             ↑   │            ├─> Failed
//!                             │   ↓            └─> Cancelled
//!                             │ Fetching → Validating → Accepting | Rejecting
//!                             └────────────────────────────────┘
//! ```

mod progress;
mod runner;
mod task;

pub use progress::{CrawlProgress, EtaTracker, ProgressSnapshot, estimate_remaining};
pub use runner::KeywordCrawlPipeline;
pub use task::{CrawlError, CrawlTaskResult, CrawlTaskSpec, ErrorStage, TaskStatus};

use std::fmt;

/// Where a keyword run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Init,
    LoadingRecords,
    IteratingCandidates,
    Fetching,
    Validating,
    Accepting,
    Rejecting,
    Done,
    Failed,
    Cancelled,
}

impl PipelineState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Cancelled)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::LoadingRecords => "loading records",
            Self::IteratingCandidates => "iterating",
            Self::Fetching => "fetching",
            Self::Validating => "validating",
            Self::Accepting => "accepting",
            Self::Rejecting => "rejecting",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<TaskStatus> for PipelineState {
    fn from(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Done => Self::Done,
            TaskStatus::Failed => Self::Failed,
            TaskStatus::Cancelled => Self::Cancelled,
        }
    }
}
