//! Progress UI (spinner) for crawl runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use image_crawler_core::CrawlProgress;
use image_crawler_core::pipeline::ProgressSnapshot;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::task::{JoinError, JoinHandle};

/// Spawns the progress UI (spinner) when requested.
/// Returns (handle, stop) so the caller can signal stop and await the handle.
/// When `use_spinner` is false, returns (None, stop) with stop already true.
pub(crate) fn spawn_progress_ui(
    use_spinner: bool,
    progress: CrawlProgress,
    total_tasks: usize,
) -> (Option<JoinHandle<()>>, Arc<AtomicBool>) {
    if !use_spinner {
        return (None, Arc::new(AtomicBool::new(true)));
    }
    let stop = Arc::new(AtomicBool::new(false));
    let handle = spawn_spinner_inner(progress, total_tasks, Arc::clone(&stop));
    (Some(handle), stop)
}

/// Signals the spinner to stop and waits for it to clear the line.
///
/// Returns the spinner task's `JoinError` if it panicked or was aborted.
pub(crate) async fn stop_progress_ui(
    handle: Option<JoinHandle<()>>,
    stop: &AtomicBool,
) -> Result<(), JoinError> {
    stop.store(true, Ordering::SeqCst);
    let Some(handle) = handle else {
        return Ok(());
    };
    handle.await
}

fn spawn_spinner_inner(
    progress: CrawlProgress,
    total_tasks: usize,
    stop: Arc<AtomicBool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(100));

        while !stop.load(Ordering::SeqCst) {
            spinner.set_message(status_line(&progress.snapshots(), total_tasks));
            tokio::time::sleep(Duration::from_millis(120)).await;
        }

        spinner.finish_and_clear();
    })
}

/// One-line summary: finished keywords, images so far, and the busiest active keyword.
fn status_line(snapshots: &[ProgressSnapshot], total_tasks: usize) -> String {
    let finished = snapshots.iter().filter(|s| s.state.is_terminal()).count();
    let accepted: usize = snapshots.iter().map(|s| s.accepted).sum();
    let target: usize = snapshots.iter().map(|s| s.target).sum();

    let active = snapshots
        .iter()
        .filter(|s| !s.state.is_terminal())
        .max_by_key(|s| s.accepted);
    let detail = match active {
        Some(s) => {
            let eta = s
                .eta
                .map_or_else(|| "eta unknown".to_string(), |d| format!("eta {}s", d.as_secs()));
            format!(
                "{}:{} {} ({}/{}, {eta})",
                s.provider, s.keyword, s.state, s.accepted, s.target
            )
        }
        None => "waiting for workers".to_string(),
    };

    format!(
        "[{}/{} keywords] {accepted}/{target} images | {detail}",
        finished.min(total_tasks),
        total_tasks
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use image_crawler_core::{PipelineState, Provider};

    fn snapshot(keyword: &str, state: PipelineState, accepted: usize) -> ProgressSnapshot {
        ProgressSnapshot {
            keyword: keyword.to_string(),
            provider: Provider::Baidu,
            state,
            accepted,
            target: 10,
            rejected: 0,
            skipped: 0,
            failed: 0,
            eta: Some(Duration::from_secs(30)),
        }
    }

    #[test]
    fn test_status_line_with_active_keyword() {
        let line = status_line(
            &[
                snapshot("cat", PipelineState::Done, 10),
                snapshot("dog", PipelineState::Fetching, 4),
            ],
            3,
        );
        assert_eq!(
            line,
            "[1/3 keywords] 14/20 images | baidu:dog fetching (4/10, eta 30s)"
        );
    }

    #[test]
    fn test_status_line_before_start() {
        assert_eq!(status_line(&[], 2), "[0/2 keywords] 0/0 images | waiting for workers");
    }

    #[tokio::test]
    async fn spawn_progress_ui_when_disabled_returns_none_handle_and_stop_already_true() {
        let (handle, stop) = spawn_progress_ui(false, CrawlProgress::new(), 1);

        assert!(handle.is_none());
        assert!(
            stop.load(Ordering::SeqCst),
            "stop signal should be true when spinner disabled"
        );
    }

    #[tokio::test]
    async fn spawn_progress_ui_when_enabled_stop_ends_task() {
        let (handle, stop) = spawn_progress_ui(true, CrawlProgress::new(), 1);
        assert!(!stop.load(Ordering::SeqCst), "stop should be false initially");

        stop_progress_ui(handle, &stop).await.unwrap();
        assert!(stop.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_stop_progress_ui_without_spinner() {
        let (handle, stop) = spawn_progress_ui(false, CrawlProgress::new(), 1);
        assert!(stop_progress_ui(handle, &stop).await.is_ok());
    }

    #[tokio::test]
    async fn test_stop_progress_ui_reports_dead_spinner() {
        let stop = AtomicBool::new(false);
        let handle: JoinHandle<()> = tokio::spawn(async { panic!("terminal went away") });

        let err = stop_progress_ui(Some(handle), &stop).await.unwrap_err();
        assert!(err.is_panic());
        assert!(stop.load(Ordering::SeqCst));
    }
}
