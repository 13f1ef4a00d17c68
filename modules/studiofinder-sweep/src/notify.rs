//! Run notifications for the batch runner.

use async_trait::async_trait;
use tracing::{error, info, warn};

use studiofinder_common::RunResult;

use crate::sweep::HardStop;

/// Receives one event per region plus a closing summary. Implementations
/// must not fail the batch; delivery problems are theirs to log.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn success(&self, result: &RunResult);

    async fn halted(&self, result: &RunResult, stop: &HardStop, source_file: &str);

    async fn failure(&self, region_code: &str, source_file: &str, error: &anyhow::Error);

    async fn summary(&self, completed: &[RunResult]);
}

/// Emits every notification as a structured log event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn success(&self, result: &RunResult) {
        info!(
            region = result.region_code.as_str(),
            name = result.region_name.as_str(),
            tab = result.destination_tab.as_str(),
            added = result.added_count,
            api_requests = result.api_request_count,
            "Region completed"
        );
    }

    async fn halted(&self, result: &RunResult, stop: &HardStop, source_file: &str) {
        error!(
            region = stop.region_code.as_str(),
            tab = stop.destination_tab.as_str(),
            file = source_file,
            center = %stop.center,
            keyword = stop.keyword.as_str(),
            status = %stop.status,
            message = stop.message.as_deref().unwrap_or(""),
            added_before_stop = result.added_count,
            "Batch halted by Places"
        );
    }

    async fn failure(&self, region_code: &str, source_file: &str, error: &anyhow::Error) {
        warn!(region = region_code, file = source_file, error = format!("{error:#}"), "Region failed");
    }

    async fn summary(&self, completed: &[RunResult]) {
        let added: usize = completed.iter().map(|r| r.added_count).sum();
        let requests: u64 = completed.iter().map(|r| r.api_request_count).sum();
        info!(regions = completed.len(), added, api_requests = requests, "Batch summary");
        for r in completed {
            info!(
                region = r.region_code.as_str(),
                added = r.added_count,
                api_requests = r.api_request_count,
                "  region"
            );
        }
    }
}
