use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::info;

use super::checker::Checker;
use super::types::ProbeOutcome;

/// Monitoring executor - probes every registered URI for one cycle
pub struct MonitoringExecutor {
    checker: Arc<dyn Checker>,
    max_concurrent: usize,
}

impl MonitoringExecutor {
    /// `max_concurrent` of 1 probes strictly one after another
    pub fn new(checker: Arc<dyn Checker>, max_concurrent: usize) -> Self {
        Self { checker, max_concurrent: max_concurrent.max(1) }
    }

    /// Probe each URI. Outcomes come back in the order of `uris`
    /// regardless of which probe finished first.
    pub async fn execute_all(&self, uris: &[String]) -> Vec<ProbeOutcome> {
        stream::iter(uris.iter().cloned())
            .map(|uri| async move {
                let outcome = self.checker.check(&uri).await;
                if let (Some(status), Some(latency)) = (outcome.status_code, outcome.latency) {
                    info!(uri = %uri, status, latency_ms = latency.as_millis() as u64, "Probe completed");
                }
                outcome
            })
            .buffered(self.max_concurrent)
            .collect()
            .await
    }
}
