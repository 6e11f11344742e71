use chrono::Local;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info, warn};

use super::executor::MonitoringExecutor;
use super::snapshot::{SnapshotError, SnapshotWriter};
use super::types::Snapshot;
use crate::registry::{RegistryError, RegistryStore};

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("could not read registry: {0}")]
    Registry(#[from] RegistryError),
    #[error("could not write snapshot: {0}")]
    Snapshot(#[from] SnapshotError),
}

/// What a single poll cycle did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleReport {
    /// Registry was empty, nothing probed or written
    Empty,
    Written { path: PathBuf, probed: usize, failures: usize },
}

/// Poll scheduler - runs one cycle at a time on a fixed interval
pub struct PollScheduler {
    store: Arc<RegistryStore>,
    executor: MonitoringExecutor,
    writer: SnapshotWriter,
    interval: Duration,
}

impl PollScheduler {
    pub fn new(
        store: Arc<RegistryStore>,
        executor: MonitoringExecutor,
        writer: SnapshotWriter,
        interval: Duration,
    ) -> Self {
        Self { store, executor, writer, interval }
    }

    /// List the registry, probe every entry and write the snapshot
    pub async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        let uris = self.store.list().await?;

        if uris.is_empty() {
            info!("Nothing to check");
            return Ok(CycleReport::Empty);
        }

        info!(count = uris.len(), "Checking endpoints");
        let outcomes = self.executor.execute_all(&uris).await;
        let snapshot = Snapshot::new(Local::now(), outcomes);
        let path = self.writer.write(&snapshot).await?;

        Ok(CycleReport::Written { path, probed: snapshot.len(), failures: snapshot.failures() })
    }

    /// Poll until `shutdown` flips to true or its sender is dropped.
    ///
    /// Shutdown is only observed between cycles, so a started cycle always
    /// finishes writing its snapshot.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = self.interval.as_secs(), "Poll scheduler started");

        loop {
            let stopping = *shutdown.borrow();
            if stopping {
                break;
            }

            match self.run_cycle().await {
                Ok(CycleReport::Empty) => {}
                Ok(CycleReport::Written { path, probed, failures }) => {
                    if failures > 0 {
                        warn!(path = %path.display(), probed, failures, "Poll cycle finished with failures");
                    } else {
                        info!(path = %path.display(), probed, "Poll cycle finished");
                    }
                }
                Err(e) => error!("Poll cycle aborted: {}", e),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Poll scheduler stopped");
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
