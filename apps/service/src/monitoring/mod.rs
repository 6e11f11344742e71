/// Monitoring engine module - probes the registry on a schedule
///
/// This module is responsible for:
/// - Probing a single endpoint over HTTP and classifying the outcome
/// - Probing a whole registry listing in registry order
/// - Writing each cycle's outcomes to a dated snapshot file
/// - Driving poll cycles on a fixed interval until shutdown
pub mod checker;
pub mod executor;
pub mod scheduler;
pub mod snapshot;
pub mod types;

pub use checker::{Checker, HttpChecker};
pub use executor::MonitoringExecutor;
pub use scheduler::{CycleError, CycleReport, PollScheduler};
pub use snapshot::{SnapshotError, SnapshotWriter};
pub use types::{OutcomeKind, ProbeOutcome, Snapshot};
