use anyhow::{Context, Result};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::command::{LoopExit, run_command_loop};
use crate::config::{Config, RegistrySettings};
use crate::monitoring::{HttpChecker, MonitoringExecutor, PollScheduler, SnapshotWriter};
use crate::registry::{FileState, RegistryStore};

/// Run the monitor until the operator quits or the process is interrupted.
pub async fn run(config: Config) -> Result<()> {
    let (store, _) = open_registry(&config.registry).await?;

    let checker = HttpChecker::new(config.polling.probe_timeout()).context("failed to build HTTP client")?;
    let scheduler = PollScheduler::new(
        store.clone(),
        MonitoringExecutor::new(Arc::new(checker), config.polling.max_concurrent_probes),
        SnapshotWriter::new(&config.snapshots.directory),
        config.polling.interval(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller = scheduler.spawn(shutdown_rx);

    let stdin = BufReader::new(tokio::io::stdin());
    serve(
        stdin,
        tokio::io::stdout(),
        &store,
        interrupted(),
        shutdown_tx,
        poller,
        config.polling.shutdown_grace(),
    )
    .await;

    Ok(())
}

/// Open the registry and run the startup sanity check. Failing to open is
/// fatal; an unreadable registry is only reported.
pub async fn open_registry(settings: &RegistrySettings) -> Result<(Arc<RegistryStore>, FileState)> {
    let path = settings.path.as_path();
    let (store, state) = RegistryStore::open(path, settings.write_mode)
        .await
        .with_context(|| format!("failed to open registry {}", path.display()))?;

    check_registry(path, state, &store).await;
    Ok((Arc::new(store), state))
}

/// Operator-facing warning for a registry found in `state`, if any
pub fn startup_notice(state: FileState) -> Option<&'static str> {
    match state {
        FileState::Empty => Some(
            "Registry file exists but is empty; a previous write may have been interrupted and entries lost",
        ),
        FileState::Created | FileState::Populated => None,
    }
}

async fn check_registry(path: &Path, state: FileState, store: &RegistryStore) {
    if state == FileState::Created {
        info!(path = %path.display(), "Created empty registry");
    }
    if let Some(notice) = startup_notice(state) {
        warn!(path = %path.display(), "{}", notice);
    }

    match store.list().await {
        Ok(uris) => info!(path = %path.display(), count = uris.len(), "Registry loaded"),
        Err(e) => error!(path = %path.display(), "Registry is unreadable, commands will fail until it is fixed: {}", e),
    }
}

/// Resolves on Ctrl-C, or never if the handler cannot be installed
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Serve commands, then stop the poller. Returns whether it drained in time.
pub async fn serve<R, W, I>(
    input: R,
    output: W,
    store: &RegistryStore,
    interrupt: I,
    shutdown: watch::Sender<bool>,
    poller: JoinHandle<()>,
    grace: Duration,
) -> bool
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    I: Future<Output = ()>,
{
    supervise(input, output, store, interrupt).await;
    stop_poller(shutdown, poller, grace).await
}

/// Wait for `q` or `interrupt`. Closed or failing input keeps the monitor
/// running until `interrupt` resolves.
pub async fn supervise<R, W, I>(input: R, output: W, store: &RegistryStore, interrupt: I)
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    I: Future<Output = ()>,
{
    tokio::pin!(interrupt);

    tokio::select! {
        result = run_command_loop(input, output, store) => match result {
            Ok(LoopExit::Quit) => return,
            Ok(LoopExit::InputClosed) => {}
            Err(e) => error!("Reading commands failed, monitoring continues until interrupted: {}", e),
        },
        _ = &mut interrupt => {
            info!("Interrupt received");
            return;
        }
    }

    interrupt.await;
    info!("Interrupt received");
}

/// Broadcast shutdown and wait up to `grace` for the current cycle to finish
pub async fn stop_poller(shutdown: watch::Sender<bool>, poller: JoinHandle<()>, grace: Duration) -> bool {
    info!("Shutting down");
    let _ = shutdown.send(true);

    match tokio::time::timeout(grace, poller).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            error!("Poll scheduler task failed: {}", e);
            false
        }
        Err(_) => {
            warn!(grace_secs = grace.as_secs(), "Poll cycle still running after grace period, exiting anyway");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::{Checker, ProbeOutcome};
    use crate::registry::WriteMode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::{TempDir, tempdir};
    use tokio::sync::oneshot;

    /// Takes `delay` per check and counts calls
    struct SlowChecker {
        delay: Duration,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Checker for SlowChecker {
        async fn check(&self, uri: &str) -> ProbeOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            ProbeOutcome::success(uri, 200, self.delay)
        }
    }

    struct Harness {
        dir: TempDir,
        store: Arc<RegistryStore>,
        checker: Arc<SlowChecker>,
        shutdown: watch::Sender<bool>,
        observer: watch::Receiver<bool>,
        poller: JoinHandle<()>,
    }

    /// Registry with one entry and a running poller
    async fn harness(delay: Duration) -> Harness {
        let dir = tempdir().unwrap();
        let settings = RegistrySettings { path: dir.path().join("servers.json"), write_mode: WriteMode::Replace };
        let (store, _) = open_registry(&settings).await.unwrap();
        store.add("https://a.example").await.unwrap();

        let checker = Arc::new(SlowChecker { delay, calls: AtomicUsize::new(0) });
        let scheduler = PollScheduler::new(
            store.clone(),
            MonitoringExecutor::new(checker.clone(), 1),
            SnapshotWriter::new(dir.path().join("logs")),
            Duration::from_millis(20),
        );
        let (shutdown, rx) = watch::channel(false);
        let observer = rx.clone();
        let poller = scheduler.spawn(rx);

        Harness { dir, store, checker, shutdown, observer, poller }
    }

    fn snapshot_count(dir: &Path) -> usize {
        let Ok(days) = std::fs::read_dir(dir.join("logs")) else {
            return 0;
        };
        days.map(|day| std::fs::read_dir(day.unwrap().path()).unwrap().count()).sum()
    }

    #[tokio::test]
    async fn test_open_registry_fails_when_unopenable() {
        let dir = tempdir().unwrap();
        let settings =
            RegistrySettings { path: dir.path().join("missing/servers.json"), write_mode: WriteMode::InPlace };

        let err = open_registry(&settings).await.err().expect("open should fail");

        assert!(err.to_string().starts_with("failed to open registry"));
    }

    #[tokio::test]
    async fn test_zero_length_registry_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("servers.json");
        std::fs::write(&path, "").unwrap();
        let settings = RegistrySettings { path, write_mode: WriteMode::Replace };

        let (store, state) = open_registry(&settings).await.unwrap();

        assert_eq!(state, FileState::Empty);
        assert!(startup_notice(state).unwrap().contains("empty"));
        assert!(store.list().await.unwrap().is_empty());
        assert!(startup_notice(FileState::Created).is_none());
        assert!(startup_notice(FileState::Populated).is_none());
    }

    #[tokio::test]
    async fn test_quit_broadcasts_shutdown() {
        let h = harness(Duration::from_millis(1)).await;

        let drained = tokio::time::timeout(
            Duration::from_secs(2),
            serve(&b"ls\nq\n"[..], Vec::new(), &h.store, std::future::pending(), h.shutdown, h.poller, Duration::from_secs(2)),
        )
        .await
        .expect("q should end the session");

        assert!(drained);
        assert!(*h.observer.borrow());
    }

    #[tokio::test]
    async fn test_closed_input_keeps_monitoring() {
        let h = harness(Duration::from_millis(1)).await;
        let (interrupt_tx, interrupt_rx) = oneshot::channel::<()>();

        let session = serve(
            &b"ls\n"[..],
            Vec::new(),
            &h.store,
            async move {
                let _ = interrupt_rx.await;
            },
            h.shutdown,
            h.poller,
            Duration::from_secs(2),
        );
        tokio::pin!(session);

        assert!(tokio::time::timeout(Duration::from_millis(150), &mut session).await.is_err());
        assert!(!*h.observer.borrow());
        assert!(h.checker.calls.load(Ordering::SeqCst) >= 2);

        interrupt_tx.send(()).unwrap();
        assert!(tokio::time::timeout(Duration::from_secs(2), session).await.unwrap());
        assert!(*h.observer.borrow());
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_in_flight_cycle() {
        let h = harness(Duration::from_millis(300)).await;

        // First cycle is now in flight.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(snapshot_count(h.dir.path()), 0);

        assert!(stop_poller(h.shutdown, h.poller, Duration::from_secs(2)).await);

        assert_eq!(snapshot_count(h.dir.path()), 1);
        assert_eq!(h.checker.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_shutdown_gives_up_after_grace() {
        let h = harness(Duration::from_secs(5)).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(!stop_poller(h.shutdown, h.poller, Duration::from_millis(50)).await);
    }
}
