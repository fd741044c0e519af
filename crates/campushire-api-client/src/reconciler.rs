//! Client-side import status reconciliation.
//!
//! The server does not push progress; the `ImportWatcher` polls the status
//! endpoint on an interval and publishes snapshots through a watch channel.
//! A failed poll is counted but never fatal: the watcher keeps the last good
//! observation and retries on the next tick, indefinitely, until the job is
//! terminal or the caller stops it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use campushire_core::models::{ImportJobResponse, ImportStatus};

use crate::ApiClient;

/// One poll of the server's view. `Ok(None)` means the server has no import
/// job to report yet, which is a valid observation, not an error.
#[async_trait]
pub trait StatusFetch: Send + Sync + 'static {
    async fn fetch_latest(&self) -> anyhow::Result<Option<ImportJobResponse>>;
}

/// Fetches the latest import job for one college via the API client.
pub struct LatestImportFetch {
    client: ApiClient,
    college_id: Uuid,
}

impl LatestImportFetch {
    pub fn new(client: ApiClient, college_id: Uuid) -> Self {
        Self { client, college_id }
    }
}

#[async_trait]
impl StatusFetch for LatestImportFetch {
    async fn fetch_latest(&self) -> anyhow::Result<Option<ImportJobResponse>> {
        self.client.latest_import(self.college_id).await
    }
}

#[derive(Debug, Clone)]
pub enum ImportObservation {
    /// No poll has succeeded yet.
    Unknown,
    /// The server reported no import job for this college.
    NoJob,
    Job(ImportJobResponse),
}

/// What the watcher currently believes about the import.
#[derive(Debug, Clone)]
pub struct ImportSnapshot {
    pub observation: ImportObservation,
    /// A non-terminal job has shown no status or row-count change for the
    /// configured window.
    pub stalled: bool,
    /// Failed polls since the last successful one.
    pub consecutive_failures: u32,
}

impl ImportSnapshot {
    fn initial() -> Self {
        Self {
            observation: ImportObservation::Unknown,
            stalled: false,
            consecutive_failures: 0,
        }
    }

    pub fn job(&self) -> Option<&ImportJobResponse> {
        match &self.observation {
            ImportObservation::Job(job) => Some(job),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.job().is_some_and(|job| job.status.is_terminal())
    }
}

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub poll_interval: Duration,
    /// How long a non-terminal job may sit unchanged before the snapshot
    /// raises the stall flag.
    pub stall_after: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            stall_after: Duration::from_secs(30),
        }
    }
}

pub struct ImportWatcherHandle {
    receiver: watch::Receiver<ImportSnapshot>,
    shutdown_sender: mpsc::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

impl ImportWatcherHandle {
    pub fn subscribe(&self) -> watch::Receiver<ImportSnapshot> {
        self.receiver.clone()
    }

    pub fn snapshot(&self) -> ImportSnapshot {
        self.receiver.borrow().clone()
    }

    /// Ask the watcher to stop before the job turns terminal.
    pub async fn stop(&self) {
        let _ = self.shutdown_sender.send(()).await;
    }

    /// Wait for the watch loop to end (terminal job or `stop`).
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

/// Start watching. The loop ends on its own once the observed job is
/// terminal.
pub fn spawn(fetch: Arc<dyn StatusFetch>, config: WatcherConfig) -> ImportWatcherHandle {
    let (sender, receiver) = watch::channel(ImportSnapshot::initial());
    let (shutdown_sender, shutdown_receiver) = mpsc::channel(1);

    let task = tokio::spawn(watch_loop(fetch, config, sender, shutdown_receiver));

    ImportWatcherHandle {
        receiver,
        shutdown_sender,
        task,
    }
}

async fn watch_loop(
    fetch: Arc<dyn StatusFetch>,
    config: WatcherConfig,
    sender: watch::Sender<ImportSnapshot>,
    mut shutdown_receiver: mpsc::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(config.poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let mut consecutive_failures: u32 = 0;
    let mut last_progress: Option<(ImportStatus, i64, chrono::DateTime<chrono::Utc>)> = None;
    let mut last_change = Instant::now();

    loop {
        tokio::select! {
            _ = shutdown_receiver.recv() => {
                tracing::debug!("Import watcher stopped");
                break;
            }
            _ = ticker.tick() => {}
        }

        match fetch.fetch_latest().await {
            Ok(None) => {
                consecutive_failures = 0;
                last_progress = None;
                last_change = Instant::now();
                let _ = sender.send(ImportSnapshot {
                    observation: ImportObservation::NoJob,
                    stalled: false,
                    consecutive_failures,
                });
            }
            Ok(Some(job)) => {
                consecutive_failures = 0;

                // Any server-side write advances updated_at, so this is the
                // liveness signal even when the row count holds still
                let progress = (job.status, job.processed_rows, job.updated_at);
                if last_progress != Some(progress) {
                    last_progress = Some(progress);
                    last_change = Instant::now();
                }

                let terminal = job.status.is_terminal();
                let stalled = !terminal && last_change.elapsed() >= config.stall_after;
                let _ = sender.send(ImportSnapshot {
                    observation: ImportObservation::Job(job),
                    stalled,
                    consecutive_failures,
                });

                if terminal {
                    tracing::debug!("Import watcher observed a terminal job, stopping");
                    break;
                }
            }
            Err(e) => {
                // Keep the last good observation; only the counter changes
                consecutive_failures += 1;
                tracing::warn!(
                    consecutive_failures,
                    error = %e,
                    "Import status poll failed"
                );
                let mut snapshot = sender.borrow().clone();
                snapshot.consecutive_failures = consecutive_failures;
                let _ = sender.send(snapshot);
            }
        }
    }
}
