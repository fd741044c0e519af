//! Submission gate and in-process worker pool.
//!
//! `submit` is the synchronous half of the pipeline: syntactic pre-checks,
//! the atomic single-flight job creation, and the channel handoff all happen
//! before the caller gets its `202`-worthy answer. Everything after that is
//! the worker pool's problem.

use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use uuid::Uuid;

use campushire_core::models::ImportJob;
use campushire_core::{sheet, AppError, Config};
use campushire_db::{ImportJobStore, StudentStore};

use crate::runner::{run_import, ImportRunnerConfig};

#[derive(Debug, Clone)]
pub struct ImportQueueConfig {
    pub queue_size: usize,
    pub max_concurrent_jobs: usize,
    pub max_file_size_bytes: usize,
    pub runner: ImportRunnerConfig,
}

impl ImportQueueConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            queue_size: config.import_queue_size,
            max_concurrent_jobs: config.import_max_concurrent_jobs,
            max_file_size_bytes: config.import_max_file_size_bytes,
            runner: ImportRunnerConfig::from_config(config),
        }
    }
}

struct ImportTask {
    job_id: Uuid,
    tenant_id: Uuid,
    payload: Vec<u8>,
}

/// Accepts import submissions and runs them on a bounded worker pool.
#[derive(Clone)]
pub struct ImportQueue {
    jobs: Arc<dyn ImportJobStore>,
    sender: mpsc::Sender<ImportTask>,
    shutdown_sender: mpsc::Sender<()>,
    pool: Arc<Mutex<Option<JoinHandle<()>>>>,
    max_file_size_bytes: usize,
}

impl ImportQueue {
    pub fn new(
        config: ImportQueueConfig,
        jobs: Arc<dyn ImportJobStore>,
        students: Arc<dyn StudentStore>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_size);
        let (shutdown_sender, shutdown_receiver) = mpsc::channel(1);

        let pool = tokio::spawn(worker_pool(
            config.max_concurrent_jobs,
            config.runner,
            jobs.clone(),
            students,
            receiver,
            shutdown_receiver,
        ));

        Self {
            jobs,
            sender,
            shutdown_sender,
            pool: Arc::new(Mutex::new(Some(pool))),
            max_file_size_bytes: config.max_file_size_bytes,
        }
    }

    /// Validate the payload, create the queued job record, and hand the work
    /// to the pool. Rejections here leave no job record behind, with one
    /// exception: a full queue marks the just-created job failed so the
    /// single-flight gate does not stay wedged on a job nobody will run.
    #[tracing::instrument(skip(self, payload), fields(payload_bytes = payload.len()))]
    pub async fn submit(&self, tenant_id: Uuid, payload: Vec<u8>) -> Result<ImportJob, AppError> {
        if payload.len() > self.max_file_size_bytes {
            return Err(AppError::PayloadTooLarge(format!(
                "file is {} bytes, limit is {}",
                payload.len(),
                self.max_file_size_bytes
            )));
        }
        sheet::read_header(&payload)?;

        let job = self.jobs.create_job(tenant_id).await?;
        tracing::info!(job_id = %job.id, "Import job created");

        let task = ImportTask {
            job_id: job.id,
            tenant_id,
            payload,
        };
        if self.sender.try_send(task).is_err() {
            tracing::warn!(job_id = %job.id, "Import queue is full, failing job");
            self.jobs
                .mark_failed(job.id, 0, &[], "import queue is full")
                .await?;
            return Err(AppError::Internal("import queue is full".to_string()));
        }

        Ok(job)
    }

    /// Stop the pool and wait for it to drain: no further tasks are
    /// dispatched, jobs still sitting in the channel are marked failed, and
    /// the call returns once every in-flight import has finished.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_sender.send(()).await;
        let pool = match self.pool.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        if let Some(pool) = pool {
            let _ = pool.await;
        }
    }
}

async fn worker_pool(
    max_concurrent_jobs: usize,
    runner_config: ImportRunnerConfig,
    jobs: Arc<dyn ImportJobStore>,
    students: Arc<dyn StudentStore>,
    mut receiver: mpsc::Receiver<ImportTask>,
    mut shutdown_receiver: mpsc::Receiver<()>,
) {
    let semaphore = Arc::new(Semaphore::new(max_concurrent_jobs));

    loop {
        let permit = tokio::select! {
            _ = shutdown_receiver.recv() => break,
            permit = semaphore.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        tokio::select! {
            _ = shutdown_receiver.recv() => {
                drop(permit);
                break;
            }
            task = receiver.recv() => {
                let Some(task) = task else { break };

                let jobs = jobs.clone();
                let students = students.clone();
                let config = runner_config.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    match run_import(
                        &config,
                        jobs.as_ref(),
                        students.as_ref(),
                        task.job_id,
                        task.tenant_id,
                        &task.payload,
                    )
                    .await
                    {
                        Ok(job) => {
                            tracing::info!(job_id = %job.id, status = %job.status, "Import finished");
                        }
                        Err(e) => {
                            tracing::error!(
                                job_id = %task.job_id,
                                error = %e,
                                "Could not record import failure"
                            );
                        }
                    }
                });
            }
        }
    }

    tracing::info!("Import worker pool shutting down");

    // Jobs still sitting in the channel will never run; fail them now so the
    // single-flight gate is not left wedged on a queued row.
    receiver.close();
    while let Ok(task) = receiver.try_recv() {
        if let Err(e) = jobs
            .mark_failed(task.job_id, 0, &[], "server shut down before the import started")
            .await
        {
            tracing::error!(
                job_id = %task.job_id,
                error = %e,
                "Could not fail undispatched import"
            );
        }
    }

    // Every in-flight import holds a permit; acquiring them all waits for the
    // last one to finish.
    let _ = semaphore
        .clone()
        .acquire_many_owned(max_concurrent_jobs as u32)
        .await;
    tracing::info!("Import worker pool drained");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        payload_with_rows, wait_status, wait_terminal, MemoryJobStore, MemoryStudentStore,
    };
    use campushire_core::models::ImportStatus;
    use std::time::Duration;

    fn test_config() -> ImportQueueConfig {
        ImportQueueConfig {
            queue_size: 8,
            max_concurrent_jobs: 2,
            max_file_size_bytes: 1024 * 1024,
            runner: ImportRunnerConfig::default(),
        }
    }

    fn queue_with(
        config: ImportQueueConfig,
        students: MemoryStudentStore,
    ) -> (ImportQueue, Arc<MemoryJobStore>, Arc<MemoryStudentStore>) {
        let jobs = Arc::new(MemoryJobStore::new());
        let students = Arc::new(students);
        let queue = ImportQueue::new(config, jobs.clone(), students.clone());
        (queue, jobs, students)
    }

    #[tokio::test]
    async fn test_submit_runs_job_to_completion() {
        let (queue, jobs, students) = queue_with(test_config(), MemoryStudentStore::new());
        let tenant_id = Uuid::new_v4();

        let job = queue.submit(tenant_id, payload_with_rows(5)).await.unwrap();
        assert_eq!(job.status, ImportStatus::Queued);

        let done = wait_terminal(&jobs, tenant_id, job.id).await;
        assert_eq!(done.status, ImportStatus::Completed);
        assert_eq!(done.total_rows, 5);
        assert_eq!(done.processed_rows, 5);
        assert_eq!(students.count(tenant_id), 5);
    }

    #[tokio::test]
    async fn test_empty_file_rejected_without_job_record() {
        let (queue, jobs, _students) = queue_with(test_config(), MemoryStudentStore::new());
        let tenant_id = Uuid::new_v4();

        let err = queue.submit(tenant_id, b"   \n".to_vec()).await.unwrap_err();
        assert!(matches!(err, AppError::UnparseableFile(_)));
        assert!(jobs.latest_job(tenant_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_column_rejected_without_job_record() {
        let (queue, jobs, _students) = queue_with(test_config(), MemoryStudentStore::new());
        let tenant_id = Uuid::new_v4();

        let err = queue
            .submit(tenant_id, b"enrollment_no,name\nEN001,Riya\n".to_vec())
            .await
            .unwrap_err();
        match err {
            AppError::UnparseableFile(msg) => assert!(msg.contains("email")),
            other => panic!("unexpected error: {}", other),
        }
        assert!(jobs.latest_job(tenant_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_oversize_file_rejected() {
        let mut config = test_config();
        config.max_file_size_bytes = 64;
        let (queue, jobs, _students) = queue_with(config, MemoryStudentStore::new());
        let tenant_id = Uuid::new_v4();

        let err = queue
            .submit(tenant_id, payload_with_rows(100))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PayloadTooLarge(_)));
        assert!(jobs.latest_job(tenant_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_second_submit_conflicts_with_active_job() {
        let (store, gate) = MemoryStudentStore::blocking();
        let (queue, jobs, _students) = queue_with(test_config(), store);
        let tenant_id = Uuid::new_v4();

        let first = queue.submit(tenant_id, payload_with_rows(2)).await.unwrap();
        wait_status(&jobs, tenant_id, first.id, ImportStatus::Processing).await;

        // Gate holds while the first job is in flight, and names it
        let err = queue
            .submit(tenant_id, payload_with_rows(2))
            .await
            .unwrap_err();
        match err {
            AppError::ImportInProgress { job_id } => assert_eq!(job_id, first.id),
            other => panic!("unexpected error: {}", other),
        }

        gate.add_permits(100);
        let done = wait_terminal(&jobs, tenant_id, first.id).await;
        assert_eq!(done.status, ImportStatus::Completed);

        // Terminal job releases the gate
        let second = queue.submit(tenant_id, payload_with_rows(2)).await.unwrap();
        assert_ne!(second.id, first.id);
        wait_terminal(&jobs, tenant_id, second.id).await;
    }

    #[tokio::test]
    async fn test_other_tenant_unaffected_by_active_job() {
        let (store, gate) = MemoryStudentStore::blocking();
        let (queue, jobs, _students) = queue_with(test_config(), store);
        let tenant_a = Uuid::new_v4();
        let tenant_b = Uuid::new_v4();

        let job_a = queue.submit(tenant_a, payload_with_rows(2)).await.unwrap();
        wait_status(&jobs, tenant_a, job_a.id, ImportStatus::Processing).await;

        let job_b = queue.submit(tenant_b, payload_with_rows(2)).await.unwrap();

        gate.add_permits(100);
        assert_eq!(
            wait_terminal(&jobs, tenant_a, job_a.id).await.status,
            ImportStatus::Completed
        );
        assert_eq!(
            wait_terminal(&jobs, tenant_b, job_b.id).await.status,
            ImportStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_full_queue_marks_job_failed() {
        let mut config = test_config();
        config.queue_size = 1;
        config.max_concurrent_jobs = 1;
        let (store, gate) = MemoryStudentStore::blocking();
        let (queue, jobs, _students) = queue_with(config, store);

        // Tenant 1 occupies the single worker slot
        let tenant_1 = Uuid::new_v4();
        let job_1 = queue.submit(tenant_1, payload_with_rows(2)).await.unwrap();
        wait_status(&jobs, tenant_1, job_1.id, ImportStatus::Processing).await;

        // Tenant 2 fills the channel
        let tenant_2 = Uuid::new_v4();
        let job_2 = queue.submit(tenant_2, payload_with_rows(2)).await.unwrap();

        // Tenant 3 finds the queue full; its job record is failed, not stuck
        let tenant_3 = Uuid::new_v4();
        let err = queue
            .submit(tenant_3, payload_with_rows(2))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
        let failed = jobs.latest_job(tenant_3).await.unwrap().unwrap();
        assert_eq!(failed.status, ImportStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("import queue is full"));

        gate.add_permits(100);
        assert_eq!(
            wait_terminal(&jobs, tenant_1, job_1.id).await.status,
            ImportStatus::Completed
        );
        assert_eq!(
            wait_terminal(&jobs, tenant_2, job_2.id).await.status,
            ImportStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_reaping_stale_job_frees_the_gate() {
        let (queue, jobs, _students) = queue_with(test_config(), MemoryStudentStore::new());
        let tenant_id = Uuid::new_v4();

        // A job orphaned mid-processing by a crashed worker
        let wedged = jobs.create_job(tenant_id).await.unwrap();
        jobs.mark_processing(wedged.id, 10).await.unwrap();
        jobs.backdate(wedged.id, 3600);

        let err = queue
            .submit(tenant_id, payload_with_rows(2))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ImportInProgress { .. }));

        assert_eq!(jobs.reap_stale_jobs(900).await.unwrap(), 1);
        let reaped = jobs.get_job(tenant_id, wedged.id).await.unwrap().unwrap();
        assert_eq!(reaped.status, ImportStatus::Failed);
        assert!(reaped.error.is_some());

        // The reaped job no longer holds the gate
        let job = queue.submit(tenant_id, payload_with_rows(2)).await.unwrap();
        assert_eq!(
            wait_terminal(&jobs, tenant_id, job.id).await.status,
            ImportStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_reap_leaves_fresh_and_terminal_jobs_alone() {
        let jobs = MemoryJobStore::new();

        let tenant_a = Uuid::new_v4();
        let fresh = jobs.create_job(tenant_a).await.unwrap();

        let tenant_b = Uuid::new_v4();
        let done = jobs.create_job(tenant_b).await.unwrap();
        jobs.mark_processing(done.id, 1).await.unwrap();
        jobs.mark_completed(done.id, 1, &[]).await.unwrap();
        jobs.backdate(done.id, 7200);

        assert_eq!(jobs.reap_stale_jobs(900).await.unwrap(), 0);
        assert_eq!(
            jobs.get_job(tenant_a, fresh.id).await.unwrap().unwrap().status,
            ImportStatus::Queued
        );
        let done = jobs.get_job(tenant_b, done.id).await.unwrap().unwrap();
        assert_eq!(done.status, ImportStatus::Completed);
        assert!(done.error.is_none());
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_in_flight_import() {
        let (store, gate) = MemoryStudentStore::blocking();
        let (queue, jobs, _students) = queue_with(test_config(), store);
        let tenant_id = Uuid::new_v4();

        let job = queue.submit(tenant_id, payload_with_rows(3)).await.unwrap();
        wait_status(&jobs, tenant_id, job.id, ImportStatus::Processing).await;

        let draining = tokio::spawn({
            let queue = queue.clone();
            async move { queue.shutdown().await }
        });

        // Shutdown must not preempt the running import
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!draining.is_finished());

        gate.add_permits(100);
        draining.await.unwrap();

        let done = jobs.get_job(tenant_id, job.id).await.unwrap().unwrap();
        assert_eq!(done.status, ImportStatus::Completed);
        assert_eq!(done.processed_rows, 3);
    }

    #[tokio::test]
    async fn test_shutdown_fails_undispatched_jobs() {
        let mut config = test_config();
        config.max_concurrent_jobs = 1;
        let (store, gate) = MemoryStudentStore::blocking();
        let (queue, jobs, _students) = queue_with(config, store);

        let tenant_1 = Uuid::new_v4();
        let job_1 = queue.submit(tenant_1, payload_with_rows(2)).await.unwrap();
        wait_status(&jobs, tenant_1, job_1.id, ImportStatus::Processing).await;

        // Queued behind the busy worker slot, never dispatched
        let tenant_2 = Uuid::new_v4();
        let job_2 = queue.submit(tenant_2, payload_with_rows(2)).await.unwrap();

        let draining = tokio::spawn({
            let queue = queue.clone();
            async move { queue.shutdown().await }
        });

        let failed = wait_terminal(&jobs, tenant_2, job_2.id).await;
        assert_eq!(failed.status, ImportStatus::Failed);
        assert!(failed.error.as_deref().unwrap_or("").contains("shut down"));

        gate.add_permits(100);
        draining.await.unwrap();
        assert_eq!(
            jobs.get_job(tenant_1, job_1.id)
                .await
                .unwrap()
                .unwrap()
                .status,
            ImportStatus::Completed
        );
    }
}
