//! In-memory store implementations for gate and worker tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Semaphore;
use uuid::Uuid;

use campushire_core::models::{ImportJob, ImportStatus, RejectedRow, StudentUpsert};
use campushire_core::AppError;
use campushire_db::{ImportJobStore, StudentStore};

/// In-memory `ImportJobStore` with the same single-flight guarantee the
/// database enforces via its partial unique index.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: Mutex<MemoryJobs>,
}

#[derive(Default)]
struct MemoryJobs {
    by_id: HashMap<Uuid, ImportJob>,
    // Creation order, for latest_job
    order: Vec<Uuid>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> std::sync::MutexGuard<'_, MemoryJobs> {
        self.jobs.lock().unwrap()
    }

    /// Rewind a job's `updated_at`, standing in for a worker that stopped
    /// reporting progress some time ago.
    pub fn backdate(&self, job_id: Uuid, secs: i64) {
        let mut jobs = self.locked();
        if let Some(job) = jobs.by_id.get_mut(&job_id) {
            job.updated_at -= chrono::Duration::seconds(secs);
        }
    }
}

#[async_trait]
impl ImportJobStore for MemoryJobStore {
    async fn create_job(&self, tenant_id: Uuid) -> Result<ImportJob, AppError> {
        let mut jobs = self.locked();
        if let Some(active) = jobs
            .by_id
            .values()
            .find(|j| j.tenant_id == tenant_id && !j.is_terminal())
        {
            return Err(AppError::ImportInProgress { job_id: active.id });
        }

        let now = Utc::now();
        let job = ImportJob {
            id: Uuid::new_v4(),
            tenant_id,
            status: ImportStatus::Queued,
            total_rows: 0,
            processed_rows: 0,
            rejected_rows: vec![],
            error: None,
            created_at: now,
            updated_at: now,
        };
        jobs.order.push(job.id);
        jobs.by_id.insert(job.id, job.clone());
        Ok(job)
    }

    async fn mark_processing(&self, job_id: Uuid, total_rows: i64) -> Result<ImportJob, AppError> {
        let mut jobs = self.locked();
        let job = jobs
            .by_id
            .get_mut(&job_id)
            .ok_or_else(|| AppError::Internal(format!("no such job: {}", job_id)))?;
        if job.status != ImportStatus::Queued {
            return Err(AppError::Internal(format!(
                "job {} is not queued: {}",
                job_id, job.status
            )));
        }
        job.status = ImportStatus::Processing;
        job.total_rows = total_rows;
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    async fn record_progress(
        &self,
        job_id: Uuid,
        processed_rows: i64,
        rejected_rows: &[RejectedRow],
    ) -> Result<(), AppError> {
        let mut jobs = self.locked();
        let job = jobs
            .by_id
            .get_mut(&job_id)
            .ok_or_else(|| AppError::Internal(format!("no such job: {}", job_id)))?;
        if job.status != ImportStatus::Processing {
            return Ok(());
        }
        // Progress never regresses
        job.processed_rows = job.processed_rows.max(processed_rows);
        job.rejected_rows = rejected_rows.to_vec();
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn mark_completed(
        &self,
        job_id: Uuid,
        processed_rows: i64,
        rejected_rows: &[RejectedRow],
    ) -> Result<ImportJob, AppError> {
        let mut jobs = self.locked();
        let job = jobs
            .by_id
            .get_mut(&job_id)
            .ok_or_else(|| AppError::Internal(format!("no such job: {}", job_id)))?;
        if job.status != ImportStatus::Processing {
            return Err(AppError::Internal(format!(
                "job {} is not processing: {}",
                job_id, job.status
            )));
        }
        job.status = ImportStatus::Completed;
        job.processed_rows = processed_rows;
        job.rejected_rows = rejected_rows.to_vec();
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    async fn mark_failed(
        &self,
        job_id: Uuid,
        processed_rows: i64,
        rejected_rows: &[RejectedRow],
        error: &str,
    ) -> Result<ImportJob, AppError> {
        let mut jobs = self.locked();
        let job = jobs
            .by_id
            .get_mut(&job_id)
            .ok_or_else(|| AppError::Internal(format!("no such job: {}", job_id)))?;
        if job.is_terminal() {
            return Err(AppError::Internal(format!(
                "job {} is already terminal: {}",
                job_id, job.status
            )));
        }
        job.status = ImportStatus::Failed;
        job.processed_rows = processed_rows;
        job.rejected_rows = rejected_rows.to_vec();
        job.error = Some(error.to_string());
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    async fn get_job(
        &self,
        tenant_id: Uuid,
        job_id: Uuid,
    ) -> Result<Option<ImportJob>, AppError> {
        let jobs = self.locked();
        Ok(jobs
            .by_id
            .get(&job_id)
            .filter(|j| j.tenant_id == tenant_id)
            .cloned())
    }

    async fn latest_job(&self, tenant_id: Uuid) -> Result<Option<ImportJob>, AppError> {
        let jobs = self.locked();
        Ok(jobs
            .order
            .iter()
            .rev()
            .filter_map(|id| jobs.by_id.get(id))
            .find(|j| j.tenant_id == tenant_id)
            .cloned())
    }

    async fn active_job(&self, tenant_id: Uuid) -> Result<Option<ImportJob>, AppError> {
        let jobs = self.locked();
        Ok(jobs
            .by_id
            .values()
            .find(|j| j.tenant_id == tenant_id && !j.is_terminal())
            .cloned())
    }

    async fn reap_stale_jobs(&self, grace_secs: u64) -> Result<u64, AppError> {
        let mut jobs = self.locked();
        let cutoff = Utc::now() - chrono::Duration::seconds(grace_secs as i64);
        let mut reaped = 0;
        for job in jobs.by_id.values_mut() {
            if !job.is_terminal() && job.updated_at < cutoff {
                job.status = ImportStatus::Failed;
                job.error = Some("import worker stopped reporting progress".to_string());
                job.updated_at = Utc::now();
                reaped += 1;
            }
        }
        Ok(reaped)
    }
}

/// In-memory `StudentStore`. Can be configured to fail after N successful
/// upserts, or to block each upsert on a semaphore permit so tests control
/// when the worker makes progress.
pub struct MemoryStudentStore {
    records: Mutex<HashMap<(Uuid, String), StudentUpsert>>,
    calls: AtomicU64,
    fail_after: Option<u64>,
    gate: Option<Arc<Semaphore>>,
}

impl MemoryStudentStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            calls: AtomicU64::new(0),
            fail_after: None,
            gate: None,
        }
    }

    /// Store that fails every upsert after the first `n` succeed.
    pub fn failing_after(n: u64) -> Self {
        Self {
            fail_after: Some(n),
            ..Self::new()
        }
    }

    /// Store whose upserts each consume one permit from the returned
    /// semaphore. With zero permits the worker parks on the first row.
    pub fn blocking() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let store = Self {
            gate: Some(gate.clone()),
            ..Self::new()
        };
        (store, gate)
    }

    pub fn upsert_calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn count(&self, tenant_id: Uuid) -> usize {
        self.records
            .lock()
            .unwrap()
            .keys()
            .filter(|(t, _)| *t == tenant_id)
            .count()
    }

    pub fn get(&self, tenant_id: Uuid, enrollment_no: &str) -> Option<StudentUpsert> {
        self.records
            .lock()
            .unwrap()
            .get(&(tenant_id, enrollment_no.to_string()))
            .cloned()
    }
}

impl Default for MemoryStudentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StudentStore for MemoryStudentStore {
    async fn upsert_student(
        &self,
        tenant_id: Uuid,
        upsert: &StudentUpsert,
    ) -> Result<(), AppError> {
        if let Some(gate) = &self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|_| AppError::Internal("store gate closed".to_string()))?;
            permit.forget();
        }

        let calls = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(limit) = self.fail_after {
            if calls > limit {
                return Err(AppError::Internal("simulated store failure".to_string()));
            }
        }

        self.records
            .lock()
            .unwrap()
            .insert((tenant_id, upsert.enrollment_no.clone()), upsert.clone());
        Ok(())
    }
}

/// CSV payload with `count` valid data rows.
pub fn payload_with_rows(count: usize) -> Vec<u8> {
    let mut out = String::from("enrollment_no,name,email\n");
    for i in 1..=count {
        out.push_str(&format!("EN{:04},Student {},s{}@college.edu\n", i, i, i));
    }
    out.into_bytes()
}

/// Poll the store until the job reaches a terminal state.
pub async fn wait_terminal(store: &MemoryJobStore, tenant_id: Uuid, job_id: Uuid) -> ImportJob {
    for _ in 0..500 {
        if let Some(job) = store.get_job(tenant_id, job_id).await.unwrap() {
            if job.is_terminal() {
                return job;
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("job {} never reached a terminal state", job_id);
}

/// Poll the store until the job reports the given status.
pub async fn wait_status(
    store: &MemoryJobStore,
    tenant_id: Uuid,
    job_id: Uuid,
    status: ImportStatus,
) -> ImportJob {
    for _ in 0..500 {
        if let Some(job) = store.get_job(tenant_id, job_id).await.unwrap() {
            if job.status == status {
                return job;
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("job {} never reached status {}", job_id, status);
}
