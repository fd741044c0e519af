//! Store traits the import worker is written against.
//!
//! The Postgres repositories are the production implementations; tests use
//! in-memory implementations to exercise gate and worker semantics without a
//! database.

use async_trait::async_trait;
use uuid::Uuid;

use campushire_core::models::{ImportJob, RejectedRow, StudentUpsert};
use campushire_core::AppError;

use crate::db::import_job::ImportJobRepository;
use crate::db::student::StudentRepository;

/// Durable job record store: source of truth for progress and for the
/// single-flight gate.
#[async_trait]
pub trait ImportJobStore: Send + Sync {
    /// Atomic check-and-create: fails with `ImportInProgress { job_id }` when
    /// the tenant already has a queued or processing job.
    async fn create_job(&self, tenant_id: Uuid) -> Result<ImportJob, AppError>;

    async fn mark_processing(&self, job_id: Uuid, total_rows: i64) -> Result<ImportJob, AppError>;

    async fn record_progress(
        &self,
        job_id: Uuid,
        processed_rows: i64,
        rejected_rows: &[RejectedRow],
    ) -> Result<(), AppError>;

    async fn mark_completed(
        &self,
        job_id: Uuid,
        processed_rows: i64,
        rejected_rows: &[RejectedRow],
    ) -> Result<ImportJob, AppError>;

    async fn mark_failed(
        &self,
        job_id: Uuid,
        processed_rows: i64,
        rejected_rows: &[RejectedRow],
        error: &str,
    ) -> Result<ImportJob, AppError>;

    async fn get_job(&self, tenant_id: Uuid, job_id: Uuid)
        -> Result<Option<ImportJob>, AppError>;

    async fn latest_job(&self, tenant_id: Uuid) -> Result<Option<ImportJob>, AppError>;

    async fn active_job(&self, tenant_id: Uuid) -> Result<Option<ImportJob>, AppError>;

    /// Fail non-terminal jobs whose `updated_at` is older than the grace
    /// period, so a crashed worker cannot wedge the single-flight gate.
    async fn reap_stale_jobs(&self, grace_secs: u64) -> Result<u64, AppError>;
}

/// External record store consumed by the row processor.
#[async_trait]
pub trait StudentStore: Send + Sync {
    /// Exactly one record created-or-updated per successful call.
    async fn upsert_student(
        &self,
        tenant_id: Uuid,
        upsert: &StudentUpsert,
    ) -> Result<(), AppError>;
}

#[async_trait]
impl ImportJobStore for ImportJobRepository {
    async fn create_job(&self, tenant_id: Uuid) -> Result<ImportJob, AppError> {
        ImportJobRepository::create_job(self, tenant_id).await
    }

    async fn mark_processing(&self, job_id: Uuid, total_rows: i64) -> Result<ImportJob, AppError> {
        ImportJobRepository::mark_processing(self, job_id, total_rows).await
    }

    async fn record_progress(
        &self,
        job_id: Uuid,
        processed_rows: i64,
        rejected_rows: &[RejectedRow],
    ) -> Result<(), AppError> {
        ImportJobRepository::record_progress(self, job_id, processed_rows, rejected_rows).await
    }

    async fn mark_completed(
        &self,
        job_id: Uuid,
        processed_rows: i64,
        rejected_rows: &[RejectedRow],
    ) -> Result<ImportJob, AppError> {
        ImportJobRepository::mark_completed(self, job_id, processed_rows, rejected_rows).await
    }

    async fn mark_failed(
        &self,
        job_id: Uuid,
        processed_rows: i64,
        rejected_rows: &[RejectedRow],
        error: &str,
    ) -> Result<ImportJob, AppError> {
        ImportJobRepository::mark_failed(self, job_id, processed_rows, rejected_rows, error).await
    }

    async fn get_job(
        &self,
        tenant_id: Uuid,
        job_id: Uuid,
    ) -> Result<Option<ImportJob>, AppError> {
        ImportJobRepository::get_job(self, tenant_id, job_id).await
    }

    async fn latest_job(&self, tenant_id: Uuid) -> Result<Option<ImportJob>, AppError> {
        ImportJobRepository::latest_job(self, tenant_id).await
    }

    async fn active_job(&self, tenant_id: Uuid) -> Result<Option<ImportJob>, AppError> {
        ImportJobRepository::active_job(self, tenant_id).await
    }

    async fn reap_stale_jobs(&self, grace_secs: u64) -> Result<u64, AppError> {
        ImportJobRepository::reap_stale_jobs(self, grace_secs).await
    }
}

#[async_trait]
impl StudentStore for StudentRepository {
    async fn upsert_student(
        &self,
        tenant_id: Uuid,
        upsert: &StudentUpsert,
    ) -> Result<(), AppError> {
        StudentRepository::upsert_student(self, tenant_id, upsert).await
    }
}
