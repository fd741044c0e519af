use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use campushire_core::models::{ImportJob, RejectedRow};
use campushire_core::AppError;

/// Name of the partial unique index that enforces the single-flight gate:
/// at most one `queued`/`processing` job per tenant.
const ACTIVE_JOB_INDEX: &str = "idx_import_jobs_tenant_active";

const JOB_COLUMNS: &str = r#"
    id,
    tenant_id,
    status,
    total_rows,
    processed_rows,
    rejected_rows,
    error,
    created_at,
    updated_at
"#;

/// Repository for import job records. Source of truth for progress and for
/// the single-flight gate; survives process restarts of gate and worker.
#[derive(Clone)]
pub struct ImportJobRepository {
    pool: PgPool,
}

fn is_active_job_conflict(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db) if db.constraint() == Some(ACTIVE_JOB_INDEX)
    )
}

fn rejected_rows_json(rejected_rows: &[RejectedRow]) -> Result<serde_json::Value, AppError> {
    serde_json::to_value(rejected_rows)
        .map_err(|e| AppError::Internal(format!("Failed to encode rejected rows: {}", e)))
}

enum ConflictOutcome {
    InProgress(Uuid),
    RetryInsert,
    GiveUp,
}

/// Resolve an insert that lost the single-flight race. While the conflicting
/// job is still active its id is handed back to the caller; when it turned
/// terminal between the failed insert and the lookup, the insert is retried
/// once instead of surfacing the transient unique violation.
fn conflict_outcome(active: Option<&ImportJob>, retry_left: bool) -> ConflictOutcome {
    match active {
        Some(job) => ConflictOutcome::InProgress(job.id),
        None if retry_left => ConflictOutcome::RetryInsert,
        None => ConflictOutcome::GiveUp,
    }
}

impl ImportJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new queued job for the tenant.
    ///
    /// The insert races on the partial unique index over active jobs: a
    /// concurrent submission from the same tenant makes exactly one of the
    /// two inserts fail with a unique violation, which is surfaced as
    /// `ImportInProgress` carrying the already-active job's id so the caller
    /// can resume polling instead of retrying.
    #[tracing::instrument(skip(self))]
    pub async fn create_job(&self, tenant_id: Uuid) -> Result<ImportJob, AppError> {
        for attempt in 0..2 {
            let result = sqlx::query_as::<Postgres, ImportJob>(&format!(
                r#"
                INSERT INTO import_jobs (tenant_id, status)
                VALUES ($1, 'queued')
                RETURNING {JOB_COLUMNS}
                "#,
            ))
            .bind(tenant_id)
            .fetch_one(&self.pool)
            .await;

            match result {
                Ok(job) => {
                    tracing::info!(
                        job_id = %job.id,
                        tenant_id = %tenant_id,
                        "Import job created"
                    );
                    return Ok(job);
                }
                Err(e) if is_active_job_conflict(&e) => {
                    let active = self.active_job(tenant_id).await?;
                    match conflict_outcome(active.as_ref(), attempt == 0) {
                        ConflictOutcome::InProgress(job_id) => {
                            tracing::warn!(
                                tenant_id = %tenant_id,
                                active_job_id = %job_id,
                                "Submission rejected, tenant already has an active import"
                            );
                            return Err(AppError::ImportInProgress { job_id });
                        }
                        ConflictOutcome::RetryInsert => {
                            tracing::debug!(
                                tenant_id = %tenant_id,
                                "Conflicting job turned terminal mid-submission, retrying insert"
                            );
                        }
                        ConflictOutcome::GiveUp => return Err(AppError::Database(e)),
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, tenant_id = %tenant_id, "Failed to create import job");
                    return Err(AppError::Database(e));
                }
            }
        }

        Err(AppError::Internal(format!(
            "Could not create import job for tenant {}",
            tenant_id
        )))
    }

    /// Transition `queued -> processing` and record the row count. Only the
    /// worker that owns the job calls this, and only once.
    #[tracing::instrument(skip(self))]
    pub async fn mark_processing(
        &self,
        job_id: Uuid,
        total_rows: i64,
    ) -> Result<ImportJob, AppError> {
        let job = sqlx::query_as::<Postgres, ImportJob>(&format!(
            r#"
            UPDATE import_jobs
            SET status = 'processing',
                total_rows = $2,
                updated_at = NOW()
            WHERE id = $1 AND status = 'queued'
            RETURNING {JOB_COLUMNS}
            "#,
        ))
        .bind(job_id)
        .bind(total_rows)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            AppError::Internal(format!("Import job {} is not in queued state", job_id))
        })?;

        tracing::info!(job_id = %job_id, total_rows = total_rows, "Import job processing");
        Ok(job)
    }

    /// Batched progress write. Guarded so `processed_rows` can only grow and
    /// only while the job is processing; always advances `updated_at` so
    /// pollers can tell a live worker from a stalled one.
    #[tracing::instrument(skip(self, rejected_rows))]
    pub async fn record_progress(
        &self,
        job_id: Uuid,
        processed_rows: i64,
        rejected_rows: &[RejectedRow],
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE import_jobs
            SET processed_rows = GREATEST(processed_rows, $2),
                rejected_rows = $3,
                updated_at = NOW()
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(job_id)
        .bind(processed_rows)
        .bind(rejected_rows_json(rejected_rows)?)
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            job_id = %job_id,
            processed_rows = processed_rows,
            rejected = rejected_rows.len(),
            "Import progress recorded"
        );
        Ok(())
    }

    /// Terminal transition: all rows accounted for, no pipeline fault.
    /// Completed-with-rejections is a valid outcome.
    #[tracing::instrument(skip(self, rejected_rows))]
    pub async fn mark_completed(
        &self,
        job_id: Uuid,
        processed_rows: i64,
        rejected_rows: &[RejectedRow],
    ) -> Result<ImportJob, AppError> {
        let job = sqlx::query_as::<Postgres, ImportJob>(&format!(
            r#"
            UPDATE import_jobs
            SET status = 'completed',
                processed_rows = GREATEST(processed_rows, $2),
                rejected_rows = $3,
                updated_at = NOW()
            WHERE id = $1 AND status = 'processing'
            RETURNING {JOB_COLUMNS}
            "#,
        ))
        .bind(job_id)
        .bind(processed_rows)
        .bind(rejected_rows_json(rejected_rows)?)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            AppError::Internal(format!("Import job {} is not in processing state", job_id))
        })?;

        tracing::info!(
            job_id = %job_id,
            tenant_id = %job.tenant_id,
            processed_rows = job.processed_rows,
            rejected = job.rejected_rows.len(),
            "Import job completed"
        );
        Ok(job)
    }

    /// Terminal transition for a pipeline-level fault. Allowed from `queued`
    /// as well (e.g. the handoff to the worker failed), so no orphaned
    /// `queued` row can wedge the single-flight gate.
    #[tracing::instrument(skip(self, rejected_rows))]
    pub async fn mark_failed(
        &self,
        job_id: Uuid,
        processed_rows: i64,
        rejected_rows: &[RejectedRow],
        error: &str,
    ) -> Result<ImportJob, AppError> {
        let job = sqlx::query_as::<Postgres, ImportJob>(&format!(
            r#"
            UPDATE import_jobs
            SET status = 'failed',
                processed_rows = GREATEST(processed_rows, $2),
                rejected_rows = $3,
                error = $4,
                updated_at = NOW()
            WHERE id = $1 AND status IN ('queued', 'processing')
            RETURNING {JOB_COLUMNS}
            "#,
        ))
        .bind(job_id)
        .bind(processed_rows)
        .bind(rejected_rows_json(rejected_rows)?)
        .bind(error)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            AppError::Internal(format!("Import job {} is not in an active state", job_id))
        })?;

        tracing::error!(
            job_id = %job_id,
            tenant_id = %job.tenant_id,
            processed_rows = job.processed_rows,
            error = error,
            "Import job failed"
        );
        Ok(job)
    }

    /// Get a job by ID with tenant check.
    #[tracing::instrument(skip(self))]
    pub async fn get_job(
        &self,
        tenant_id: Uuid,
        job_id: Uuid,
    ) -> Result<Option<ImportJob>, AppError> {
        let job = sqlx::query_as::<Postgres, ImportJob>(&format!(
            r#"
            SELECT {JOB_COLUMNS}
            FROM import_jobs
            WHERE tenant_id = $1 AND id = $2
            "#,
        ))
        .bind(tenant_id)
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(job)
    }

    /// The tenant's most recently created job, regardless of status. This is
    /// what a reloaded client polls to rediscover an in-flight import.
    #[tracing::instrument(skip(self))]
    pub async fn latest_job(&self, tenant_id: Uuid) -> Result<Option<ImportJob>, AppError> {
        let job = sqlx::query_as::<Postgres, ImportJob>(&format!(
            r#"
            SELECT {JOB_COLUMNS}
            FROM import_jobs
            WHERE tenant_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        ))
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(job)
    }

    /// The tenant's active (non-terminal) job, if any. At most one exists by
    /// the single-flight invariant.
    #[tracing::instrument(skip(self))]
    pub async fn active_job(&self, tenant_id: Uuid) -> Result<Option<ImportJob>, AppError> {
        let job = sqlx::query_as::<Postgres, ImportJob>(&format!(
            r#"
            SELECT {JOB_COLUMNS}
            FROM import_jobs
            WHERE tenant_id = $1 AND status IN ('queued', 'processing')
            LIMIT 1
            "#,
        ))
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(job)
    }

    /// Fail queued/processing jobs whose `updated_at` is older than the grace
    /// period. A worker that crashed or was killed mid-import leaves its job
    /// non-terminal with no one left to finish it, which would hold the
    /// tenant's single-flight gate forever; the reaper turns such jobs into
    /// ordinary failures. Returns the number of jobs reaped.
    #[tracing::instrument(skip(self))]
    pub async fn reap_stale_jobs(&self, grace_secs: u64) -> Result<u64, AppError> {
        use sqlx::Row;

        let result = sqlx::query(
            r#"
            WITH reaped AS (
                UPDATE import_jobs
                SET status = 'failed',
                    error = 'import worker stopped reporting progress',
                    updated_at = NOW()
                WHERE status IN ('queued', 'processing')
                    AND updated_at < NOW() - ($1 * interval '1 second')
                RETURNING id
            )
            SELECT COUNT(*)::bigint FROM reaped
            "#,
        )
        .bind(grace_secs as i64)
        .fetch_one(&self.pool)
        .await?;

        let count: i64 = result.get(0);
        let count = count.max(0) as u64;

        if count > 0 {
            tracing::warn!(
                count = count,
                grace_secs = grace_secs,
                "Reaped stale import jobs"
            );
        }

        Ok(count)
    }

    /// Delete terminal jobs older than the given number of days. Returns the
    /// number of rows deleted. Retention of finished jobs is config-driven.
    #[tracing::instrument(skip(self))]
    pub async fn delete_old_finished_jobs(&self, older_than_days: i32) -> Result<u64, AppError> {
        use sqlx::Row;

        let result = sqlx::query(
            r#"
            WITH deleted AS (
                DELETE FROM import_jobs
                WHERE status IN ('completed', 'failed')
                    AND updated_at < NOW() - ($1 * interval '1 day')
                RETURNING id
            )
            SELECT COUNT(*)::bigint FROM deleted
            "#,
        )
        .bind(older_than_days)
        .fetch_one(&self.pool)
        .await?;

        let count: i64 = result.get(0);
        let count = count.max(0) as u64;

        if count > 0 {
            tracing::info!(
                count = count,
                older_than_days = older_than_days,
                "Deleted old finished import jobs"
            );
        }

        Ok(count)
    }
}
