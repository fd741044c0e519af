//! Import runner: drives one accepted payload through the row processor and
//! keeps the durable job record current.
//!
//! Row rejections are accounted and kept; any other failure (unreadable
//! record, store error) is a pipeline fault that marks the job failed with
//! the progress made so far. Rows after a fault are never attempted.

use std::time::{Duration, Instant};

use uuid::Uuid;

use campushire_core::models::{ImportJob, RejectedRow};
use campushire_core::{sheet, AppError, Config};
use campushire_db::{ImportJobStore, StudentStore};

use crate::processor::{process_row, RowOutcome};

/// Progress flush tuning: write progress to the job store every
/// `progress_batch_rows` rows or every `progress_batch_interval`, whichever
/// comes first. The terminal write always carries the final counts.
#[derive(Debug, Clone)]
pub struct ImportRunnerConfig {
    pub progress_batch_rows: usize,
    pub progress_batch_interval: Duration,
}

impl ImportRunnerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            progress_batch_rows: config.import_progress_batch_rows,
            progress_batch_interval: Duration::from_millis(
                config.import_progress_batch_interval_ms,
            ),
        }
    }
}

impl Default for ImportRunnerConfig {
    fn default() -> Self {
        Self {
            progress_batch_rows: 50,
            progress_batch_interval: Duration::from_secs(1),
        }
    }
}

struct Progress {
    processed: i64,
    rejected: Vec<RejectedRow>,
    rows_since_flush: usize,
    last_flush: Instant,
}

impl Progress {
    fn new() -> Self {
        Self {
            processed: 0,
            rejected: vec![],
            rows_since_flush: 0,
            last_flush: Instant::now(),
        }
    }
}

/// Run one import to a terminal state. On a pipeline fault the job is marked
/// failed with the rows accounted so far; the returned `Err` means even the
/// failure could not be recorded.
#[tracing::instrument(skip(config, jobs, students, payload), fields(payload_bytes = payload.len()))]
pub async fn run_import(
    config: &ImportRunnerConfig,
    jobs: &dyn ImportJobStore,
    students: &dyn StudentStore,
    job_id: Uuid,
    tenant_id: Uuid,
    payload: &[u8],
) -> Result<ImportJob, AppError> {
    let mut progress = Progress::new();
    match drive(config, jobs, students, job_id, tenant_id, payload, &mut progress).await {
        Ok(job) => {
            tracing::info!(
                job_id = %job.id,
                processed_rows = job.processed_rows,
                rejected = job.rejected_rows.len(),
                "Import completed"
            );
            Ok(job)
        }
        Err(e) => {
            tracing::error!(
                job_id = %job_id,
                processed_rows = progress.processed,
                error = %e,
                "Import failed"
            );
            jobs.mark_failed(
                job_id,
                progress.processed,
                &progress.rejected,
                &e.to_string(),
            )
            .await
        }
    }
}

async fn drive(
    config: &ImportRunnerConfig,
    jobs: &dyn ImportJobStore,
    students: &dyn StudentStore,
    job_id: Uuid,
    tenant_id: Uuid,
    payload: &[u8],
    progress: &mut Progress,
) -> Result<ImportJob, AppError> {
    // Counting pass first, so total_rows is known before any row is written.
    let total_rows = sheet::count_rows(payload)?;
    jobs.mark_processing(job_id, total_rows).await?;

    for row in sheet::parse(payload)? {
        let row = row?;

        match process_row(students, tenant_id, &row).await? {
            RowOutcome::Ok => {}
            RowOutcome::Rejected(reason) => progress.rejected.push(RejectedRow {
                row_index: row.row_index,
                reason,
            }),
        }
        progress.processed += 1;
        progress.rows_since_flush += 1;

        if progress.rows_since_flush >= config.progress_batch_rows
            || progress.last_flush.elapsed() >= config.progress_batch_interval
        {
            jobs.record_progress(job_id, progress.processed, &progress.rejected)
                .await?;
            progress.rows_since_flush = 0;
            progress.last_flush = Instant::now();
        }
    }

    jobs.mark_completed(job_id, progress.processed, &progress.rejected)
        .await
}
