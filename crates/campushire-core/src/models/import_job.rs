use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// Import job lifecycle. `queued -> processing -> {completed, failed}`;
/// nothing leaves a terminal state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl ImportStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ImportStatus::Completed | ImportStatus::Failed)
    }
}

impl Display for ImportStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ImportStatus::Queued => write!(f, "queued"),
            ImportStatus::Processing => write!(f, "processing"),
            ImportStatus::Completed => write!(f, "completed"),
            ImportStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for ImportStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(ImportStatus::Queued),
            "processing" => Ok(ImportStatus::Processing),
            "completed" => Ok(ImportStatus::Completed),
            "failed" => Ok(ImportStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid import status: {}", s)),
        }
    }
}

/// One rejected source row: its 1-based position in the file and the reason.
/// Accumulated on the job record, never discarded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct RejectedRow {
    pub row_index: i64,
    pub reason: String,
}

/// One tracked attempt to bulk-load a college's student records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportJob {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub status: ImportStatus,
    pub total_rows: i64,
    pub processed_rows: i64,
    pub rejected_rows: Vec<RejectedRow>,
    /// Pipeline-level failure reason; set only with `status = failed`.
    /// Row-level rejections live in `rejected_rows` instead.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(feature = "sqlx")]
impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for ImportJob {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(ImportJob {
            id: row.get("id"),
            tenant_id: row.get("tenant_id"),
            status: row.get::<String, _>("status").parse().map_err(|e| {
                sqlx::Error::Decode(format!("Failed to parse import status: {}", e).into())
            })?,
            total_rows: row.get("total_rows"),
            processed_rows: row.get("processed_rows"),
            rejected_rows: serde_json::from_value(
                row.get::<serde_json::Value, _>("rejected_rows"),
            )
            .map_err(|e| {
                sqlx::Error::Decode(format!("Failed to decode rejected_rows: {}", e).into())
            })?,
            error: row.get("error"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

impl ImportJob {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// True when the worker has accounted for every source row. Necessary but
    /// not sufficient for `completed`: the terminal status write still decides.
    pub fn is_fully_processed(&self) -> bool {
        self.total_rows > 0 && self.processed_rows == self.total_rows
    }
}

/// Response model for the status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ImportJobResponse {
    pub job_id: Uuid,
    pub status: ImportStatus,
    pub total_rows: i64,
    pub processed_rows: i64,
    pub rejected_rows: Vec<RejectedRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ImportJob> for ImportJobResponse {
    fn from(job: ImportJob) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            total_rows: job.total_rows,
            processed_rows: job.processed_rows,
            rejected_rows: job.rejected_rows,
            error: job.error,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

/// Response returned by the submission endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ImportSubmitResponse {
    pub job_id: Uuid,
    pub status: ImportStatus,
}
