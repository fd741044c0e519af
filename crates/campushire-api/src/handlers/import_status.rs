use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use campushire_core::models::ImportJobResponse;
use campushire_core::AppError;

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

/// Get one import job by id
#[utoipa::path(
    get,
    path = "/api/v0/colleges/{college_id}/imports/{job_id}",
    tag = "imports",
    params(
        ("college_id" = Uuid, Path, description = "College (tenant) id"),
        ("job_id" = Uuid, Path, description = "Import job id")
    ),
    responses(
        (status = 200, description = "Import job status", body = ImportJobResponse),
        (status = 404, description = "Job not found for this college", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(operation = "get_import"))]
pub async fn get_import(
    State(state): State<Arc<AppState>>,
    Path((college_id, job_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ImportJobResponse>, HttpAppError> {
    let job = state
        .import_job_repository
        .get_job(college_id, job_id)
        .await
        .map_err(HttpAppError::from)?
        .ok_or_else(|| HttpAppError(AppError::NotFound("Import job not found".to_string())))?;

    Ok(Json(job.into()))
}

/// Get a college's most recently created import job
#[utoipa::path(
    get,
    path = "/api/v0/colleges/{college_id}/imports/latest",
    tag = "imports",
    params(
        ("college_id" = Uuid, Path, description = "College (tenant) id")
    ),
    responses(
        (status = 200, description = "Most recent import job", body = ImportJobResponse),
        (status = 404, description = "College has no import jobs", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(operation = "latest_import"))]
pub async fn latest_import(
    State(state): State<Arc<AppState>>,
    Path(college_id): Path<Uuid>,
) -> Result<Json<ImportJobResponse>, HttpAppError> {
    let job = state
        .import_job_repository
        .latest_job(college_id)
        .await
        .map_err(HttpAppError::from)?
        .ok_or_else(|| {
            HttpAppError(AppError::NotFound(
                "No import jobs for this college".to_string(),
            ))
        })?;

    Ok(Json(job.into()))
}
