use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use campushire_core::models::ImportSubmitResponse;
use campushire_core::AppError;

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

/// Submit a student spreadsheet for import
///
/// Accepts the file, runs the syntactic pre-checks, creates the durable job
/// record, and queues the work. Returns `202 Accepted` with the job id; the
/// actual import runs in the background and is observed via the status
/// endpoints.
///
/// # Errors
/// - `AppError::UnparseableFile` - Empty file or missing required columns
/// - `AppError::PayloadTooLarge` - File exceeds the configured size limit
/// - `AppError::ImportInProgress` - The college already has an import in flight
#[utoipa::path(
    post,
    path = "/api/v0/colleges/{college_id}/imports",
    tag = "imports",
    params(
        ("college_id" = Uuid, Path, description = "College (tenant) id")
    ),
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 202, description = "Import accepted and queued", body = ImportSubmitResponse),
        (status = 400, description = "Unparseable file", body = ErrorResponse),
        (status = 409, description = "Import already in progress", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(state, multipart),
    fields(college_id = %college_id, operation = "submit_import")
)]
pub async fn submit_import(
    State(state): State<Arc<AppState>>,
    Path(college_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ImportSubmitResponse>), HttpAppError> {
    let payload = read_file_field(&mut multipart).await?;

    let job = state
        .import_queue
        .submit(college_id, payload)
        .await
        .map_err(HttpAppError::from)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ImportSubmitResponse {
            job_id: job.id,
            status: job.status,
        }),
    ))
}

/// Pull the uploaded file out of the multipart body. Accepts the field named
/// `file`, or any field carrying a filename.
async fn read_file_field(multipart: &mut Multipart) -> Result<Vec<u8>, HttpAppError> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        HttpAppError(AppError::BadRequest(format!(
            "Invalid multipart payload: {}",
            e
        )))
    })? {
        if field.name() != Some("file") && field.file_name().is_none() {
            continue;
        }
        let bytes = field.bytes().await.map_err(|e| {
            HttpAppError(AppError::BadRequest(format!(
                "Failed to read file field: {}",
                e
            )))
        })?;
        return Ok(bytes.to_vec());
    }

    Err(HttpAppError(AppError::BadRequest(
        "Missing file field in multipart payload".to_string(),
    )))
}
