//! OpenAPI documentation.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use campushire_core::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Campushire API",
        version = "0.1.0",
        description = "Campus recruiting platform API (v0). Bulk student-data imports run as tracked background jobs; all endpoints are versioned under /api/v0/."
    ),
    paths(
        handlers::import_submit::submit_import,
        handlers::import_status::get_import,
        handlers::import_status::latest_import,
        handlers::health::health_check,
    ),
    components(schemas(
        models::ImportStatus,
        models::RejectedRow,
        models::ImportJobResponse,
        models::ImportSubmitResponse,
        error::ErrorResponse,
    )),
    tags(
        (name = "imports", description = "Bulk student-data import jobs"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;
