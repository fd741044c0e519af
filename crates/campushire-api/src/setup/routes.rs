//! Route configuration and setup

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use campushire_core::Config;

use crate::api_doc::ApiDoc;
use crate::handlers;
use crate::state::AppState;

// Headroom for multipart framing on top of the file size limit
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router> {
    let cors = setup_cors(config)?;

    let app = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route(
            "/api/v0/colleges/{college_id}/imports",
            post(handlers::import_submit::submit_import),
        )
        .route(
            "/api/v0/colleges/{college_id}/imports/latest",
            get(handlers::import_status::latest_import),
        )
        .route(
            "/api/v0/colleges/{college_id}/imports/{job_id}",
            get(handlers::import_status::get_import),
        )
        .route("/api/openapi.json", get(openapi_spec))
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(
            config.import_max_file_size_bytes + MULTIPART_OVERHEAD_BYTES,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(app)
}

async fn openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

fn setup_cors(config: &Config) -> Result<CorsLayer> {
    let cors = if config.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins
            .iter()
            .map(|origin| origin.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .context("Invalid CORS origin")?;
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(Any)
    };

    Ok(cors)
}
