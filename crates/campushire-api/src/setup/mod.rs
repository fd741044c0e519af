//! Application setup and initialization
//!
//! All initialization logic lives here rather than in main.rs, so the pieces
//! stay individually testable.

pub mod database;
pub mod routes;
pub mod server;

use std::sync::Arc;

use anyhow::{Context, Result};

use campushire_core::Config;
use campushire_db::{ImportJobRepository, StudentRepository};
use campushire_worker::{ImportQueue, ImportQueueConfig};

use crate::state::AppState;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    // Fail fast on misconfiguration
    config
        .validate()
        .context("Configuration validation failed")?;

    crate::telemetry::init_telemetry();
    crate::error::set_production(config.is_production());
    tracing::info!("Configuration loaded and validated successfully");

    let pool = database::setup_database(&config).await?;

    let import_job_repository = ImportJobRepository::new(pool.clone());
    let student_repository = StudentRepository::new(pool.clone());

    let import_queue = ImportQueue::new(
        ImportQueueConfig::from_config(&config),
        Arc::new(import_job_repository.clone()),
        Arc::new(student_repository),
    );

    crate::retention::spawn_retention_sweep(&config, import_job_repository.clone());
    crate::retention::spawn_stale_job_reaper(&config, import_job_repository.clone());

    let state = Arc::new(AppState {
        pool,
        import_job_repository,
        import_queue,
    });

    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}
