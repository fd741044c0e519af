//! Application state shared across handlers.

use sqlx::PgPool;

use campushire_db::ImportJobRepository;
use campushire_worker::ImportQueue;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub import_job_repository: ImportJobRepository,
    pub import_queue: ImportQueue,
}
