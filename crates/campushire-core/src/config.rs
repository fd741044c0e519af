//! Configuration module
//!
//! Environment-driven configuration for the API server, database pool, and
//! the import pipeline tuning knobs.

use std::env;
use std::str::FromStr;

// Common defaults
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const SERVER_PORT: u16 = 3000;
const IMPORT_MAX_FILE_SIZE_BYTES: usize = 10 * 1024 * 1024;
const IMPORT_QUEUE_SIZE: usize = 64;
const IMPORT_MAX_CONCURRENT_JOBS: usize = 4;
const IMPORT_PROGRESS_BATCH_ROWS: usize = 50;
const IMPORT_PROGRESS_BATCH_INTERVAL_MS: u64 = 1000;
const IMPORT_STALE_JOB_GRACE_SECS: u64 = 900;
const IMPORT_STALE_JOB_REAP_INTERVAL_SECS: u64 = 60;

/// Application configuration, loaded from the environment.
#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub environment: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    /// Maximum accepted upload size in bytes.
    pub import_max_file_size_bytes: usize,
    /// Bound of the in-process import job channel.
    pub import_queue_size: usize,
    /// Maximum imports processed concurrently (across tenants).
    pub import_max_concurrent_jobs: usize,
    /// Flush progress to the job store every N rows...
    pub import_progress_batch_rows: usize,
    /// ...or every T milliseconds, whichever comes first.
    pub import_progress_batch_interval_ms: u64,
    /// Retention in days for finished import jobs. 0 = disabled.
    pub import_retention_days: i32,
    /// Interval in seconds between retention sweeps. 0 = disabled.
    pub import_retention_sweep_interval_secs: u64,
    /// How long a queued/processing job may sit without an `updated_at`
    /// advance before the reaper marks it failed.
    pub import_stale_job_grace_secs: u64,
    /// Interval in seconds between stale-job reaps. 0 = disabled.
    pub import_stale_job_reap_interval_secs: u64,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let config = Self {
            server_port: env_or("SERVER_PORT", SERVER_PORT),
            cors_origins,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            database_url,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", MAX_CONNECTIONS),
            db_timeout_seconds: env_or("DB_TIMEOUT_SECONDS", CONNECTION_TIMEOUT_SECS),
            import_max_file_size_bytes: env_or(
                "IMPORT_MAX_FILE_SIZE_BYTES",
                IMPORT_MAX_FILE_SIZE_BYTES,
            ),
            import_queue_size: env_or("IMPORT_QUEUE_SIZE", IMPORT_QUEUE_SIZE),
            import_max_concurrent_jobs: env_or(
                "IMPORT_MAX_CONCURRENT_JOBS",
                IMPORT_MAX_CONCURRENT_JOBS,
            ),
            import_progress_batch_rows: env_or(
                "IMPORT_PROGRESS_BATCH_ROWS",
                IMPORT_PROGRESS_BATCH_ROWS,
            ),
            import_progress_batch_interval_ms: env_or(
                "IMPORT_PROGRESS_BATCH_INTERVAL_MS",
                IMPORT_PROGRESS_BATCH_INTERVAL_MS,
            ),
            import_retention_days: env_or("IMPORT_RETENTION_DAYS", 0),
            import_retention_sweep_interval_secs: env_or(
                "IMPORT_RETENTION_SWEEP_INTERVAL_SECS",
                3600,
            ),
            import_stale_job_grace_secs: env_or(
                "IMPORT_STALE_JOB_GRACE_SECS",
                IMPORT_STALE_JOB_GRACE_SECS,
            ),
            import_stale_job_reap_interval_secs: env_or(
                "IMPORT_STALE_JOB_REAP_INTERVAL_SECS",
                IMPORT_STALE_JOB_REAP_INTERVAL_SECS,
            ),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.database_url.is_empty() {
            anyhow::bail!("DATABASE_URL must not be empty");
        }
        if self.import_queue_size == 0 {
            anyhow::bail!("IMPORT_QUEUE_SIZE must be at least 1");
        }
        if self.import_max_concurrent_jobs == 0 {
            anyhow::bail!("IMPORT_MAX_CONCURRENT_JOBS must be at least 1");
        }
        if self.import_progress_batch_rows == 0 {
            anyhow::bail!("IMPORT_PROGRESS_BATCH_ROWS must be at least 1");
        }
        if self.import_stale_job_reap_interval_secs > 0 && self.import_stale_job_grace_secs == 0 {
            anyhow::bail!(
                "IMPORT_STALE_JOB_GRACE_SECS must be at least 1 while the stale-job reaper is enabled"
            );
        }
        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }
}
