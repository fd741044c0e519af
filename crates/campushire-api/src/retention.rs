//! Background maintenance tasks over the import job table.
//!
//! The retention sweep deletes finished jobs past their retention window; it
//! is disabled unless `IMPORT_RETENTION_DAYS` is set to a positive number of
//! days and only ever touches terminal jobs. The stale-job reaper fails
//! queued/processing jobs whose worker stopped reporting progress, so a crash
//! or kill mid-import cannot hold a tenant's single-flight gate forever. Its
//! first tick runs at startup, recovering jobs orphaned by the previous
//! process.

use campushire_core::Config;
use campushire_db::ImportJobRepository;
use std::time::Duration;

pub fn spawn_retention_sweep(config: &Config, repository: ImportJobRepository) {
    if config.import_retention_days <= 0 || config.import_retention_sweep_interval_secs == 0 {
        tracing::info!("Import job retention sweep disabled");
        return;
    }

    let retention_days = config.import_retention_days;
    let interval = Duration::from_secs(config.import_retention_sweep_interval_secs);
    tracing::info!(
        retention_days,
        sweep_interval_secs = interval.as_secs(),
        "Import job retention sweep enabled"
    );

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match repository.delete_old_finished_jobs(retention_days).await {
                Ok(0) => {}
                Ok(deleted) => {
                    tracing::info!(deleted, "Retention sweep removed finished import jobs");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Retention sweep failed");
                }
            }
        }
    });
}

pub fn spawn_stale_job_reaper(config: &Config, repository: ImportJobRepository) {
    if config.import_stale_job_reap_interval_secs == 0 {
        tracing::info!("Stale import job reaper disabled");
        return;
    }

    let grace_secs = config.import_stale_job_grace_secs;
    let interval = Duration::from_secs(config.import_stale_job_reap_interval_secs);
    tracing::info!(
        grace_secs,
        reap_interval_secs = interval.as_secs(),
        "Stale import job reaper enabled"
    );

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if let Err(e) = repository.reap_stale_jobs(grace_secs).await {
                tracing::error!(error = %e, "Stale job reap failed");
            }
        }
    });
}
