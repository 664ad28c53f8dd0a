//! Runtime initialization and setup

use crate::app::{config::AppConfig, logging::init_logging};
use crate::config::JobConfig;
use anyhow::{Context, Result};
use tracing::info;

/// Initialize logging and load the job configuration
pub async fn initialize_app(config: &AppConfig) -> Result<JobConfig> {
    init_logging(config);

    let job = config
        .job_loader()
        .load()
        .await
        .context("Failed to load job configuration")?;

    info!(
        "Job '{}': {} tasks, up to {} attempts each",
        job.name, job.parallelism, job.retry.max_attempts
    );
    Ok(job)
}
