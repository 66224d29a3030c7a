//! Waiting on asynchronous jobs started by image import, export and capture

use crate::api::jobs::{Job, JOB_COMPLETED, JOB_FAILED, JOB_PENDING};
use crate::api::ApiError;
use crate::provider_data::PpcProviderData;
use crate::waiter::{Observation, WaitError, Waiter};
use std::time::Duration;
use thiserror::Error;
use tfplug::context::Context;

#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("failed to get job status for job id {0}")]
    MissingStatus(String),

    #[error("job status failed for job id {id} with message: {message}")]
    Failed { id: String, message: String },
}

/// Maps a job to its state. A failed job or one without a state is an error
/// rather than an observation so the waiter stops with the job's message.
pub(crate) fn job_state(job: Job) -> Result<Observation<Job>, JobError> {
    let state = match job.state() {
        None | Some("") => return Err(JobError::MissingStatus(job.id)),
        Some(state) => state.to_string(),
    };

    if state == JOB_FAILED {
        return Err(JobError::Failed {
            message: job.message().unwrap_or_default().to_string(),
            id: job.id,
        });
    }

    Ok(Observation::new(job, state))
}

/// Polls the job until it completes
pub(crate) async fn wait_for_job(
    ctx: &Context,
    data: &PpcProviderData,
    cloud: &str,
    job_id: &str,
    timeout: Duration,
) -> Result<Option<Job>, WaitError> {
    let waiter = Waiter::new(&JOB_PENDING, &[JOB_COMPLETED])?
        .delay(Duration::from_secs(10))
        .poll_interval(Duration::from_secs(10))
        .timeout(timeout);
    let api = data.client.cloud(cloud);
    let api = &api;

    tracing::debug!("Waiting for job {} in {}", job_id, cloud);
    data.tune(waiter)
        .wait(ctx, move || async move {
            let job = api.jobs().get(job_id).await?;
            job_state(job)
        })
        .await
}
