//! Asynchronous job API

use crate::api::common::segment;
use crate::api::{error::ApiError, Client};
use serde::{Deserialize, Serialize};

pub const JOB_COMPLETED: &str = "completed";
pub const JOB_FAILED: &str = "failed";

/// Non-terminal job states
pub const JOB_PENDING: [&str; 5] = [
    "queued",
    "readyForProcessing",
    "inProgress",
    "running",
    "waiting",
];

pub struct JobsApi<'a> {
    client: &'a Client,
    base: String,
}

impl<'a> JobsApi<'a> {
    pub fn new(client: &'a Client, cloud_path: String) -> Self {
        Self {
            client,
            base: format!("{}/jobs", cloud_path),
        }
    }

    /// GET /jobs/{id}
    pub async fn get(&self, job_id: &str) -> Result<Job, ApiError> {
        let path = format!("{}/{}", self.base, segment(job_id));
        self.client.get(&path).await
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobStatus {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub progress: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobOperation {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    #[serde(default)]
    pub status: Option<JobStatus>,
    #[serde(default)]
    pub operation: Option<JobOperation>,
}

impl Job {
    pub fn state(&self) -> Option<&str> {
        self.status.as_ref().and_then(|s| s.state.as_deref())
    }

    pub fn message(&self) -> Option<&str> {
        self.status.as_ref().and_then(|s| s.message.as_deref())
    }
}
