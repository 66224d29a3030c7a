//! Instance snapshot API

use crate::api::common::{segment, Empty};
use crate::api::{error::ApiError, Client};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub struct SnapshotsApi<'a> {
    client: &'a Client,
    base: String,
}

impl<'a> SnapshotsApi<'a> {
    pub fn new(client: &'a Client, cloud_path: String) -> Self {
        Self {
            client,
            base: format!("{}/snapshots", cloud_path),
        }
    }

    fn snapshot_path(&self, snapshot_id: &str) -> String {
        format!("{}/{}", self.base, segment(snapshot_id))
    }

    /// GET /snapshots
    pub async fn list(&self) -> Result<Vec<Snapshot>, ApiError> {
        let list: SnapshotList = self.client.get(&self.base).await?;
        Ok(list.snapshots)
    }

    /// GET /snapshots/{id}
    pub async fn get(&self, snapshot_id: &str) -> Result<Snapshot, ApiError> {
        self.client.get(&self.snapshot_path(snapshot_id)).await
    }

    /// PUT /snapshots/{id}
    pub async fn update(&self, snapshot_id: &str, request: &UpdateSnapshotRequest) -> Result<Empty, ApiError> {
        self.client.put(&self.snapshot_path(snapshot_id), request).await
    }

    /// DELETE /snapshots/{id}
    pub async fn delete(&self, snapshot_id: &str) -> Result<Empty, ApiError> {
        self.client.delete(&self.snapshot_path(snapshot_id)).await
    }
}

#[derive(Debug, Deserialize)]
struct SnapshotList {
    #[serde(default)]
    snapshots: Vec<Snapshot>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(rename = "snapshotID")]
    pub snapshot_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub percent_complete: Option<f64>,
    #[serde(default)]
    pub creation_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_update_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub volume_snapshots: HashMap<String, String>,
    #[serde(rename = "pvmInstanceID", default)]
    pub pvm_instance_id: Option<String>,
}

impl Snapshot {
    pub fn status(&self) -> &str {
        self.status.as_deref().unwrap_or_default()
    }

    pub fn is_complete(&self) -> bool {
        self.percent_complete.unwrap_or_default() >= 100.0
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct UpdateSnapshotRequest {
    pub name: String,
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::create_test_client;
    use mockito::Server;

    #[tokio::test]
    async fn test_get_snapshot() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/ppc/v1/cloud-instances/cloud-1/snapshots/snap-1")
            .with_status(200)
            .with_body(
                r#"{"snapshotID": "snap-1", "name": "nightly", "status": "available",
                    "percentComplete": 100, "creationDate": "2024-05-01T00:00:00Z",
                    "volumeSnapshots": {"vol-1": "vsnap-1"}}"#,
            )
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let snapshot = client.cloud("cloud-1").snapshots().get("snap-1").await.unwrap();

        assert!(snapshot.is_complete());
        assert_eq!(snapshot.status(), "available");
        assert_eq!(snapshot.volume_snapshots.get("vol-1").map(String::as_str), Some("vsnap-1"));
    }
}
