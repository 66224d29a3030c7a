//! Volume group API

use crate::api::common::{segment, Empty};
use crate::api::{error::ApiError, Client};
use serde::{Deserialize, Serialize};

pub struct VolumeGroupsApi<'a> {
    client: &'a Client,
    base: String,
}

impl<'a> VolumeGroupsApi<'a> {
    pub fn new(client: &'a Client, cloud_path: String) -> Self {
        Self {
            client,
            base: format!("{}/volume-groups", cloud_path),
        }
    }

    fn group_path(&self, group_id: &str) -> String {
        format!("{}/{}", self.base, segment(group_id))
    }

    /// GET /volume-groups/{id}
    pub async fn get(&self, group_id: &str) -> Result<VolumeGroup, ApiError> {
        self.client.get(&self.group_path(group_id)).await
    }

    /// GET /volume-groups/{id}/details
    pub async fn get_details(&self, group_id: &str) -> Result<VolumeGroupDetails, ApiError> {
        let path = format!("{}/details", self.group_path(group_id));
        self.client.get(&path).await
    }

    /// GET /volume-groups/details
    pub async fn list_details(&self) -> Result<Vec<VolumeGroupDetails>, ApiError> {
        let path = format!("{}/details", self.base);
        let list: VolumeGroupDetailsList = self.client.get(&path).await?;
        Ok(list.volume_groups)
    }

    /// POST /volume-groups
    pub async fn create(&self, request: &CreateVolumeGroupRequest) -> Result<VolumeGroup, ApiError> {
        self.client.post(&self.base, request).await
    }

    /// PUT /volume-groups/{id}
    pub async fn update(&self, group_id: &str, request: &UpdateVolumeGroupRequest) -> Result<Empty, ApiError> {
        self.client.put(&self.group_path(group_id), request).await
    }

    /// DELETE /volume-groups/{id}
    pub async fn delete(&self, group_id: &str) -> Result<Empty, ApiError> {
        self.client.delete(&self.group_path(group_id)).await
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VolumeGroupDetailsList {
    #[serde(default)]
    volume_groups: Vec<VolumeGroupDetails>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeGroup {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub replication_status: Option<String>,
    #[serde(default)]
    pub consistency_group_name: Option<String>,
}

impl VolumeGroup {
    pub fn status(&self) -> &str {
        self.status.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusDescriptionError {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "volIDs", default)]
    pub volume_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusDescription {
    #[serde(default)]
    pub errors: Vec<StatusDescriptionError>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeGroupDetails {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub replication_status: Option<String>,
    #[serde(default)]
    pub consistency_group_name: Option<String>,
    #[serde(rename = "volumeIDs", default)]
    pub volume_ids: Vec<String>,
    #[serde(default)]
    pub status_description: Option<StatusDescription>,
}

impl VolumeGroupDetails {
    pub fn errors(&self) -> &[StatusDescriptionError] {
        self.status_description
            .as_ref()
            .map(|s| s.errors.as_slice())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVolumeGroupRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consistency_group_name: Option<String>,
    #[serde(rename = "volumeIDs")]
    pub volume_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateVolumeGroupRequest {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub add_volumes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub remove_volumes: Vec<String>,
}
