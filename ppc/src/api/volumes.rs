//! Volume API

use crate::api::common::{segment, Empty};
use crate::api::{error::ApiError, Client};
use serde::{Deserialize, Serialize};

pub struct VolumesApi<'a> {
    client: &'a Client,
    base: String,
}

impl<'a> VolumesApi<'a> {
    pub fn new(client: &'a Client, cloud_path: String) -> Self {
        Self {
            client,
            base: format!("{}/volumes", cloud_path),
        }
    }

    fn volume_path(&self, volume_id: &str) -> String {
        format!("{}/{}", self.base, segment(volume_id))
    }

    /// GET /volumes/{id}
    pub async fn get(&self, volume_id: &str) -> Result<Volume, ApiError> {
        self.client.get(&self.volume_path(volume_id)).await
    }

    /// POST /volumes
    pub async fn create(&self, request: &CreateVolumeRequest) -> Result<Volume, ApiError> {
        self.client.post(&self.base, request).await
    }

    /// PUT /volumes/{id}
    pub async fn update(&self, volume_id: &str, request: &UpdateVolumeRequest) -> Result<Volume, ApiError> {
        self.client.put(&self.volume_path(volume_id), request).await
    }

    /// DELETE /volumes/{id}
    pub async fn delete(&self, volume_id: &str) -> Result<Empty, ApiError> {
        self.client.delete(&self.volume_path(volume_id)).await
    }

    /// PUT /volumes/{id}/action
    pub async fn action(&self, volume_id: &str, request: &VolumeAction) -> Result<Empty, ApiError> {
        let path = format!("{}/action", self.volume_path(volume_id));
        self.client.put(&path, request).await
    }

    /// GET /volumes/{id}/flash-copy-mappings
    pub async fn flash_copy_mappings(&self, volume_id: &str) -> Result<Vec<FlashCopyMapping>, ApiError> {
        let path = format!("{}/flash-copy-mappings", self.volume_path(volume_id));
        self.client.get(&path).await
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    #[serde(rename = "volumeID")]
    pub volume_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub size: Option<f64>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub shareable: Option<bool>,
    #[serde(default)]
    pub bootable: Option<bool>,
    #[serde(default)]
    pub disk_type: Option<String>,
    #[serde(default)]
    pub volume_pool: Option<String>,
    #[serde(rename = "pvmInstanceIDs", default)]
    pub pvm_instance_ids: Vec<String>,
    #[serde(default)]
    pub delete_on_termination: Option<bool>,
    #[serde(default)]
    pub wwn: Option<String>,
    #[serde(default)]
    pub replication_enabled: Option<bool>,
    #[serde(default)]
    pub auxiliary: Option<bool>,
    #[serde(default)]
    pub consistency_group_name: Option<String>,
    #[serde(rename = "groupID", default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub replication_type: Option<String>,
    #[serde(default)]
    pub replication_status: Option<String>,
    #[serde(default)]
    pub mirroring_state: Option<String>,
    #[serde(default)]
    pub primary_role: Option<String>,
    #[serde(default)]
    pub master_volume_name: Option<String>,
    #[serde(default)]
    pub aux_volume_name: Option<String>,
}

impl Volume {
    pub fn state(&self) -> &str {
        self.state.as_deref().unwrap_or_default()
    }

    pub fn is_shareable(&self) -> bool {
        self.shareable.unwrap_or(false)
    }

    pub fn attached_to(&self, instance_id: &str) -> bool {
        self.pvm_instance_ids.iter().any(|id| id == instance_id)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVolumeRequest {
    pub name: String,
    pub size: f64,
    pub shareable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_pool: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replication_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affinity_policy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affinity_volume: Option<String>,
    #[serde(rename = "affinityPVMInstance", skip_serializing_if = "Option::is_none")]
    pub affinity_pvm_instance: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub anti_affinity_volumes: Vec<String>,
    #[serde(rename = "antiAffinityPVMInstances", skip_serializing_if = "Vec::is_empty")]
    pub anti_affinity_pvm_instances: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateVolumeRequest {
    pub name: String,
    pub size: f64,
    pub shareable: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeAction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replication_enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlashCopyMapping {
    #[serde(default)]
    pub flash_copy_name: Option<String>,
    #[serde(default)]
    pub copy_rate: Option<i64>,
    #[serde(default)]
    pub progress: Option<i64>,
    #[serde(default)]
    pub source_volume_name: Option<String>,
    #[serde(default)]
    pub target_volume_name: Option<String>,
    #[serde(default)]
    pub start_time: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub status: Option<String>,
}
