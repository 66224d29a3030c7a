//! PVM instance (LPAR) API

use crate::api::common::{segment, Empty, JobReference, NetworkAttachment, StorageAffinity};
use crate::api::{error::ApiError, Client};
use serde::{Deserialize, Serialize};

pub const ACTION_START: &str = "start";
pub const ACTION_IMMEDIATE_SHUTDOWN: &str = "immediate-shutdown";

pub struct InstancesApi<'a> {
    client: &'a Client,
    base: String,
}

impl<'a> InstancesApi<'a> {
    pub fn new(client: &'a Client, cloud_path: String) -> Self {
        Self {
            client,
            base: format!("{}/pvm-instances", cloud_path),
        }
    }

    fn instance_path(&self, instance_id: &str) -> String {
        format!("{}/{}", self.base, segment(instance_id))
    }

    /// GET /pvm-instances
    pub async fn list(&self) -> Result<Vec<PvmInstance>, ApiError> {
        let list: PvmInstanceList = self.client.get(&self.base).await?;
        Ok(list.pvm_instances)
    }

    /// GET /pvm-instances/{id}, the id may also be the instance name
    pub async fn get(&self, instance_id: &str) -> Result<PvmInstance, ApiError> {
        self.client.get(&self.instance_path(instance_id)).await
    }

    /// POST /pvm-instances
    pub async fn create(&self, request: &CreateInstanceRequest) -> Result<Vec<PvmInstance>, ApiError> {
        self.client.post(&self.base, request).await
    }

    /// PUT /pvm-instances/{id}
    pub async fn update(
        &self,
        instance_id: &str,
        request: &UpdateInstanceRequest,
    ) -> Result<Empty, ApiError> {
        self.client.put(&self.instance_path(instance_id), request).await
    }

    /// DELETE /pvm-instances/{id}
    pub async fn delete(&self, instance_id: &str) -> Result<Empty, ApiError> {
        self.client.delete(&self.instance_path(instance_id)).await
    }

    /// POST /pvm-instances/{id}/action
    pub async fn action(&self, instance_id: &str, action: &str) -> Result<Empty, ApiError> {
        let path = format!("{}/action", self.instance_path(instance_id));
        self.client
            .post(
                &path,
                &InstanceAction {
                    action: action.to_string(),
                },
            )
            .await
    }

    /// GET /pvm-instances/{id}/volumes/{volume}
    pub async fn get_volume(&self, instance_id: &str, volume_id: &str) -> Result<Empty, ApiError> {
        let path = format!(
            "{}/volumes/{}",
            self.instance_path(instance_id),
            segment(volume_id)
        );
        self.client.get(&path).await
    }

    /// POST /pvm-instances/{id}/volumes/{volume}
    pub async fn attach_volume(&self, instance_id: &str, volume_id: &str) -> Result<Empty, ApiError> {
        let path = format!(
            "{}/volumes/{}",
            self.instance_path(instance_id),
            segment(volume_id)
        );
        self.client.post(&path, &Empty {}).await
    }

    /// DELETE /pvm-instances/{id}/volumes/{volume}
    pub async fn detach_volume(&self, instance_id: &str, volume_id: &str) -> Result<Empty, ApiError> {
        let path = format!(
            "{}/volumes/{}",
            self.instance_path(instance_id),
            segment(volume_id)
        );
        self.client.delete(&path).await
    }

    /// POST /pvm-instances/{id}/snapshots
    pub async fn create_snapshot(
        &self,
        instance_id: &str,
        request: &CreateSnapshotRequest,
    ) -> Result<SnapshotCreated, ApiError> {
        let path = format!("{}/snapshots", self.instance_path(instance_id));
        self.client.post(&path, request).await
    }

    /// POST /pvm-instances/{id}/capture
    pub async fn capture(
        &self,
        instance_id: &str,
        request: &CaptureRequest,
    ) -> Result<JobReference, ApiError> {
        let path = format!("{}/capture", self.instance_path(instance_id));
        self.client.post(&path, request).await
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PvmInstanceList {
    #[serde(default)]
    pvm_instances: Vec<PvmInstance>,
}

#[derive(Debug, Serialize)]
struct InstanceAction {
    action: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PvmInstance {
    #[serde(rename = "pvmInstanceID")]
    pub pvm_instance_id: String,
    #[serde(default)]
    pub server_name: Option<String>,
    #[serde(rename = "imageID", default)]
    pub image_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub health: Option<InstanceHealth>,
    #[serde(default)]
    pub fault: Option<InstanceFault>,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub memory: Option<f64>,
    #[serde(default)]
    pub processors: Option<f64>,
    #[serde(default)]
    pub proc_type: Option<String>,
    #[serde(default)]
    pub sys_type: Option<String>,
    #[serde(default)]
    pub migratable: Option<bool>,
    #[serde(rename = "minmem", default)]
    pub min_memory: Option<f64>,
    #[serde(rename = "maxmem", default)]
    pub max_memory: Option<f64>,
    #[serde(rename = "minproc", default)]
    pub min_processors: Option<f64>,
    #[serde(rename = "maxproc", default)]
    pub max_processors: Option<f64>,
    #[serde(default)]
    pub storage_type: Option<String>,
    #[serde(default)]
    pub storage_pool: Option<String>,
    #[serde(default)]
    pub storage_pool_affinity: Option<bool>,
    #[serde(default)]
    pub placement_group: Option<String>,
    #[serde(default)]
    pub networks: Vec<InstanceNetwork>,
    #[serde(default)]
    pub sap_profile: Option<SapProfileReference>,
    #[serde(default)]
    pub pin_policy: Option<String>,
    #[serde(default)]
    pub operating_system: Option<String>,
    #[serde(default)]
    pub os_type: Option<String>,
    #[serde(default)]
    pub virtual_cores: Option<VirtualCores>,
    #[serde(default)]
    pub license_repository_capacity: Option<i64>,
    #[serde(default)]
    pub deployment_type: Option<String>,
    #[serde(rename = "volumeIDs", default)]
    pub volume_ids: Vec<String>,
}

impl PvmInstance {
    pub fn status(&self) -> &str {
        self.status.as_deref().unwrap_or_default()
    }

    pub fn health_status(&self) -> &str {
        self.health
            .as_ref()
            .and_then(|h| h.status.as_deref())
            .unwrap_or_default()
    }

    pub fn fault_message(&self) -> Option<String> {
        self.fault.as_ref().and_then(|f| f.message.clone())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstanceHealth {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstanceFault {
    #[serde(default)]
    pub code: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceNetwork {
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub mac_address: Option<String>,
    #[serde(rename = "networkID", default)]
    pub network_id: Option<String>,
    #[serde(default)]
    pub network_name: Option<String>,
    #[serde(rename = "type", default)]
    pub type_: Option<String>,
    #[serde(rename = "externalIP", default)]
    pub external_ip: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SapProfileReference {
    #[serde(rename = "profileID", default)]
    pub profile_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VirtualCores {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
}

impl VirtualCores {
    pub fn assigned(assigned: i64) -> Self {
        Self {
            assigned: Some(assigned),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInstanceRequest {
    pub server_name: String,
    #[serde(rename = "imageID")]
    pub image_id: String,
    pub processors: f64,
    pub memory: f64,
    pub proc_type: String,
    pub sys_type: String,
    pub replicants: f64,
    pub replicant_naming_scheme: String,
    pub replicant_affinity_policy: String,
    pub networks: Vec<NetworkAttachment>,
    pub migratable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_pair_name: Option<String>,
    #[serde(rename = "volumeIDs", skip_serializing_if = "Vec::is_empty")]
    pub volume_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pin_policy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub virtual_cores: Option<VirtualCores>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_pool: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_affinity: Option<StorageAffinity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_connection: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placement_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_repository_capacity: Option<i64>,
}

/// Partial update. Unset fields are left alone by the server.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInstanceRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proc_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processors: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub migratable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub virtual_cores: Option<VirtualCores>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_repository_capacity: Option<i64>,
    #[serde(rename = "sapProfileID", skip_serializing_if = "Option::is_none")]
    pub sap_profile_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_pool_affinity: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSnapshotRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "volumeIDs", skip_serializing_if = "Vec::is_empty")]
    pub volume_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotCreated {
    #[serde(rename = "snapshotID")]
    pub snapshot_id: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRequest {
    pub capture_name: String,
    pub capture_destination: String,
    #[serde(rename = "captureVolumeIDs", skip_serializing_if = "Vec::is_empty")]
    pub capture_volume_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_storage_region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_storage_access_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_storage_secret_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_storage_image_path: Option<String>,
}

#[cfg(test)]
#[path = "./instances_test.rs"]
mod instances_test;
