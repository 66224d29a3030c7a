//! SAP profile and SAP instance API

use crate::api::common::{segment, NetworkAttachment, StorageAffinity};
use crate::api::instances::PvmInstance;
use crate::api::{error::ApiError, Client};
use serde::{Deserialize, Serialize};

pub struct SapApi<'a> {
    client: &'a Client,
    base: String,
}

impl<'a> SapApi<'a> {
    pub fn new(client: &'a Client, cloud_path: String) -> Self {
        Self {
            client,
            base: format!("{}/sap", cloud_path),
        }
    }

    /// GET /sap
    pub async fn list_profiles(&self) -> Result<Vec<SapProfile>, ApiError> {
        let list: SapProfileList = self.client.get(&self.base).await?;
        Ok(list.profiles)
    }

    /// GET /sap/{profile}
    pub async fn get_profile(&self, profile_id: &str) -> Result<SapProfile, ApiError> {
        let path = format!("{}/{}", self.base, segment(profile_id));
        self.client.get(&path).await
    }

    /// POST /sap, provisions instances from a certified profile
    pub async fn create(&self, request: &CreateSapInstanceRequest) -> Result<Vec<PvmInstance>, ApiError> {
        self.client.post(&self.base, request).await
    }
}

#[derive(Debug, Deserialize)]
struct SapProfileList {
    #[serde(default)]
    profiles: Vec<SapProfile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SapProfile {
    #[serde(rename = "profileID")]
    pub profile_id: String,
    #[serde(default)]
    pub certified: Option<bool>,
    #[serde(default)]
    pub cores: Option<i64>,
    #[serde(default)]
    pub memory: Option<i64>,
    #[serde(rename = "type", default)]
    pub type_: Option<String>,
}

/// Replica settings for multi-instance SAP provisioning
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SapInstanceCount {
    pub count: i64,
    pub affinity_policy: String,
    pub numerical: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSapInstanceRequest {
    pub name: String,
    #[serde(rename = "profileID")]
    pub profile_id: String,
    #[serde(rename = "imageID")]
    pub image_id: String,
    pub networks: Vec<NetworkAttachment>,
    pub instances: SapInstanceCount,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment_type: Option<String>,
    #[serde(rename = "volumeIDs", skip_serializing_if = "Vec::is_empty")]
    pub volume_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pin_policy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_key_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sys_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_pool: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_affinity: Option<StorageAffinity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placement_group: Option<String>,
}
