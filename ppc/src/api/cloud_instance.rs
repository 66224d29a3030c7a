//! Cloud instance (tenant workspace) scope
//!
//! Every PPC object lives under `/ppc/v1/cloud-instances/{cloud}`. The
//! [`CloudApi`] accessor carries that prefix and hands out one sub-API per
//! resource kind.

use crate::api::common::segment;
use crate::api::{
    client::Client, error::ApiError, images::ImagesApi, instances::InstancesApi, jobs::JobsApi,
    keys::KeysApi, networks::NetworksApi, placement_groups::PlacementGroupsApi, sap::SapApi,
    snapshots::SnapshotsApi, storage_capacity::StorageCapacityApi, volume_groups::VolumeGroupsApi,
    volumes::VolumesApi,
};
use serde::{Deserialize, Serialize};

/// Capability flag that allows changing assigned virtual cores in place
pub const CUSTOM_VIRTUAL_CORES: &str = "custom-virtualcores";

pub struct CloudApi<'a> {
    client: &'a Client,
    cloud_instance_id: String,
}

impl<'a> CloudApi<'a> {
    pub fn new(client: &'a Client, cloud_instance_id: &str) -> Self {
        Self {
            client,
            cloud_instance_id: cloud_instance_id.to_string(),
        }
    }

    pub fn cloud_instance_id(&self) -> &str {
        &self.cloud_instance_id
    }

    /// Path prefix shared by every call in this cloud instance
    pub fn base_path(&self) -> String {
        format!(
            "/ppc/v1/cloud-instances/{}",
            segment(&self.cloud_instance_id)
        )
    }

    /// GET /ppc/v1/cloud-instances/{cloud}
    pub async fn get(&self) -> Result<CloudInstance, ApiError> {
        self.client.get(&self.base_path()).await
    }

    pub fn instances(&self) -> InstancesApi<'a> {
        InstancesApi::new(self.client, self.base_path())
    }

    pub fn sap(&self) -> SapApi<'a> {
        SapApi::new(self.client, self.base_path())
    }

    pub fn volumes(&self) -> VolumesApi<'a> {
        VolumesApi::new(self.client, self.base_path())
    }

    pub fn networks(&self) -> NetworksApi<'a> {
        NetworksApi::new(self.client, self.base_path())
    }

    pub fn images(&self) -> ImagesApi<'a> {
        ImagesApi::new(self.client, self.base_path())
    }

    pub fn jobs(&self) -> JobsApi<'a> {
        JobsApi::new(self.client, self.base_path())
    }

    pub fn keys(&self) -> KeysApi<'a> {
        KeysApi::new(self.client, self.base_path())
    }

    pub fn snapshots(&self) -> SnapshotsApi<'a> {
        SnapshotsApi::new(self.client, self.base_path())
    }

    pub fn placement_groups(&self) -> PlacementGroupsApi<'a> {
        PlacementGroupsApi::new(self.client, self.base_path())
    }

    pub fn volume_groups(&self) -> VolumeGroupsApi<'a> {
        VolumeGroupsApi::new(self.client, self.base_path())
    }

    pub fn storage_capacity(&self) -> StorageCapacityApi<'a> {
        StorageCapacityApi::new(self.client, self.base_path())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudInstance {
    #[serde(default, rename = "cloudInstanceID")]
    pub cloud_instance_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl CloudInstance {
    pub fn has_capability(&self, capability: &str) -> bool {
        tracing::debug!(
            "Checking for capability {} in {:?}",
            capability,
            self.capabilities
        );
        self.capabilities.iter().any(|c| c == capability)
    }
}
