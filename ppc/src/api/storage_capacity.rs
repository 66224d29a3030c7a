//! Storage capacity API

use crate::api::common::segment;
use crate::api::{error::ApiError, Client};
use serde::{Deserialize, Serialize};

pub struct StorageCapacityApi<'a> {
    client: &'a Client,
    base: String,
}

impl<'a> StorageCapacityApi<'a> {
    pub fn new(client: &'a Client, cloud_path: String) -> Self {
        Self {
            client,
            base: format!("{}/storage-capacity", cloud_path),
        }
    }

    /// GET /storage-capacity/storage-pools/{pool}
    pub async fn pool(&self, pool: &str) -> Result<StoragePoolCapacity, ApiError> {
        let path = format!("{}/storage-pools/{}", self.base, segment(pool));
        self.client.get(&path).await
    }

    /// GET /storage-capacity/storage-types/{type}
    pub async fn storage_type(&self, storage_type: &str) -> Result<StorageTypeCapacity, ApiError> {
        let path = format!("{}/storage-types/{}", self.base, segment(storage_type));
        self.client.get(&path).await
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoragePoolCapacity {
    #[serde(default)]
    pub max_allocation_size: i64,
    #[serde(default)]
    pub pool_name: Option<String>,
    #[serde(default)]
    pub storage_type: Option<String>,
    #[serde(default)]
    pub total_capacity: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaximumStorageAllocation {
    #[serde(default)]
    pub max_allocation_size: i64,
    #[serde(default)]
    pub storage_pool: Option<String>,
    #[serde(default)]
    pub storage_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageTypeCapacity {
    #[serde(default)]
    pub maximum_storage_allocation: Option<MaximumStorageAllocation>,
    #[serde(default)]
    pub storage_pools_capacity: Vec<StoragePoolCapacity>,
    #[serde(default)]
    pub storage_type: Option<String>,
}
