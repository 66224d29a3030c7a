//! Capacity of every pool behind one storage type

use super::{
    cloud_attribute, configure_response, id_attribute, read_response, record, required_input,
};
use crate::api::storage_capacity::StorageTypeCapacity;
use crate::ids;
use crate::provider_data::PpcProviderData;
use crate::resources::{
    api_error, invalid_id, not_configured, put, required_string, CLOUD_INSTANCE_ID,
};
use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceMetadataRequest,
    DataSourceMetadataResponse, DataSourceSchemaRequest, DataSourceSchemaResponse,
    DataSourceWithConfigure, ReadDataSourceRequest, ReadDataSourceResponse,
    ValidateDataSourceConfigRequest, ValidateDataSourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{Diagnostic, Dynamic, DynamicValue};

const STORAGE_TYPE: &str = "ppc_storage_type";

#[derive(Default)]
pub struct StorageTypeCapacityDataSource {
    provider_data: Option<PpcProviderData>,
}

/// The largest single allocation, flattened into a string map
fn maximum_allocation(capacity: &StorageTypeCapacity) -> Dynamic {
    match &capacity.maximum_storage_allocation {
        Some(max) => {
            let mut fields = vec![(
                "max_allocation_size".to_string(),
                max.max_allocation_size.to_string(),
            )];
            if let Some(pool) = &max.storage_pool {
                fields.push(("storage_pool".to_string(), pool.clone()));
            }
            if let Some(storage_type) = &max.storage_type {
                fields.push(("storage_type".to_string(), storage_type.clone()));
            }
            Dynamic::string_map(fields)
        }
        None => Dynamic::Null,
    }
}

fn pools(capacity: &StorageTypeCapacity) -> Dynamic {
    Dynamic::List(
        capacity
            .storage_pools_capacity
            .iter()
            .map(|pool| {
                record([
                    ("max_allocation_size", (pool.max_allocation_size as f64).into()),
                    ("pool_name", pool.pool_name.clone().into()),
                    ("storage_type", pool.storage_type.clone().into()),
                    ("total_capacity", pool.total_capacity.map(|v| v as f64).into()),
                ])
            })
            .collect(),
    )
}

impl StorageTypeCapacityDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_static() -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Reads the storage pool capacities of a storage type")
            .attribute(id_attribute())
            .attribute(cloud_attribute())
            .attribute(required_input(STORAGE_TYPE, "Storage type name"))
            .attribute(
                AttributeBuilder::new("maximum_storage_allocation", AttributeType::string_map())
                    .description("Maximum storage allocation")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(
                    "storage_pools_capacity",
                    AttributeType::object_list(&[
                        ("max_allocation_size", AttributeType::Number),
                        ("pool_name", AttributeType::String),
                        ("storage_type", AttributeType::String),
                        ("total_capacity", AttributeType::Number),
                    ]),
                )
                .description("Storage pools capacity")
                .computed()
                .build(),
            )
            .build()
    }

    async fn read_capacity(&self, config: &DynamicValue) -> Result<DynamicValue, Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let cloud = required_string(config, CLOUD_INSTANCE_ID)?;
        let storage_type = required_string(config, STORAGE_TYPE)?;
        let id = ids::encode(&[&cloud, &storage_type]).map_err(invalid_id)?;

        let capacity = data
            .client
            .cloud(&cloud)
            .storage_capacity()
            .storage_type(&storage_type)
            .await
            .map_err(|e| api_error("Failed to read storage type capacity", e))?;
        tracing::debug!(
            "Storage type {} spans {} pools",
            storage_type,
            capacity.storage_pools_capacity.len()
        );

        let mut state = config.clone();
        put(&mut state, "id", id);
        put(&mut state, "maximum_storage_allocation", maximum_allocation(&capacity));
        put(&mut state, "storage_pools_capacity", pools(&capacity));
        Ok(state)
    }
}

#[async_trait]
impl DataSource for StorageTypeCapacityDataSource {
    fn type_name(&self) -> &str {
        "ppc_storage_type_capacity"
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: DataSourceMetadataRequest,
    ) -> DataSourceMetadataResponse {
        DataSourceMetadataResponse {
            type_name: self.type_name().to_string(),
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        DataSourceSchemaResponse {
            schema: Self::schema_static(),
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateDataSourceConfigRequest,
    ) -> ValidateDataSourceConfigResponse {
        ValidateDataSourceConfigResponse {
            diagnostics: Self::schema_static().validate_config(&request.config),
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let result = self.read_capacity(&request.config).await;
        read_response(request.config, result)
    }
}

#[async_trait]
impl DataSourceWithConfigure for StorageTypeCapacityDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        configure_response(&mut self.provider_data, request.provider_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::attr;
    use crate::resources::test_support::*;
    use mockito::Server;

    #[test]
    fn test_missing_maximum_allocation_is_null() {
        assert_eq!(maximum_allocation(&StorageTypeCapacity::default()), Dynamic::Null);
    }

    #[tokio::test]
    async fn test_read_capacity() {
        let mut server = Server::new_async().await;
        let _get = server
            .mock(
                "GET",
                "/ppc/v1/cloud-instances/cloud-1/storage-capacity/storage-types/tier1",
            )
            .with_status(200)
            .with_body(
                r#"{
                    "maximumStorageAllocation": {"maxAllocationSize": 4096, "storagePool": "Tier1-Flash-2", "storageType": "tier1"},
                    "storagePoolsCapacity": [
                        {"maxAllocationSize": 2048, "poolName": "Tier1-Flash-1", "storageType": "tier1", "totalCapacity": 40960},
                        {"maxAllocationSize": 4096, "poolName": "Tier1-Flash-2", "storageType": "tier1", "totalCapacity": 81920}
                    ],
                    "storageType": "tier1"
                }"#,
            )
            .create_async()
            .await;

        let mut data_source = StorageTypeCapacityDataSource::new();
        configure_data_source(&mut data_source, &server.url()).await;
        let config = object(&[
            (CLOUD_INSTANCE_ID, "cloud-1".into()),
            (STORAGE_TYPE, "tier1".into()),
        ]);
        let response = data_source
            .read(Context::new(), data_source_request("ppc_storage_type_capacity", config))
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert_eq!(string_at(&response.state, "id"), "cloud-1/tier1");

        let max = response
            .state
            .get_map(&attr("maximum_storage_allocation"))
            .unwrap();
        assert_eq!(
            max.get("max_allocation_size").and_then(|v| v.as_str()),
            Some("4096")
        );
        assert_eq!(
            max.get("storage_pool").and_then(|v| v.as_str()),
            Some("Tier1-Flash-2")
        );

        let pools = response
            .state
            .get_list(&attr("storage_pools_capacity"))
            .unwrap();
        assert_eq!(pools.len(), 2);
    }
}
