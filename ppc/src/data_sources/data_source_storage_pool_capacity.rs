//! Capacity of one storage pool

use super::{cloud_attribute, configure_response, id_attribute, read_response, required_input};
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
use tfplug::types::{Diagnostic, DynamicValue};

const STORAGE_POOL: &str = "ppc_storage_pool";

#[derive(Default)]
pub struct StoragePoolCapacityDataSource {
    provider_data: Option<PpcProviderData>,
}

impl StoragePoolCapacityDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_static() -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Reads the capacity of a storage pool")
            .attribute(id_attribute())
            .attribute(cloud_attribute())
            .attribute(required_input(STORAGE_POOL, "Storage pool name"))
            .attribute(
                AttributeBuilder::new("max_allocation_size", AttributeType::Number)
                    .description("Maximum allocation storage size (GB)")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("storage_type", AttributeType::String)
                    .description("Storage type of the storage pool")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("total_capacity", AttributeType::Number)
                    .description("Total pool capacity (GB)")
                    .computed()
                    .build(),
            )
            .build()
    }

    async fn read_capacity(&self, config: &DynamicValue) -> Result<DynamicValue, Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let cloud = required_string(config, CLOUD_INSTANCE_ID)?;
        let pool = required_string(config, STORAGE_POOL)?;
        let id = ids::encode(&[&cloud, &pool]).map_err(invalid_id)?;

        let capacity = data
            .client
            .cloud(&cloud)
            .storage_capacity()
            .pool(&pool)
            .await
            .map_err(|e| api_error("Failed to read storage pool capacity", e))?;

        let mut state = config.clone();
        put(&mut state, "id", id);
        put(&mut state, "max_allocation_size", capacity.max_allocation_size as f64);
        put(&mut state, "storage_type", capacity.storage_type.clone());
        put(&mut state, "total_capacity", capacity.total_capacity.map(|v| v as f64));
        Ok(state)
    }
}

#[async_trait]
impl DataSource for StoragePoolCapacityDataSource {
    fn type_name(&self) -> &str {
        "ppc_storage_pool_capacity"
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
impl DataSourceWithConfigure for StoragePoolCapacityDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        configure_response(&mut self.provider_data, request.provider_data)
    }
}
