//! Volume group lookup with its members and status errors

use super::{cloud_attribute, configure_response, id_attribute, read_response, required_input};
use crate::provider_data::PpcProviderData;
use crate::resources::resource_volume_group::{status_error_type, status_errors};
use crate::resources::{
    api_error, not_configured, put, put_strings, required_string, CLOUD_INSTANCE_ID,
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

const GROUP_ID: &str = "ppc_volume_group_id";

#[derive(Default)]
pub struct VolumeGroupDetailsDataSource {
    provider_data: Option<PpcProviderData>,
}

impl VolumeGroupDetailsDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_static() -> Schema {
        let computed = |name: &str, attr_type: AttributeType| {
            AttributeBuilder::new(name, attr_type).computed().build()
        };

        SchemaBuilder::new()
            .version(0)
            .description("Reads a volume group and its volumes")
            .attribute(id_attribute())
            .attribute(cloud_attribute())
            .attribute(required_input(GROUP_ID, "Volume group ID"))
            .attribute(computed("volume_group_name", AttributeType::String))
            .attribute(computed("status", AttributeType::String))
            .attribute(computed("replication_status", AttributeType::String))
            .attribute(computed("consistency_group_name", AttributeType::String))
            .attribute(computed("status_description_errors", status_error_type()))
            .attribute(computed("volume_ids", AttributeType::string_set()))
            .build()
    }

    async fn read_details(&self, config: &DynamicValue) -> Result<DynamicValue, Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let cloud = required_string(config, CLOUD_INSTANCE_ID)?;
        let group_id = required_string(config, GROUP_ID)?;

        let group = data
            .client
            .cloud(&cloud)
            .volume_groups()
            .get_details(&group_id)
            .await
            .map_err(|e| api_error("Failed to read volume group", e))?;

        let mut state = config.clone();
        put(&mut state, "id", group.id.as_str());
        put(&mut state, "volume_group_name", group.name.clone());
        put(&mut state, "status", group.status.clone());
        put(&mut state, "replication_status", group.replication_status.clone());
        put(
            &mut state,
            "consistency_group_name",
            group.consistency_group_name.clone(),
        );
        put(&mut state, "status_description_errors", status_errors(group.errors()));
        put_strings(&mut state, "volume_ids", &group.volume_ids);
        Ok(state)
    }
}

#[async_trait]
impl DataSource for VolumeGroupDetailsDataSource {
    fn type_name(&self) -> &str {
        "ppc_volume_group_details"
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
        let result = self.read_details(&request.config).await;
        read_response(request.config, result)
    }
}

#[async_trait]
impl DataSourceWithConfigure for VolumeGroupDetailsDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        configure_response(&mut self.provider_data, request.provider_data)
    }
}
