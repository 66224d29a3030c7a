//! Single placement group lookup by name or id

use super::{cloud_attribute, configure_response, id_attribute, read_response, required_input};
use crate::provider_data::PpcProviderData;
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

const GROUP_NAME: &str = "ppc_placement_group_name";

#[derive(Default)]
pub struct PlacementGroupDataSource {
    provider_data: Option<PpcProviderData>,
}

impl PlacementGroupDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_static() -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Reads a placement group")
            .attribute(id_attribute())
            .attribute(cloud_attribute())
            .attribute(required_input(GROUP_NAME, "Name of the placement group"))
            .attribute(
                AttributeBuilder::new("policy", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("members", AttributeType::string_list())
                    .description("Instance IDs in the group")
                    .computed()
                    .build(),
            )
            .build()
    }

    async fn read_group(&self, config: &DynamicValue) -> Result<DynamicValue, Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let cloud = required_string(config, CLOUD_INSTANCE_ID)?;
        let name = required_string(config, GROUP_NAME)?;

        let group = data
            .client
            .cloud(&cloud)
            .placement_groups()
            .get(&name)
            .await
            .map_err(|e| api_error("Failed to read placement group", e))?;

        let mut state = config.clone();
        put(&mut state, "id", group.id.as_str());
        put(&mut state, "policy", group.policy.clone());
        put_strings(&mut state, "members", &group.members);
        Ok(state)
    }
}

#[async_trait]
impl DataSource for PlacementGroupDataSource {
    fn type_name(&self) -> &str {
        "ppc_placement_group"
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
        let result = self.read_group(&request.config).await;
        read_response(request.config, result)
    }
}

#[async_trait]
impl DataSourceWithConfigure for PlacementGroupDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        configure_response(&mut self.provider_data, request.provider_data)
    }
}
