//! All placement groups of a cloud instance

use super::{
    cloud_attribute, collection_id, configure_response, id_attribute, read_response, record,
};
use crate::provider_data::PpcProviderData;
use crate::resources::{api_error, not_configured, put, required_string, CLOUD_INSTANCE_ID};
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

#[derive(Default)]
pub struct PlacementGroupsDataSource {
    provider_data: Option<PpcProviderData>,
}

impl PlacementGroupsDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_static() -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Lists the placement groups of a cloud instance")
            .attribute(id_attribute())
            .attribute(cloud_attribute())
            .attribute(
                AttributeBuilder::new(
                    "placement_groups",
                    AttributeType::object_list(&[
                        ("id", AttributeType::String),
                        ("name", AttributeType::String),
                        ("members", AttributeType::string_list()),
                        ("policy", AttributeType::String),
                    ]),
                )
                .computed()
                .build(),
            )
            .build()
    }

    async fn read_groups(&self, config: &DynamicValue) -> Result<DynamicValue, Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let cloud = required_string(config, CLOUD_INSTANCE_ID)?;

        let groups = data
            .client
            .cloud(&cloud)
            .placement_groups()
            .list()
            .await
            .map_err(|e| api_error("Failed to list placement groups", e))?;

        let mut state = config.clone();
        put(&mut state, "id", collection_id());
        put(
            &mut state,
            "placement_groups",
            Dynamic::List(
                groups
                    .iter()
                    .map(|group| {
                        record([
                            ("id", group.id.as_str().into()),
                            ("name", group.name.clone().into()),
                            ("members", Dynamic::string_list(group.members.iter().cloned())),
                            ("policy", group.policy.clone().into()),
                        ])
                    })
                    .collect(),
            ),
        );
        Ok(state)
    }
}

#[async_trait]
impl DataSource for PlacementGroupsDataSource {
    fn type_name(&self) -> &str {
        "ppc_placement_groups"
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
        let result = self.read_groups(&request.config).await;
        read_response(request.config, result)
    }
}

#[async_trait]
impl DataSourceWithConfigure for PlacementGroupsDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        configure_response(&mut self.provider_data, request.provider_data)
    }
}
