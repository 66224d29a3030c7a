//! All volume groups of a cloud instance, with details

use super::{
    cloud_attribute, collection_id, configure_response, id_attribute, read_response, record,
};
use crate::api::volume_groups::VolumeGroupDetails;
use crate::provider_data::PpcProviderData;
use crate::resources::resource_volume_group::{status_error_type, status_errors};
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
pub struct VolumeGroupsDetailsDataSource {
    provider_data: Option<PpcProviderData>,
}

fn group_record(group: &VolumeGroupDetails) -> Dynamic {
    record([
        ("id", group.id.as_str().into()),
        ("volume_group_name", group.name.clone().into()),
        ("status", group.status.clone().into()),
        ("replication_status", group.replication_status.clone().into()),
        ("consistency_group_name", group.consistency_group_name.clone().into()),
        ("status_description_errors", status_errors(group.errors())),
        ("volume_ids", Dynamic::string_list(group.volume_ids.iter().cloned())),
    ])
}

impl VolumeGroupsDetailsDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_static() -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Lists the volume groups of a cloud instance with their volumes")
            .attribute(id_attribute())
            .attribute(cloud_attribute())
            .attribute(
                AttributeBuilder::new(
                    "volume_groups",
                    AttributeType::object_list(&[
                        ("id", AttributeType::String),
                        ("volume_group_name", AttributeType::String),
                        ("status", AttributeType::String),
                        ("replication_status", AttributeType::String),
                        ("consistency_group_name", AttributeType::String),
                        ("status_description_errors", status_error_type()),
                        ("volume_ids", AttributeType::string_set()),
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
            .volume_groups()
            .list_details()
            .await
            .map_err(|e| api_error("Failed to list volume groups", e))?;

        let mut state = config.clone();
        put(&mut state, "id", collection_id());
        put(
            &mut state,
            "volume_groups",
            Dynamic::List(groups.iter().map(group_record).collect()),
        );
        Ok(state)
    }
}

#[async_trait]
impl DataSource for VolumeGroupsDetailsDataSource {
    fn type_name(&self) -> &str {
        "ppc_volume_groups_details"
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
impl DataSourceWithConfigure for VolumeGroupsDetailsDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        configure_response(&mut self.provider_data, request.provider_data)
    }
}
