//! All instance snapshots of a cloud instance

use super::{
    cloud_attribute, collection_id, configure_response, id_attribute, read_response, record,
};
use crate::api::snapshots::Snapshot;
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
pub struct SnapshotsDataSource {
    provider_data: Option<PpcProviderData>,
}

fn snapshot_record(snapshot: &Snapshot) -> Dynamic {
    record([
        ("id", snapshot.snapshot_id.as_str().into()),
        ("name", snapshot.name.clone().into()),
        ("percent_complete", snapshot.percent_complete.into()),
        ("description", snapshot.description.clone().into()),
        ("action", snapshot.action.clone().into()),
        ("status", snapshot.status.clone().into()),
        (
            "creation_date",
            snapshot.creation_date.map(|d| d.to_rfc3339()).into(),
        ),
        (
            "last_updated_date",
            snapshot.last_update_date.map(|d| d.to_rfc3339()).into(),
        ),
        (
            "volume_snapshots",
            Dynamic::string_map(snapshot.volume_snapshots.clone()),
        ),
    ])
}

impl SnapshotsDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_static() -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Lists the instance snapshots of a cloud instance")
            .attribute(id_attribute())
            .attribute(cloud_attribute())
            .attribute(
                AttributeBuilder::new(
                    "instance_snapshots",
                    AttributeType::object_list(&[
                        ("id", AttributeType::String),
                        ("name", AttributeType::String),
                        ("percent_complete", AttributeType::Number),
                        ("description", AttributeType::String),
                        ("action", AttributeType::String),
                        ("status", AttributeType::String),
                        ("creation_date", AttributeType::String),
                        ("last_updated_date", AttributeType::String),
                        ("volume_snapshots", AttributeType::string_map()),
                    ]),
                )
                .computed()
                .build(),
            )
            .build()
    }

    async fn read_snapshots(&self, config: &DynamicValue) -> Result<DynamicValue, Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let cloud = required_string(config, CLOUD_INSTANCE_ID)?;

        let snapshots = data
            .client
            .cloud(&cloud)
            .snapshots()
            .list()
            .await
            .map_err(|e| api_error("Failed to list snapshots", e))?;

        let mut state = config.clone();
        put(&mut state, "id", collection_id());
        put(
            &mut state,
            "instance_snapshots",
            Dynamic::List(snapshots.iter().map(snapshot_record).collect()),
        );
        Ok(state)
    }
}

#[async_trait]
impl DataSource for SnapshotsDataSource {
    fn type_name(&self) -> &str {
        "ppc_snapshots"
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
        let result = self.read_snapshots(&request.config).await;
        read_response(request.config, result)
    }
}

#[async_trait]
impl DataSourceWithConfigure for SnapshotsDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        configure_response(&mut self.provider_data, request.provider_data)
    }
}
