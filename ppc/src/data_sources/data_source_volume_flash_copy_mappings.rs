//! Flash copy mappings of a volume

use super::{
    cloud_attribute, collection_id, configure_response, id_attribute, read_response, record,
    required_input,
};
use crate::api::volumes::FlashCopyMapping;
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

const VOLUME_ID: &str = "ppc_volume_id";

#[derive(Default)]
pub struct VolumeFlashCopyMappingsDataSource {
    provider_data: Option<PpcProviderData>,
}

fn mapping_record(mapping: &FlashCopyMapping) -> Dynamic {
    record([
        ("flash_copy_name", mapping.flash_copy_name.clone().into()),
        ("copy_rate", mapping.copy_rate.map(|v| v as f64).into()),
        ("progress", mapping.progress.map(|v| v as f64).into()),
        ("source_volume_name", mapping.source_volume_name.clone().into()),
        ("target_volume_name", mapping.target_volume_name.clone().into()),
        ("start_time", mapping.start_time.map(|t| t.to_rfc3339()).into()),
        ("status", mapping.status.clone().into()),
    ])
}

impl VolumeFlashCopyMappingsDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_static() -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Lists the flash copy mappings of a volume")
            .attribute(id_attribute())
            .attribute(cloud_attribute())
            .attribute(required_input(VOLUME_ID, "Volume ID"))
            .attribute(
                AttributeBuilder::new(
                    "flash_copy_mappings",
                    AttributeType::object_list(&[
                        ("flash_copy_name", AttributeType::String),
                        ("copy_rate", AttributeType::Number),
                        ("progress", AttributeType::Number),
                        ("source_volume_name", AttributeType::String),
                        ("target_volume_name", AttributeType::String),
                        ("start_time", AttributeType::String),
                        ("status", AttributeType::String),
                    ]),
                )
                .computed()
                .build(),
            )
            .build()
    }

    async fn read_mappings(&self, config: &DynamicValue) -> Result<DynamicValue, Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let cloud = required_string(config, CLOUD_INSTANCE_ID)?;
        let volume_id = required_string(config, VOLUME_ID)?;

        let mappings = data
            .client
            .cloud(&cloud)
            .volumes()
            .flash_copy_mappings(&volume_id)
            .await
            .map_err(|e| api_error("Failed to read flash copy mappings", e))?;

        let mut state = config.clone();
        put(&mut state, "id", collection_id());
        put(
            &mut state,
            "flash_copy_mappings",
            Dynamic::List(mappings.iter().map(mapping_record).collect()),
        );
        Ok(state)
    }
}

#[async_trait]
impl DataSource for VolumeFlashCopyMappingsDataSource {
    fn type_name(&self) -> &str {
        "ppc_volume_flash_copy_mappings"
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
        let result = self.read_mappings(&request.config).await;
        read_response(request.config, result)
    }
}

#[async_trait]
impl DataSourceWithConfigure for VolumeFlashCopyMappingsDataSource {
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

    fn config() -> DynamicValue {
        object(&[
            (CLOUD_INSTANCE_ID, "cloud-1".into()),
            (VOLUME_ID, "vol-1".into()),
        ])
    }

    #[tokio::test]
    async fn test_read_mappings() {
        let mut server = Server::new_async().await;
        let _get = server
            .mock(
                "GET",
                "/ppc/v1/cloud-instances/cloud-1/volumes/vol-1/flash-copy-mappings",
            )
            .with_status(200)
            .with_body(
                r#"[{"flashCopyName": "fc-1", "copyRate": 50, "progress": 100,
                     "sourceVolumeName": "data", "targetVolumeName": "data-copy",
                     "startTime": "2024-05-01T08:00:00Z", "status": "copying"}]"#,
            )
            .create_async()
            .await;

        let mut data_source = VolumeFlashCopyMappingsDataSource::new();
        configure_data_source(&mut data_source, &server.url()).await;
        let response = data_source
            .read(
                Context::new(),
                data_source_request("ppc_volume_flash_copy_mappings", config()),
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let mappings = response.state.get_list(&attr("flash_copy_mappings")).unwrap();
        assert_eq!(mappings.len(), 1);
        match &mappings[0] {
            Dynamic::Map(fields) => {
                assert_eq!(fields.get("copy_rate"), Some(&Dynamic::Number(50.0)));
                assert_eq!(
                    fields.get("start_time").and_then(|v| v.as_str()),
                    Some("2024-05-01T08:00:00+00:00")
                );
                assert_eq!(fields.get("target_volume_name").and_then(|v| v.as_str()), Some("data-copy"));
            }
            other => panic!("expected a map, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_volume_is_an_error() {
        let mut server = Server::new_async().await;
        let _get = server
            .mock(
                "GET",
                "/ppc/v1/cloud-instances/cloud-1/volumes/vol-1/flash-copy-mappings",
            )
            .with_status(404)
            .with_body(r#"{"description": "volume not found"}"#)
            .create_async()
            .await;

        let mut data_source = VolumeFlashCopyMappingsDataSource::new();
        configure_data_source(&mut data_source, &server.url()).await;
        let response = data_source
            .read(
                Context::new(),
                data_source_request("ppc_volume_flash_copy_mappings", config()),
            )
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(
            response.diagnostics[0].summary,
            "Failed to read flash copy mappings"
        );
        assert_eq!(response.state, config());
    }
}
