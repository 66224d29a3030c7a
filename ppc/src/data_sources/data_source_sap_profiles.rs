//! All SAP profiles offered to a cloud instance

use super::{
    cloud_attribute, collection_id, configure_response, id_attribute, read_response, record,
};
use crate::api::sap::SapProfile;
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
pub struct SapProfilesDataSource {
    provider_data: Option<PpcProviderData>,
}

fn profile_record(profile: &SapProfile) -> Dynamic {
    record([
        ("certified", profile.certified.into()),
        ("cores", profile.cores.map(|v| v as f64).into()),
        ("memory", profile.memory.map(|v| v as f64).into()),
        ("profile_id", profile.profile_id.as_str().into()),
        ("type", profile.type_.clone().into()),
    ])
}

impl SapProfilesDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_static() -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Lists the SAP profiles of a cloud instance")
            .attribute(id_attribute())
            .attribute(cloud_attribute())
            .attribute(
                AttributeBuilder::new(
                    "profiles",
                    AttributeType::object_list(&[
                        ("certified", AttributeType::Bool),
                        ("cores", AttributeType::Number),
                        ("memory", AttributeType::Number),
                        ("profile_id", AttributeType::String),
                        ("type", AttributeType::String),
                    ]),
                )
                .description("SAP profiles")
                .computed()
                .build(),
            )
            .build()
    }

    async fn read_profiles(&self, config: &DynamicValue) -> Result<DynamicValue, Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let cloud = required_string(config, CLOUD_INSTANCE_ID)?;

        let profiles = data
            .client
            .cloud(&cloud)
            .sap()
            .list_profiles()
            .await
            .map_err(|e| api_error("Failed to list SAP profiles", e))?;

        let mut state = config.clone();
        put(&mut state, "id", collection_id());
        put(
            &mut state,
            "profiles",
            Dynamic::List(profiles.iter().map(profile_record).collect()),
        );
        Ok(state)
    }
}

#[async_trait]
impl DataSource for SapProfilesDataSource {
    fn type_name(&self) -> &str {
        "ppc_sap_profiles"
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
        let result = self.read_profiles(&request.config).await;
        read_response(request.config, result)
    }
}

#[async_trait]
impl DataSourceWithConfigure for SapProfilesDataSource {
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
    fn test_profile_record_leaves_missing_fields_null() {
        let profile = SapProfile {
            profile_id: "bh1-2x8".to_string(),
            ..Default::default()
        };

        match profile_record(&profile) {
            Dynamic::Map(fields) => {
                assert_eq!(fields.get("profile_id").and_then(|v| v.as_str()), Some("bh1-2x8"));
                assert_eq!(fields.get("cores"), Some(&Dynamic::Null));
                assert_eq!(fields.get("certified"), Some(&Dynamic::Null));
            }
            other => panic!("expected a map, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_profiles() {
        let mut server = Server::new_async().await;
        let _list = server
            .mock("GET", "/ppc/v1/cloud-instances/cloud-1/sap")
            .with_status(200)
            .with_body(
                r#"{"profiles": [
                    {"profileID": "ush1-4x128", "certified": true, "cores": 4, "memory": 128, "type": "ush"},
                    {"profileID": "bh1-2x8", "certified": false, "cores": 2, "memory": 8, "type": "balanced"}
                ]}"#,
            )
            .create_async()
            .await;

        let mut data_source = SapProfilesDataSource::new();
        configure_data_source(&mut data_source, &server.url()).await;
        let config = object(&[(CLOUD_INSTANCE_ID, "cloud-1".into())]);
        let response = data_source
            .read(Context::new(), data_source_request("ppc_sap_profiles", config))
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let profiles = response.state.get_list(&attr("profiles")).unwrap();
        assert_eq!(profiles.len(), 2);
    }

    #[tokio::test]
    async fn test_list_failure() {
        let mut server = Server::new_async().await;
        let _list = server
            .mock("GET", "/ppc/v1/cloud-instances/cloud-1/sap")
            .with_status(403)
            .with_body(r#"{"description": "forbidden"}"#)
            .create_async()
            .await;

        let mut data_source = SapProfilesDataSource::new();
        configure_data_source(&mut data_source, &server.url()).await;
        let config = object(&[(CLOUD_INSTANCE_ID, "cloud-1".into())]);
        let response = data_source
            .read(Context::new(), data_source_request("ppc_sap_profiles", config))
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].summary, "Failed to list SAP profiles");
    }
}
