//! SAP profile lookup

use super::{cloud_attribute, configure_response, id_attribute, read_response, required_input};
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
use tfplug::types::{Diagnostic, DynamicValue};

const PROFILE_ID: &str = "ppc_sap_profile_id";

#[derive(Default)]
pub struct SapProfileDataSource {
    provider_data: Option<PpcProviderData>,
}

impl SapProfileDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_static() -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Reads a SAP profile")
            .attribute(id_attribute())
            .attribute(cloud_attribute())
            .attribute(required_input(PROFILE_ID, "SAP profile ID"))
            .attribute(
                AttributeBuilder::new("certified", AttributeType::Bool)
                    .description("Has certification been performed on profile")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("cores", AttributeType::Number)
                    .description("Amount of cores")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("memory", AttributeType::Number)
                    .description("Amount of memory (in GB)")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("type", AttributeType::String)
                    .description("Type of profile")
                    .computed()
                    .build(),
            )
            .build()
    }

    async fn read_profile(&self, config: &DynamicValue) -> Result<DynamicValue, Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let cloud = required_string(config, CLOUD_INSTANCE_ID)?;
        let profile_id = required_string(config, PROFILE_ID)?;

        let profile = data
            .client
            .cloud(&cloud)
            .sap()
            .get_profile(&profile_id)
            .await
            .map_err(|e| api_error("Failed to read SAP profile", e))?;

        let mut state = config.clone();
        put(&mut state, "id", profile.profile_id.as_str());
        put(&mut state, "certified", profile.certified);
        put(&mut state, "cores", profile.cores.map(|v| v as f64));
        put(&mut state, "memory", profile.memory.map(|v| v as f64));
        put(&mut state, "type", profile.type_.clone());
        Ok(state)
    }
}

#[async_trait]
impl DataSource for SapProfileDataSource {
    fn type_name(&self) -> &str {
        "ppc_sap_profile"
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
        let result = self.read_profile(&request.config).await;
        read_response(request.config, result)
    }
}

#[async_trait]
impl DataSourceWithConfigure for SapProfileDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        configure_response(&mut self.provider_data, request.provider_data)
    }
}
