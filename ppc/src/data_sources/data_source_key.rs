//! Single SSH key lookup

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

const KEY_NAME: &str = "ppc_key_name";

#[derive(Default)]
pub struct KeyDataSource {
    provider_data: Option<PpcProviderData>,
}

impl KeyDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_static() -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Reads an SSH key by name")
            .attribute(id_attribute())
            .attribute(cloud_attribute())
            .attribute(required_input(KEY_NAME, "Name of the SSH key"))
            .attribute(
                AttributeBuilder::new("ssh_key", AttributeType::String)
                    .description("SSH RSA key")
                    .computed()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("creation_date", AttributeType::String)
                    .description("Date of SSH key creation")
                    .computed()
                    .build(),
            )
            .build()
    }

    async fn read_key(&self, config: &DynamicValue) -> Result<DynamicValue, Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let cloud = required_string(config, CLOUD_INSTANCE_ID)?;
        let name = required_string(config, KEY_NAME)?;

        let key = data
            .client
            .cloud(&cloud)
            .keys()
            .get(&name)
            .await
            .map_err(|e| api_error("Failed to read SSH key", e))?;

        let mut state = config.clone();
        put(&mut state, "id", key.name.as_str());
        put(&mut state, "ssh_key", key.ssh_key.as_str());
        put(&mut state, "creation_date", key.creation_date_string());
        Ok(state)
    }
}

#[async_trait]
impl DataSource for KeyDataSource {
    fn type_name(&self) -> &str {
        "ppc_key"
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
        let result = self.read_key(&request.config).await;
        read_response(request.config, result)
    }
}

#[async_trait]
impl DataSourceWithConfigure for KeyDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        configure_response(&mut self.provider_data, request.provider_data)
    }
}
