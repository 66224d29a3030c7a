pub mod api;
pub mod data_sources;
pub mod ids;
pub mod provider_data;
pub mod resources;
pub mod waiter;

use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tfplug::context::Context;
use tfplug::data_source::DataSourceWithConfigure;
use tfplug::provider::{
    ConfigureProviderRequest, ConfigureProviderResponse, DataSourceFactory, Provider,
    ProviderMetaSchemaRequest, ProviderMetaSchemaResponse, ProviderMetadataRequest,
    ProviderMetadataResponse, ProviderSchemaRequest, ProviderSchemaResponse, ResourceFactory,
    StopProviderRequest, StopProviderResponse, ValidateProviderConfigRequest,
    ValidateProviderConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue, ServerCapabilities};
use tfplug::ProviderResource;

use crate::api::{Client, RetryConfig};
use crate::provider_data::PpcProviderData;

pub const ENDPOINT_ENV: &str = "PPC_ENDPOINT";
pub const API_TOKEN_ENV: &str = "PPC_API_TOKEN";
pub const INSECURE_ENV: &str = "PPC_INSECURE";
pub const MAX_RETRIES_ENV: &str = "PPC_MAX_RETRIES";

#[derive(Default)]
pub struct PpcProvider {
    provider_data: Option<PpcProviderData>,
}

/// Settings resolved from the provider block, falling back to env vars
#[derive(Debug, Clone, PartialEq)]
struct Settings {
    endpoint: Option<String>,
    api_token: Option<String>,
    insecure: bool,
    max_retries: u32,
}

impl Settings {
    fn resolve(config: &DynamicValue) -> Self {
        let string = |name: &str, env: &str| {
            config
                .get_optional_string(&AttributePath::new(name))
                .or_else(|| std::env::var(env).ok().filter(|v| !v.is_empty()))
        };

        let insecure = config
            .get_optional_bool(&AttributePath::new("insecure"))
            .or_else(|| {
                std::env::var(INSECURE_ENV)
                    .ok()
                    .and_then(|v| v.parse::<bool>().ok())
            })
            .unwrap_or(false);

        let max_retries = config
            .get_optional_number(&AttributePath::new("max_retries"))
            .filter(|n| *n >= 0.0)
            .map(|n| n as u32)
            .or_else(|| {
                std::env::var(MAX_RETRIES_ENV)
                    .ok()
                    .and_then(|v| v.parse::<u32>().ok())
            })
            .unwrap_or(RetryConfig::default().max_retries);

        Self {
            endpoint: string("endpoint", ENDPOINT_ENV),
            api_token: string("api_token", API_TOKEN_ENV),
            insecure,
            max_retries,
        }
    }
}

impl PpcProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_static() -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Power Systems Virtual Server provider")
            .attribute(
                AttributeBuilder::new("endpoint", AttributeType::String)
                    .description(&format!(
                        "API endpoint, e.g. https://ppc.example.com. Can also be set with {}",
                        ENDPOINT_ENV
                    ))
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("api_token", AttributeType::String)
                    .description(&format!("API token. Can also be set with {}", API_TOKEN_ENV))
                    .optional()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("insecure", AttributeType::Bool)
                    .description("Skip TLS certificate verification")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("max_retries", AttributeType::Number)
                    .description("Retries for throttled or failed API calls")
                    .optional()
                    .build(),
            )
            .build()
    }
}

macro_rules! resource_factory {
    ($ty:ty) => {
        Box::new(|| Box::new(<$ty>::new()) as Box<dyn ProviderResource>) as ResourceFactory
    };
}

macro_rules! data_source_factory {
    ($ty:ty) => {
        Box::new(|| Box::new(<$ty>::new()) as Box<dyn DataSourceWithConfigure>)
            as DataSourceFactory
    };
}

#[async_trait]
impl Provider for PpcProvider {
    fn type_name(&self) -> &str {
        "ppc"
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: ProviderMetadataRequest,
    ) -> ProviderMetadataResponse {
        ProviderMetadataResponse {
            type_name: self.type_name().to_string(),
            server_capabilities: ServerCapabilities::default(),
        }
    }

    async fn schema(&self, _ctx: Context, _request: ProviderSchemaRequest) -> ProviderSchemaResponse {
        ProviderSchemaResponse {
            schema: Self::schema_static(),
            diagnostics: vec![],
        }
    }

    async fn meta_schema(
        &self,
        _ctx: Context,
        _request: ProviderMetaSchemaRequest,
    ) -> ProviderMetaSchemaResponse {
        ProviderMetaSchemaResponse {
            schema: None,
            diagnostics: vec![],
        }
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse {
        let settings = Settings::resolve(&request.config);
        let mut diagnostics = vec![];

        let (endpoint, api_token) = match (settings.endpoint, settings.api_token) {
            (Some(endpoint), Some(api_token)) => (endpoint, api_token),
            (None, _) => {
                diagnostics.push(Diagnostic::error(
                    "Missing endpoint",
                    format!(
                        "endpoint is required (set in provider config or {} env var)",
                        ENDPOINT_ENV
                    ),
                ));
                return ConfigureProviderResponse {
                    diagnostics,
                    provider_data: None,
                };
            }
            (_, None) => {
                diagnostics.push(Diagnostic::error(
                    "Missing API token",
                    format!(
                        "api_token is required (set in provider config or {} env var)",
                        API_TOKEN_ENV
                    ),
                ));
                return ConfigureProviderResponse {
                    diagnostics,
                    provider_data: None,
                };
            }
        };

        let retry_config = RetryConfig {
            max_retries: settings.max_retries,
            ..Default::default()
        };

        match Client::with_config(&endpoint, &api_token, settings.insecure, retry_config) {
            Ok(client) => {
                tracing::info!("Configured PPC provider for {}", endpoint);
                let data = PpcProviderData::new(client);
                self.provider_data = Some(data.clone());
                ConfigureProviderResponse {
                    diagnostics,
                    provider_data: Some(Arc::new(data) as Arc<dyn Any + Send + Sync>),
                }
            }
            Err(e) => {
                tracing::error!("Failed to create API client: {}", e);
                diagnostics.push(Diagnostic::error(
                    "Failed to create API client",
                    e.to_string(),
                ));
                ConfigureProviderResponse {
                    diagnostics,
                    provider_data: None,
                }
            }
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateProviderConfigRequest,
    ) -> ValidateProviderConfigResponse {
        let mut diagnostics = Self::schema_static().validate_config(&request.config);
        if let Ok(n) = request.config.get_number(&AttributePath::new("max_retries")) {
            if n < 0.0 || n.fract() != 0.0 {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid max_retries",
                        "max_retries must be a non-negative whole number",
                    )
                    .with_attribute(AttributePath::new("max_retries")),
                );
            }
        }
        ValidateProviderConfigResponse { diagnostics }
    }

    async fn stop(&self, _ctx: Context, _request: StopProviderRequest) -> StopProviderResponse {
        StopProviderResponse { error: None }
    }

    fn resources(&self) -> HashMap<String, ResourceFactory> {
        use crate::resources::*;

        HashMap::from([
            ("ppc_capture".to_string(), resource_factory!(CaptureResource)),
            ("ppc_image".to_string(), resource_factory!(ImageResource)),
            ("ppc_image_export".to_string(), resource_factory!(ImageExportResource)),
            ("ppc_instance".to_string(), resource_factory!(InstanceResource)),
            ("ppc_key".to_string(), resource_factory!(KeyResource)),
            ("ppc_network".to_string(), resource_factory!(NetworkResource)),
            ("ppc_network_port".to_string(), resource_factory!(NetworkPortResource)),
            (
                "ppc_network_port_attach".to_string(),
                resource_factory!(NetworkPortAttachResource),
            ),
            (
                "ppc_placement_group".to_string(),
                resource_factory!(PlacementGroupResource),
            ),
            ("ppc_snapshot".to_string(), resource_factory!(SnapshotResource)),
            ("ppc_volume".to_string(), resource_factory!(VolumeResource)),
            ("ppc_volume_attach".to_string(), resource_factory!(VolumeAttachResource)),
            ("ppc_volume_group".to_string(), resource_factory!(VolumeGroupResource)),
        ])
    }

    fn data_sources(&self) -> HashMap<String, DataSourceFactory> {
        use crate::data_sources::*;

        HashMap::from([
            ("ppc_instance_ip".to_string(), data_source_factory!(InstanceIpDataSource)),
            ("ppc_key".to_string(), data_source_factory!(KeyDataSource)),
            ("ppc_keys".to_string(), data_source_factory!(KeysDataSource)),
            (
                "ppc_placement_group".to_string(),
                data_source_factory!(PlacementGroupDataSource),
            ),
            (
                "ppc_placement_groups".to_string(),
                data_source_factory!(PlacementGroupsDataSource),
            ),
            ("ppc_sap_profile".to_string(), data_source_factory!(SapProfileDataSource)),
            ("ppc_sap_profiles".to_string(), data_source_factory!(SapProfilesDataSource)),
            ("ppc_snapshots".to_string(), data_source_factory!(SnapshotsDataSource)),
            (
                "ppc_storage_pool_capacity".to_string(),
                data_source_factory!(StoragePoolCapacityDataSource),
            ),
            (
                "ppc_storage_type_capacity".to_string(),
                data_source_factory!(StorageTypeCapacityDataSource),
            ),
            (
                "ppc_volume_flash_copy_mappings".to_string(),
                data_source_factory!(VolumeFlashCopyMappingsDataSource),
            ),
            (
                "ppc_volume_group_details".to_string(),
                data_source_factory!(VolumeGroupDetailsDataSource),
            ),
            (
                "ppc_volume_groups_details".to_string(),
                data_source_factory!(VolumeGroupsDetailsDataSource),
            ),
        ])
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tfplug::types::{ClientCapabilities, Dynamic};

    fn clear_env() {
        for var in [ENDPOINT_ENV, API_TOKEN_ENV, INSECURE_ENV, MAX_RETRIES_ENV] {
            std::env::remove_var(var);
        }
    }

    fn configure_request(config: DynamicValue) -> ConfigureProviderRequest {
        ConfigureProviderRequest {
            terraform_version: "1.9.0".to_string(),
            config,
            client_capabilities: ClientCapabilities::default(),
        }
    }

    fn config(pairs: &[(&str, Dynamic)]) -> DynamicValue {
        let mut value = DynamicValue::object();
        for (name, v) in pairs {
            value.set(&AttributePath::new(name), v.clone()).unwrap();
        }
        value
    }

    #[tokio::test]
    #[serial]
    async fn provider_configures_successfully_with_env_vars() {
        clear_env();
        std::env::set_var(ENDPOINT_ENV, "https://ppc.example.com");
        std::env::set_var(API_TOKEN_ENV, "secret");
        std::env::set_var(INSECURE_ENV, "true");

        let mut provider = PpcProvider::new();
        let response = provider
            .configure(Context::new(), configure_request(DynamicValue::object()))
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert!(response.provider_data.is_some());
        let data = provider.provider_data.as_ref().unwrap();
        assert_eq!(data.client.base_url(), "https://ppc.example.com");

        clear_env();
    }

    #[tokio::test]
    #[serial]
    async fn provider_config_wins_over_env_vars() {
        clear_env();
        std::env::set_var(ENDPOINT_ENV, "https://env.example.com");
        std::env::set_var(MAX_RETRIES_ENV, "9");

        let mut provider = PpcProvider::new();
        let response = provider
            .configure(
                Context::new(),
                configure_request(config(&[
                    ("endpoint", "https://config.example.com/".into()),
                    ("api_token", "secret".into()),
                    ("max_retries", Dynamic::Number(1.0)),
                ])),
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let data = provider.provider_data.as_ref().unwrap();
        assert_eq!(data.client.base_url(), "https://config.example.com");
        assert_eq!(data.client.retry_config().max_retries, 1);

        clear_env();
    }

    #[tokio::test]
    #[serial]
    async fn provider_reads_max_retries_from_env() {
        clear_env();
        std::env::set_var(MAX_RETRIES_ENV, "5");

        let settings = Settings::resolve(&DynamicValue::object());
        assert_eq!(settings.max_retries, 5);
        assert!(!settings.insecure);

        std::env::set_var(MAX_RETRIES_ENV, "many");
        let settings = Settings::resolve(&DynamicValue::object());
        assert_eq!(settings.max_retries, RetryConfig::default().max_retries);

        clear_env();
    }

    #[tokio::test]
    #[serial]
    async fn provider_configure_requires_endpoint() {
        clear_env();
        std::env::set_var(API_TOKEN_ENV, "secret");

        let mut provider = PpcProvider::new();
        let response = provider
            .configure(Context::new(), configure_request(DynamicValue::object()))
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert!(response.diagnostics[0].detail.contains("endpoint is required"));
        assert!(response.provider_data.is_none());

        clear_env();
    }

    #[tokio::test]
    #[serial]
    async fn provider_configure_requires_api_token() {
        clear_env();
        std::env::set_var(ENDPOINT_ENV, "https://ppc.example.com");

        let mut provider = PpcProvider::new();
        let response = provider
            .configure(Context::new(), configure_request(DynamicValue::object()))
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert!(response.diagnostics[0].detail.contains("api_token is required"));

        clear_env();
    }

    #[tokio::test]
    #[serial]
    async fn provider_rejects_bad_endpoint() {
        clear_env();

        let mut provider = PpcProvider::new();
        let response = provider
            .configure(
                Context::new(),
                configure_request(config(&[
                    ("endpoint", "ftp://ppc.example.com".into()),
                    ("api_token", "secret".into()),
                ])),
            )
            .await;

        assert_eq!(response.diagnostics[0].summary, "Failed to create API client");
        assert!(provider.provider_data.is_none());
    }

    #[tokio::test]
    async fn provider_validate_rejects_negative_retries() {
        let provider = PpcProvider::new();
        let response = provider
            .validate(
                Context::new(),
                ValidateProviderConfigRequest {
                    config: config(&[("max_retries", Dynamic::Number(-1.0))]),
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].summary, "Invalid max_retries");
    }

    #[test]
    fn provider_registers_every_resource_and_data_source() {
        let provider = PpcProvider::new();

        let resources = provider.resources();
        assert_eq!(resources.len(), 13);
        for (name, factory) in &resources {
            assert_eq!(factory().type_name(), name);
        }

        let data_sources = provider.data_sources();
        assert_eq!(data_sources.len(), 13);
        for (name, factory) in &data_sources {
            assert_eq!(factory().type_name(), name);
        }
    }
}
