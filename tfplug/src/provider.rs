//! Provider trait and related types
//!
//! A provider is configured once, then hands out factories for its
//! resources and data sources. Each factory output is configured with the
//! `provider_data` returned from [`Provider::configure`].

use crate::context::Context;
use crate::schema::Schema;
use crate::types::{ClientCapabilities, Diagnostic, DynamicValue, ServerCapabilities};
use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

pub use crate::data_source::DataSourceFactory;
pub use crate::resource::ResourceFactory;

#[async_trait]
pub trait Provider: Send + Sync {
    fn type_name(&self) -> &str;

    async fn metadata(
        &self,
        ctx: Context,
        request: ProviderMetadataRequest,
    ) -> ProviderMetadataResponse;

    async fn schema(&self, ctx: Context, request: ProviderSchemaRequest) -> ProviderSchemaResponse;

    async fn meta_schema(
        &self,
        ctx: Context,
        request: ProviderMetaSchemaRequest,
    ) -> ProviderMetaSchemaResponse;

    /// Builds shared state (API clients and the like) from configuration.
    /// Whatever lands in `provider_data` is passed to every resource and
    /// data source.
    async fn configure(
        &mut self,
        ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse;

    async fn validate(
        &self,
        ctx: Context,
        request: ValidateProviderConfigRequest,
    ) -> ValidateProviderConfigResponse;

    async fn stop(&self, ctx: Context, request: StopProviderRequest) -> StopProviderResponse;

    fn resources(&self) -> HashMap<String, ResourceFactory>;

    fn data_sources(&self) -> HashMap<String, DataSourceFactory>;
}

pub struct ProviderMetadataRequest;

pub struct ProviderMetadataResponse {
    pub type_name: String,
    pub server_capabilities: ServerCapabilities,
}

pub struct ProviderSchemaRequest;

pub struct ProviderSchemaResponse {
    pub schema: Schema,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct ProviderMetaSchemaRequest;

pub struct ProviderMetaSchemaResponse {
    pub schema: Option<Schema>,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct ConfigureProviderRequest {
    pub terraform_version: String,
    pub config: DynamicValue,
    pub client_capabilities: ClientCapabilities,
}

pub struct ConfigureProviderResponse {
    pub diagnostics: Vec<Diagnostic>,
    pub provider_data: Option<Arc<dyn Any + Send + Sync>>,
}

pub struct ValidateProviderConfigRequest {
    pub config: DynamicValue,
    pub client_capabilities: ClientCapabilities,
}

pub struct ValidateProviderConfigResponse {
    pub diagnostics: Vec<Diagnostic>,
}

pub struct StopProviderRequest;

pub struct StopProviderResponse {
    pub error: Option<String>,
}
