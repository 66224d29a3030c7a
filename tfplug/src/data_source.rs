//! DataSource trait and related types

use crate::context::Context;
use crate::schema::Schema;
use crate::types::{ClientCapabilities, Deferred, Diagnostic, DynamicValue};
use async_trait::async_trait;
use std::any::Any;
use std::sync::Arc;

/// Base trait for data sources
/// Type name must match the key in Provider.data_sources()
#[async_trait]
pub trait DataSource: Send + Sync {
    fn type_name(&self) -> &str;

    async fn metadata(
        &self,
        ctx: Context,
        request: DataSourceMetadataRequest,
    ) -> DataSourceMetadataResponse;

    async fn schema(
        &self,
        ctx: Context,
        request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse;

    async fn validate(
        &self,
        ctx: Context,
        request: ValidateDataSourceConfigRequest,
    ) -> ValidateDataSourceConfigResponse;

    /// The only operation of a data source. Must populate every attribute
    /// in response.state.
    async fn read(&self, ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse;
}

pub struct DataSourceMetadataRequest;

pub struct DataSourceMetadataResponse {
    pub type_name: String,
}

pub struct DataSourceSchemaRequest;

pub struct DataSourceSchemaResponse {
    pub schema: Schema,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct ValidateDataSourceConfigRequest {
    pub type_name: String,
    pub config: DynamicValue,
}

pub struct ValidateDataSourceConfigResponse {
    pub diagnostics: Vec<Diagnostic>,
}

pub struct ReadDataSourceRequest {
    pub type_name: String,
    pub config: DynamicValue,
    pub provider_meta: Option<DynamicValue>,
    pub client_capabilities: ClientCapabilities,
}

pub struct ReadDataSourceResponse {
    pub state: DynamicValue,
    pub diagnostics: Vec<Diagnostic>,
    pub deferred: Option<Deferred>,
}

/// Called right after the factory builds the data source
#[async_trait]
pub trait DataSourceWithConfigure: DataSource {
    async fn configure(
        &mut self,
        ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse;
}

pub struct ConfigureDataSourceRequest {
    pub provider_data: Option<Arc<dyn Any + Send + Sync>>,
}

pub struct ConfigureDataSourceResponse {
    pub diagnostics: Vec<Diagnostic>,
}

/// Builds a fresh, unconfigured data source
pub type DataSourceFactory = Box<dyn Fn() -> Box<dyn DataSourceWithConfigure> + Send + Sync>;
