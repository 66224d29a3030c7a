//! Resource trait and related types
//!
//! Every managed resource implements [`Resource`] for its lifecycle, plus
//! [`ResourceWithConfigure`] to receive provider data and
//! [`ResourceWithImportState`] for `terraform import`.

use crate::context::Context;
use crate::schema::Schema;
use crate::types::{ClientCapabilities, Deferred, Diagnostic, DynamicValue, ResourceIdentityData};
use async_trait::async_trait;
use std::any::Any;
use std::sync::Arc;

/// Base trait for resources
/// Type name must match the key in Provider.resources()
#[async_trait]
pub trait Resource: Send + Sync {
    fn type_name(&self) -> &str;

    async fn metadata(
        &self,
        ctx: Context,
        request: ResourceMetadataRequest,
    ) -> ResourceMetadataResponse;

    async fn schema(&self, ctx: Context, request: ResourceSchemaRequest) -> ResourceSchemaResponse;

    /// Called during plan. Must not reach the remote API.
    async fn validate(
        &self,
        ctx: Context,
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse;

    /// Must populate every attribute in response.new_state, computed ones
    /// included
    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse;

    /// Returns `None` when the remote object no longer exists
    async fn read(&self, ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse;

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse;

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse;
}

pub struct ResourceMetadataRequest;

pub struct ResourceMetadataResponse {
    pub type_name: String,
}

pub struct ResourceSchemaRequest;

pub struct ResourceSchemaResponse {
    pub schema: Schema,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct ValidateResourceConfigRequest {
    pub type_name: String,
    pub config: DynamicValue,
    pub client_capabilities: ClientCapabilities,
}

pub struct ValidateResourceConfigResponse {
    pub diagnostics: Vec<Diagnostic>,
}

pub struct CreateResourceRequest {
    pub type_name: String,
    pub planned_state: DynamicValue,
    pub config: DynamicValue,
    pub planned_private: Vec<u8>,
    pub provider_meta: Option<DynamicValue>,
}

pub struct CreateResourceResponse {
    /// Carries at least the id whenever the remote object was created, even
    /// when the diagnostics hold an error
    pub new_state: DynamicValue,
    pub private: Vec<u8>,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct ReadResourceRequest {
    pub type_name: String,
    pub current_state: DynamicValue,
    pub private: Vec<u8>,
    pub provider_meta: Option<DynamicValue>,
    pub client_capabilities: ClientCapabilities,
    pub current_identity: Option<ResourceIdentityData>,
}

pub struct ReadResourceResponse {
    pub new_state: Option<DynamicValue>,
    pub diagnostics: Vec<Diagnostic>,
    pub private: Vec<u8>,
    pub deferred: Option<Deferred>,
    pub new_identity: Option<ResourceIdentityData>,
}

pub struct UpdateResourceRequest {
    pub type_name: String,
    pub prior_state: DynamicValue,
    pub planned_state: DynamicValue,
    pub config: DynamicValue,
    pub planned_private: Vec<u8>,
    pub provider_meta: Option<DynamicValue>,
    pub planned_identity: Option<ResourceIdentityData>,
}

pub struct UpdateResourceResponse {
    pub new_state: DynamicValue,
    pub private: Vec<u8>,
    pub diagnostics: Vec<Diagnostic>,
    pub new_identity: Option<ResourceIdentityData>,
}

pub struct DeleteResourceRequest {
    pub type_name: String,
    pub prior_state: DynamicValue,
    pub planned_private: Vec<u8>,
    pub provider_meta: Option<DynamicValue>,
}

pub struct DeleteResourceResponse {
    pub diagnostics: Vec<Diagnostic>,
}

/// Called right after the factory builds the resource, before any lifecycle
/// call
#[async_trait]
pub trait ResourceWithConfigure: Resource {
    async fn configure(
        &mut self,
        ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse;
}

pub struct ConfigureResourceRequest {
    /// Data from ConfigureProviderResponse.provider_data, downcast to the
    /// provider's own type
    pub provider_data: Option<Arc<dyn Any + Send + Sync>>,
}

pub struct ConfigureResourceResponse {
    pub diagnostics: Vec<Diagnostic>,
}

#[async_trait]
pub trait ResourceWithImportState: Resource {
    /// Parses the import ID and returns the full resource state
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse;
}

pub struct ImportResourceStateRequest {
    pub type_name: String,
    pub id: String,
    pub client_capabilities: ClientCapabilities,
    pub identity: Option<ResourceIdentityData>,
}

pub struct ImportResourceStateResponse {
    pub imported_resources: Vec<ImportedResource>,
    pub diagnostics: Vec<Diagnostic>,
    pub deferred: Option<Deferred>,
}

pub struct ImportedResource {
    pub type_name: String,
    pub state: DynamicValue,
    pub private: Vec<u8>,
    pub identity: Option<ResourceIdentityData>,
}

/// What a provider hands out per resource type: configurable and importable
pub trait ProviderResource: ResourceWithConfigure + ResourceWithImportState {}

impl<T> ProviderResource for T where T: ResourceWithConfigure + ResourceWithImportState {}

/// Builds a fresh, unconfigured resource
pub type ResourceFactory = Box<dyn Fn() -> Box<dyn ProviderResource> + Send + Sync>;
