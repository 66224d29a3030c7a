//! tfplug - Terraform provider contract for Rust
//!
//! The traits, value types and schema machinery a provider implements
//! against. Wire transport lives outside this crate.

// Core modules
pub mod context;
pub mod error;
pub mod schema;
pub mod types;

// Provider API modules
pub mod data_source;
pub mod provider;
pub mod resource;

// Helper modules
pub mod defaults;
pub mod import;
pub mod plan_modifier;
pub mod validator;

// Re-exports for convenience
pub use context::Context;
pub use data_source::{DataSource, DataSourceFactory, DataSourceWithConfigure};
pub use error::{Result, TfplugError};
pub use import::import_state_passthrough_id;
pub use provider::{Provider, ProviderMetadataRequest, ProviderMetadataResponse};
pub use resource::{
    ProviderResource, Resource, ResourceFactory, ResourceWithConfigure, ResourceWithImportState,
};
pub use schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
pub use types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
