//! Fixtures shared by the resource and data source tests

use crate::api::test_helpers::{create_test_client, init_tracing};
use crate::provider_data::PpcProviderData;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tfplug::context::Context;
use tfplug::data_source::{ConfigureDataSourceRequest, DataSourceWithConfigure, ReadDataSourceRequest};
use tfplug::resource::{
    ConfigureResourceRequest, CreateResourceRequest, DeleteResourceRequest,
    ImportResourceStateRequest, ReadResourceRequest, ResourceWithConfigure,
    UpdateResourceRequest, ValidateResourceConfigRequest,
};
use tfplug::types::{AttributePath, ClientCapabilities, Dynamic, DynamicValue};

/// Provider data against a fake server, polling every millisecond
pub fn provider_data(url: &str) -> PpcProviderData {
    init_tracing();
    PpcProviderData::new(create_test_client(url)).with_poll_override(Duration::from_millis(1))
}

pub async fn configure<R: ResourceWithConfigure>(resource: &mut R, url: &str) {
    let data: Arc<dyn Any + Send + Sync> = Arc::new(provider_data(url));
    let response = resource
        .configure(
            Context::new(),
            ConfigureResourceRequest {
                provider_data: Some(data),
            },
        )
        .await;
    assert!(response.diagnostics.is_empty());
}

pub async fn configure_data_source<D: DataSourceWithConfigure>(data_source: &mut D, url: &str) {
    let data: Arc<dyn Any + Send + Sync> = Arc::new(provider_data(url));
    let response = data_source
        .configure(
            Context::new(),
            ConfigureDataSourceRequest {
                provider_data: Some(data),
            },
        )
        .await;
    assert!(response.diagnostics.is_empty());
}

pub fn object(pairs: &[(&str, Dynamic)]) -> DynamicValue {
    let mut value = DynamicValue::object();
    for (name, v) in pairs {
        value.set(&AttributePath::new(name), v.clone()).unwrap();
    }
    value
}

pub fn with(value: &DynamicValue, name: &str, v: impl Into<Dynamic>) -> DynamicValue {
    let mut value = value.clone();
    value.set(&AttributePath::new(name), v).unwrap();
    value
}

pub fn string_at(value: &DynamicValue, name: &str) -> String {
    value.get_string(&AttributePath::new(name)).unwrap()
}

pub fn number_at(value: &DynamicValue, name: &str) -> f64 {
    value.get_number(&AttributePath::new(name)).unwrap()
}

pub fn validate_request(type_name: &str, config: DynamicValue) -> ValidateResourceConfigRequest {
    ValidateResourceConfigRequest {
        type_name: type_name.to_string(),
        config,
        client_capabilities: ClientCapabilities::default(),
    }
}

pub fn create_request(type_name: &str, planned: DynamicValue) -> CreateResourceRequest {
    CreateResourceRequest {
        type_name: type_name.to_string(),
        config: planned.clone(),
        planned_state: planned,
        planned_private: vec![],
        provider_meta: None,
    }
}

pub fn read_request(type_name: &str, state: DynamicValue) -> ReadResourceRequest {
    ReadResourceRequest {
        type_name: type_name.to_string(),
        current_state: state,
        private: vec![],
        provider_meta: None,
        client_capabilities: ClientCapabilities::default(),
        current_identity: None,
    }
}

pub fn update_request(type_name: &str, prior: DynamicValue, planned: DynamicValue) -> UpdateResourceRequest {
    UpdateResourceRequest {
        type_name: type_name.to_string(),
        prior_state: prior,
        config: planned.clone(),
        planned_state: planned,
        planned_private: vec![],
        provider_meta: None,
        planned_identity: None,
    }
}

pub fn delete_request(type_name: &str, prior: DynamicValue) -> DeleteResourceRequest {
    DeleteResourceRequest {
        type_name: type_name.to_string(),
        prior_state: prior,
        planned_private: vec![],
        provider_meta: None,
    }
}

pub fn import_request(type_name: &str, id: &str) -> ImportResourceStateRequest {
    ImportResourceStateRequest {
        type_name: type_name.to_string(),
        id: id.to_string(),
        client_capabilities: ClientCapabilities::default(),
        identity: None,
    }
}

pub fn data_source_request(type_name: &str, config: DynamicValue) -> ReadDataSourceRequest {
    ReadDataSourceRequest {
        type_name: type_name.to_string(),
        config,
        provider_meta: None,
        client_capabilities: ClientCapabilities::default(),
    }
}
