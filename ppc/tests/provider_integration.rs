//! Drives the provider the way Terraform does: configure, build handlers
//! from the factories, hand them the provider data and run them against a
//! fake API

#![allow(clippy::disallowed_methods)] // Allow unwrap() in tests for clarity

use mockito::{Matcher, Server};
use ppc::PpcProvider;
use serial_test::serial;
use std::any::Any;
use std::sync::Arc;
use tfplug::context::Context;
use tfplug::data_source::{ConfigureDataSourceRequest, ReadDataSourceRequest};
use tfplug::provider::{ConfigureProviderRequest, Provider};
use tfplug::resource::{
    ConfigureResourceRequest, CreateResourceRequest, DeleteResourceRequest, ReadResourceRequest,
};
use tfplug::types::{AttributePath, ClientCapabilities, Dynamic, DynamicValue};

const KEY_BODY: &str =
    r#"{"name": "ops", "sshKey": "ssh-rsa AAAA", "creationDate": "2024-01-02T03:04:05Z"}"#;

async fn configured_provider(url: &str) -> (PpcProvider, Option<Arc<dyn Any + Send + Sync>>) {
    let mut config = DynamicValue::null();
    let _ = config.set_string(&AttributePath::new("endpoint"), url.to_string());
    let _ = config.set_string(&AttributePath::new("api_token"), "secret".to_string());
    let _ = config.set_number(&AttributePath::new("max_retries"), 0.0);

    let mut provider = PpcProvider::new();
    let response = provider
        .configure(
            Context::new(),
            ConfigureProviderRequest {
                terraform_version: "1.9.0".to_string(),
                config,
                client_capabilities: ClientCapabilities::default(),
            },
        )
        .await;
    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    assert!(response.provider_data.is_some());

    (provider, response.provider_data)
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn key_lifecycle_through_the_provider() {
    let mut server = Server::new_async().await;
    let create = server
        .mock("POST", "/ppc/v1/cloud-instances/cloud-1/sshkeys")
        .match_header("authorization", "Bearer secret")
        .match_body(Matcher::PartialJson(serde_json::json!({"name": "ops"})))
        .with_status(201)
        .with_body(KEY_BODY)
        .create_async()
        .await;
    let read = server
        .mock("GET", "/ppc/v1/cloud-instances/cloud-1/sshkeys/ops")
        .match_header("authorization", "Bearer secret")
        .with_status(200)
        .with_body(KEY_BODY)
        .expect(2)
        .create_async()
        .await;
    let delete = server
        .mock("DELETE", "/ppc/v1/cloud-instances/cloud-1/sshkeys/ops")
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let (provider, provider_data) = configured_provider(&server.url()).await;
    let factories = provider.resources();
    let mut key = factories.get("ppc_key").unwrap()();
    let configured = key
        .configure(Context::new(), ConfigureResourceRequest { provider_data })
        .await;
    assert!(configured.diagnostics.is_empty());

    let mut planned = DynamicValue::null();
    let _ = planned.set_string(&AttributePath::new("ppc_cloud_instance_id"), "cloud-1".to_string());
    let _ = planned.set_string(&AttributePath::new("ppc_key_name"), "ops".to_string());
    let _ = planned.set_string(&AttributePath::new("ppc_ssh_key"), "ssh-rsa AAAA".to_string());

    let created = key
        .create(
            Context::new(),
            CreateResourceRequest {
                type_name: "ppc_key".to_string(),
                planned_state: planned.clone(),
                config: planned,
                planned_private: vec![],
                provider_meta: None,
            },
        )
        .await;
    assert!(created.diagnostics.is_empty(), "{:?}", created.diagnostics);
    assert_eq!(
        created.new_state.get_string(&AttributePath::new("id")).unwrap(),
        "cloud-1/ops"
    );

    let refreshed = key
        .read(
            Context::new(),
            ReadResourceRequest {
                type_name: "ppc_key".to_string(),
                current_state: created.new_state.clone(),
                private: vec![],
                provider_meta: None,
                client_capabilities: ClientCapabilities::default(),
                current_identity: None,
            },
        )
        .await;
    assert!(refreshed.diagnostics.is_empty());
    assert!(refreshed.new_state.is_some());

    let deleted = key
        .delete(
            Context::new(),
            DeleteResourceRequest {
                type_name: "ppc_key".to_string(),
                prior_state: created.new_state,
                planned_private: vec![],
                provider_meta: None,
            },
        )
        .await;
    assert!(deleted.diagnostics.is_empty(), "{:?}", deleted.diagnostics);

    create.assert_async().await;
    read.assert_async().await;
    delete.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn data_source_reads_through_the_provider() {
    let mut server = Server::new_async().await;
    let _list = server
        .mock("GET", "/ppc/v1/cloud-instances/cloud-1/placement-groups")
        .with_status(200)
        .with_body(
            r#"{"placementGroups": [{"id": "pg-1", "name": "db", "policy": "affinity", "members": []}]}"#,
        )
        .create_async()
        .await;

    let (provider, provider_data) = configured_provider(&server.url()).await;
    let factories = provider.data_sources();
    let mut groups = factories.get("ppc_placement_groups").unwrap()();
    let configured = groups
        .configure(Context::new(), ConfigureDataSourceRequest { provider_data })
        .await;
    assert!(configured.diagnostics.is_empty());

    let mut config = DynamicValue::null();
    let _ = config.set_string(&AttributePath::new("ppc_cloud_instance_id"), "cloud-1".to_string());
    let response = groups
        .read(
            Context::new(),
            ReadDataSourceRequest {
                type_name: "ppc_placement_groups".to_string(),
                config,
                provider_meta: None,
                client_capabilities: ClientCapabilities::default(),
            },
        )
        .await;

    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    let list = response
        .state
        .get_list(&AttributePath::new("placement_groups"))
        .unwrap();
    assert_eq!(list.len(), 1);
    match &list[0] {
        Dynamic::Map(fields) => {
            assert_eq!(fields.get("policy").and_then(|v| v.as_str()), Some("affinity"));
        }
        other => panic!("expected a map, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn handlers_refuse_to_run_without_provider_data() {
    let provider = PpcProvider::new();

    let factories = provider.data_sources();
    let mut key = factories.get("ppc_key").unwrap()();
    let configured = key
        .configure(Context::new(), ConfigureDataSourceRequest { provider_data: None })
        .await;
    assert_eq!(configured.diagnostics.len(), 1);
    assert_eq!(configured.diagnostics[0].summary, "No provider data");

    let mut config = DynamicValue::null();
    let _ = config.set_string(&AttributePath::new("ppc_cloud_instance_id"), "cloud-1".to_string());
    let _ = config.set_string(&AttributePath::new("ppc_key_name"), "ops".to_string());
    let response = key
        .read(
            Context::new(),
            ReadDataSourceRequest {
                type_name: "ppc_key".to_string(),
                config,
                provider_meta: None,
                client_capabilities: ClientCapabilities::default(),
            },
        )
        .await;
    assert_eq!(response.diagnostics[0].summary, "Provider not configured");
}
