//! SSH key resource. Keys are addressed by name.

use super::{
    api_error, configure_response, import_response, import_seed, invalid_id, invalid_import_id,
    missing_on_import, not_configured, put, required_string, state_id, timeouts_attribute,
    validate_config, Timeouts, CLOUD_INSTANCE_ID,
};
use crate::api::keys::SshKey;
use crate::ids;
use crate::provider_data::PpcProviderData;
use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::plan_modifier::UseStateForUnknown;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceMetadataRequest, ResourceMetadataResponse,
    ResourceSchemaRequest, ResourceSchemaResponse, ResourceWithConfigure,
    ResourceWithImportState, UpdateResourceRequest, UpdateResourceResponse,
    ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{Diagnostic, DynamicValue};

const KEY_NAME: &str = "ppc_key_name";
const SSH_KEY: &str = "ppc_ssh_key";

const DEFAULT_TIMEOUTS: Timeouts = Timeouts::minutes(60, 60, 60);

#[derive(Default)]
pub struct KeyResource {
    provider_data: Option<PpcProviderData>,
}

impl KeyResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_static() -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Manages an SSH key")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("Composite identifier <cloud_instance_id>/<key_name>")
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(CLOUD_INSTANCE_ID, AttributeType::String)
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(KEY_NAME, AttributeType::String)
                    .description("User defined name for the SSH key")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(SSH_KEY, AttributeType::String)
                    .description("SSH RSA key")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("key_id", AttributeType::String)
                    .computed()
                    .description("Deprecated, replaced by name")
                    .deprecated()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("ssh_key", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("creation_date", AttributeType::String)
                    .description("Date of SSH key creation")
                    .computed()
                    .build(),
            )
            .attribute(timeouts_attribute())
            .build()
    }

    async fn create_key(&self, plan: &DynamicValue, state: &mut DynamicValue) -> Result<(), Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let cloud = required_string(plan, CLOUD_INSTANCE_ID)?;
        let name = required_string(plan, KEY_NAME)?;
        let ssh_key = required_string(plan, SSH_KEY)?;

        data.client
            .cloud(&cloud)
            .keys()
            .create(&name, &ssh_key)
            .await
            .map_err(|e| api_error("Failed to create SSH key", e))?;

        let id = ids::encode(&[&cloud, &name]).map_err(invalid_id)?;
        put(state, "id", id.as_str());
        tracing::info!("Created SSH key {}", id);

        if let Some(read) = self.read_key(state).await? {
            *state = read;
        }
        Ok(())
    }

    async fn read_key(&self, current: &DynamicValue) -> Result<Option<DynamicValue>, Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let id = state_id(current)?;
        let (cloud, name) = ids::decode_pair(&id).map_err(invalid_id)?;

        match data.client.cloud(&cloud).keys().get(&name).await {
            Ok(key) => {
                let mut state = current.clone();
                put(&mut state, CLOUD_INSTANCE_ID, cloud.as_str());
                apply_key(&mut state, &key);
                Ok(Some(state))
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!("SSH key {} no longer exists, removing from state", id);
                Ok(None)
            }
            Err(e) => Err(api_error("Failed to read SSH key", e)),
        }
    }

    async fn delete_key(&self, prior: &DynamicValue) -> Result<(), Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let id = state_id(prior)?;
        let (cloud, name) = ids::decode_pair(&id).map_err(invalid_id)?;

        match data.client.cloud(&cloud).keys().delete(&name).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                tracing::debug!("SSH key {} already deleted", id);
                Ok(())
            }
            Err(e) => Err(api_error("Failed to delete SSH key", e)),
        }
    }
}

fn apply_key(state: &mut DynamicValue, key: &SshKey) {
    put(state, KEY_NAME, key.name.as_str());
    put(state, SSH_KEY, key.ssh_key.as_str());
    put(state, "name", key.name.as_str());
    put(state, "key_id", key.name.as_str());
    put(state, "ssh_key", key.ssh_key.as_str());
    put(state, "creation_date", key.creation_date_string());
}

#[async_trait]
impl Resource for KeyResource {
    fn type_name(&self) -> &str {
        "ppc_key"
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: ResourceMetadataRequest,
    ) -> ResourceMetadataResponse {
        ResourceMetadataResponse {
            type_name: self.type_name().to_string(),
        }
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        ResourceSchemaResponse {
            schema: Self::schema_static(),
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        ValidateResourceConfigResponse {
            diagnostics: validate_config(&Self::schema_static(), &request.config, DEFAULT_TIMEOUTS),
        }
    }

    async fn create(&self, _ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let mut diagnostics = vec![];
        let mut new_state = request.planned_state.clone();

        if let Err(diag) = self.create_key(&request.planned_state, &mut new_state).await {
            diagnostics.push(diag);
        }

        CreateResourceResponse {
            new_state,
            private: vec![],
            diagnostics,
        }
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let mut diagnostics = vec![];

        let new_state = match self.read_key(&request.current_state).await {
            Ok(state) => state,
            Err(diag) => {
                diagnostics.push(diag);
                Some(request.current_state)
            }
        };

        ReadResourceResponse {
            new_state,
            diagnostics,
            private: request.private,
            deferred: None,
            new_identity: None,
        }
    }

    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let mut diagnostics = vec![];

        let new_state = match self.read_key(&request.prior_state).await {
            Ok(Some(state)) => state,
            Ok(None) => {
                diagnostics.push(Diagnostic::error(
                    "SSH key not found",
                    "The SSH key was removed outside of Terraform",
                ));
                request.prior_state
            }
            Err(diag) => {
                diagnostics.push(diag);
                request.prior_state
            }
        };

        UpdateResourceResponse {
            new_state,
            private: vec![],
            diagnostics,
            new_identity: None,
        }
    }

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let mut diagnostics = vec![];

        if let Err(diag) = self.delete_key(&request.prior_state).await {
            diagnostics.push(diag);
        }

        DeleteResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithConfigure for KeyResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        configure_response(&mut self.provider_data, request.provider_data)
    }
}

#[async_trait]
impl ResourceWithImportState for KeyResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let id = request.id.as_str();
        let result = match ids::decode_pair(id) {
            Ok(_) => self
                .read_key(&import_seed(id))
                .await
                .and_then(|state| state.ok_or_else(|| missing_on_import("SSH key", id))),
            Err(e) => Err(invalid_import_id(e, "<cloud_instance_id>/<key_name>")),
        };
        import_response(&request.type_name, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::test_support::*;
    use mockito::{Matcher, Server};
    use tfplug::types::Dynamic;

    const TYPE: &str = "ppc_key";
    const KEYS_PATH: &str = "/ppc/v1/cloud-instances/cloud-1/sshkeys";
    const KEY_PATH: &str = "/ppc/v1/cloud-instances/cloud-1/sshkeys/ops";
    const KEY_BODY: &str =
        r#"{"name": "ops", "sshKey": "ssh-rsa AAAA", "creationDate": "2024-01-02T03:04:05Z"}"#;

    fn planned() -> DynamicValue {
        object(&[
            ("id", Dynamic::Unknown),
            (CLOUD_INSTANCE_ID, "cloud-1".into()),
            (KEY_NAME, "ops".into()),
            (SSH_KEY, "ssh-rsa AAAA".into()),
        ])
    }

    async fn configured(url: &str) -> KeyResource {
        let mut resource = KeyResource::new();
        configure(&mut resource, url).await;
        resource
    }

    #[test]
    fn test_key_id_is_deprecated() {
        let schema = KeyResource::schema_static();
        let key_id = schema.attribute("key_id").unwrap();
        assert!(key_id.deprecated);
        assert!(key_id.computed);
        assert!(!schema.attribute(KEY_NAME).unwrap().deprecated);
    }

    #[tokio::test]
    async fn test_create_then_read() {
        let mut server = Server::new_async().await;
        let post = server
            .mock("POST", KEYS_PATH)
            .match_body(Matcher::Json(serde_json::json!({
                "name": "ops",
                "sshKey": "ssh-rsa AAAA"
            })))
            .with_status(201)
            .with_body(KEY_BODY)
            .create_async()
            .await;
        let _get = server
            .mock("GET", KEY_PATH)
            .with_status(200)
            .with_body(KEY_BODY)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .create(Context::new(), create_request(TYPE, planned()))
            .await;

        post.assert_async().await;
        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert_eq!(string_at(&response.new_state, "id"), "cloud-1/ops");
        assert_eq!(string_at(&response.new_state, "key_id"), "ops");
        assert_eq!(
            string_at(&response.new_state, "creation_date"),
            "2024-01-02T03:04:05+00:00"
        );
    }

    #[tokio::test]
    async fn test_create_failure_has_no_id() {
        let mut server = Server::new_async().await;
        let _post = server
            .mock("POST", KEYS_PATH)
            .with_status(400)
            .with_body(r#"{"description": "key already exists"}"#)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .create(Context::new(), create_request(TYPE, planned()))
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].summary, "Failed to create SSH key");
        assert!(response.new_state.get_optional_string(&crate::resources::attr("id")).is_none());
    }

    #[tokio::test]
    async fn test_read_not_found_twice() {
        let mut server = Server::new_async().await;
        let _get = server
            .mock("GET", KEY_PATH)
            .with_status(404)
            .with_body(r#"{"description": "key not found"}"#)
            .expect(2)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let prior = with(&planned(), "id", "cloud-1/ops");
        for _ in 0..2 {
            let response = resource
                .read(Context::new(), read_request(TYPE, prior.clone()))
                .await;
            assert!(response.diagnostics.is_empty());
            assert!(response.new_state.is_none());
        }
    }

    #[tokio::test]
    async fn test_delete_not_found_is_success() {
        let mut server = Server::new_async().await;
        let _delete = server
            .mock("DELETE", KEY_PATH)
            .with_status(404)
            .with_body(r#"{"description": "key not found"}"#)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let prior = with(&planned(), "id", "cloud-1/ops");
        let response = resource
            .delete(Context::new(), delete_request(TYPE, prior))
            .await;

        assert!(response.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn test_import() {
        let mut server = Server::new_async().await;
        let _get = server
            .mock("GET", KEY_PATH)
            .with_status(200)
            .with_body(KEY_BODY)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .import_state(Context::new(), import_request(TYPE, "cloud-1/ops"))
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = &response.imported_resources[0].state;
        assert_eq!(string_at(state, CLOUD_INSTANCE_ID), "cloud-1");
        assert_eq!(string_at(state, SSH_KEY), "ssh-rsa AAAA");

        let response = resource
            .import_state(Context::new(), import_request(TYPE, "ops"))
            .await;
        assert_eq!(response.diagnostics[0].summary, "Invalid import ID");
    }
}
