//! Server placement group. The API cannot rename a group or change its
//! policy, so both force a new group.

use super::{
    api_error, configure_response, import_response, import_seed, invalid_id, invalid_import_id,
    missing_on_import, not_configured, put, put_strings, required_string, state_id,
    timeouts_attribute, validate_config, Timeouts, CLOUD_INSTANCE_ID,
};
use crate::api::placement_groups::PlacementGroup;
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
use tfplug::validator::StringOneOf;

const GROUP_NAME: &str = "ppc_placement_group_name";
const GROUP_POLICY: &str = "ppc_placement_group_policy";

const DEFAULT_TIMEOUTS: Timeouts = Timeouts::minutes(60, 60, 60);

#[derive(Default)]
pub struct PlacementGroupResource {
    provider_data: Option<PpcProviderData>,
}

impl PlacementGroupResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_static() -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Manages a server placement group")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("Composite identifier <cloud_instance_id>/<placement_group_id>")
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
                AttributeBuilder::new(GROUP_NAME, AttributeType::String)
                    .description("Name of the placement group")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(GROUP_POLICY, AttributeType::String)
                    .description("Policy of the placement group")
                    .required()
                    .force_new()
                    .validator(StringOneOf::create(&["affinity", "anti-affinity"]))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("placement_group_id", AttributeType::String)
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("members", AttributeType::string_set())
                    .description("Instance IDs in the group")
                    .computed()
                    .build(),
            )
            .attribute(timeouts_attribute())
            .build()
    }

    async fn create_group(&self, plan: &DynamicValue, state: &mut DynamicValue) -> Result<(), Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let cloud = required_string(plan, CLOUD_INSTANCE_ID)?;
        let name = required_string(plan, GROUP_NAME)?;
        let policy = required_string(plan, GROUP_POLICY)?;

        let group = data
            .client
            .cloud(&cloud)
            .placement_groups()
            .create(&name, &policy)
            .await
            .map_err(|e| api_error("Failed to create placement group", e))?;

        let id = ids::encode(&[&cloud, &group.id]).map_err(invalid_id)?;
        put(state, "id", id.as_str());
        tracing::info!("Created placement group {}", id);

        apply_group(state, &cloud, &group);
        Ok(())
    }

    async fn read_group(&self, current: &DynamicValue) -> Result<Option<DynamicValue>, Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let id = state_id(current)?;
        let (cloud, group_id) = ids::decode_pair(&id).map_err(invalid_id)?;

        match data.client.cloud(&cloud).placement_groups().get(&group_id).await {
            Ok(group) => {
                let mut state = current.clone();
                apply_group(&mut state, &cloud, &group);
                Ok(Some(state))
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!("Placement group {} no longer exists, removing from state", id);
                Ok(None)
            }
            Err(e) => Err(api_error("Failed to read placement group", e)),
        }
    }

    async fn delete_group(&self, prior: &DynamicValue) -> Result<(), Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let id = state_id(prior)?;
        let (cloud, group_id) = ids::decode_pair(&id).map_err(invalid_id)?;

        match data.client.cloud(&cloud).placement_groups().delete(&group_id).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                tracing::debug!("Placement group {} already deleted", id);
                Ok(())
            }
            Err(e) => Err(api_error("Failed to delete placement group", e)),
        }
    }
}

fn apply_group(state: &mut DynamicValue, cloud: &str, group: &PlacementGroup) {
    put(state, CLOUD_INSTANCE_ID, cloud);
    put(state, "placement_group_id", group.id.as_str());
    put(state, GROUP_NAME, group.name.clone());
    put(state, GROUP_POLICY, group.policy.clone());
    put_strings(state, "members", &group.members);
}

#[async_trait]
impl Resource for PlacementGroupResource {
    fn type_name(&self) -> &str {
        "ppc_placement_group"
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

        if let Err(diag) = self.create_group(&request.planned_state, &mut new_state).await {
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

        let new_state = match self.read_group(&request.current_state).await {
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

        let new_state = match self.read_group(&request.prior_state).await {
            Ok(Some(state)) => state,
            Ok(None) => {
                diagnostics.push(Diagnostic::error(
                    "Placement group not found",
                    "The placement group was removed outside of Terraform",
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

        if let Err(diag) = self.delete_group(&request.prior_state).await {
            diagnostics.push(diag);
        }

        DeleteResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithConfigure for PlacementGroupResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        configure_response(&mut self.provider_data, request.provider_data)
    }
}

#[async_trait]
impl ResourceWithImportState for PlacementGroupResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let id = request.id.as_str();
        let result = match ids::decode_pair(id) {
            Ok(_) => self
                .read_group(&import_seed(id))
                .await
                .and_then(|state| state.ok_or_else(|| missing_on_import("placement group", id))),
            Err(e) => Err(invalid_import_id(e, "<cloud_instance_id>/<placement_group_id>")),
        };
        import_response(&request.type_name, result)
    }
}
