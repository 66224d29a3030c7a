//! Volume group resource. Membership changes are sent as an add/remove diff.

use super::{
    api_error, attr, configure_response, import_response, import_seed, invalid_id,
    invalid_import_id, missing_on_import, not_configured, put, put_strings, required_string,
    state_id, timeouts_attribute, validate_config, wait_error, Timeouts, CLOUD_INSTANCE_ID,
};
use crate::api::volume_groups::{
    CreateVolumeGroupRequest, StatusDescriptionError, UpdateVolumeGroupRequest, VolumeGroup,
    VolumeGroupDetails,
};
use crate::api::ApiError;
use crate::ids;
use crate::provider_data::PpcProviderData;
use crate::waiter::{Observation, WaitError, Waiter, NOT_FOUND};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
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
use tfplug::types::{Diagnostic, Dynamic, DynamicValue};

const GROUP_NAME: &str = "ppc_volume_group_name";
const CONSISTENCY_GROUP_NAME: &str = "ppc_consistency_group_name";
const VOLUME_IDS: &str = "ppc_volume_ids";
const STATUS_ERRORS: &str = "status_description_errors";

const STATE_AVAILABLE: &str = "available";
const STATE_CREATING: &str = "creating";
const STATE_UPDATING: &str = "updating";
const STATE_DELETING: &str = "deleting";
const STATE_ERROR: &str = "error";

const DEFAULT_TIMEOUTS: Timeouts = Timeouts::minutes(30, 30, 10);

/// Element type of `status_description_errors`
pub(crate) fn status_error_type() -> AttributeType {
    AttributeType::object_list(&[
        ("key", AttributeType::String),
        ("message", AttributeType::String),
        ("volume_ids", AttributeType::string_list()),
    ])
}

pub(crate) fn status_errors(errors: &[StatusDescriptionError]) -> Dynamic {
    Dynamic::List(
        errors
            .iter()
            .map(|error| {
                Dynamic::Map(HashMap::from([
                    ("key".to_string(), error.key.clone().into()),
                    ("message".to_string(), error.message.clone().into()),
                    (
                        "volume_ids".to_string(),
                        Dynamic::string_list(error.volume_ids.iter().cloned()),
                    ),
                ]))
            })
            .collect(),
    )
}

#[derive(Default)]
pub struct VolumeGroupResource {
    provider_data: Option<PpcProviderData>,
}

impl VolumeGroupResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_static() -> Schema {
        let computed = |name: &str, description: &str| {
            AttributeBuilder::new(name, AttributeType::String)
                .description(description)
                .computed()
                .build()
        };

        SchemaBuilder::new()
            .version(0)
            .description("Manages a volume group")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("Composite identifier <cloud_instance_id>/<volume_group_id>")
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
                    .description("Name of the volume group")
                    .optional()
                    .computed()
                    .force_new()
                    .conflicts_with(&[CONSISTENCY_GROUP_NAME])
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(CONSISTENCY_GROUP_NAME, AttributeType::String)
                    .description("Consistency group name at the storage controller")
                    .optional()
                    .force_new()
                    .conflicts_with(&[GROUP_NAME])
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(VOLUME_IDS, AttributeType::string_set())
                    .description("Volumes in the group")
                    .required()
                    .build(),
            )
            .attribute(computed("volume_group_id", "Volume group ID"))
            .attribute(computed("volume_group_status", "Volume group status"))
            .attribute(computed("replication_status", "Replication status"))
            .attribute(computed("consistency_group_name", "Consistency group name"))
            .attribute(
                AttributeBuilder::new(STATUS_ERRORS, status_error_type())
                    .description("Errors reported for the group")
                    .computed()
                    .build(),
            )
            .attribute(timeouts_attribute())
            .build()
    }

    async fn create_group(
        &self,
        ctx: &Context,
        plan: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Result<(), Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let timeouts = DEFAULT_TIMEOUTS.resolve(plan)?;
        let ctx = ctx.with_timeout(timeouts.create);
        let cloud = required_string(plan, CLOUD_INSTANCE_ID)?;

        let body = CreateVolumeGroupRequest {
            name: plan.get_optional_string(&attr(GROUP_NAME)),
            consistency_group_name: plan.get_optional_string(&attr(CONSISTENCY_GROUP_NAME)),
            volume_ids: volume_ids(plan),
        };

        let group = data
            .client
            .cloud(&cloud)
            .volume_groups()
            .create(&body)
            .await
            .map_err(|e| api_error("Failed to create volume group", e))?;

        let id = ids::encode(&[&cloud, &group.id]).map_err(invalid_id)?;
        put(state, "id", id.as_str());
        put(state, "volume_group_id", group.id.as_str());
        tracing::info!("Created volume group {}", id);

        wait_for_available(&ctx, data, &cloud, &group.id, timeouts.create)
            .await
            .map_err(|e| wait_error("Failed waiting for volume group to become available", e))?;

        match self.read_group(state).await? {
            Some(read) => {
                *state = read;
                Ok(())
            }
            None => Err(Diagnostic::error(
                "Volume group not found",
                format!("Volume group {} disappeared after create", id),
            )),
        }
    }

    async fn read_group(&self, current: &DynamicValue) -> Result<Option<DynamicValue>, Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let id = state_id(current)?;
        let (cloud, group_id) = ids::decode_pair(&id).map_err(invalid_id)?;

        match data.client.cloud(&cloud).volume_groups().get_details(&group_id).await {
            Ok(group) => {
                let mut state = current.clone();
                apply_group(&mut state, &cloud, &group);
                Ok(Some(state))
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!("Volume group {} no longer exists, removing from state", id);
                Ok(None)
            }
            Err(e) => Err(api_error("Failed to read volume group", e)),
        }
    }

    async fn update_group(
        &self,
        ctx: &Context,
        prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> Result<DynamicValue, Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let timeouts = DEFAULT_TIMEOUTS.resolve(planned)?;
        let ctx = ctx.with_timeout(timeouts.update);
        let id = state_id(prior)?;
        let (cloud, group_id) = ids::decode_pair(&id).map_err(invalid_id)?;

        let body = membership_diff(&volume_ids(prior), &volume_ids(planned));
        if body != UpdateVolumeGroupRequest::default() {
            tracing::debug!(
                "Volume group {} adds {:?} and removes {:?}",
                id,
                body.add_volumes,
                body.remove_volumes
            );
            data.client
                .cloud(&cloud)
                .volume_groups()
                .update(&group_id, &body)
                .await
                .map_err(|e| api_error("Failed to update volume group", e))?;
            wait_for_available(&ctx, data, &cloud, &group_id, timeouts.update)
                .await
                .map_err(|e| wait_error("Failed waiting for volume group update", e))?;
        }

        let mut state = planned.clone();
        put(&mut state, "id", id.as_str());
        match self.read_group(&state).await? {
            Some(state) => Ok(state),
            None => Err(Diagnostic::error(
                "Volume group not found",
                format!("Volume group {} disappeared during update", id),
            )),
        }
    }

    async fn delete_group(&self, ctx: &Context, prior: &DynamicValue) -> Result<(), Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let timeouts = DEFAULT_TIMEOUTS.resolve(prior)?;
        let ctx = ctx.with_timeout(timeouts.delete);
        let id = state_id(prior)?;
        let (cloud, group_id) = ids::decode_pair(&id).map_err(invalid_id)?;
        let api = data.client.cloud(&cloud);

        let members = volume_ids(prior);
        if !members.is_empty() {
            let body = UpdateVolumeGroupRequest {
                add_volumes: vec![],
                remove_volumes: members,
            };
            match api.volume_groups().update(&group_id, &body).await {
                Ok(_) => {}
                Err(e) if e.is_not_found() => {
                    tracing::debug!("Volume group {} already deleted", id);
                    return Ok(());
                }
                Err(e) => return Err(api_error("Failed to remove volumes from volume group", e)),
            }
            wait_for_available(&ctx, data, &cloud, &group_id, timeouts.delete)
                .await
                .map_err(|e| wait_error("Failed waiting for volume group update", e))?;
        }

        match api.volume_groups().delete(&group_id).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(api_error("Failed to delete volume group", e)),
        }

        wait_for_deleted(&ctx, data, &cloud, &group_id, timeouts.delete)
            .await
            .map_err(|e| wait_error("Failed waiting for volume group deletion", e))
    }
}

fn volume_ids(value: &DynamicValue) -> Vec<String> {
    value.get_string_list(&attr(VOLUME_IDS)).unwrap_or_default()
}

pub(crate) fn membership_diff(prior: &[String], planned: &[String]) -> UpdateVolumeGroupRequest {
    UpdateVolumeGroupRequest {
        add_volumes: planned
            .iter()
            .filter(|v| !prior.contains(v))
            .cloned()
            .collect(),
        remove_volumes: prior
            .iter()
            .filter(|v| !planned.contains(v))
            .cloned()
            .collect(),
    }
}

pub(crate) fn available_state(group: VolumeGroup) -> Observation<VolumeGroup> {
    let state = group.status().to_string();
    if state == STATE_ERROR {
        let fault = format!("volume group {} is in error state", group.id);
        return Observation::new(group, state).with_fault(fault);
    }
    Observation::new(group, state)
}

async fn wait_for_available(
    ctx: &Context,
    data: &PpcProviderData,
    cloud: &str,
    group_id: &str,
    timeout: Duration,
) -> Result<Option<VolumeGroup>, WaitError> {
    let waiter = Waiter::new(&[STATE_CREATING, STATE_UPDATING], &[STATE_AVAILABLE])?
        .delay(Duration::from_secs(10))
        .poll_interval(Duration::from_secs(120))
        .timeout(timeout);
    let api = data.client.cloud(cloud);
    let api = &api;

    data.tune(waiter)
        .wait(ctx, move || async move {
            let group = api.volume_groups().get(group_id).await?;
            Ok::<_, ApiError>(available_state(group))
        })
        .await
}

async fn wait_for_deleted(
    ctx: &Context,
    data: &PpcProviderData,
    cloud: &str,
    group_id: &str,
    timeout: Duration,
) -> Result<(), WaitError> {
    let waiter = Waiter::new(&[STATE_DELETING, STATE_UPDATING], &[NOT_FOUND])?
        .delay(Duration::from_secs(10))
        .poll_interval(Duration::from_secs(120))
        .timeout(timeout);
    let api = data.client.cloud(cloud);
    let api = &api;

    data.tune(waiter)
        .wait(ctx, move || async move {
            match api.volume_groups().get(group_id).await {
                Ok(group) => Ok(Observation::new(group, STATE_DELETING)),
                Err(e) if e.is_not_found() => Ok(Observation::gone()),
                Err(e) => Err(e),
            }
        })
        .await
        .map(|_| ())
}

fn apply_group(state: &mut DynamicValue, cloud: &str, group: &VolumeGroupDetails) {
    put(state, CLOUD_INSTANCE_ID, cloud);
    put(state, "volume_group_id", group.id.as_str());
    put(state, GROUP_NAME, group.name.clone());
    put(state, "volume_group_status", group.status.clone());
    put(state, "replication_status", group.replication_status.clone());
    put(state, "consistency_group_name", group.consistency_group_name.clone());
    put_strings(state, VOLUME_IDS, &group.volume_ids);
    put(state, STATUS_ERRORS, status_errors(group.errors()));
}

#[async_trait]
impl Resource for VolumeGroupResource {
    fn type_name(&self) -> &str {
        "ppc_volume_group"
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

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let mut diagnostics = vec![];
        let mut new_state = request.planned_state.clone();

        if let Err(diag) = self
            .create_group(&ctx, &request.planned_state, &mut new_state)
            .await
        {
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

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let mut diagnostics = vec![];

        let new_state = match self
            .update_group(&ctx, &request.prior_state, &request.planned_state)
            .await
        {
            Ok(state) => state,
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

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let mut diagnostics = vec![];

        if let Err(diag) = self.delete_group(&ctx, &request.prior_state).await {
            diagnostics.push(diag);
        }

        DeleteResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithConfigure for VolumeGroupResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        configure_response(&mut self.provider_data, request.provider_data)
    }
}

#[async_trait]
impl ResourceWithImportState for VolumeGroupResource {
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
                .and_then(|state| state.ok_or_else(|| missing_on_import("volume group", id))),
            Err(e) => Err(invalid_import_id(e, "<cloud_instance_id>/<volume_group_id>")),
        };
        import_response(&request.type_name, result)
    }
}

#[cfg(test)]
#[path = "./resource_volume_group_test.rs"]
mod resource_volume_group_test;
