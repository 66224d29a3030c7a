//! Block storage volume resource

use super::{
    affinity_attributes, api_error, attr, configure_response, import_response, import_seed,
    invalid_id, invalid_import_id, missing_on_import, not_configured, put, required_number,
    required_string, state_id, storage_affinity, timeouts_attribute, validate_config, wait_error,
    Timeouts, CLOUD_INSTANCE_ID,
};
use crate::api::volumes::{CreateVolumeRequest, UpdateVolumeRequest, Volume, VolumeAction};
use crate::api::ApiError;
use crate::ids;
use crate::provider_data::PpcProviderData;
use crate::waiter::{Observation, WaitError, Waiter, NOT_FOUND};
use async_trait::async_trait;
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
use tfplug::types::{Diagnostic, DynamicValue};
use tfplug::validator::StringOneOf;

const VOLUME_NAME: &str = "ppc_volume_name";
const VOLUME_SIZE: &str = "ppc_volume_size";
const VOLUME_SHAREABLE: &str = "ppc_volume_shareable";
const VOLUME_TYPE: &str = "ppc_volume_type";
const VOLUME_POOL: &str = "ppc_volume_pool";
const REPLICATION_ENABLED: &str = "ppc_replication_enabled";

const STATE_AVAILABLE: &str = "available";
const STATE_IN_USE: &str = "in-use";
const STATE_CREATING: &str = "creating";
const STATE_ERROR: &str = "error";
const STATE_DELETING: &str = "deleting";

const DEFAULT_TIMEOUTS: Timeouts = Timeouts::minutes(30, 30, 10);

#[derive(Default)]
pub struct VolumeResource {
    provider_data: Option<PpcProviderData>,
}

impl VolumeResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_static() -> Schema {
        let computed = |name: &str, ty: AttributeType, description: &str| {
            AttributeBuilder::new(name, ty)
                .description(description)
                .computed()
                .build()
        };

        let mut builder = SchemaBuilder::new()
            .version(0)
            .description("Manages a block storage volume")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("Composite identifier <cloud_instance_id>/<volume_id>")
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(CLOUD_INSTANCE_ID, AttributeType::String)
                    .description("The cloud instance the volume lives in")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(VOLUME_NAME, AttributeType::String)
                    .description("Name of the volume")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(VOLUME_SIZE, AttributeType::Number)
                    .description("Size in GB")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(VOLUME_SHAREABLE, AttributeType::Bool)
                    .description("Whether the volume can be attached to several instances")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(VOLUME_TYPE, AttributeType::String)
                    .description("Storage tier")
                    .optional()
                    .computed()
                    .force_new()
                    .validator(StringOneOf::create(&["ssd", "standard", "tier1", "tier3"]))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(VOLUME_POOL, AttributeType::String)
                    .description("Storage pool to place the volume in")
                    .optional()
                    .computed()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(REPLICATION_ENABLED, AttributeType::Bool)
                    .description("Whether the volume is replicated")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(computed("volume_id", AttributeType::String, "Volume ID"))
            .attribute(computed("volume_status", AttributeType::String, "Volume state"))
            .attribute(computed("delete_on_termination", AttributeType::Bool, "Deleted with the instance"))
            .attribute(computed("wwn", AttributeType::String, "World wide name"))
            .attribute(computed("auxiliary", AttributeType::Bool, "Auxiliary replication volume"))
            .attribute(computed("consistency_group_name", AttributeType::String, "Consistency group"))
            .attribute(computed("group_id", AttributeType::String, "Volume group ID"))
            .attribute(computed("replication_type", AttributeType::String, "Replication type"))
            .attribute(computed("replication_status", AttributeType::String, "Replication status"))
            .attribute(computed("mirroring_state", AttributeType::String, "Mirroring state"))
            .attribute(computed("primary_role", AttributeType::String, "Primary role"))
            .attribute(computed("auxiliary_volume_name", AttributeType::String, "Auxiliary volume"))
            .attribute(computed("master_volume_name", AttributeType::String, "Master volume"));

        for attribute in affinity_attributes(true) {
            builder = builder.attribute(attribute);
        }

        builder.attribute(timeouts_attribute()).build()
    }

    async fn create_volume(
        &self,
        ctx: &Context,
        plan: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Result<(), Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let timeouts = DEFAULT_TIMEOUTS.resolve(plan)?;
        let ctx = ctx.with_timeout(timeouts.create);
        let cloud = required_string(plan, CLOUD_INSTANCE_ID)?;
        let api = data.client.cloud(&cloud);

        let mut body = CreateVolumeRequest {
            name: required_string(plan, VOLUME_NAME)?,
            size: required_number(plan, VOLUME_SIZE)?,
            shareable: plan.get_optional_bool(&attr(VOLUME_SHAREABLE)).unwrap_or(false),
            disk_type: plan.get_optional_string(&attr(VOLUME_TYPE)),
            volume_pool: plan.get_optional_string(&attr(VOLUME_POOL)),
            replication_enabled: plan.get_optional_bool(&attr(REPLICATION_ENABLED)),
            ..Default::default()
        };
        if let Some(affinity) = storage_affinity(plan) {
            body.affinity_policy = affinity.affinity_policy;
            body.affinity_volume = affinity.affinity_volume;
            body.affinity_pvm_instance = affinity.affinity_pvm_instance;
            body.anti_affinity_volumes = affinity.anti_affinity_volumes;
            body.anti_affinity_pvm_instances = affinity.anti_affinity_pvm_instances;
        }

        let volume = api
            .volumes()
            .create(&body)
            .await
            .map_err(|e| api_error("Failed to create volume", e))?;

        let id = ids::encode(&[&cloud, &volume.volume_id]).map_err(invalid_id)?;
        put(state, "id", id.as_str());
        put(state, "volume_id", volume.volume_id.as_str());
        tracing::info!("Created volume {}", id);

        let volume = wait_for_available(&ctx, data, &cloud, &volume.volume_id, timeouts.create)
            .await
            .map_err(|e| wait_error("Failed waiting for volume to become available", e))?;

        if let Some(volume) = volume {
            apply_volume(state, &cloud, &volume);
        }
        Ok(())
    }

    async fn read_volume(&self, current: &DynamicValue) -> Result<Option<DynamicValue>, Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let id = state_id(current)?;
        let (cloud, volume_id) = ids::decode_pair(&id).map_err(invalid_id)?;

        match data.client.cloud(&cloud).volumes().get(&volume_id).await {
            Ok(volume) => {
                let mut state = current.clone();
                apply_volume(&mut state, &cloud, &volume);
                Ok(Some(state))
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!("Volume {} no longer exists, removing from state", id);
                Ok(None)
            }
            Err(e) => Err(api_error("Failed to read volume", e)),
        }
    }

    async fn update_volume(
        &self,
        ctx: &Context,
        prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> Result<DynamicValue, Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let timeouts = DEFAULT_TIMEOUTS.resolve(planned)?;
        let ctx = ctx.with_timeout(timeouts.update);
        let id = state_id(prior)?;
        let (cloud, volume_id) = ids::decode_pair(&id).map_err(invalid_id)?;
        let api = data.client.cloud(&cloud);

        if [VOLUME_NAME, VOLUME_SIZE, VOLUME_SHAREABLE]
            .iter()
            .any(|name| prior.differs_at(planned, &attr(name)))
        {
            let body = UpdateVolumeRequest {
                name: required_string(planned, VOLUME_NAME)?,
                size: required_number(planned, VOLUME_SIZE)?,
                shareable: planned.get_optional_bool(&attr(VOLUME_SHAREABLE)).unwrap_or(false),
            };
            api.volumes()
                .update(&volume_id, &body)
                .await
                .map_err(|e| api_error("Failed to update volume", e))?;
            wait_for_available(&ctx, data, &cloud, &volume_id, timeouts.update)
                .await
                .map_err(|e| wait_error("Failed waiting for volume update", e))?;
        }

        if prior.differs_at(planned, &attr(REPLICATION_ENABLED)) {
            if let Some(enabled) = planned.get_optional_bool(&attr(REPLICATION_ENABLED)) {
                let action = VolumeAction {
                    replication_enabled: Some(enabled),
                };
                api.volumes()
                    .action(&volume_id, &action)
                    .await
                    .map_err(|e| api_error("Failed to change volume replication", e))?;
                wait_for_available(&ctx, data, &cloud, &volume_id, timeouts.update)
                    .await
                    .map_err(|e| wait_error("Failed waiting for volume update", e))?;
            }
        }

        let volume = api
            .volumes()
            .get(&volume_id)
            .await
            .map_err(|e| api_error("Failed to read volume", e))?;
        let mut state = planned.clone();
        put(&mut state, "id", id.as_str());
        apply_volume(&mut state, &cloud, &volume);
        Ok(state)
    }

    async fn delete_volume(&self, ctx: &Context, prior: &DynamicValue) -> Result<(), Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let timeouts = DEFAULT_TIMEOUTS.resolve(prior)?;
        let ctx = ctx.with_timeout(timeouts.delete);
        let id = state_id(prior)?;
        let (cloud, volume_id) = ids::decode_pair(&id).map_err(invalid_id)?;

        match data.client.cloud(&cloud).volumes().delete(&volume_id).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                tracing::debug!("Volume {} already deleted", id);
                return Ok(());
            }
            Err(e) => return Err(api_error("Failed to delete volume", e)),
        }

        wait_for_deleted(&ctx, data, &cloud, &volume_id, timeouts.delete)
            .await
            .map_err(|e| wait_error("Failed waiting for volume deletion", e))
    }
}

/// `in-use` counts as available and `error` ends the wait. Anything else
/// (`creating`, `resizing`, ...) is still settling.
pub(crate) fn available_state(volume: Volume) -> Observation<Volume> {
    match volume.state() {
        STATE_AVAILABLE | STATE_IN_USE => Observation::new(volume, STATE_AVAILABLE),
        STATE_ERROR => {
            let fault = format!("volume {} is in error state", volume.volume_id);
            Observation::new(volume, STATE_ERROR).with_fault(fault)
        }
        _ => Observation::new(volume, STATE_CREATING),
    }
}

async fn wait_for_available(
    ctx: &Context,
    data: &PpcProviderData,
    cloud: &str,
    volume_id: &str,
    timeout: Duration,
) -> Result<Option<Volume>, WaitError> {
    let waiter = Waiter::new(&[STATE_CREATING], &[STATE_AVAILABLE])?
        .delay(Duration::from_secs(10))
        .poll_interval(Duration::from_secs(120))
        .timeout(timeout);
    let api = data.client.cloud(cloud);
    let api = &api;

    data.tune(waiter)
        .wait(ctx, move || async move {
            let volume = api.volumes().get(volume_id).await?;
            Ok::<_, ApiError>(available_state(volume))
        })
        .await
}

async fn wait_for_deleted(
    ctx: &Context,
    data: &PpcProviderData,
    cloud: &str,
    volume_id: &str,
    timeout: Duration,
) -> Result<(), WaitError> {
    let waiter = Waiter::new(&[STATE_DELETING], &[NOT_FOUND])?
        .delay(Duration::from_secs(10))
        .poll_interval(Duration::from_secs(120))
        .timeout(timeout);
    let api = data.client.cloud(cloud);
    let api = &api;

    data.tune(waiter)
        .wait(ctx, move || async move {
            match api.volumes().get(volume_id).await {
                Ok(volume) => Ok(Observation::new(volume, STATE_DELETING)),
                Err(e) if e.is_not_found() => Ok(Observation::gone()),
                Err(e) => Err(e),
            }
        })
        .await
        .map(|_| ())
}

fn apply_volume(state: &mut DynamicValue, cloud: &str, volume: &Volume) {
    put(state, CLOUD_INSTANCE_ID, cloud);
    put(state, "volume_id", volume.volume_id.as_str());
    put(state, VOLUME_NAME, volume.name.clone());
    put(state, VOLUME_SIZE, volume.size);
    put(state, VOLUME_SHAREABLE, volume.shareable);
    put(state, VOLUME_TYPE, volume.disk_type.clone());
    put(state, VOLUME_POOL, volume.volume_pool.clone());
    put(state, REPLICATION_ENABLED, volume.replication_enabled);
    put(state, "volume_status", volume.state.clone());
    put(state, "delete_on_termination", volume.delete_on_termination);
    put(state, "wwn", volume.wwn.clone());
    put(state, "auxiliary", volume.auxiliary);
    put(state, "consistency_group_name", volume.consistency_group_name.clone());
    put(state, "group_id", volume.group_id.clone());
    put(state, "replication_type", volume.replication_type.clone());
    put(state, "replication_status", volume.replication_status.clone());
    put(state, "mirroring_state", volume.mirroring_state.clone());
    put(state, "primary_role", volume.primary_role.clone());
    put(state, "auxiliary_volume_name", volume.aux_volume_name.clone());
    put(state, "master_volume_name", volume.master_volume_name.clone());
}

#[async_trait]
impl Resource for VolumeResource {
    fn type_name(&self) -> &str {
        "ppc_volume"
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
            .create_volume(&ctx, &request.planned_state, &mut new_state)
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

        let new_state = match self.read_volume(&request.current_state).await {
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
            .update_volume(&ctx, &request.prior_state, &request.planned_state)
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

        if let Err(diag) = self.delete_volume(&ctx, &request.prior_state).await {
            diagnostics.push(diag);
        }

        DeleteResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithConfigure for VolumeResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        configure_response(&mut self.provider_data, request.provider_data)
    }
}

#[async_trait]
impl ResourceWithImportState for VolumeResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let id = request.id.as_str();
        let result = match ids::decode_pair(id) {
            Ok(_) => self
                .read_volume(&import_seed(id))
                .await
                .and_then(|state| state.ok_or_else(|| missing_on_import("volume", id))),
            Err(e) => Err(invalid_import_id(e, "<cloud_instance_id>/<volume_id>")),
        };
        import_response(&request.type_name, result)
    }
}

#[cfg(test)]
#[path = "./resource_volume_test.rs"]
mod resource_volume_test;
