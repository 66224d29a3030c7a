//! Attachment of a volume to an instance

use super::{
    api_error, attr, configure_response, import_response, import_seed, invalid_id,
    invalid_import_id, missing_on_import, not_configured, put, required_string, state_id,
    timeouts_attribute, validate_config, wait_error, Timeouts, CLOUD_INSTANCE_ID,
};
use crate::api::volumes::Volume;
use crate::api::ApiError;
use crate::ids;
use crate::provider_data::PpcProviderData;
use crate::waiter::{Observation, WaitError, Waiter};
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

const INSTANCE_ID: &str = "ppc_instance_id";
const VOLUME_ID: &str = "ppc_volume_id";

const STATE_AVAILABLE: &str = "available";
const STATE_IN_USE: &str = "in-use";
const STATE_ATTACHING: &str = "attaching";
const STATE_DETACHING: &str = "detaching";
const STATE_DETACHED: &str = "detached";

const DEFAULT_TIMEOUTS: Timeouts = Timeouts::minutes(15, 15, 15);

#[derive(Default)]
pub struct VolumeAttachResource {
    provider_data: Option<PpcProviderData>,
}

impl VolumeAttachResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_static() -> Schema {
        let required = |name: &str, description: &str| {
            AttributeBuilder::new(name, AttributeType::String)
                .description(description)
                .required()
                .force_new()
                .build()
        };

        SchemaBuilder::new()
            .version(0)
            .description("Attaches a volume to an instance")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("Composite identifier <cloud_instance_id>/<instance_id>/<volume_id>")
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(required(CLOUD_INSTANCE_ID, "The cloud instance of the instance and volume"))
            .attribute(required(INSTANCE_ID, "Instance to attach to"))
            .attribute(required(VOLUME_ID, "Volume to attach"))
            .attribute(
                AttributeBuilder::new("status", AttributeType::String)
                    .description("State of the attached volume")
                    .computed()
                    .build(),
            )
            .attribute(timeouts_attribute())
            .build()
    }

    async fn attach(
        &self,
        ctx: &Context,
        plan: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Result<(), Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let timeouts = DEFAULT_TIMEOUTS.resolve(plan)?;
        let ctx = ctx.with_timeout(timeouts.create);
        let cloud = required_string(plan, CLOUD_INSTANCE_ID)?;
        let instance_id = required_string(plan, INSTANCE_ID)?;
        let volume_id = required_string(plan, VOLUME_ID)?;
        let api = data.client.cloud(&cloud);

        let volume = api
            .volumes()
            .get(&volume_id)
            .await
            .map_err(|e| api_error("Failed to read volume", e))?;
        check_attachable(&volume)?;

        api.instances()
            .attach_volume(&instance_id, &volume_id)
            .await
            .map_err(|e| api_error("Failed to attach volume", e))?;

        let id = ids::encode(&[&cloud, &instance_id, &volume_id]).map_err(invalid_id)?;
        put(state, "id", id.as_str());
        tracing::info!("Attached volume {} to instance {}", volume_id, instance_id);

        let volume = wait_for_attached(&ctx, data, &cloud, &instance_id, &volume_id, timeouts.create)
            .await
            .map_err(|e| wait_error("Failed waiting for volume attachment", e))?;

        if let Some(volume) = volume {
            put(state, "status", volume.state.clone());
        }
        Ok(())
    }

    async fn read_attachment(
        &self,
        current: &DynamicValue,
    ) -> Result<Option<DynamicValue>, Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let id = state_id(current)?;
        let (cloud, instance_id, volume_id) = ids::decode_triple(&id).map_err(invalid_id)?;
        let api = data.client.cloud(&cloud);

        match api.instances().get_volume(&instance_id, &volume_id).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                tracing::warn!("Volume attachment {} no longer exists", id);
                return Ok(None);
            }
            Err(e) => return Err(api_error("Failed to read volume attachment", e)),
        }

        let volume = match api.volumes().get(&volume_id).await {
            Ok(volume) => volume,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(api_error("Failed to read volume", e)),
        };

        let mut state = current.clone();
        put(&mut state, CLOUD_INSTANCE_ID, cloud.as_str());
        put(&mut state, INSTANCE_ID, instance_id.as_str());
        put(&mut state, VOLUME_ID, volume_id.as_str());
        put(&mut state, "status", volume.state.clone());
        Ok(Some(state))
    }

    async fn detach(&self, ctx: &Context, prior: &DynamicValue) -> Result<(), Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let timeouts = DEFAULT_TIMEOUTS.resolve(prior)?;
        let ctx = ctx.with_timeout(timeouts.delete);
        let id = state_id(prior)?;
        let (cloud, instance_id, volume_id) = ids::decode_triple(&id).map_err(invalid_id)?;
        let api = data.client.cloud(&cloud);

        match api.instances().detach_volume(&instance_id, &volume_id).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                tracing::debug!("Volume {} already detached", volume_id);
                return Ok(());
            }
            Err(e) => return Err(api_error("Failed to detach volume", e)),
        }

        wait_for_detached(&ctx, data, &cloud, &instance_id, &volume_id, timeouts.delete)
            .await
            .map_err(|e| wait_error("Failed waiting for volume detachment", e))
    }

    async fn import_attachment(&self, id: &str) -> Result<DynamicValue, Diagnostic> {
        ids::decode_triple(id).map_err(|e| {
            invalid_import_id(e, "<cloud_instance_id>/<instance_id>/<volume_id>")
        })?;
        self.read_attachment(&import_seed(id))
            .await?
            .ok_or_else(|| missing_on_import("volume attachment", id))
    }
}

/// A volume in use can only take another attachment when it is shareable
pub(crate) fn check_attachable(volume: &Volume) -> Result<(), Diagnostic> {
    if volume.state() == STATE_IN_USE && !volume.is_shareable() {
        return Err(Diagnostic::error(
            "Failed to attach volume",
            "the volume cannot be attached in the current state. The volume must be in the *available* state. No other states are permissible",
        )
        .with_attribute(attr(VOLUME_ID)));
    }
    Ok(())
}

/// In use by `instance_id`, attaching until then
pub(crate) fn attached_state(volume: Volume, instance_id: &str) -> Observation<Volume> {
    if volume.state() == STATE_IN_USE && volume.attached_to(instance_id) {
        return Observation::new(volume, STATE_IN_USE);
    }
    Observation::new(volume, STATE_ATTACHING)
}

/// Detached once the instance is gone from the volume and the volume is
/// free again, or shareable
pub(crate) fn detached_state(volume: Volume, instance_id: &str) -> Observation<Volume> {
    let free = volume.is_shareable() || volume.state() == STATE_AVAILABLE;
    if !volume.attached_to(instance_id) && free {
        return Observation::new(volume, STATE_DETACHED);
    }
    Observation::new(volume, STATE_DETACHING)
}

async fn wait_for_attached(
    ctx: &Context,
    data: &PpcProviderData,
    cloud: &str,
    instance_id: &str,
    volume_id: &str,
    timeout: Duration,
) -> Result<Option<Volume>, WaitError> {
    let waiter = Waiter::new(&[STATE_ATTACHING], &[STATE_IN_USE])?
        .delay(Duration::from_secs(10))
        .poll_interval(Duration::from_secs(30))
        .timeout(timeout);
    let api = data.client.cloud(cloud);
    let api = &api;

    data.tune(waiter)
        .wait(ctx, move || async move {
            let volume = api.volumes().get(volume_id).await?;
            Ok::<_, ApiError>(attached_state(volume, instance_id))
        })
        .await
}

async fn wait_for_detached(
    ctx: &Context,
    data: &PpcProviderData,
    cloud: &str,
    instance_id: &str,
    volume_id: &str,
    timeout: Duration,
) -> Result<(), WaitError> {
    let waiter = Waiter::new(&[STATE_DETACHING], &[STATE_DETACHED])?
        .delay(Duration::from_secs(10))
        .poll_interval(Duration::from_secs(30))
        .timeout(timeout);
    let api = data.client.cloud(cloud);
    let api = &api;

    data.tune(waiter)
        .wait(ctx, move || async move {
            match api.volumes().get(volume_id).await {
                Ok(volume) => Ok(detached_state(volume, instance_id)),
                // a volume deleted underneath the attachment counts as detached
                Err(e) if e.is_not_found() => Ok(Observation {
                    value: None,
                    state: STATE_DETACHED.to_string(),
                    fault: None,
                }),
                Err(e) => Err(e),
            }
        })
        .await
        .map(|_| ())
}

#[async_trait]
impl Resource for VolumeAttachResource {
    fn type_name(&self) -> &str {
        "ppc_volume_attach"
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

        if let Err(diag) = self.attach(&ctx, &request.planned_state, &mut new_state).await {
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

        let new_state = match self.read_attachment(&request.current_state).await {
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

    /// Every attribute forces replacement, so this only carries the plan
    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        UpdateResourceResponse {
            new_state: request.planned_state,
            private: vec![],
            diagnostics: vec![],
            new_identity: None,
        }
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let mut diagnostics = vec![];

        if let Err(diag) = self.detach(&ctx, &request.prior_state).await {
            diagnostics.push(diag);
        }

        DeleteResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithConfigure for VolumeAttachResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        configure_response(&mut self.provider_data, request.provider_data)
    }
}

#[async_trait]
impl ResourceWithImportState for VolumeAttachResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_response(&request.type_name, self.import_attachment(&request.id).await)
    }
}

#[cfg(test)]
#[path = "./resource_volume_attach_test.rs"]
mod resource_volume_attach_test;
