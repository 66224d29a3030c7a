//! Point-in-time snapshot of an instance and, optionally, a subset of its volumes

use super::{
    api_error, attr, configure_response, import_response, import_seed, invalid_id,
    invalid_import_id, missing_on_import, not_configured, put, required_string, state_id,
    timeouts_attribute, validate_config, wait_error, Timeouts, CLOUD_INSTANCE_ID,
};
use crate::api::instances::CreateSnapshotRequest;
use crate::api::snapshots::{Snapshot, UpdateSnapshotRequest};
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
use tfplug::types::{Diagnostic, Dynamic, DynamicValue};

const SNAPSHOT_NAME: &str = "ppc_snapshot_name";
const INSTANCE_NAME: &str = "ppc_instance_name";
const VOLUME_IDS: &str = "ppc_volume_ids";
const DESCRIPTION: &str = "ppc_description";
const LEGACY_DESCRIPTION: &str = "description";

const STATE_AVAILABLE: &str = "available";
const STATE_IN_PROGRESS: &str = "in_progress";
const STATE_BUILD: &str = "BUILD";
const STATE_ERROR: &str = "ERROR";
const STATE_DELETING: &str = "deleting";

const DEFAULT_TIMEOUTS: Timeouts = Timeouts::minutes(60, 60, 10);

#[derive(Default)]
pub struct SnapshotResource {
    provider_data: Option<PpcProviderData>,
}

impl SnapshotResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_static() -> Schema {
        let computed = |name: &str, ty: AttributeType| {
            AttributeBuilder::new(name, ty).computed().build()
        };

        SchemaBuilder::new()
            .version(0)
            .description("Manages an instance snapshot")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("Composite identifier <cloud_instance_id>/<snapshot_id>")
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
                AttributeBuilder::new(SNAPSHOT_NAME, AttributeType::String)
                    .description("Unique name of the snapshot")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(INSTANCE_NAME, AttributeType::String)
                    .description("Name or ID of the instance")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(VOLUME_IDS, AttributeType::string_set())
                    .description("Volumes to snapshot, the whole instance when empty")
                    .optional()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(DESCRIPTION, AttributeType::String)
                    .description("Description of the snapshot")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(LEGACY_DESCRIPTION, AttributeType::String)
                    .optional()
                    .description("Deprecated, use ppc_description instead")
                    .deprecated()
                    .build(),
            )
            .attribute(computed("snapshot_id", AttributeType::String))
            .attribute(computed("status", AttributeType::String))
            .attribute(computed("creation_date", AttributeType::String))
            .attribute(computed("last_update_date", AttributeType::String))
            .attribute(computed("volume_snapshots", AttributeType::string_map()))
            .attribute(timeouts_attribute())
            .build()
    }

    async fn create_snapshot(
        &self,
        ctx: &Context,
        plan: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Result<(), Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let timeouts = DEFAULT_TIMEOUTS.resolve(plan)?;
        let ctx = ctx.with_timeout(timeouts.create);
        let cloud = required_string(plan, CLOUD_INSTANCE_ID)?;
        let instance = required_string(plan, INSTANCE_NAME)?;

        let body = CreateSnapshotRequest {
            name: required_string(plan, SNAPSHOT_NAME)?,
            description: description(plan),
            volume_ids: plan.get_string_list(&attr(VOLUME_IDS)).unwrap_or_default(),
        };
        if body.volume_ids.is_empty() {
            tracing::debug!("No volume ids given, snapshotting all of {}", instance);
        }

        let created = data
            .client
            .cloud(&cloud)
            .instances()
            .create_snapshot(&instance, &body)
            .await
            .map_err(|e| api_error("Failed to create snapshot", e))?;

        let id = ids::encode(&[&cloud, &created.snapshot_id]).map_err(invalid_id)?;
        put(state, "id", id.as_str());
        put(state, "snapshot_id", created.snapshot_id.as_str());
        tracing::info!("Created snapshot {}", id);

        let snapshot = wait_for_available(&ctx, data, &cloud, &created.snapshot_id, timeouts.create)
            .await
            .map_err(|e| wait_error("Failed waiting for snapshot to become available", e))?;

        if let Some(snapshot) = snapshot {
            apply_snapshot(state, &cloud, &snapshot);
        }
        Ok(())
    }

    async fn read_snapshot(&self, current: &DynamicValue) -> Result<Option<DynamicValue>, Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let id = state_id(current)?;
        let (cloud, snapshot_id) = ids::decode_pair(&id).map_err(invalid_id)?;

        match data.client.cloud(&cloud).snapshots().get(&snapshot_id).await {
            Ok(snapshot) => {
                let mut state = current.clone();
                apply_snapshot(&mut state, &cloud, &snapshot);
                Ok(Some(state))
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!("Snapshot {} no longer exists, removing from state", id);
                Ok(None)
            }
            Err(e) => Err(api_error("Failed to read snapshot", e)),
        }
    }

    async fn update_snapshot(
        &self,
        ctx: &Context,
        prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> Result<DynamicValue, Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let timeouts = DEFAULT_TIMEOUTS.resolve(planned)?;
        let ctx = ctx.with_timeout(timeouts.update);
        let id = state_id(prior)?;
        let (cloud, snapshot_id) = ids::decode_pair(&id).map_err(invalid_id)?;

        if [SNAPSHOT_NAME, DESCRIPTION, LEGACY_DESCRIPTION]
            .iter()
            .any(|name| prior.differs_at(planned, &attr(name)))
        {
            let body = UpdateSnapshotRequest {
                name: required_string(planned, SNAPSHOT_NAME)?,
                description: description(planned).unwrap_or_default(),
            };
            data.client
                .cloud(&cloud)
                .snapshots()
                .update(&snapshot_id, &body)
                .await
                .map_err(|e| api_error("Failed to update snapshot", e))?;
            wait_for_available(&ctx, data, &cloud, &snapshot_id, timeouts.update)
                .await
                .map_err(|e| wait_error("Failed waiting for snapshot update", e))?;
        }

        let mut state = planned.clone();
        put(&mut state, "id", id.as_str());
        match self.read_snapshot(&state).await? {
            Some(state) => Ok(state),
            None => Err(Diagnostic::error(
                "Snapshot not found",
                format!("Snapshot {} disappeared during update", id),
            )),
        }
    }

    async fn delete_snapshot(&self, ctx: &Context, prior: &DynamicValue) -> Result<(), Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let timeouts = DEFAULT_TIMEOUTS.resolve(prior)?;
        let ctx = ctx.with_timeout(timeouts.delete);
        let id = state_id(prior)?;
        let (cloud, snapshot_id) = ids::decode_pair(&id).map_err(invalid_id)?;
        let api = data.client.cloud(&cloud);

        match api.snapshots().get(&snapshot_id).await {
            Ok(snapshot) => {
                tracing::debug!("Deleting snapshot {} in state {}", id, snapshot.status());
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!("Snapshot {} already deleted", id);
                return Ok(());
            }
            Err(e) => return Err(api_error("Failed to read snapshot", e)),
        }

        match api.snapshots().delete(&snapshot_id).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(api_error("Failed to delete snapshot", e)),
        }

        wait_for_deleted(&ctx, data, &cloud, &snapshot_id, timeouts.delete)
            .await
            .map_err(|e| wait_error("Failed waiting for snapshot deletion", e))
    }
}

/// `ppc_description` wins over the deprecated `description`
fn description(value: &DynamicValue) -> Option<String> {
    value
        .get_optional_string(&attr(DESCRIPTION))
        .or_else(|| value.get_optional_string(&attr(LEGACY_DESCRIPTION)))
}

pub(crate) fn available_state(snapshot: Snapshot) -> Observation<Snapshot> {
    let status = snapshot.status().to_string();

    if status == STATE_AVAILABLE && snapshot.is_complete() {
        Observation::new(snapshot, STATE_AVAILABLE)
    } else if status.eq_ignore_ascii_case(STATE_ERROR) {
        let fault = format!("snapshot {} failed", snapshot.snapshot_id);
        Observation::new(snapshot, STATE_ERROR).with_fault(fault)
    } else {
        Observation::new(snapshot, STATE_IN_PROGRESS)
    }
}

async fn wait_for_available(
    ctx: &Context,
    data: &PpcProviderData,
    cloud: &str,
    snapshot_id: &str,
    timeout: Duration,
) -> Result<Option<Snapshot>, WaitError> {
    let waiter = Waiter::new(&[STATE_IN_PROGRESS, STATE_BUILD], &[STATE_AVAILABLE])?
        .delay(Duration::from_secs(30))
        .poll_interval(Duration::from_secs(120))
        .timeout(timeout);
    let api = data.client.cloud(cloud);
    let api = &api;

    data.tune(waiter)
        .wait(ctx, move || async move {
            let snapshot = api.snapshots().get(snapshot_id).await?;
            Ok::<_, ApiError>(available_state(snapshot))
        })
        .await
}

async fn wait_for_deleted(
    ctx: &Context,
    data: &PpcProviderData,
    cloud: &str,
    snapshot_id: &str,
    timeout: Duration,
) -> Result<(), WaitError> {
    let waiter = Waiter::new(&[STATE_DELETING], &[NOT_FOUND])?
        .delay(Duration::from_secs(10))
        .poll_interval(Duration::from_secs(10))
        .timeout(timeout);
    let api = data.client.cloud(cloud);
    let api = &api;

    data.tune(waiter)
        .wait(ctx, move || async move {
            match api.snapshots().get(snapshot_id).await {
                Ok(snapshot) => Ok(Observation::new(snapshot, STATE_DELETING)),
                Err(e) if e.is_not_found() => Ok(Observation::gone()),
                Err(e) => Err(e),
            }
        })
        .await
        .map(|_| ())
}

fn apply_snapshot(state: &mut DynamicValue, cloud: &str, snapshot: &Snapshot) {
    put(state, CLOUD_INSTANCE_ID, cloud);
    put(state, SNAPSHOT_NAME, snapshot.name.clone());
    put(state, "snapshot_id", snapshot.snapshot_id.as_str());
    put(state, "status", snapshot.status.clone());
    put(
        state,
        "creation_date",
        snapshot.creation_date.map(|d| d.to_rfc3339()),
    );
    put(
        state,
        "last_update_date",
        snapshot.last_update_date.map(|d| d.to_rfc3339()),
    );
    put(
        state,
        "volume_snapshots",
        Dynamic::string_map(snapshot.volume_snapshots.clone()),
    );
}

#[async_trait]
impl Resource for SnapshotResource {
    fn type_name(&self) -> &str {
        "ppc_snapshot"
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
            .create_snapshot(&ctx, &request.planned_state, &mut new_state)
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

        let new_state = match self.read_snapshot(&request.current_state).await {
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
            .update_snapshot(&ctx, &request.prior_state, &request.planned_state)
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

        if let Err(diag) = self.delete_snapshot(&ctx, &request.prior_state).await {
            diagnostics.push(diag);
        }

        DeleteResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithConfigure for SnapshotResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        configure_response(&mut self.provider_data, request.provider_data)
    }
}

#[async_trait]
impl ResourceWithImportState for SnapshotResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let id = request.id.as_str();
        let result = match ids::decode_pair(id) {
            Ok(_) => self
                .read_snapshot(&import_seed(id))
                .await
                .and_then(|state| state.ok_or_else(|| missing_on_import("snapshot", id))),
            Err(e) => Err(invalid_import_id(e, "<cloud_instance_id>/<snapshot_id>")),
        };
        import_response(&request.type_name, result)
    }
}

#[cfg(test)]
#[path = "./resource_snapshot_test.rs"]
mod resource_snapshot_test;
