//! Capture of an instance into the image catalog, a storage bucket or both

use super::job::wait_for_job;
use super::{
    api_error, attr, configure_response, import_response, import_seed, invalid_id,
    invalid_import_id, missing_on_import, not_configured, put, required_string, state_id,
    timeouts_attribute, validate_config, wait_error, Timeouts, CLOUD_INSTANCE_ID,
};
use crate::api::instances::CaptureRequest;
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
use tfplug::types::{Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::StringOneOf;

const INSTANCE_NAME: &str = "ppc_instance_name";
const CAPTURE_NAME: &str = "ppc_capture_name";
const DESTINATION: &str = "ppc_capture_destination";
const VOLUME_IDS: &str = "ppc_capture_volume_ids";
const STORAGE_REGION: &str = "ppc_capture_storage_region";
const STORAGE_ACCESS_KEY: &str = "ppc_capture_storage_access_key";
const STORAGE_SECRET_KEY: &str = "ppc_capture_storage_secret_key";
const STORAGE_IMAGE_PATH: &str = "ppc_capture_storage_image_path";

const IMAGE_CATALOG: &str = "image-catalog";
const CLOUD_STORAGE: &str = "cloud-storage";

/// Checked in this order when the capture leaves the image catalog
const STORAGE_FIELDS: [&str; 4] = [
    STORAGE_REGION,
    STORAGE_ACCESS_KEY,
    STORAGE_IMAGE_PATH,
    STORAGE_SECRET_KEY,
];

const DEFAULT_TIMEOUTS: Timeouts = Timeouts::minutes(75, 75, 50);

#[derive(Default)]
pub struct CaptureResource {
    provider_data: Option<PpcProviderData>,
}

impl CaptureResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_static() -> Schema {
        let storage_field = |name: &str, description: &str| {
            AttributeBuilder::new(name, AttributeType::String)
                .description(description)
                .optional()
                .force_new()
        };

        SchemaBuilder::new()
            .version(0)
            .description("Captures an instance as a deployable image")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("Composite identifier <cloud_instance_id>/<capture_name>/<destination>")
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
                AttributeBuilder::new(INSTANCE_NAME, AttributeType::String)
                    .description("Name of the instance to capture")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(CAPTURE_NAME, AttributeType::String)
                    .description("Name of the capture, unique in the cloud instance")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(DESTINATION, AttributeType::String)
                    .description("Destination of the deployable image")
                    .required()
                    .force_new()
                    .validator(StringOneOf::create(&[IMAGE_CATALOG, CLOUD_STORAGE, "both"]))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(VOLUME_IDS, AttributeType::string_set())
                    .description("Data volumes to include in the capture")
                    .optional()
                    .force_new()
                    .build(),
            )
            .attribute(storage_field(STORAGE_REGION, "Cloud Object Storage region").build())
            .attribute(
                storage_field(STORAGE_ACCESS_KEY, "Cloud Object Storage access key")
                    .sensitive()
                    .build(),
            )
            .attribute(
                storage_field(STORAGE_SECRET_KEY, "Cloud Object Storage secret key")
                    .sensitive()
                    .build(),
            )
            .attribute(
                storage_field(STORAGE_IMAGE_PATH, "Bucket and folder, bucket-name[/folder/../..]")
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("image_id", AttributeType::String)
                    .description("Image created in the catalog")
                    .computed()
                    .build(),
            )
            .attribute(timeouts_attribute())
            .build()
    }

    async fn create_capture(
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
        let body = capture_request(plan)?;

        let job = data
            .client
            .cloud(&cloud)
            .instances()
            .capture(&instance, &body)
            .await
            .map_err(|e| api_error("Failed to capture instance", e))?;

        let id = ids::encode(&[&cloud, &body.capture_name, &body.capture_destination])
            .map_err(invalid_id)?;
        put(state, "id", id.as_str());
        tracing::info!("Capturing {} as {} in job {}", instance, id, job.id);

        wait_for_job(&ctx, data, &cloud, &job.id, timeouts.create)
            .await
            .map_err(|e| wait_error("Failed waiting for capture", e))?;

        if let Some(captured) = self.read_capture(state).await? {
            *state = captured;
        }
        Ok(())
    }

    async fn read_capture(&self, current: &DynamicValue) -> Result<Option<DynamicValue>, Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let id = state_id(current)?;
        let (cloud, capture_name, destination) = ids::decode_triple(&id).map_err(invalid_id)?;

        let mut state = current.clone();
        put(&mut state, CLOUD_INSTANCE_ID, cloud.as_str());
        put(&mut state, CAPTURE_NAME, capture_name.as_str());
        put(&mut state, DESTINATION, destination.as_str());

        if destination == CLOUD_STORAGE {
            return Ok(Some(state));
        }

        match data.client.cloud(&cloud).images().get(&capture_name).await {
            Ok(image) => {
                put(&mut state, "image_id", image.image_id.as_str());
                Ok(Some(state))
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!("Captured image {} no longer exists, removing from state", id);
                Ok(None)
            }
            Err(e) => Err(api_error("Failed to read captured image", e)),
        }
    }

    async fn delete_capture(&self, prior: &DynamicValue) -> Result<(), Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let id = state_id(prior)?;
        let (cloud, capture_name, destination) = ids::decode_triple(&id).map_err(invalid_id)?;

        if destination == CLOUD_STORAGE {
            tracing::debug!("Capture {} only lives in cloud storage, nothing to delete", id);
            return Ok(());
        }

        match data.client.cloud(&cloud).images().delete(&capture_name).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                tracing::debug!("Captured image {} already deleted", id);
                Ok(())
            }
            Err(e) => Err(api_error("Failed to delete captured image", e)),
        }
    }
}

fn storage_field_missing(name: &str, destination: &str) -> Diagnostic {
    Diagnostic::error(
        "Missing capture storage setting",
        format!("{} is required when capture destination is {}", name, destination),
    )
    .with_attribute(attr(name))
}

/// Storage settings a non-catalog destination needs. Unknown values are
/// left for apply time.
fn check_storage_fields(config: &DynamicValue) -> Option<Diagnostic> {
    let destination = config.get_optional_string(&attr(DESTINATION))?;
    if destination == IMAGE_CATALOG {
        return None;
    }

    STORAGE_FIELDS
        .iter()
        .find(|name| matches!(config.get(&attr(name)), Err(_) | Ok(Dynamic::Null)))
        .map(|name| storage_field_missing(name, &destination))
}

pub(crate) fn capture_request(plan: &DynamicValue) -> Result<CaptureRequest, Diagnostic> {
    let destination = required_string(plan, DESTINATION)?;

    let mut body = CaptureRequest {
        capture_name: required_string(plan, CAPTURE_NAME)?,
        capture_destination: destination.clone(),
        capture_volume_ids: plan.get_string_list(&attr(VOLUME_IDS)).unwrap_or_default(),
        ..Default::default()
    };

    if destination != IMAGE_CATALOG {
        let storage = |name: &str| {
            plan.get_optional_string(&attr(name))
                .ok_or_else(|| storage_field_missing(name, &destination))
        };
        body.cloud_storage_region = Some(storage(STORAGE_REGION)?);
        body.cloud_storage_access_key = Some(storage(STORAGE_ACCESS_KEY)?);
        body.cloud_storage_image_path = Some(storage(STORAGE_IMAGE_PATH)?);
        body.cloud_storage_secret_key = Some(storage(STORAGE_SECRET_KEY)?);
    }

    Ok(body)
}

#[async_trait]
impl Resource for CaptureResource {
    fn type_name(&self) -> &str {
        "ppc_capture"
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
        let mut diagnostics =
            validate_config(&Self::schema_static(), &request.config, DEFAULT_TIMEOUTS);
        diagnostics.extend(check_storage_fields(&request.config));
        ValidateResourceConfigResponse { diagnostics }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let mut diagnostics = vec![];
        let mut new_state = request.planned_state.clone();

        if let Err(diag) = self
            .create_capture(&ctx, &request.planned_state, &mut new_state)
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

        let new_state = match self.read_capture(&request.current_state).await {
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

    // Every argument forces replacement
    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        UpdateResourceResponse {
            new_state: request.planned_state,
            private: vec![],
            diagnostics: vec![],
            new_identity: None,
        }
    }

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let mut diagnostics = vec![];

        if let Err(diag) = self.delete_capture(&request.prior_state).await {
            diagnostics.push(diag);
        }

        DeleteResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithConfigure for CaptureResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        configure_response(&mut self.provider_data, request.provider_data)
    }
}

#[async_trait]
impl ResourceWithImportState for CaptureResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let id = request.id.as_str();
        let result = match ids::decode_triple(id) {
            Ok(_) => self
                .read_capture(&import_seed(id))
                .await
                .and_then(|state| state.ok_or_else(|| missing_on_import("capture", id))),
            Err(e) => Err(invalid_import_id(
                e,
                "<cloud_instance_id>/<capture_name>/<destination>",
            )),
        };
        import_response(&request.type_name, result)
    }
}

#[cfg(test)]
#[path = "./resource_capture_test.rs"]
mod resource_capture_test;
