//! Image resource, either copied from the stock catalog or imported from a
//! Cloud Object Storage bucket

use super::job::wait_for_job;
use super::{
    affinity_attributes, api_error, attr, configure_response, import_response, import_seed,
    invalid_id, invalid_import_id, missing_on_import, not_configured, put, required_string,
    state_id, storage_affinity, timeouts_attribute, validate_config, wait_error, Timeouts,
    CLOUD_INSTANCE_ID,
};
use crate::api::images::{CopyImageRequest, CosImportRequest, Image};
use crate::api::ApiError;
use crate::ids;
use crate::provider_data::PpcProviderData;
use crate::waiter::{Observation, WaitError, Waiter};
use async_trait::async_trait;
use std::time::Duration;
use tfplug::context::Context;
use tfplug::defaults::StaticDefault;
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

const IMAGE_NAME: &str = "ppc_image_name";
const IMAGE_ID: &str = "ppc_image_id";
const BUCKET_NAME: &str = "ppc_image_bucket_name";
const BUCKET_ACCESS: &str = "ppc_image_bucket_access";
const ACCESS_KEY: &str = "ppc_image_access_key";
const SECRET_KEY: &str = "ppc_image_secret_key";
const BUCKET_REGION: &str = "ppc_image_bucket_region";
const BUCKET_FILE_NAME: &str = "ppc_image_bucket_file_name";
const STORAGE_TYPE: &str = "ppc_image_storage_type";
const STORAGE_POOL: &str = "ppc_image_storage_pool";

const COPY_SOURCE: &str = "root-project";

const IMAGE_ACTIVE: &str = "active";
const IMAGE_QUEUED: &str = "queued";
const IMAGE_IMPORTING: &str = "importing";
const IMAGE_FAILED: &str = "failed";

const DEFAULT_TIMEOUTS: Timeouts = Timeouts::minutes(60, 60, 60);

#[derive(Default)]
pub struct ImageResource {
    provider_data: Option<PpcProviderData>,
}

impl ImageResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_static() -> Schema {
        let bucket_field = |name: &str, description: &str| {
            AttributeBuilder::new(name, AttributeType::String)
                .description(description)
                .optional()
                .force_new()
                .conflicts_with(&[IMAGE_ID])
                .required_with(&[BUCKET_NAME])
                .build()
        };
        let key = |name: &str, other: &str| {
            AttributeBuilder::new(name, AttributeType::String)
                .description("Cloud Object Storage key, required for buckets with private access")
                .optional()
                .sensitive()
                .force_new()
                .required_with(&[other])
                .build()
        };

        let mut builder = SchemaBuilder::new()
            .version(0)
            .description("Manages an image in a cloud instance")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("Composite identifier <cloud_instance_id>/<image_id>")
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
                AttributeBuilder::new(IMAGE_NAME, AttributeType::String)
                    .description("Name of the image")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(IMAGE_ID, AttributeType::String)
                    .description("Stock image to copy")
                    .optional()
                    .force_new()
                    .conflicts_with(&[BUCKET_NAME])
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(BUCKET_NAME, AttributeType::String)
                    .description("Cloud Object Storage bucket, bucket-name[/optional/folder]")
                    .optional()
                    .force_new()
                    .conflicts_with(&[IMAGE_ID])
                    .required_with(&[BUCKET_REGION, BUCKET_FILE_NAME])
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(BUCKET_ACCESS, AttributeType::String)
                    .description("Whether the bucket has public or private access")
                    .optional()
                    .force_new()
                    .conflicts_with(&[IMAGE_ID])
                    .validator(StringOneOf::create(&["public", "private"]))
                    .default(StaticDefault::string("public"))
                    .build(),
            )
            .attribute(key(ACCESS_KEY, SECRET_KEY))
            .attribute(key(SECRET_KEY, ACCESS_KEY))
            .attribute(bucket_field(BUCKET_REGION, "Cloud Object Storage region"))
            .attribute(bucket_field(BUCKET_FILE_NAME, "Image file name in the bucket"))
            .attribute(
                AttributeBuilder::new(STORAGE_TYPE, AttributeType::String)
                    .description("Storage tier for the imported image")
                    .optional()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(STORAGE_POOL, AttributeType::String)
                    .description("Storage pool for the imported image, overrides the storage type and affinity")
                    .optional()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("image_id", AttributeType::String)
                    .description("Image ID")
                    .computed()
                    .build(),
            )
            .attribute(timeouts_attribute());

        for attribute in affinity_attributes(true) {
            builder = builder.attribute(attribute);
        }
        builder.build()
    }

    async fn create_image(
        &self,
        ctx: &Context,
        plan: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Result<(), Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let timeouts = DEFAULT_TIMEOUTS.resolve(plan)?;
        let ctx = ctx.with_timeout(timeouts.create);
        let cloud = required_string(plan, CLOUD_INSTANCE_ID)?;
        let name = required_string(plan, IMAGE_NAME)?;
        let api = data.client.cloud(&cloud);

        let image = if let Some(source_id) = plan.get_optional_string(&attr(IMAGE_ID)) {
            let body = CopyImageRequest {
                image_name: name,
                image_id: source_id,
                source: COPY_SOURCE.to_string(),
            };
            let image = api
                .images()
                .create(&body)
                .await
                .map_err(|e| api_error("Failed to copy image", e))?;
            persist_id(state, &cloud, &image)?;

            wait_for_active(&ctx, data, &cloud, &image.image_id, timeouts.create)
                .await
                .map_err(|e| wait_error("Failed waiting for image to become active", e))?
                .unwrap_or(image)
        } else {
            let body = cos_import_request(plan, name.clone())?;
            let job = api
                .images()
                .import_from_cos(&body)
                .await
                .map_err(|e| api_error("Failed to import image", e))?;
            tracing::info!("Started image import job {} for {}", job.id, name);

            wait_for_job(&ctx, data, &cloud, &job.id, timeouts.create)
                .await
                .map_err(|e| wait_error("Failed waiting for image import", e))?;

            let image = api
                .images()
                .get(&name)
                .await
                .map_err(|e| api_error("Failed to find imported image", e))?;
            persist_id(state, &cloud, &image)?;
            image
        };

        put(state, "image_id", image.image_id.as_str());
        Ok(())
    }

    async fn read_image(&self, current: &DynamicValue) -> Result<Option<DynamicValue>, Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let id = state_id(current)?;
        let (cloud, image_id) = ids::decode_pair(&id).map_err(invalid_id)?;

        match data.client.cloud(&cloud).images().get(&image_id).await {
            Ok(image) => {
                let mut state = current.clone();
                put(&mut state, CLOUD_INSTANCE_ID, cloud.as_str());
                put(&mut state, "image_id", image.image_id.as_str());
                if current.get_optional_string(&attr(IMAGE_NAME)).is_none() {
                    put(&mut state, IMAGE_NAME, image.name.clone());
                }
                Ok(Some(state))
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!("Image {} no longer exists, removing from state", id);
                Ok(None)
            }
            Err(e) => Err(api_error("Failed to read image", e)),
        }
    }

    async fn delete_image(&self, prior: &DynamicValue) -> Result<(), Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let id = state_id(prior)?;
        let (cloud, image_id) = ids::decode_pair(&id).map_err(invalid_id)?;

        match data.client.cloud(&cloud).images().delete(&image_id).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                tracing::debug!("Image {} already deleted", id);
                Ok(())
            }
            Err(e) => Err(api_error("Failed to delete image", e)),
        }
    }
}

fn persist_id(state: &mut DynamicValue, cloud: &str, image: &Image) -> Result<(), Diagnostic> {
    let id = ids::encode(&[cloud, &image.image_id]).map_err(invalid_id)?;
    put(state, "id", id.as_str());
    tracing::info!("Created image {}", id);
    Ok(())
}

/// Import body. A storage pool pins the placement, so the storage type and
/// affinity are only sent without one.
pub(crate) fn cos_import_request(plan: &DynamicValue, image_name: String) -> Result<CosImportRequest, Diagnostic> {
    let mut body = CosImportRequest {
        image_name,
        bucket_name: required_string(plan, BUCKET_NAME)?,
        bucket_access: plan
            .get_optional_string(&attr(BUCKET_ACCESS))
            .unwrap_or_else(|| "public".to_string()),
        image_filename: required_string(plan, BUCKET_FILE_NAME)?,
        region: required_string(plan, BUCKET_REGION)?,
        access_key: plan.get_optional_string(&attr(ACCESS_KEY)),
        secret_key: plan.get_optional_string(&attr(SECRET_KEY)),
        ..Default::default()
    };

    match plan.get_optional_string(&attr(STORAGE_POOL)) {
        Some(pool) => body.storage_pool = Some(pool),
        None => {
            body.storage_type = plan.get_optional_string(&attr(STORAGE_TYPE));
            body.storage_affinity = storage_affinity(plan);
        }
    }
    Ok(body)
}

/// Exactly one image source must be configured
fn check_source(config: &DynamicValue) -> Option<Diagnostic> {
    let configured = |name: &str| {
        !matches!(
            config.get(&attr(name)),
            Err(_) | Ok(Dynamic::Null)
        )
    };

    if configured(IMAGE_ID) || configured(BUCKET_NAME) {
        return None;
    }
    Some(
        Diagnostic::error(
            "Missing image source",
            format!("exactly one of {} or {} must be set", IMAGE_ID, BUCKET_NAME),
        )
        .with_attribute(attr(IMAGE_ID)),
    )
}

async fn wait_for_active(
    ctx: &Context,
    data: &PpcProviderData,
    cloud: &str,
    image_id: &str,
    timeout: Duration,
) -> Result<Option<Image>, WaitError> {
    let waiter = Waiter::new(&[IMAGE_QUEUED, IMAGE_IMPORTING], &[IMAGE_ACTIVE])?
        .delay(Duration::from_secs(20))
        .poll_interval(Duration::from_secs(10))
        .timeout(timeout);
    let api = data.client.cloud(cloud);
    let api = &api;

    data.tune(waiter)
        .wait(ctx, move || async move {
            let image = api.images().get(image_id).await?;
            Ok::<_, ApiError>(image_state(image))
        })
        .await
}

/// Anything short of active (no state yet, `saving`, ...) counts as queued,
/// except `importing` and a failed import
pub(crate) fn image_state(image: Image) -> Observation<Image> {
    match image.state() {
        IMAGE_ACTIVE => Observation::new(image, IMAGE_ACTIVE),
        IMAGE_IMPORTING => Observation::new(image, IMAGE_IMPORTING),
        IMAGE_FAILED => {
            let fault = format!("image {} failed", image.image_id);
            Observation::new(image, IMAGE_FAILED).with_fault(fault)
        }
        _ => Observation::new(image, IMAGE_QUEUED),
    }
}

#[async_trait]
impl Resource for ImageResource {
    fn type_name(&self) -> &str {
        "ppc_image"
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
        diagnostics.extend(check_source(&request.config));
        ValidateResourceConfigResponse { diagnostics }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let mut diagnostics = vec![];
        let mut new_state = request.planned_state.clone();

        if let Err(diag) = self
            .create_image(&ctx, &request.planned_state, &mut new_state)
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

        let new_state = match self.read_image(&request.current_state).await {
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

        if let Err(diag) = self.delete_image(&request.prior_state).await {
            diagnostics.push(diag);
        }

        DeleteResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithConfigure for ImageResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        configure_response(&mut self.provider_data, request.provider_data)
    }
}

#[async_trait]
impl ResourceWithImportState for ImageResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let id = request.id.as_str();
        let result = match ids::decode_pair(id) {
            Ok(_) => self
                .read_image(&import_seed(id))
                .await
                .and_then(|state| state.ok_or_else(|| missing_on_import("image", id))),
            Err(e) => Err(invalid_import_id(e, "<cloud_instance_id>/<image_id>")),
        };
        import_response(&request.type_name, result)
    }
}

#[cfg(test)]
#[path = "./resource_image_test.rs"]
mod resource_image_test;
