//! One-shot export of an image to a Cloud Object Storage bucket. The export
//! has no remote identity of its own, so read keeps the prior state and
//! delete only forgets it.

use super::job::wait_for_job;
use super::{
    api_error, attr, configure_response, import_response, invalid_id, invalid_import_id,
    not_configured, put, required_string, timeouts_attribute, validate_config, wait_error,
    Timeouts, CLOUD_INSTANCE_ID,
};
use crate::api::images::ExportImageRequest;
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

const IMAGE_ID: &str = "ppc_image_id";
const BUCKET_NAME: &str = "ppc_image_bucket_name";
const ACCESS_KEY: &str = "ppc_image_access_key";
const SECRET_KEY: &str = "ppc_image_secret_key";
const BUCKET_REGION: &str = "ppc_image_bucket_region";

const DEFAULT_TIMEOUTS: Timeouts = Timeouts::minutes(60, 60, 60);

#[derive(Default)]
pub struct ImageExportResource {
    provider_data: Option<PpcProviderData>,
}

impl ImageExportResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_static() -> Schema {
        let field = |name: &str, description: &str| {
            AttributeBuilder::new(name, AttributeType::String)
                .description(description)
                .required()
                .force_new()
        };

        SchemaBuilder::new()
            .version(0)
            .description("Exports an image to a Cloud Object Storage bucket")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("Composite identifier <image_id>/<bucket_name>/<region>")
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(field(CLOUD_INSTANCE_ID, "Cloud instance holding the image").build())
            .attribute(field(IMAGE_ID, "Image to export").build())
            .attribute(field(BUCKET_NAME, "Bucket name, bucket-name[/optional/folder]").build())
            .attribute(field(ACCESS_KEY, "Cloud Object Storage access key").sensitive().build())
            .attribute(field(SECRET_KEY, "Cloud Object Storage secret key").sensitive().build())
            .attribute(field(BUCKET_REGION, "Cloud Object Storage region").build())
            .attribute(timeouts_attribute())
            .build()
    }

    async fn export_image(
        &self,
        ctx: &Context,
        plan: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Result<(), Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let timeouts = DEFAULT_TIMEOUTS.resolve(plan)?;
        let ctx = ctx.with_timeout(timeouts.create);
        let cloud = required_string(plan, CLOUD_INSTANCE_ID)?;
        let image_id = required_string(plan, IMAGE_ID)?;

        let body = ExportImageRequest {
            bucket_name: required_string(plan, BUCKET_NAME)?,
            access_key: required_string(plan, ACCESS_KEY)?,
            secret_key: required_string(plan, SECRET_KEY)?,
            region: required_string(plan, BUCKET_REGION)?,
        };

        let job = data
            .client
            .cloud(&cloud)
            .images()
            .export(&image_id, &body)
            .await
            .map_err(|e| api_error("Failed to export image", e))?;

        let id = export_id(&image_id, &body.bucket_name, &body.region)?;
        put(state, "id", id.as_str());
        tracing::info!("Started export {} as job {}", id, job.id);

        wait_for_job(&ctx, data, &cloud, &job.id, timeouts.create)
            .await
            .map_err(|e| wait_error("Failed waiting for image export", e))?;
        Ok(())
    }
}

/// Bucket names may carry a folder path, so the bucket segment is
/// percent-encoded to keep the id splittable
pub(crate) fn export_id(image_id: &str, bucket: &str, region: &str) -> Result<String, Diagnostic> {
    let bucket = urlencoding::encode(bucket);
    ids::encode(&[image_id, bucket.as_ref(), region]).map_err(invalid_id)
}

fn import_export(id: &str) -> Result<DynamicValue, Diagnostic> {
    let format = "<image_id>/<bucket_name>/<region>";
    let (image_id, bucket, region) =
        ids::decode_triple(id).map_err(|e| invalid_import_id(e, format))?;
    let bucket = urlencoding::decode(&bucket).map_err(|e| {
        Diagnostic::error(
            "Invalid import ID",
            format!("bucket segment '{}' is not valid UTF-8 once decoded: {}", bucket, e),
        )
    })?;

    let mut state = DynamicValue::object();
    put(&mut state, "id", id);
    put(&mut state, IMAGE_ID, image_id);
    put(&mut state, BUCKET_NAME, bucket.into_owned());
    put(&mut state, BUCKET_REGION, region);
    Ok(state)
}

#[async_trait]
impl Resource for ImageExportResource {
    fn type_name(&self) -> &str {
        "ppc_image_export"
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
            .export_image(&ctx, &request.planned_state, &mut new_state)
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
        ReadResourceResponse {
            new_state: Some(request.current_state),
            diagnostics: vec![],
            private: request.private,
            deferred: None,
            new_identity: None,
        }
    }

    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        UpdateResourceResponse {
            new_state: request.planned_state,
            private: vec![],
            diagnostics: vec![],
            new_identity: None,
        }
    }

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        tracing::debug!(
            "Forgetting image export {:?}, the exported file stays in the bucket",
            request.prior_state.get_optional_string(&attr("id"))
        );
        DeleteResourceResponse {
            diagnostics: vec![],
        }
    }
}

#[async_trait]
impl ResourceWithConfigure for ImageExportResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        configure_response(&mut self.provider_data, request.provider_data)
    }
}

#[async_trait]
impl ResourceWithImportState for ImageExportResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_response(&request.type_name, import_export(&request.id))
    }
}
