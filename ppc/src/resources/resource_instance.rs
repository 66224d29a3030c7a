//! PVM instance (LPAR) resource
//!
//! Instances created with `ppc_sap_profile_id` go through the SAP endpoint,
//! all others through `pvm-instances`. Updates are applied one concern at a
//! time in a fixed order, stopping the LPAR where a change cannot be made
//! while it runs.

use super::{
    affinity_attributes, api_error, attr, configure_response, import_response, import_seed,
    invalid_id, invalid_import_id, missing_on_import, not_configured, put, required_string,
    state_id, storage_affinity, timeouts_attribute, validate_config, wait_error, Base64Validator,
    Timeouts, CLOUD_INSTANCE_ID,
};
use crate::api::cloud_instance::CUSTOM_VIRTUAL_CORES;
use crate::api::images::IMAGE_TYPE_STOCK_VTL;
use crate::api::instances::{
    CreateInstanceRequest, PvmInstance, UpdateInstanceRequest, VirtualCores,
    ACTION_IMMEDIATE_SHUTDOWN, ACTION_START,
};
use crate::api::placement_groups::NOT_A_MEMBER;
use crate::api::sap::{CreateSapInstanceRequest, SapInstanceCount};
use crate::api::{ApiError, CloudApi, NetworkAttachment};
use crate::ids;
use crate::provider_data::PpcProviderData;
use crate::waiter::{Observation, WaitError, Waiter, NOT_FOUND};
use async_trait::async_trait;
use std::collections::HashMap;
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

const INSTANCE_NAME: &str = "ppc_instance_name";
const IMAGE_ID: &str = "ppc_image_id";
const NETWORK: &str = "ppc_network";
const MEMORY: &str = "ppc_memory";
const PROCESSORS: &str = "ppc_processors";
const PROC_TYPE: &str = "ppc_proc_type";
const SYS_TYPE: &str = "ppc_sys_type";
const STORAGE_TYPE: &str = "ppc_storage_type";
const STORAGE_POOL: &str = "ppc_storage_pool";
const MIGRATABLE: &str = "ppc_migratable";
const VIRTUAL_CORES_ASSIGNED: &str = "ppc_virtual_cores_assigned";
const LICENSE_REPOSITORY_CAPACITY: &str = "ppc_license_repository_capacity";
const KEY_PAIR_NAME: &str = "ppc_key_pair_name";
const VOLUME_IDS: &str = "ppc_volume_ids";
const USER_DATA: &str = "ppc_user_data";
const STORAGE_CONNECTION: &str = "ppc_storage_connection";
const STORAGE_POOL_AFFINITY: &str = "ppc_storage_pool_affinity";
const PLACEMENT_GROUP_ID: &str = "ppc_placement_group_id";
const SAP_PROFILE_ID: &str = "ppc_sap_profile_id";
const SAP_DEPLOYMENT_TYPE: &str = "ppc_sap_deployment_type";
const DEPLOYMENT_TYPE: &str = "ppc_deployment_type";
const REPLICANTS: &str = "ppc_replicants";
const REPLICATION_POLICY: &str = "ppc_replication_policy";
const REPLICATION_SCHEME: &str = "ppc_replication_scheme";
const PIN_POLICY: &str = "ppc_pin_policy";
const READY_STATUS: &str = "ppc_health_status";

const STATUS_ACTIVE: &str = "ACTIVE";
const STATUS_BUILD: &str = "BUILD";
const STATUS_ERROR: &str = "ERROR";
const STATUS_SHUTOFF: &str = "SHUTOFF";
const STATUS_STOPPING: &str = "STOPPING";
const STATUS_RESIZE: &str = "RESIZE";
const STATUS_DELETING: &str = "DELETING";
const HEALTH_OK: &str = "OK";
const HEALTH_WARNING: &str = "WARNING";

/// Placement group reported for instances outside any group
const NO_PLACEMENT_GROUP: &str = "none";

const DEFAULT_TIMEOUTS: Timeouts = Timeouts::minutes(120, 60, 60);

#[derive(Default)]
pub struct InstanceResource {
    provider_data: Option<PpcProviderData>,
}

impl InstanceResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_static() -> Schema {
        let optional_computed = |name: &str, ty: AttributeType, description: &str| {
            AttributeBuilder::new(name, ty)
                .description(description)
                .optional()
                .computed()
        };
        let computed = |name: &str, ty: AttributeType, description: &str| {
            AttributeBuilder::new(name, ty)
                .description(description)
                .computed()
                .build()
        };

        let mut builder = SchemaBuilder::new()
            .version(0)
            .description("Manages a Power Systems virtual server instance")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("Composite identifier <cloud_instance_id>/<instance_id>")
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(CLOUD_INSTANCE_ID, AttributeType::String)
                    .description("The cloud instance the LPAR lives in")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(INSTANCE_NAME, AttributeType::String)
                    .description("Name of the LPAR")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(IMAGE_ID, AttributeType::String)
                    .description("Image to boot the LPAR from")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(
                    NETWORK,
                    AttributeType::object_list(&[
                        ("network_id", AttributeType::String),
                        ("ip_address", AttributeType::String),
                        ("mac_address", AttributeType::String),
                        ("network_name", AttributeType::String),
                        ("type", AttributeType::String),
                        ("external_ip", AttributeType::String),
                    ]),
                )
                .description("Networks to attach, each with an optional fixed ip_address")
                .required()
                .force_new()
                .build(),
            )
            .attribute(
                optional_computed(MEMORY, AttributeType::Number, "Memory in GB").build(),
            )
            .attribute(
                optional_computed(PROCESSORS, AttributeType::Number, "Number of processors")
                    .build(),
            )
            .attribute(
                optional_computed(PROC_TYPE, AttributeType::String, "Processor type")
                    .validator(StringOneOf::create(&["dedicated", "shared", "capped"]))
                    .build(),
            )
            .attribute(
                optional_computed(SYS_TYPE, AttributeType::String, "System type, e.g. s922")
                    .force_new()
                    .build(),
            )
            .attribute(
                optional_computed(STORAGE_TYPE, AttributeType::String, "Storage tier of the boot volume")
                    .force_new()
                    .build(),
            )
            .attribute(
                optional_computed(STORAGE_POOL, AttributeType::String, "Storage pool of the boot volume")
                    .force_new()
                    .build(),
            )
            .attribute(
                optional_computed(MIGRATABLE, AttributeType::Bool, "Whether the LPAR may be migrated")
                    .build(),
            )
            .attribute(
                optional_computed(
                    VIRTUAL_CORES_ASSIGNED,
                    AttributeType::Number,
                    "Virtual cores assigned to the LPAR",
                )
                .build(),
            )
            .attribute(
                optional_computed(
                    LICENSE_REPOSITORY_CAPACITY,
                    AttributeType::Number,
                    "VTL license repository capacity in TB, VTL images only",
                )
                .build(),
            )
            .attribute(
                AttributeBuilder::new(KEY_PAIR_NAME, AttributeType::String)
                    .description("SSH key to inject")
                    .optional()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(VOLUME_IDS, AttributeType::string_set())
                    .description("Additional volumes to attach at creation")
                    .optional()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(USER_DATA, AttributeType::String)
                    .description("Base64 encoded cloud-init user data")
                    .optional()
                    .force_new()
                    .validator(std::sync::Arc::new(Base64Validator))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(STORAGE_CONNECTION, AttributeType::String)
                    .description("Storage connection type")
                    .optional()
                    .force_new()
                    .validator(StringOneOf::create(&["vSCSI"]))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(STORAGE_POOL_AFFINITY, AttributeType::Bool)
                    .description("Keep additional volumes in the boot volume's storage pool")
                    .optional()
                    .default(StaticDefault::bool(true))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(PLACEMENT_GROUP_ID, AttributeType::String)
                    .description("Placement group the LPAR belongs to")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(SAP_PROFILE_ID, AttributeType::String)
                    .description("SAP profile, provisions the LPAR through the SAP API")
                    .optional()
                    .conflicts_with(&[MEMORY, PROCESSORS, PROC_TYPE])
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(SAP_DEPLOYMENT_TYPE, AttributeType::String)
                    .description("Deployment type for SAP instances")
                    .optional()
                    .force_new()
                    .build(),
            )
            .attribute(
                optional_computed(DEPLOYMENT_TYPE, AttributeType::String, "Deployment type")
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(REPLICANTS, AttributeType::Number)
                    .description("Number of LPARs to create")
                    .optional()
                    .force_new()
                    .default(StaticDefault::number(1.0))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(REPLICATION_POLICY, AttributeType::String)
                    .description("Affinity policy between replicants")
                    .optional()
                    .force_new()
                    .validator(StringOneOf::create(&["affinity", "anti-affinity", "none"]))
                    .default(StaticDefault::string("none"))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(REPLICATION_SCHEME, AttributeType::String)
                    .description("Whether replicant numbers are a prefix or suffix of the name")
                    .optional()
                    .force_new()
                    .validator(StringOneOf::create(&["prefix", "suffix"]))
                    .default(StaticDefault::string("suffix"))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(PIN_POLICY, AttributeType::String)
                    .description("Pin policy of the LPAR")
                    .optional()
                    .force_new()
                    .validator(StringOneOf::create(&["none", "soft", "hard"]))
                    .default(StaticDefault::string("none"))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(READY_STATUS, AttributeType::String)
                    .description("Health status that counts as ready after create")
                    .optional()
                    .validator(StringOneOf::create(&[HEALTH_OK, HEALTH_WARNING]))
                    .default(StaticDefault::string(HEALTH_OK))
                    .build(),
            )
            .attribute(computed("instance_id", AttributeType::String, "Instance ID"))
            .attribute(computed("status", AttributeType::String, "Instance status"))
            .attribute(computed("health_status", AttributeType::String, "Instance health"))
            .attribute(computed("progress", AttributeType::Number, "Build progress"))
            .attribute(computed("min_processors", AttributeType::Number, "Minimum processors"))
            .attribute(computed("max_processors", AttributeType::Number, "Maximum processors"))
            .attribute(computed("min_memory", AttributeType::Number, "Minimum memory"))
            .attribute(computed("max_memory", AttributeType::Number, "Maximum memory"))
            .attribute(computed("min_virtual_cores", AttributeType::Number, "Minimum virtual cores"))
            .attribute(computed("max_virtual_cores", AttributeType::Number, "Maximum virtual cores"))
            .attribute(computed("pin_policy", AttributeType::String, "Effective pin policy"))
            .attribute(computed("operating_system", AttributeType::String, "Operating system"))
            .attribute(computed("os_type", AttributeType::String, "Operating system type"));

        for attribute in affinity_attributes(true) {
            builder = builder.attribute(attribute);
        }

        builder.attribute(timeouts_attribute()).build()
    }

    async fn create_instance(
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

        let created = if let Some(profile_id) = plan.get_optional_string(&attr(SAP_PROFILE_ID)) {
            let body = sap_request(plan, profile_id)?;
            api.sap().create(&body).await
        } else {
            let body = instance_request(plan)?;
            if body.license_repository_capacity.is_some() {
                ensure_vtl_image(&api, &body.image_id).await?;
            }
            api.instances().create(&body).await
        };
        let instances = created.map_err(|e| api_error("Failed to create instance", e))?;

        let first = instances.first().ok_or_else(|| {
            Diagnostic::error(
                "Failed to create instance",
                "The API accepted the request but returned no instances",
            )
        })?;
        let id = ids::encode(&[&cloud, &first.pvm_instance_id]).map_err(invalid_id)?;
        put(state, "id", id.as_str());
        put(state, "instance_id", first.pvm_instance_id.as_str());
        tracing::info!("Created instance {}", id);

        let ready_status = plan
            .get_optional_string(&attr(READY_STATUS))
            .unwrap_or_else(|| HEALTH_OK.to_string());
        for instance in &instances {
            wait_for_available(
                &ctx,
                data,
                &cloud,
                &instance.pvm_instance_id,
                &ready_status,
                timeouts.create,
            )
            .await
            .map_err(|e| wait_error("Failed waiting for instance to become available", e))?;
        }

        if plan.get_optional_bool(&attr(STORAGE_POOL_AFFINITY)) == Some(false) {
            for instance in &instances {
                let body = UpdateInstanceRequest {
                    storage_pool_affinity: Some(false),
                    ..Default::default()
                };
                api.instances()
                    .update(&instance.pvm_instance_id, &body)
                    .await
                    .map_err(|e| api_error("Failed to update storage pool affinity", e))?;
            }
        }

        let instance = api
            .instances()
            .get(&first.pvm_instance_id)
            .await
            .map_err(|e| api_error("Failed to read instance", e))?;
        apply_instance(state, &cloud, &instance);
        Ok(())
    }

    async fn read_instance(&self, current: &DynamicValue) -> Result<Option<DynamicValue>, Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let id = state_id(current)?;
        let (cloud, instance_id) = ids::decode_pair(&id).map_err(invalid_id)?;

        match data.client.cloud(&cloud).instances().get(&instance_id).await {
            Ok(instance) => {
                let mut state = current.clone();
                apply_instance(&mut state, &cloud, &instance);
                Ok(Some(state))
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!("Instance {} no longer exists, removing from state", id);
                Ok(None)
            }
            Err(e) => Err(api_error("Failed to read instance", e)),
        }
    }

    async fn update_instance(
        &self,
        ctx: &Context,
        prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> Result<DynamicValue, Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let timeouts = DEFAULT_TIMEOUTS.resolve(planned)?;
        let ctx = ctx.with_timeout(timeouts.update);
        let id = state_id(prior)?;
        let (cloud, instance_id) = ids::decode_pair(&id).map_err(invalid_id)?;

        if prior.get_optional_string(&attr("health_status")).as_deref() == Some(HEALTH_WARNING) {
            return Err(Diagnostic::error(
                "Failed to update instance",
                "the operation cannot be performed when the lpar health in the WARNING State",
            ));
        }

        let api = data.client.cloud(&cloud);
        let cores_enabled = api
            .get()
            .await
            .map_err(|e| api_error("Failed to read cloud instance", e))?
            .has_capability(CUSTOM_VIRTUAL_CORES);

        let lpar = Lpar {
            ctx: &ctx,
            data,
            api: &api,
            cloud: &cloud,
            instance_id: &instance_id,
            timeout: timeouts.update,
        };

        for change in plan_changes(prior, planned) {
            tracing::debug!("Applying {:?} to instance {}", change, id);
            lpar.apply(change, cores_enabled).await?;
        }

        let instance = api
            .instances()
            .get(&instance_id)
            .await
            .map_err(|e| api_error("Failed to read instance", e))?;
        let mut state = planned.clone();
        put(&mut state, "id", id.as_str());
        apply_instance(&mut state, &cloud, &instance);
        Ok(state)
    }

    async fn delete_instance(&self, ctx: &Context, prior: &DynamicValue) -> Result<(), Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let timeouts = DEFAULT_TIMEOUTS.resolve(prior)?;
        let ctx = ctx.with_timeout(timeouts.delete);
        let id = state_id(prior)?;
        let (cloud, instance_id) = ids::decode_pair(&id).map_err(invalid_id)?;

        match data.client.cloud(&cloud).instances().delete(&instance_id).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                tracing::debug!("Instance {} already deleted", id);
                return Ok(());
            }
            Err(e) => return Err(api_error("Failed to delete instance", e)),
        }

        wait_for_deleted(&ctx, data, &cloud, &instance_id)
            .await
            .map_err(|e| wait_error("Failed waiting for instance deletion", e))
    }

    async fn import_instance(&self, id: &str) -> Result<DynamicValue, Diagnostic> {
        ids::decode_pair(id)
            .map_err(|e| invalid_import_id(e, "<cloud_instance_id>/<instance_id>"))?;
        self.read_instance(&import_seed(id))
            .await?
            .ok_or_else(|| missing_on_import("instance", id))
    }
}

/// One step of an instance update
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Change {
    Rename(String),
    ProcType {
        proc_type: String,
        virtual_cores: Option<i64>,
    },
    VirtualCores(i64),
    Resize {
        memory: f64,
        processors: f64,
        migratable: Option<bool>,
        virtual_cores: Option<i64>,
        /// The new size exceeds the running maximum
        reboot: bool,
    },
    LicenseRepository(i64),
    SapProfile(String),
    StoragePoolAffinity(bool),
    PlacementGroup {
        from: Option<String>,
        to: Option<String>,
    },
}

/// The steps that turn `prior` into `planned`, in the order they must run.
/// Attributes still unknown in the plan are left alone.
pub(crate) fn plan_changes(prior: &DynamicValue, planned: &DynamicValue) -> Vec<Change> {
    let changed = |name: &str| {
        let path = attr(name);
        prior.differs_at(planned, &path) && !matches!(planned.get(&path), Ok(Dynamic::Unknown))
    };
    let number = |name: &str| {
        planned
            .get_optional_number(&attr(name))
            .or_else(|| prior.get_optional_number(&attr(name)))
    };
    let assigned_cores = planned
        .get_optional_number(&attr(VIRTUAL_CORES_ASSIGNED))
        .map(|c| c as i64);

    let mut changes = vec![];

    if changed(INSTANCE_NAME) {
        if let Some(name) = planned.get_optional_string(&attr(INSTANCE_NAME)) {
            changes.push(Change::Rename(name));
        }
    }

    if changed(PROC_TYPE) {
        if let Some(proc_type) = planned.get_optional_string(&attr(PROC_TYPE)) {
            changes.push(Change::ProcType {
                proc_type,
                virtual_cores: assigned_cores,
            });
        }
    }

    if changed(VIRTUAL_CORES_ASSIGNED) {
        if let Some(cores) = assigned_cores {
            changes.push(Change::VirtualCores(cores));
        }
    }

    if changed(MEMORY) || changed(PROCESSORS) || changed(MIGRATABLE) {
        let memory = number(MEMORY).unwrap_or_default();
        let processors = number(PROCESSORS).unwrap_or_default();
        let max_memory = prior.get_optional_number(&attr("max_memory")).unwrap_or_default();
        let max_processors = prior
            .get_optional_number(&attr("max_processors"))
            .unwrap_or_default();

        changes.push(Change::Resize {
            memory,
            processors,
            migratable: planned.get_optional_bool(&attr(MIGRATABLE)),
            virtual_cores: assigned_cores,
            reboot: memory > max_memory || processors > max_processors,
        });
    }

    if changed(LICENSE_REPOSITORY_CAPACITY) {
        if let Some(capacity) = planned.get_optional_number(&attr(LICENSE_REPOSITORY_CAPACITY)) {
            changes.push(Change::LicenseRepository(capacity as i64));
        }
    }

    if changed(SAP_PROFILE_ID) {
        if let Some(profile) = planned.get_optional_string(&attr(SAP_PROFILE_ID)) {
            changes.push(Change::SapProfile(profile));
        }
    }

    if changed(STORAGE_POOL_AFFINITY) {
        if let Some(affinity) = planned.get_optional_bool(&attr(STORAGE_POOL_AFFINITY)) {
            changes.push(Change::StoragePoolAffinity(affinity));
        }
    }

    if changed(PLACEMENT_GROUP_ID) {
        changes.push(Change::PlacementGroup {
            from: prior.get_optional_string(&attr(PLACEMENT_GROUP_ID)),
            to: planned.get_optional_string(&attr(PLACEMENT_GROUP_ID)),
        });
    }

    changes
}

/// Everything needed to drive one LPAR through an update
struct Lpar<'a> {
    ctx: &'a Context,
    data: &'a PpcProviderData,
    api: &'a CloudApi<'a>,
    cloud: &'a str,
    instance_id: &'a str,
    timeout: Duration,
}

impl Lpar<'_> {
    async fn apply(&self, change: Change, cores_enabled: bool) -> Result<(), Diagnostic> {
        match change {
            Change::Rename(name) => {
                self.update(UpdateInstanceRequest {
                    server_name: Some(name),
                    ..Default::default()
                })
                .await?;
                self.available().await
            }
            Change::ProcType {
                proc_type,
                virtual_cores,
            } => {
                self.stop_unless_shutoff().await?;
                self.update(UpdateInstanceRequest {
                    proc_type: Some(proc_type),
                    virtual_cores: virtual_cores
                        .filter(|_| cores_enabled)
                        .map(VirtualCores::assigned),
                    ..Default::default()
                })
                .await?;
                self.stopped().await?;
                self.start().await
            }
            Change::VirtualCores(cores) => {
                self.update(UpdateInstanceRequest {
                    virtual_cores: Some(VirtualCores::assigned(cores)),
                    ..Default::default()
                })
                .await?;
                self.available().await
            }
            Change::Resize {
                memory,
                processors,
                migratable,
                virtual_cores,
                reboot,
            } => {
                if reboot {
                    self.stop().await?;
                    self.update(UpdateInstanceRequest {
                        memory: Some(memory),
                        processors: Some(processors),
                        ..Default::default()
                    })
                    .await?;
                    self.resized().await?;
                    self.start().await
                } else {
                    self.update(UpdateInstanceRequest {
                        memory: Some(memory),
                        processors: Some(processors),
                        migratable,
                        virtual_cores: virtual_cores
                            .filter(|_| cores_enabled)
                            .map(VirtualCores::assigned),
                        ..Default::default()
                    })
                    .await?;
                    self.resized().await
                }
            }
            Change::LicenseRepository(capacity) => {
                self.update(UpdateInstanceRequest {
                    license_repository_capacity: Some(capacity),
                    ..Default::default()
                })
                .await?;
                self.available().await
            }
            Change::SapProfile(profile) => {
                self.stop_unless_shutoff().await?;
                self.update(UpdateInstanceRequest {
                    sap_profile_id: Some(profile),
                    ..Default::default()
                })
                .await?;
                self.stopped().await?;
                self.start().await
            }
            Change::StoragePoolAffinity(affinity) => {
                self.update(UpdateInstanceRequest {
                    storage_pool_affinity: Some(affinity),
                    ..Default::default()
                })
                .await
            }
            Change::PlacementGroup { from, to } => self.move_placement_group(from, to).await,
        }
    }

    async fn update(&self, body: UpdateInstanceRequest) -> Result<(), Diagnostic> {
        self.api
            .instances()
            .update(self.instance_id, &body)
            .await
            .map(|_| ())
            .map_err(|e| api_error("Failed to update instance", e))
    }

    async fn action(&self, action: &str) -> Result<(), Diagnostic> {
        self.api
            .instances()
            .action(self.instance_id, action)
            .await
            .map(|_| ())
            .map_err(|e| api_error(&format!("Failed to perform {} on instance", action), e))
    }

    async fn stop(&self) -> Result<(), Diagnostic> {
        self.action(ACTION_IMMEDIATE_SHUTDOWN).await?;
        self.stopped().await
    }

    async fn stop_unless_shutoff(&self) -> Result<(), Diagnostic> {
        let instance = self
            .api
            .instances()
            .get(self.instance_id)
            .await
            .map_err(|e| api_error("Failed to read instance", e))?;
        if instance.status() == STATUS_SHUTOFF {
            return Ok(());
        }
        self.stop().await
    }

    async fn start(&self) -> Result<(), Diagnostic> {
        self.action(ACTION_START).await?;
        self.available().await
    }

    async fn available(&self) -> Result<(), Diagnostic> {
        wait_for_available(
            self.ctx,
            self.data,
            self.cloud,
            self.instance_id,
            HEALTH_OK,
            self.timeout,
        )
        .await
        .map(|_| ())
        .map_err(|e| wait_error("Failed waiting for instance to become available", e))
    }

    async fn stopped(&self) -> Result<(), Diagnostic> {
        wait_for_stopped(self.ctx, self.data, self.cloud, self.instance_id)
            .await
            .map(|_| ())
            .map_err(|e| wait_error("Failed waiting for instance to stop", e))
    }

    async fn resized(&self) -> Result<(), Diagnostic> {
        wait_for_resize(self.ctx, self.data, self.cloud, self.instance_id)
            .await
            .map(|_| ())
            .map_err(|e| wait_error("Failed waiting for instance resize", e))
    }

    async fn move_placement_group(
        &self,
        from: Option<String>,
        to: Option<String>,
    ) -> Result<(), Diagnostic> {
        let groups = self.api.placement_groups();

        if let Some(old) = from {
            match groups.remove_member(&old, self.instance_id).await {
                Ok(_) => {}
                Err(e) if e.message_contains(NOT_A_MEMBER) => {
                    tracing::debug!("Instance {} was not in placement group {}", self.instance_id, old);
                }
                Err(e) => return Err(api_error("Failed to remove instance from placement group", e)),
            }
        }

        if let Some(new) = to {
            groups
                .add_member(&new, self.instance_id)
                .await
                .map_err(|e| api_error("Failed to add instance to placement group", e))?;
        }

        Ok(())
    }
}

fn network_attachments(plan: &DynamicValue) -> Vec<NetworkAttachment> {
    plan.get_list(&attr(NETWORK))
        .unwrap_or_default()
        .into_iter()
        .filter_map(|item| match item {
            Dynamic::Map(fields) => Some(NetworkAttachment {
                network_id: fields.get("network_id").and_then(Dynamic::as_str)?.to_string(),
                ip_address: fields
                    .get("ip_address")
                    .and_then(Dynamic::as_str)
                    .filter(|ip| !ip.is_empty())
                    .map(String::from),
            }),
            _ => None,
        })
        .collect()
}

/// Only soft and hard are sent, `none` is the server default
fn pin_policy(plan: &DynamicValue) -> Option<String> {
    plan.get_optional_string(&attr(PIN_POLICY))
        .filter(|policy| policy == "soft" || policy == "hard")
}

fn required_for_create<T>(value: Option<T>, name: &str) -> Result<T, Diagnostic> {
    value.ok_or_else(|| {
        Diagnostic::error(
            "Missing instance sizing",
            format!("{} is required for creating pvm instances", name),
        )
        .with_attribute(attr(name))
    })
}

fn instance_request(plan: &DynamicValue) -> Result<CreateInstanceRequest, Diagnostic> {
    let memory = required_for_create(plan.get_optional_number(&attr(MEMORY)), MEMORY)?;
    let processors = required_for_create(plan.get_optional_number(&attr(PROCESSORS)), PROCESSORS)?;
    let sys_type = required_for_create(plan.get_optional_string(&attr(SYS_TYPE)), SYS_TYPE)?;
    let proc_type = required_for_create(plan.get_optional_string(&attr(PROC_TYPE)), PROC_TYPE)?;

    Ok(CreateInstanceRequest {
        server_name: required_string(plan, INSTANCE_NAME)?,
        image_id: required_string(plan, IMAGE_ID)?,
        processors,
        memory,
        proc_type,
        sys_type,
        replicants: plan.get_optional_number(&attr(REPLICANTS)).unwrap_or(1.0),
        replicant_naming_scheme: plan
            .get_optional_string(&attr(REPLICATION_SCHEME))
            .unwrap_or_else(|| "suffix".to_string()),
        replicant_affinity_policy: plan
            .get_optional_string(&attr(REPLICATION_POLICY))
            .unwrap_or_else(|| "none".to_string()),
        networks: network_attachments(plan),
        migratable: plan.get_optional_bool(&attr(MIGRATABLE)).unwrap_or(false),
        user_data: plan.get_optional_string(&attr(USER_DATA)),
        key_pair_name: plan.get_optional_string(&attr(KEY_PAIR_NAME)),
        volume_ids: plan.get_string_list(&attr(VOLUME_IDS)).unwrap_or_default(),
        pin_policy: pin_policy(plan),
        virtual_cores: plan
            .get_optional_number(&attr(VIRTUAL_CORES_ASSIGNED))
            .map(|cores| VirtualCores::assigned(cores as i64)),
        storage_type: plan.get_optional_string(&attr(STORAGE_TYPE)),
        storage_pool: plan.get_optional_string(&attr(STORAGE_POOL)),
        storage_affinity: storage_affinity(plan),
        storage_connection: plan.get_optional_string(&attr(STORAGE_CONNECTION)),
        deployment_type: plan.get_optional_string(&attr(DEPLOYMENT_TYPE)),
        placement_group: plan.get_optional_string(&attr(PLACEMENT_GROUP_ID)),
        license_repository_capacity: plan
            .get_optional_number(&attr(LICENSE_REPOSITORY_CAPACITY))
            .map(|capacity| capacity as i64),
    })
}

fn sap_request(plan: &DynamicValue, profile_id: String) -> Result<CreateSapInstanceRequest, Diagnostic> {
    Ok(CreateSapInstanceRequest {
        name: required_string(plan, INSTANCE_NAME)?,
        profile_id,
        image_id: required_string(plan, IMAGE_ID)?,
        networks: network_attachments(plan),
        instances: SapInstanceCount {
            count: plan.get_optional_number(&attr(REPLICANTS)).unwrap_or(1.0) as i64,
            affinity_policy: plan
                .get_optional_string(&attr(REPLICATION_POLICY))
                .unwrap_or_else(|| "none".to_string()),
            numerical: plan
                .get_optional_string(&attr(REPLICATION_SCHEME))
                .unwrap_or_else(|| "suffix".to_string()),
        },
        deployment_type: plan.get_optional_string(&attr(SAP_DEPLOYMENT_TYPE)),
        volume_ids: plan.get_string_list(&attr(VOLUME_IDS)).unwrap_or_default(),
        pin_policy: pin_policy(plan),
        ssh_key_name: plan.get_optional_string(&attr(KEY_PAIR_NAME)),
        user_data: plan.get_optional_string(&attr(USER_DATA)),
        sys_type: plan.get_optional_string(&attr(SYS_TYPE)),
        storage_type: plan.get_optional_string(&attr(STORAGE_TYPE)),
        storage_pool: plan.get_optional_string(&attr(STORAGE_POOL)),
        storage_affinity: storage_affinity(plan),
        placement_group: plan.get_optional_string(&attr(PLACEMENT_GROUP_ID)),
    })
}

/// License repository capacity is only valid for stock VTL images. The
/// stock catalogue is checked before the cloud instance's own images.
async fn ensure_vtl_image(api: &CloudApi<'_>, image_id: &str) -> Result<(), Diagnostic> {
    let image = match api.images().get_stock(image_id).await {
        Ok(image) => image,
        Err(_) => api.images().get(image_id).await.map_err(|_| {
            Diagnostic::error(
                "Invalid image",
                format!("image {} doesn't exist", image_id),
            )
            .with_attribute(attr(IMAGE_ID))
        })?,
    };

    if image.image_type() != Some(IMAGE_TYPE_STOCK_VTL) {
        return Err(Diagnostic::error(
            "Invalid license repository capacity",
            "ppc_license_repository_capacity should only be used when creating VTL instances",
        )
        .with_attribute(attr(LICENSE_REPOSITORY_CAPACITY)));
    }

    Ok(())
}

pub(crate) fn available_state(instance: PvmInstance, ready_status: &str) -> Observation<PvmInstance> {
    let status = instance.status().to_string();
    let health = instance.health_status().to_string();

    match status.as_str() {
        STATUS_ACTIVE if health == HEALTH_OK || health == ready_status => {
            Observation::new(instance, STATUS_ACTIVE)
        }
        STATUS_ERROR => {
            let fault = match instance.fault_message() {
                Some(message) => format!("failed to create the lpar: {}", message),
                None => "failed to create the lpar".to_string(),
            };
            Observation::new(instance, STATUS_ERROR).with_fault(fault)
        }
        _ => Observation::new(instance, STATUS_BUILD),
    }
}

/// SHUTOFF with a healthy status, `pending` otherwise
pub(crate) fn stopped_state(instance: PvmInstance, pending: &str) -> Observation<PvmInstance> {
    let status = instance.status().to_string();
    let healthy = instance.health_status() == HEALTH_OK;

    match status.as_str() {
        STATUS_SHUTOFF if healthy => Observation::new(instance, STATUS_SHUTOFF),
        STATUS_ERROR => {
            let fault = instance.fault_message().unwrap_or_default();
            Observation::new(instance, STATUS_ERROR).with_fault(fault)
        }
        _ => Observation::new(instance, pending),
    }
}

/// A resize settles in either power state
pub(crate) fn resize_state(instance: PvmInstance) -> Observation<PvmInstance> {
    if instance.status() == STATUS_ACTIVE && instance.health_status() == HEALTH_OK {
        return Observation::new(instance, STATUS_ACTIVE);
    }
    stopped_state(instance, STATUS_RESIZE)
}

async fn poll_instance<F>(
    ctx: &Context,
    data: &PpcProviderData,
    cloud: &str,
    instance_id: &str,
    waiter: Waiter,
    classify: F,
) -> Result<Option<PvmInstance>, WaitError>
where
    F: Fn(PvmInstance) -> Observation<PvmInstance>,
{
    let api = data.client.cloud(cloud);
    let api = &api;
    let classify = &classify;

    data.tune(waiter)
        .wait(ctx, move || async move {
            let instance = api.instances().get(instance_id).await?;
            Ok::<_, ApiError>(classify(instance))
        })
        .await
}

async fn wait_for_available(
    ctx: &Context,
    data: &PpcProviderData,
    cloud: &str,
    instance_id: &str,
    ready_status: &str,
    timeout: Duration,
) -> Result<Option<PvmInstance>, WaitError> {
    let poll = if ready_status == HEALTH_WARNING { 60 } else { 120 };
    let waiter = Waiter::new(&[STATUS_BUILD], &[STATUS_ACTIVE])?
        .delay(Duration::from_secs(30))
        .poll_interval(Duration::from_secs(poll))
        .timeout(timeout);

    poll_instance(ctx, data, cloud, instance_id, waiter, |instance| {
        available_state(instance, ready_status)
    })
    .await
}

async fn wait_for_stopped(
    ctx: &Context,
    data: &PpcProviderData,
    cloud: &str,
    instance_id: &str,
) -> Result<Option<PvmInstance>, WaitError> {
    let waiter = Waiter::new(&[STATUS_STOPPING], &[STATUS_SHUTOFF])?
        .delay(Duration::from_secs(10))
        .poll_interval(Duration::from_secs(120))
        .timeout(Duration::from_secs(30 * 60));

    poll_instance(ctx, data, cloud, instance_id, waiter, |instance| {
        stopped_state(instance, STATUS_STOPPING)
    })
    .await
}

async fn wait_for_resize(
    ctx: &Context,
    data: &PpcProviderData,
    cloud: &str,
    instance_id: &str,
) -> Result<Option<PvmInstance>, WaitError> {
    let waiter = Waiter::new(&[STATUS_RESIZE], &[STATUS_ACTIVE, STATUS_SHUTOFF])?
        .delay(Duration::from_secs(10))
        .poll_interval(Duration::from_secs(300))
        .timeout(Duration::from_secs(60 * 60));

    poll_instance(ctx, data, cloud, instance_id, waiter, resize_state).await
}

async fn wait_for_deleted(
    ctx: &Context,
    data: &PpcProviderData,
    cloud: &str,
    instance_id: &str,
) -> Result<(), WaitError> {
    let waiter = Waiter::new(&[STATUS_DELETING], &[NOT_FOUND])?
        .delay(Duration::from_secs(10))
        .poll_interval(Duration::from_secs(10))
        .timeout(Duration::from_secs(10 * 60));

    let api = data.client.cloud(cloud);
    let api = &api;

    data.tune(waiter)
        .wait(ctx, move || async move {
            match api.instances().get(instance_id).await {
                Ok(instance) => Ok(Observation::new(instance, STATUS_DELETING)),
                Err(e) if e.is_not_found() => Ok(Observation::gone()),
                Err(e) => Err(e),
            }
        })
        .await
        .map(|_| ())
}

/// Copies the remote view of the LPAR into `state`
fn apply_instance(state: &mut DynamicValue, cloud: &str, instance: &PvmInstance) {
    put(state, CLOUD_INSTANCE_ID, cloud);
    put(state, "instance_id", instance.pvm_instance_id.as_str());
    put(state, INSTANCE_NAME, instance.server_name.clone());
    put(state, IMAGE_ID, instance.image_id.clone());
    put(state, MEMORY, instance.memory);
    put(state, PROCESSORS, instance.processors);
    put(state, PROC_TYPE, instance.proc_type.clone());
    put(state, SYS_TYPE, instance.sys_type.clone());
    put(state, MIGRATABLE, instance.migratable);
    put(state, STORAGE_TYPE, instance.storage_type.clone());
    put(state, STORAGE_POOL, instance.storage_pool.clone());
    if let Some(affinity) = instance.storage_pool_affinity {
        put(state, STORAGE_POOL_AFFINITY, affinity);
    }

    if let Some(group) = instance
        .placement_group
        .as_deref()
        .filter(|group| *group != NO_PLACEMENT_GROUP)
    {
        put(state, PLACEMENT_GROUP_ID, group);
    }

    let networks = instance
        .networks
        .iter()
        .map(|network| {
            Dynamic::Map(HashMap::from([
                ("network_id".to_string(), network.network_id.clone().into()),
                ("ip_address".to_string(), network.ip_address.clone().into()),
                ("mac_address".to_string(), network.mac_address.clone().into()),
                ("network_name".to_string(), network.network_name.clone().into()),
                ("type".to_string(), network.type_.clone().into()),
                ("external_ip".to_string(), network.external_ip.clone().into()),
            ]))
        })
        .collect();
    put(state, NETWORK, Dynamic::List(networks));

    if let Some(profile) = instance.sap_profile.as_ref().and_then(|p| p.profile_id.clone()) {
        put(state, SAP_PROFILE_ID, profile);
    }
    put(state, DEPLOYMENT_TYPE, instance.deployment_type.clone());
    put(
        state,
        LICENSE_REPOSITORY_CAPACITY,
        instance.license_repository_capacity.map(|c| c as f64),
    );

    let cores = instance.virtual_cores.clone().unwrap_or_default();
    put(state, VIRTUAL_CORES_ASSIGNED, cores.assigned.map(|c| c as f64));
    put(state, "min_virtual_cores", cores.min.map(|c| c as f64));
    put(state, "max_virtual_cores", cores.max.map(|c| c as f64));

    put(state, "status", instance.status.clone());
    put(
        state,
        "health_status",
        Some(instance.health_status()).filter(|h| !h.is_empty()),
    );
    put(state, "progress", instance.progress);
    put(state, "min_processors", instance.min_processors);
    put(state, "max_processors", instance.max_processors);
    put(state, "min_memory", instance.min_memory);
    put(state, "max_memory", instance.max_memory);
    put(state, "pin_policy", instance.pin_policy.clone());
    put(state, "operating_system", instance.operating_system.clone());
    put(state, "os_type", instance.os_type.clone());
}

#[async_trait]
impl Resource for InstanceResource {
    fn type_name(&self) -> &str {
        "ppc_instance"
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
            .create_instance(&ctx, &request.planned_state, &mut new_state)
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

        let new_state = match self.read_instance(&request.current_state).await {
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
            .update_instance(&ctx, &request.prior_state, &request.planned_state)
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

        if let Err(diag) = self.delete_instance(&ctx, &request.prior_state).await {
            diagnostics.push(diag);
        }

        DeleteResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithConfigure for InstanceResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        configure_response(&mut self.provider_data, request.provider_data)
    }
}

#[async_trait]
impl ResourceWithImportState for InstanceResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_response(&request.type_name, self.import_instance(&request.id).await)
    }
}

#[cfg(test)]
#[path = "./resource_instance_test.rs"]
mod resource_instance_test;
