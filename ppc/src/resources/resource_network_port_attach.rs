//! Network port created on a network and attached to an instance

use super::resource_network_port::{
    delete_port_by_id, wait_for_port_down, NETWORK_NAME, PORT_BUILD, PORT_DESCRIPTION,
    PORT_IP_ADDRESS,
};
use super::{
    api_error, attr, configure_response, import_response, import_seed, invalid_id,
    invalid_import_id, missing_on_import, not_configured, put, required_string, state_id,
    timeouts_attribute, validate_config, wait_error, Timeouts, CLOUD_INSTANCE_ID,
};
use crate::api::networks::{CreatePortRequest, NetworkPort, UpdatePortRequest};
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
use tfplug::types::{Diagnostic, DynamicValue};

const INSTANCE_ID: &str = "ppc_instance_id";

const DEFAULT_DESCRIPTION: &str = "Port Created via Terraform";
const PORT_ACTIVE: &str = "ACTIVE";

const DEFAULT_TIMEOUTS: Timeouts = Timeouts::minutes(60, 60, 60);

#[derive(Default)]
pub struct NetworkPortAttachResource {
    provider_data: Option<PpcProviderData>,
}

impl NetworkPortAttachResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_static() -> Schema {
        let computed = |name: &str| {
            AttributeBuilder::new(name, AttributeType::String)
                .computed()
                .build()
        };

        SchemaBuilder::new()
            .version(0)
            .description("Creates a network port and attaches it to an instance")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("Composite identifier <cloud_instance_id>/<network_name>/<port_id>")
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
                AttributeBuilder::new(INSTANCE_ID, AttributeType::String)
                    .description("Instance to attach the port to")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(NETWORK_NAME, AttributeType::String)
                    .description("Name of the network in the cloud instance")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(PORT_DESCRIPTION, AttributeType::String)
                    .description("Human readable description of the port")
                    .optional()
                    .force_new()
                    .default(StaticDefault::string(DEFAULT_DESCRIPTION))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(PORT_IP_ADDRESS, AttributeType::String)
                    .optional()
                    .computed()
                    .force_new()
                    .build(),
            )
            .attribute(computed("network_port_id"))
            .attribute(computed("macaddress"))
            .attribute(computed("status"))
            .attribute(computed("public_ip"))
            .attribute(timeouts_attribute())
            .build()
    }

    async fn attach_port(
        &self,
        ctx: &Context,
        plan: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Result<(), Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let timeouts = DEFAULT_TIMEOUTS.resolve(plan)?;
        let ctx = ctx.with_timeout(timeouts.create);
        let cloud = required_string(plan, CLOUD_INSTANCE_ID)?;
        let network = required_string(plan, NETWORK_NAME)?;
        let instance = required_string(plan, INSTANCE_ID)?;
        let description = plan
            .get_optional_string(&attr(PORT_DESCRIPTION))
            .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string());
        let api = data.client.cloud(&cloud);

        let body = CreatePortRequest {
            description: description.clone(),
            ip_address: plan.get_optional_string(&attr(PORT_IP_ADDRESS)),
        };
        let port = api
            .networks()
            .create_port(&network, &body)
            .await
            .map_err(|e| api_error("Failed to create network port", e))?;
        let port_id = port.port_id;

        let id = ids::encode(&[&cloud, &network, &port_id]).map_err(invalid_id)?;
        put(state, "id", id.as_str());
        put(state, "network_port_id", port_id.as_str());
        tracing::info!("Created network port {}", id);

        wait_for_port_down(&ctx, data, &cloud, &network, &port_id, timeouts.create)
            .await
            .map_err(|e| wait_error("Failed waiting for network port", e))?;

        let attach = UpdatePortRequest {
            description,
            pvm_instance_id: instance.clone(),
        };
        api.networks()
            .update_port(&network, &port_id, &attach)
            .await
            .map_err(|e| api_error("Failed to attach network port", e))?;

        let port = wait_for_port_active(&ctx, data, &cloud, &network, &port_id, &instance, timeouts.create)
            .await
            .map_err(|e| wait_error("Failed waiting for network port to attach", e))?;

        if let Some(port) = port {
            apply_port(state, &port);
        }
        Ok(())
    }

    async fn read_port(&self, current: &DynamicValue) -> Result<Option<DynamicValue>, Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let id = state_id(current)?;
        let (cloud, network, port_id) = ids::decode_triple(&id).map_err(invalid_id)?;

        match data.client.cloud(&cloud).networks().get_port(&network, &port_id).await {
            Ok(port) => {
                let mut state = current.clone();
                put(&mut state, CLOUD_INSTANCE_ID, cloud.as_str());
                put(&mut state, NETWORK_NAME, network.as_str());
                apply_port(&mut state, &port);
                Ok(Some(state))
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!("Network port {} no longer exists, removing from state", id);
                Ok(None)
            }
            Err(e) => Err(api_error("Failed to read network port", e)),
        }
    }
}

async fn wait_for_port_active(
    ctx: &Context,
    data: &PpcProviderData,
    cloud: &str,
    network: &str,
    port_id: &str,
    instance: &str,
    timeout: Duration,
) -> Result<Option<NetworkPort>, WaitError> {
    let waiter = Waiter::new(&[PORT_BUILD], &[PORT_ACTIVE])?
        .delay(Duration::from_secs(10))
        .poll_interval(Duration::from_secs(10))
        .timeout(timeout);
    let api = data.client.cloud(cloud);
    let api = &api;

    data.tune(waiter)
        .wait(ctx, move || async move {
            let port = api.networks().get_port(network, port_id).await?;
            Ok::<_, ApiError>(attached_state(port, instance))
        })
        .await
}

/// ACTIVE only once the port reports the instance it was attached to
pub(crate) fn attached_state(port: NetworkPort, instance: &str) -> Observation<NetworkPort> {
    let attached = port.status() == PORT_ACTIVE && port.instance_id() == Some(instance);
    Observation::new(port, if attached { PORT_ACTIVE } else { PORT_BUILD })
}

fn apply_port(state: &mut DynamicValue, port: &NetworkPort) {
    put(state, "network_port_id", port.port_id.as_str());
    put(state, INSTANCE_ID, port.instance_id());
    put(state, PORT_DESCRIPTION, port.description.clone());
    put(state, PORT_IP_ADDRESS, port.ip_address.clone());
    put(state, "macaddress", port.mac_address.clone());
    put(state, "status", port.status.clone());
    put(state, "public_ip", port.external_ip.clone());
}

#[async_trait]
impl Resource for NetworkPortAttachResource {
    fn type_name(&self) -> &str {
        "ppc_network_port_attach"
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
            .attach_port(&ctx, &request.planned_state, &mut new_state)
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

        let new_state = match self.read_port(&request.current_state).await {
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

        let result = match self.provider_data.as_ref() {
            Some(data) => match state_id(&request.prior_state) {
                Ok(id) => delete_port_by_id(data, &id).await,
                Err(diag) => Err(diag),
            },
            None => Err(not_configured()),
        };
        if let Err(diag) = result {
            diagnostics.push(diag);
        }

        DeleteResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithConfigure for NetworkPortAttachResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        configure_response(&mut self.provider_data, request.provider_data)
    }
}

#[async_trait]
impl ResourceWithImportState for NetworkPortAttachResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let id = request.id.as_str();
        let result = match ids::decode_triple(id) {
            Ok(_) => self
                .read_port(&import_seed(id))
                .await
                .and_then(|state| state.ok_or_else(|| missing_on_import("network port", id))),
            Err(e) => Err(invalid_import_id(
                e,
                "<cloud_instance_id>/<network_name>/<port_id>",
            )),
        };
        import_response(&request.type_name, result)
    }
}

#[cfg(test)]
#[path = "./resource_network_port_attach_test.rs"]
mod resource_network_port_attach_test;
