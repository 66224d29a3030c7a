//! Unattached network port resource, superseded by `ppc_network_port_attach`

use super::{
    api_error, attr, configure_response, import_response, import_seed, invalid_id,
    invalid_import_id, missing_on_import, not_configured, put, required_string, state_id,
    timeouts_attribute, validate_config, wait_error, Timeouts, CLOUD_INSTANCE_ID,
};
use crate::api::networks::{CreatePortRequest, NetworkPort};
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

pub(crate) const NETWORK_NAME: &str = "ppc_network_name";
pub(crate) const PORT_DESCRIPTION: &str = "ppc_network_port_description";
pub(crate) const PORT_IP_ADDRESS: &str = "ppc_network_port_ipaddress";

pub(crate) const PORT_DOWN: &str = "DOWN";
pub(crate) const PORT_BUILD: &str = "build";

const DEFAULT_TIMEOUTS: Timeouts = Timeouts::minutes(60, 60, 60);

#[derive(Default)]
pub struct NetworkPortResource {
    provider_data: Option<PpcProviderData>,
}

impl NetworkPortResource {
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
            .description("Creates a network port that is not attached to an instance")
            .deprecated()
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
                AttributeBuilder::new(NETWORK_NAME, AttributeType::String)
                    .description("Network the port is created on")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(PORT_DESCRIPTION, AttributeType::String)
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(PORT_IP_ADDRESS, AttributeType::String)
                    .description("Fixed address for the port, assigned by the platform when absent")
                    .optional()
                    .computed()
                    .force_new()
                    .build(),
            )
            .attribute(computed("macaddress", "MAC address of the port"))
            .attribute(computed("portid", "Port ID"))
            .attribute(computed("status", "Port status"))
            .attribute(computed("public_ip", "External address of the port"))
            .attribute(timeouts_attribute())
            .build()
    }

    async fn create_port(
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

        let body = CreatePortRequest {
            description: plan
                .get_optional_string(&attr(PORT_DESCRIPTION))
                .unwrap_or_default(),
            ip_address: plan.get_optional_string(&attr(PORT_IP_ADDRESS)),
        };

        let port = data
            .client
            .cloud(&cloud)
            .networks()
            .create_port(&network, &body)
            .await
            .map_err(|e| api_error("Failed to create network port", e))?;

        let id = ids::encode(&[&cloud, &network, &port.port_id]).map_err(invalid_id)?;
        put(state, "id", id.as_str());
        tracing::info!("Created network port {}", id);

        let port = wait_for_port_down(&ctx, data, &cloud, &network, &port.port_id, timeouts.create)
            .await
            .map_err(|e| wait_error("Failed waiting for network port", e))?;

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

    async fn delete_port(&self, prior: &DynamicValue) -> Result<(), Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let id = state_id(prior)?;
        delete_port_by_id(data, &id).await
    }
}

/// Deletes the port named by a `cloud/network/port` id, a missing port
/// counts as deleted
pub(crate) async fn delete_port_by_id(data: &PpcProviderData, id: &str) -> Result<(), Diagnostic> {
    let (cloud, network, port_id) = ids::decode_triple(id).map_err(invalid_id)?;

    match data
        .client
        .cloud(&cloud)
        .networks()
        .delete_port(&network, &port_id)
        .await
    {
        Ok(_) => Ok(()),
        Err(e) if e.is_not_found() => {
            tracing::debug!("Network port {} already deleted", id);
            Ok(())
        }
        Err(e) => Err(api_error("Failed to delete network port", e)),
    }
}

/// Waits for a freshly created port to settle in DOWN
pub(crate) async fn wait_for_port_down(
    ctx: &Context,
    data: &PpcProviderData,
    cloud: &str,
    network: &str,
    port_id: &str,
    timeout: Duration,
) -> Result<Option<NetworkPort>, WaitError> {
    let waiter = Waiter::new(&[PORT_BUILD], &[PORT_DOWN])?
        .delay(Duration::from_secs(10))
        .poll_interval(Duration::from_secs(10))
        .timeout(timeout);
    let api = data.client.cloud(cloud);
    let api = &api;

    data.tune(waiter)
        .wait(ctx, move || async move {
            let port = api.networks().get_port(network, port_id).await?;
            Ok::<_, ApiError>(down_state(port))
        })
        .await
}

pub(crate) fn down_state(port: NetworkPort) -> Observation<NetworkPort> {
    let state = if port.status() == PORT_DOWN {
        PORT_DOWN
    } else {
        PORT_BUILD
    };
    Observation::new(port, state)
}

fn apply_port(state: &mut DynamicValue, port: &NetworkPort) {
    put(state, "portid", port.port_id.as_str());
    put(state, PORT_DESCRIPTION, port.description.clone());
    put(state, PORT_IP_ADDRESS, port.ip_address.clone());
    put(state, "macaddress", port.mac_address.clone());
    put(state, "status", port.status.clone());
    put(state, "public_ip", port.external_ip.clone());
}

#[async_trait]
impl Resource for NetworkPortResource {
    fn type_name(&self) -> &str {
        "ppc_network_port"
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
        diagnostics.push(Diagnostic::warning(
            "Deprecated resource",
            "ppc_network_port is deprecated, use ppc_network_port_attach to create and attach a port",
        ));
        ValidateResourceConfigResponse { diagnostics }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let mut diagnostics = vec![];
        let mut new_state = request.planned_state.clone();

        if let Err(diag) = self
            .create_port(&ctx, &request.planned_state, &mut new_state)
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

        if let Err(diag) = self.delete_port(&request.prior_state).await {
            diagnostics.push(diag);
        }

        DeleteResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithConfigure for NetworkPortResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        configure_response(&mut self.provider_data, request.provider_data)
    }
}

#[async_trait]
impl ResourceWithImportState for NetworkPortResource {
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
#[path = "./resource_network_port_test.rs"]
mod resource_network_port_test;
