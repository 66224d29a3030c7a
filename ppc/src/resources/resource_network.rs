//! Private and public VLAN network resource

use super::{
    api_error, attr, configure_response, import_response, import_seed, invalid_id,
    invalid_import_id, missing_on_import, not_configured, put, put_strings, required_string,
    state_id, timeouts_attribute, validate_config, wait_error, Timeouts, CLOUD_INSTANCE_ID,
};
use crate::api::networks::{CreateNetworkRequest, IpAddressRange, Network, UpdateNetworkRequest};
use crate::api::ApiError;
use crate::ids;
use crate::provider_data::PpcProviderData;
use crate::waiter::{Observation, WaitError, Waiter};
use async_trait::async_trait;
use std::collections::HashMap;
use std::net::Ipv4Addr;
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
use tfplug::validator::StringOneOf;

const NETWORK_TYPE: &str = "ppc_network_type";
const NETWORK_NAME: &str = "ppc_network_name";
const DNS: &str = "ppc_dns";
const CIDR: &str = "ppc_cidr";
const GATEWAY: &str = "ppc_gateway";
const MTU: &str = "ppc_network_mtu";
const IP_RANGES: &str = "ppc_ipaddress_range";
const RANGE_START: &str = "ppc_starting_ip_address";
const RANGE_END: &str = "ppc_ending_ip_address";

const TYPE_VLAN: &str = "vlan";

const NETWORK_READY: &str = "NETWORK_READY";
const NETWORK_BUILD: &str = "BUILD";

const DEFAULT_TIMEOUTS: Timeouts = Timeouts::minutes(60, 60, 60);

/// Addresses derived from a CIDR when the configuration leaves them out
#[derive(Debug, Clone, PartialEq)]
pub struct IpData {
    pub gateway: String,
    pub range: IpAddressRange,
}

/// Usable host count per prefix length. Prefixes outside the table fall
/// back to 2^(32 - prefix).
fn subnet_size(prefix: u32) -> u64 {
    match prefix {
        21 => 2048,
        22 => 1024,
        23 => 512,
        24 => 256,
        25 => 128,
        26 => 64,
        27 => 32,
        28 => 16,
        29 => 8,
        30 => 4,
        31 => 2,
        other => 1u64 << (32 - other),
    }
}

/// Gateway on host 1, range from host 4 to host size - 2. The first hosts
/// are reserved by the platform.
pub fn ip_data_from_cidr(cidr: &str) -> Result<IpData, Diagnostic> {
    let invalid = |detail: String| {
        Diagnostic::error("Invalid CIDR", detail).with_attribute(attr(CIDR))
    };

    let (address, prefix) = cidr
        .split_once('/')
        .ok_or_else(|| invalid(format!("'{}' is not in address/prefix form", cidr)))?;
    let address: Ipv4Addr = address
        .parse()
        .map_err(|e| invalid(format!("'{}' has an invalid address: {}", cidr, e)))?;
    let prefix: u32 = prefix
        .parse()
        .ok()
        .filter(|p| *p <= 32)
        .ok_or_else(|| invalid(format!("'{}' has an invalid prefix length", cidr)))?;

    let mask = if prefix == 0 { 0 } else { u32::MAX << (32 - prefix) };
    let network = u32::from(address) & mask;
    let size = subnet_size(prefix);

    let host = |index: i64| -> Result<String, Diagnostic> {
        if index < 0 || index as u64 >= size {
            return Err(invalid(format!(
                "host {} is outside of the {} addresses in {}",
                index, size, cidr
            )));
        }
        Ok(Ipv4Addr::from(network + index as u32).to_string())
    };

    Ok(IpData {
        gateway: host(1)?,
        range: IpAddressRange {
            starting_ip_address: host(4)?,
            ending_ip_address: host(size as i64 - 2)?,
        },
    })
}

#[derive(Default)]
pub struct NetworkResource {
    provider_data: Option<PpcProviderData>,
}

impl NetworkResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_static() -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Manages a network in a cloud instance")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("Composite identifier <cloud_instance_id>/<network_id>")
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(CLOUD_INSTANCE_ID, AttributeType::String)
                    .description("The cloud instance the network lives in")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(NETWORK_TYPE, AttributeType::String)
                    .description("vlan for private networks, pub-vlan for public ones")
                    .required()
                    .force_new()
                    .validator(StringOneOf::create(&[TYPE_VLAN, "pub-vlan"]))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(NETWORK_NAME, AttributeType::String)
                    .description("Name of the network")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(DNS, AttributeType::string_set())
                    .description("DNS servers")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(CIDR, AttributeType::String)
                    .description("Network address range, required for vlan networks")
                    .optional()
                    .computed()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(GATEWAY, AttributeType::String)
                    .description("Gateway address, host 1 of the CIDR by default")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(MTU, AttributeType::Number)
                    .description("Maximum transmission unit")
                    .optional()
                    .computed()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(
                    IP_RANGES,
                    AttributeType::object_list(&[
                        (RANGE_START, AttributeType::String),
                        (RANGE_END, AttributeType::String),
                    ]),
                )
                .description("Assignable address ranges")
                .optional()
                .computed()
                .build(),
            )
            .attribute(
                AttributeBuilder::new("network_id", AttributeType::String)
                    .description("Network ID")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("vlan_id", AttributeType::Number)
                    .description("VLAN assigned by the platform")
                    .computed()
                    .build(),
            )
            .attribute(timeouts_attribute())
            .build()
    }

    async fn create_network(
        &self,
        ctx: &Context,
        plan: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Result<(), Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let timeouts = DEFAULT_TIMEOUTS.resolve(plan)?;
        let ctx = ctx.with_timeout(timeouts.create);
        let cloud = required_string(plan, CLOUD_INSTANCE_ID)?;
        let body = network_request(plan)?;
        let api = data.client.cloud(&cloud);

        let network = api
            .networks()
            .create(&body)
            .await
            .map_err(|e| api_error("Failed to create network", e))?;

        let id = ids::encode(&[&cloud, &network.network_id]).map_err(invalid_id)?;
        put(state, "id", id.as_str());
        put(state, "network_id", network.network_id.as_str());
        tracing::info!("Created network {}", id);

        let ready = wait_for_ready(&ctx, data, &cloud, &network.network_id, timeouts.create)
            .await
            .map_err(|e| wait_error("Failed waiting for network to become ready", e))?;

        if let Some(network) = ready {
            apply_network(state, &cloud, &network);
        }
        Ok(())
    }

    async fn read_network(&self, current: &DynamicValue) -> Result<Option<DynamicValue>, Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let id = state_id(current)?;
        let (cloud, network_id) = ids::decode_pair(&id).map_err(invalid_id)?;

        match data.client.cloud(&cloud).networks().get(&network_id).await {
            Ok(network) => {
                let mut state = current.clone();
                apply_network(&mut state, &cloud, &network);
                Ok(Some(state))
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!("Network {} no longer exists, removing from state", id);
                Ok(None)
            }
            Err(e) => Err(api_error("Failed to read network", e)),
        }
    }

    async fn update_network(
        &self,
        prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> Result<DynamicValue, Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let id = state_id(prior)?;
        let (cloud, network_id) = ids::decode_pair(&id).map_err(invalid_id)?;
        let api = data.client.cloud(&cloud);

        if let Some(body) = update_body(prior, planned) {
            api.networks()
                .update(&network_id, &body)
                .await
                .map_err(|e| api_error("Failed to update network", e))?;
        }

        let network = api
            .networks()
            .get(&network_id)
            .await
            .map_err(|e| api_error("Failed to read network", e))?;
        let mut state = planned.clone();
        put(&mut state, "id", id.as_str());
        apply_network(&mut state, &cloud, &network);
        Ok(state)
    }

    async fn delete_network(&self, prior: &DynamicValue) -> Result<(), Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let id = state_id(prior)?;
        let (cloud, network_id) = ids::decode_pair(&id).map_err(invalid_id)?;

        match data.client.cloud(&cloud).networks().delete(&network_id).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                tracing::debug!("Network {} already deleted", id);
                Ok(())
            }
            Err(e) => Err(api_error("Failed to delete network", e)),
        }
    }
}

fn configured_ranges(config: &DynamicValue) -> Vec<IpAddressRange> {
    config
        .get_list(&attr(IP_RANGES))
        .unwrap_or_default()
        .into_iter()
        .filter_map(|item| match item {
            Dynamic::Map(fields) => Some(IpAddressRange {
                starting_ip_address: fields.get(RANGE_START).and_then(Dynamic::as_str)?.to_string(),
                ending_ip_address: fields.get(RANGE_END).and_then(Dynamic::as_str)?.to_string(),
            }),
            _ => None,
        })
        .collect()
}

/// Create body. vlan networks need a CIDR, the gateway and ranges derived
/// from it give way to configured values.
pub(crate) fn network_request(plan: &DynamicValue) -> Result<CreateNetworkRequest, Diagnostic> {
    let network_type = required_string(plan, NETWORK_TYPE)?;

    let mut body = CreateNetworkRequest {
        name: required_string(plan, NETWORK_NAME)?,
        type_: network_type.clone(),
        dns_servers: plan.get_string_list(&attr(DNS)).unwrap_or_default(),
        mtu: plan.get_optional_number(&attr(MTU)).map(|mtu| mtu as i64),
        ..Default::default()
    };

    if network_type == TYPE_VLAN {
        let cidr = plan.get_optional_string(&attr(CIDR)).ok_or_else(|| {
            Diagnostic::error(
                "Missing CIDR",
                format!("{} is required when {} is vlan", CIDR, NETWORK_TYPE),
            )
            .with_attribute(attr(CIDR))
        })?;

        let derived = ip_data_from_cidr(&cidr)?;
        let ranges = configured_ranges(plan);

        body.gateway = Some(
            plan.get_optional_string(&attr(GATEWAY))
                .unwrap_or(derived.gateway),
        );
        body.ip_address_ranges = if ranges.is_empty() {
            vec![derived.range]
        } else {
            ranges
        };
        body.cidr = Some(cidr);
    }

    Ok(body)
}

/// `None` when nothing the API can change in place differs
pub(crate) fn update_body(prior: &DynamicValue, planned: &DynamicValue) -> Option<UpdateNetworkRequest> {
    let changed = |name: &str| prior.differs_at(planned, &attr(name));
    if ![NETWORK_NAME, DNS, GATEWAY, IP_RANGES].iter().any(|name| changed(name)) {
        return None;
    }

    let mut body = UpdateNetworkRequest {
        dns_servers: planned.get_string_list(&attr(DNS)).unwrap_or_default(),
        ..Default::default()
    };
    if planned.get_optional_string(&attr(NETWORK_TYPE)).as_deref() == Some(TYPE_VLAN) {
        body.gateway = planned.get_optional_string(&attr(GATEWAY));
        let ranges = configured_ranges(planned);
        body.ip_address_ranges = (!ranges.is_empty()).then_some(ranges);
    }
    if changed(NETWORK_NAME) {
        body.name = planned.get_optional_string(&attr(NETWORK_NAME));
    }
    Some(body)
}

async fn wait_for_ready(
    ctx: &Context,
    data: &PpcProviderData,
    cloud: &str,
    network_id: &str,
    timeout: Duration,
) -> Result<Option<Network>, WaitError> {
    let waiter = Waiter::new(&[NETWORK_BUILD], &[NETWORK_READY])?
        .delay(Duration::from_secs(10))
        .poll_interval(Duration::from_secs(10))
        .timeout(timeout);
    let api = data.client.cloud(cloud);
    let api = &api;

    data.tune(waiter)
        .wait(ctx, move || async move {
            let network = api.networks().get(network_id).await?;
            Ok::<_, ApiError>(ready_state(network))
        })
        .await
}

/// Ready once the platform has assigned a VLAN
pub(crate) fn ready_state(network: Network) -> Observation<Network> {
    if network.vlan_id.is_some() {
        Observation::new(network, NETWORK_READY)
    } else {
        Observation::new(network, NETWORK_BUILD)
    }
}

fn apply_network(state: &mut DynamicValue, cloud: &str, network: &Network) {
    put(state, CLOUD_INSTANCE_ID, cloud);
    put(state, "network_id", network.network_id.as_str());
    put(state, NETWORK_NAME, network.name.clone());
    put(state, NETWORK_TYPE, network.type_.clone());
    put(state, CIDR, network.cidr.clone());
    put(state, GATEWAY, network.gateway.clone());
    put(state, MTU, network.mtu.map(|mtu| mtu as f64));
    put(state, "vlan_id", network.vlan_id);
    put_strings(state, DNS, &network.dns_servers);

    let ranges = network
        .ip_address_ranges
        .iter()
        .map(|range| {
            Dynamic::Map(HashMap::from([
                (RANGE_START.to_string(), range.starting_ip_address.as_str().into()),
                (RANGE_END.to_string(), range.ending_ip_address.as_str().into()),
            ]))
        })
        .collect();
    put(state, IP_RANGES, Dynamic::List(ranges));
}

#[async_trait]
impl Resource for NetworkResource {
    fn type_name(&self) -> &str {
        "ppc_network"
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

        if let Some(cidr) = request.config.get_optional_string(&attr(CIDR)) {
            if let Err(diag) = ip_data_from_cidr(&cidr) {
                diagnostics.push(diag);
            }
        }

        ValidateResourceConfigResponse { diagnostics }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let mut diagnostics = vec![];
        let mut new_state = request.planned_state.clone();

        if let Err(diag) = self
            .create_network(&ctx, &request.planned_state, &mut new_state)
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

        let new_state = match self.read_network(&request.current_state).await {
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
        let mut diagnostics = vec![];

        let new_state = match self
            .update_network(&request.prior_state, &request.planned_state)
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

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let mut diagnostics = vec![];

        if let Err(diag) = self.delete_network(&request.prior_state).await {
            diagnostics.push(diag);
        }

        DeleteResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithConfigure for NetworkResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        configure_response(&mut self.provider_data, request.provider_data)
    }
}

#[async_trait]
impl ResourceWithImportState for NetworkResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let id = request.id.as_str();
        let result = match ids::decode_pair(id) {
            Ok(_) => self
                .read_network(&import_seed(id))
                .await
                .and_then(|state| state.ok_or_else(|| missing_on_import("network", id))),
            Err(e) => Err(invalid_import_id(e, "<cloud_instance_id>/<network_id>")),
        };
        import_response(&request.type_name, result)
    }
}

#[cfg(test)]
#[path = "./resource_network_test.rs"]
mod resource_network_test;
