//! The address an instance holds on one network

use super::{cloud_attribute, configure_response, id_attribute, read_response, required_input};
use crate::api::instances::InstanceNetwork;
use crate::provider_data::PpcProviderData;
use crate::resources::{api_error, not_configured, put, required_string, CLOUD_INSTANCE_ID};
use async_trait::async_trait;
use std::net::Ipv4Addr;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceMetadataRequest,
    DataSourceMetadataResponse, DataSourceSchemaRequest, DataSourceSchemaResponse,
    DataSourceWithConfigure, ReadDataSourceRequest, ReadDataSourceResponse,
    ValidateDataSourceConfigRequest, ValidateDataSourceConfigResponse,
};
use tfplug::schema::{Attribute, AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{Diagnostic, DynamicValue};

const INSTANCE_NAME: &str = "ppc_instance_name";
const NETWORK_NAME: &str = "ppc_network_name";

#[derive(Default)]
pub struct InstanceIpDataSource {
    provider_data: Option<PpcProviderData>,
}

/// Last octet of an IPv4 address, `None` for anything else
pub(crate) fn ip_octet(ip: &str) -> Option<String> {
    ip.parse::<Ipv4Addr>()
        .ok()
        .map(|addr| addr.octets()[3].to_string())
}

fn computed_string(name: &str, description: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .description(description)
        .computed()
        .build()
}

impl InstanceIpDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_static() -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Reads the IP address of an instance on a network")
            .attribute(id_attribute())
            .attribute(cloud_attribute())
            .attribute(required_input(INSTANCE_NAME, "Name or ID of the instance"))
            .attribute(required_input(NETWORK_NAME, "Name of the network"))
            .attribute(computed_string("ip", "IP address"))
            .attribute(computed_string("ipoctet", "Last octet of the IP address"))
            .attribute(computed_string("macaddress", "MAC address"))
            .attribute(computed_string("network_id", "Network ID"))
            .attribute(computed_string("type", "Address type"))
            .attribute(computed_string("external_ip", "External IP address"))
            .build()
    }

    async fn read_ip(&self, config: &DynamicValue) -> Result<DynamicValue, Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let cloud = required_string(config, CLOUD_INSTANCE_ID)?;
        let instance_name = required_string(config, INSTANCE_NAME)?;
        let network_name = required_string(config, NETWORK_NAME)?;

        let instance = data
            .client
            .cloud(&cloud)
            .instances()
            .get(&instance_name)
            .await
            .map_err(|e| api_error("Failed to read instance", e))?;

        let network = instance
            .networks
            .iter()
            .find(|n| n.network_name.as_deref() == Some(network_name.as_str()))
            .ok_or_else(|| {
                Diagnostic::error(
                    "Failed to read instance IP",
                    "failed to find instance ip that belongs to the given network",
                )
            })?;
        tracing::debug!(
            "Instance {} has {:?} on network {}",
            instance_name,
            network.ip_address,
            network_name
        );

        let mut state = config.clone();
        apply_network(&mut state, network);
        Ok(state)
    }
}

fn apply_network(state: &mut DynamicValue, network: &InstanceNetwork) {
    put(state, "id", network.network_id.clone());
    put(state, "network_id", network.network_id.clone());
    put(state, "ip", network.ip_address.clone());
    put(state, "ipoctet", network.ip_address.as_deref().and_then(ip_octet));
    put(state, "macaddress", network.mac_address.clone());
    put(state, "type", network.type_.clone());
    put(state, "external_ip", network.external_ip.clone());
}

#[async_trait]
impl DataSource for InstanceIpDataSource {
    fn type_name(&self) -> &str {
        "ppc_instance_ip"
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: DataSourceMetadataRequest,
    ) -> DataSourceMetadataResponse {
        DataSourceMetadataResponse {
            type_name: self.type_name().to_string(),
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        DataSourceSchemaResponse {
            schema: Self::schema_static(),
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateDataSourceConfigRequest,
    ) -> ValidateDataSourceConfigResponse {
        ValidateDataSourceConfigResponse {
            diagnostics: Self::schema_static().validate_config(&request.config),
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let result = self.read_ip(&request.config).await;
        read_response(request.config, result)
    }
}

#[async_trait]
impl DataSourceWithConfigure for InstanceIpDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        configure_response(&mut self.provider_data, request.provider_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::test_support::*;
    use mockito::Server;

    const INSTANCE_BODY: &str = r#"{
        "pvmInstanceID": "ins-1",
        "serverName": "web",
        "status": "ACTIVE",
        "networks": [
            {"ipAddress": "10.0.0.5", "macAddress": "fa:16:3e:00:00:01", "networkID": "net-a",
             "networkName": "private", "type": "fixed"},
            {"ipAddress": "192.168.7.42", "macAddress": "fa:16:3e:00:00:02", "networkID": "net-b",
             "networkName": "public", "type": "fixed", "externalIP": "52.1.2.3"}
        ]
    }"#;

    fn config(network: &str) -> DynamicValue {
        object(&[
            (CLOUD_INSTANCE_ID, "cloud-1".into()),
            (INSTANCE_NAME, "web".into()),
            (NETWORK_NAME, network.into()),
        ])
    }

    #[test]
    fn test_ip_octet() {
        assert_eq!(ip_octet("192.168.7.42").as_deref(), Some("42"));
        assert_eq!(ip_octet("10.0.0.0").as_deref(), Some("0"));
        assert_eq!(ip_octet("fe80::1"), None);
        assert_eq!(ip_octet(""), None);
    }

    #[tokio::test]
    async fn test_read_matching_network() {
        let mut server = Server::new_async().await;
        let _get = server
            .mock("GET", "/ppc/v1/cloud-instances/cloud-1/pvm-instances/web")
            .with_status(200)
            .with_body(INSTANCE_BODY)
            .create_async()
            .await;

        let mut data_source = InstanceIpDataSource::new();
        configure_data_source(&mut data_source, &server.url()).await;
        let response = data_source
            .read(Context::new(), data_source_request("ppc_instance_ip", config("public")))
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert_eq!(string_at(&response.state, "id"), "net-b");
        assert_eq!(string_at(&response.state, "ip"), "192.168.7.42");
        assert_eq!(string_at(&response.state, "ipoctet"), "42");
        assert_eq!(string_at(&response.state, "macaddress"), "fa:16:3e:00:00:02");
        assert_eq!(string_at(&response.state, "external_ip"), "52.1.2.3");
    }

    #[tokio::test]
    async fn test_no_matching_network() {
        let mut server = Server::new_async().await;
        let _get = server
            .mock("GET", "/ppc/v1/cloud-instances/cloud-1/pvm-instances/web")
            .with_status(200)
            .with_body(INSTANCE_BODY)
            .create_async()
            .await;

        let mut data_source = InstanceIpDataSource::new();
        configure_data_source(&mut data_source, &server.url()).await;
        let response = data_source
            .read(Context::new(), data_source_request("ppc_instance_ip", config("storage")))
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(
            response.diagnostics[0].detail,
            "failed to find instance ip that belongs to the given network"
        );
    }
}
