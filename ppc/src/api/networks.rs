//! Network and network port API

use crate::api::common::{segment, Empty};
use crate::api::{error::ApiError, Client};
use serde::{Deserialize, Serialize};

pub struct NetworksApi<'a> {
    client: &'a Client,
    base: String,
}

impl<'a> NetworksApi<'a> {
    pub fn new(client: &'a Client, cloud_path: String) -> Self {
        Self {
            client,
            base: format!("{}/networks", cloud_path),
        }
    }

    fn network_path(&self, network: &str) -> String {
        format!("{}/{}", self.base, segment(network))
    }

    fn port_path(&self, network: &str, port_id: &str) -> String {
        format!("{}/ports/{}", self.network_path(network), segment(port_id))
    }

    /// GET /networks/{id}
    pub async fn get(&self, network_id: &str) -> Result<Network, ApiError> {
        self.client.get(&self.network_path(network_id)).await
    }

    /// POST /networks
    pub async fn create(&self, request: &CreateNetworkRequest) -> Result<Network, ApiError> {
        self.client.post(&self.base, request).await
    }

    /// PUT /networks/{id}
    pub async fn update(&self, network_id: &str, request: &UpdateNetworkRequest) -> Result<Network, ApiError> {
        self.client.put(&self.network_path(network_id), request).await
    }

    /// DELETE /networks/{id}
    pub async fn delete(&self, network_id: &str) -> Result<Empty, ApiError> {
        self.client.delete(&self.network_path(network_id)).await
    }

    /// GET /networks/{network}/ports/{port}, network may be a name or an id
    pub async fn get_port(&self, network: &str, port_id: &str) -> Result<NetworkPort, ApiError> {
        self.client.get(&self.port_path(network, port_id)).await
    }

    /// POST /networks/{network}/ports
    pub async fn create_port(
        &self,
        network: &str,
        request: &CreatePortRequest,
    ) -> Result<NetworkPort, ApiError> {
        let path = format!("{}/ports", self.network_path(network));
        self.client.post(&path, request).await
    }

    /// PUT /networks/{network}/ports/{port}
    pub async fn update_port(
        &self,
        network: &str,
        port_id: &str,
        request: &UpdatePortRequest,
    ) -> Result<NetworkPort, ApiError> {
        self.client.put(&self.port_path(network, port_id), request).await
    }

    /// DELETE /networks/{network}/ports/{port}
    pub async fn delete_port(&self, network: &str, port_id: &str) -> Result<Empty, ApiError> {
        self.client.delete(&self.port_path(network, port_id)).await
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IpAddressRange {
    #[serde(rename = "startingIPAddress")]
    pub starting_ip_address: String,
    #[serde(rename = "endingIPAddress")]
    pub ending_ip_address: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Network {
    #[serde(rename = "networkID")]
    pub network_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub type_: Option<String>,
    #[serde(rename = "vlanID", default)]
    pub vlan_id: Option<f64>,
    #[serde(default)]
    pub cidr: Option<String>,
    #[serde(default)]
    pub gateway: Option<String>,
    #[serde(default)]
    pub dns_servers: Vec<String>,
    #[serde(default)]
    pub mtu: Option<i64>,
    #[serde(rename = "ipAddressRanges", default)]
    pub ip_address_ranges: Vec<IpAddressRange>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNetworkRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dns_servers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtu: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cidr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    #[serde(rename = "ipAddressRanges", skip_serializing_if = "Vec::is_empty")]
    pub ip_address_ranges: Vec<IpAddressRange>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNetworkRequest {
    pub dns_servers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    #[serde(rename = "ipAddressRanges", skip_serializing_if = "Option::is_none")]
    pub ip_address_ranges: Option<Vec<IpAddressRange>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortInstance {
    #[serde(rename = "pvmInstanceID", default)]
    pub pvm_instance_id: Option<String>,
    #[serde(default)]
    pub href: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkPort {
    #[serde(rename = "portID")]
    pub port_id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub mac_address: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(rename = "externalIP", default)]
    pub external_ip: Option<String>,
    #[serde(default)]
    pub pvm_instance: Option<PortInstance>,
}

impl NetworkPort {
    pub fn status(&self) -> &str {
        self.status.as_deref().unwrap_or_default()
    }

    /// Instance the port is attached to, if any
    pub fn instance_id(&self) -> Option<&str> {
        self.pvm_instance
            .as_ref()
            .and_then(|p| p.pvm_instance_id.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePortRequest {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdatePortRequest {
    pub description: String,
    #[serde(rename = "pvmInstanceID")]
    pub pvm_instance_id: String,
}
