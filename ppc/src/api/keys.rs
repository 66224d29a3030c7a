//! SSH key API
//!
//! Keys are addressed by name rather than by a generated id.

use crate::api::common::{segment, Empty};
use crate::api::{error::ApiError, Client};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub struct KeysApi<'a> {
    client: &'a Client,
    base: String,
}

impl<'a> KeysApi<'a> {
    pub fn new(client: &'a Client, cloud_path: String) -> Self {
        Self {
            client,
            base: format!("{}/sshkeys", cloud_path),
        }
    }

    /// GET /sshkeys
    pub async fn list(&self) -> Result<Vec<SshKey>, ApiError> {
        let list: SshKeyList = self.client.get(&self.base).await?;
        Ok(list.ssh_keys)
    }

    /// GET /sshkeys/{name}
    pub async fn get(&self, name: &str) -> Result<SshKey, ApiError> {
        let path = format!("{}/{}", self.base, segment(name));
        self.client.get(&path).await
    }

    /// POST /sshkeys
    pub async fn create(&self, name: &str, ssh_key: &str) -> Result<SshKey, ApiError> {
        let body = SshKey {
            name: name.to_string(),
            ssh_key: ssh_key.to_string(),
            creation_date: None,
        };
        self.client.post(&self.base, &body).await
    }

    /// DELETE /sshkeys/{name}
    pub async fn delete(&self, name: &str) -> Result<Empty, ApiError> {
        let path = format!("{}/{}", self.base, segment(name));
        self.client.delete(&path).await
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SshKeyList {
    #[serde(default)]
    ssh_keys: Vec<SshKey>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SshKey {
    pub name: String,
    #[serde(rename = "sshKey")]
    pub ssh_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<DateTime<Utc>>,
}

impl SshKey {
    /// RFC 3339 creation timestamp, empty when the server omitted it
    pub fn creation_date_string(&self) -> String {
        self.creation_date
            .map(|d| d.to_rfc3339())
            .unwrap_or_default()
    }
}
