//! Common types and utilities for the PPC API

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

/// Error body returned by the control plane
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub description: Option<String>,
    pub error: Option<String>,
    pub code: Option<i64>,
}

#[derive(Debug, thiserror::Error)]
#[error("API error details: error={error:?}, description={description:?}, code={code:?}")]
pub struct ApiErrorDetails {
    pub description: Option<String>,
    pub error: Option<String>,
    pub code: Option<i64>,
}

/// Body-less responses such as `{}` on delete
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Empty {}

/// Asynchronous job reference returned by long running operations
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReference {
    pub id: String,
    #[serde(default)]
    pub href: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ApiQueryParams {
    params: Vec<(String, String)>,
}

impl ApiQueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<K: Into<String>, V: ToString>(mut self, key: K, value: V) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    pub fn add_optional<K: Into<String>, V: ToString>(mut self, key: K, value: Option<V>) -> Self {
        if let Some(v) = value {
            self.params.push((key.into(), v.to_string()));
        }
        self
    }

    pub fn to_query_string(&self) -> String {
        if self.params.is_empty() {
            String::new()
        } else {
            format!(
                "?{}",
                self.params
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
                    .collect::<Vec<_>>()
                    .join("&")
            )
        }
    }
}

/// Percent-encodes a path segment taken from user input
pub fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Storage placement rules shared by instance, image and volume creation
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StorageAffinity {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affinity_policy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affinity_volume: Option<String>,
    #[serde(rename = "affinityPVMInstance", skip_serializing_if = "Option::is_none")]
    pub affinity_pvm_instance: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub anti_affinity_volumes: Vec<String>,
    #[serde(
        rename = "antiAffinityPVMInstances",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub anti_affinity_pvm_instances: Vec<String>,
}

/// Network to attach at instance creation
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkAttachment {
    #[serde(rename = "networkID")]
    pub network_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}
