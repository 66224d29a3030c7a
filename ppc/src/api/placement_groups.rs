//! Placement group API

use crate::api::common::{segment, Empty};
use crate::api::{error::ApiError, Client};
use serde::{Deserialize, Serialize};

/// Error text returned when removing an instance that is not a member
pub const NOT_A_MEMBER: &str = "is not part of placement-group";

pub struct PlacementGroupsApi<'a> {
    client: &'a Client,
    base: String,
}

impl<'a> PlacementGroupsApi<'a> {
    pub fn new(client: &'a Client, cloud_path: String) -> Self {
        Self {
            client,
            base: format!("{}/placement-groups", cloud_path),
        }
    }

    fn group_path(&self, group: &str) -> String {
        format!("{}/{}", self.base, segment(group))
    }

    /// GET /placement-groups
    pub async fn list(&self) -> Result<Vec<PlacementGroup>, ApiError> {
        let list: PlacementGroupList = self.client.get(&self.base).await?;
        Ok(list.placement_groups)
    }

    /// GET /placement-groups/{id}, also accepts the group name
    pub async fn get(&self, group: &str) -> Result<PlacementGroup, ApiError> {
        self.client.get(&self.group_path(group)).await
    }

    /// POST /placement-groups
    pub async fn create(&self, name: &str, policy: &str) -> Result<PlacementGroup, ApiError> {
        let body = CreatePlacementGroupRequest {
            name: name.to_string(),
            policy: policy.to_string(),
        };
        self.client.post(&self.base, &body).await
    }

    /// DELETE /placement-groups/{id}
    pub async fn delete(&self, group_id: &str) -> Result<Empty, ApiError> {
        self.client.delete(&self.group_path(group_id)).await
    }

    /// POST /placement-groups/{id}/members
    pub async fn add_member(&self, group_id: &str, instance_id: &str) -> Result<PlacementGroup, ApiError> {
        let path = format!("{}/members", self.group_path(group_id));
        self.client
            .post(
                &path,
                &MemberRequest {
                    id: instance_id.to_string(),
                },
            )
            .await
    }

    /// DELETE /placement-groups/{id}/members
    pub async fn remove_member(&self, group_id: &str, instance_id: &str) -> Result<PlacementGroup, ApiError> {
        let path = format!("{}/members", self.group_path(group_id));
        self.client
            .delete_with_body(
                &path,
                &MemberRequest {
                    id: instance_id.to_string(),
                },
            )
            .await
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlacementGroupList {
    #[serde(default)]
    placement_groups: Vec<PlacementGroup>,
}

#[derive(Debug, Serialize)]
struct CreatePlacementGroupRequest {
    name: String,
    policy: String,
}

#[derive(Debug, Serialize)]
struct MemberRequest {
    id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlacementGroup {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub policy: Option<String>,
    #[serde(default)]
    pub members: Vec<String>,
}
