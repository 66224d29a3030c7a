//! Image catalog API

use crate::api::common::{segment, Empty, JobReference, StorageAffinity};
use crate::api::{error::ApiError, Client};
use serde::{Deserialize, Serialize};

/// Image type that allows a license repository capacity on the instance
pub const IMAGE_TYPE_STOCK_VTL: &str = "stock-vtl";

pub struct ImagesApi<'a> {
    client: &'a Client,
    cloud_path: String,
}

impl<'a> ImagesApi<'a> {
    pub fn new(client: &'a Client, cloud_path: String) -> Self {
        Self { client, cloud_path }
    }

    fn image_path(&self, image: &str) -> String {
        format!("{}/images/{}", self.cloud_path, segment(image))
    }

    /// GET /images/{id}, also accepts the image name
    pub async fn get(&self, image: &str) -> Result<Image, ApiError> {
        self.client.get(&self.image_path(image)).await
    }

    /// GET /stock-images/{id}
    pub async fn get_stock(&self, image_id: &str) -> Result<Image, ApiError> {
        let path = format!("{}/stock-images/{}", self.cloud_path, segment(image_id));
        self.client.get(&path).await
    }

    /// POST /images, copies a stock image into the cloud instance
    pub async fn create(&self, request: &CopyImageRequest) -> Result<Image, ApiError> {
        let path = format!("{}/images", self.cloud_path);
        self.client.post(&path, request).await
    }

    /// POST /cos-images
    pub async fn import_from_cos(&self, request: &CosImportRequest) -> Result<JobReference, ApiError> {
        let path = format!("{}/cos-images", self.cloud_path);
        self.client.post(&path, request).await
    }

    /// POST /images/{id}/export
    pub async fn export(&self, image_id: &str, request: &ExportImageRequest) -> Result<JobReference, ApiError> {
        let path = format!("{}/export", self.image_path(image_id));
        self.client.post(&path, request).await
    }

    /// DELETE /images/{id}
    pub async fn delete(&self, image_id: &str) -> Result<Empty, ApiError> {
        self.client.delete(&self.image_path(image_id)).await
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSpecifications {
    #[serde(default)]
    pub image_type: Option<String>,
    #[serde(default)]
    pub operating_system: Option<String>,
    #[serde(default)]
    pub architecture: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    #[serde(rename = "imageID")]
    pub image_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub storage_type: Option<String>,
    #[serde(default)]
    pub storage_pool: Option<String>,
    #[serde(default)]
    pub specifications: Option<ImageSpecifications>,
}

impl Image {
    pub fn state(&self) -> &str {
        self.state.as_deref().unwrap_or_default()
    }

    pub fn image_type(&self) -> Option<&str> {
        self.specifications
            .as_ref()
            .and_then(|s| s.image_type.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyImageRequest {
    pub image_name: String,
    #[serde(rename = "imageID")]
    pub image_id: String,
    pub source: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CosImportRequest {
    pub image_name: String,
    pub bucket_name: String,
    pub bucket_access: String,
    pub image_filename: String,
    pub region: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_pool: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_affinity: Option<StorageAffinity>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportImageRequest {
    pub bucket_name: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::create_test_client;
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn test_stock_image_type() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/ppc/v1/cloud-instances/cloud-1/stock-images/vtl-1")
            .with_status(200)
            .with_body(
                r#"{"imageID": "vtl-1", "name": "VTL", "state": "active",
                    "specifications": {"imageType": "stock-vtl"}}"#,
            )
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let image = client.cloud("cloud-1").images().get_stock("vtl-1").await.unwrap();

        assert_eq!(image.image_type(), Some(IMAGE_TYPE_STOCK_VTL));
        assert_eq!(image.state(), "active");
    }

    #[tokio::test]
    async fn test_cos_import_returns_job() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/ppc/v1/cloud-instances/cloud-1/cos-images")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "imageName": "rhel",
                "bucketName": "images",
                "bucketAccess": "public",
                "imageFilename": "rhel.ova.gz",
                "region": "us-east"
            })))
            .with_status(202)
            .with_body(r#"{"id": "job-1"}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let job = client
            .cloud("cloud-1")
            .images()
            .import_from_cos(&CosImportRequest {
                image_name: "rhel".to_string(),
                bucket_name: "images".to_string(),
                bucket_access: "public".to_string(),
                image_filename: "rhel.ova.gz".to_string(),
                region: "us-east".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        m.assert_async().await;
        assert_eq!(job.id, "job-1");
    }
}
