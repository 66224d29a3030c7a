#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::resources::test_support::*;
    use mockito::Server;

    const TYPE: &str = "ppc_volume_attach";
    const VOLUME_PATH: &str = "/ppc/v1/cloud-instances/cloud-1/volumes/vol-1";
    const ATTACH_PATH: &str = "/ppc/v1/cloud-instances/cloud-1/pvm-instances/ins-1/volumes/vol-1";

    fn volume(state: &str, shareable: bool, instances: &[&str]) -> Volume {
        Volume {
            volume_id: "vol-1".to_string(),
            state: Some(state.to_string()),
            shareable: Some(shareable),
            pvm_instance_ids: instances.iter().map(|i| i.to_string()).collect(),
            ..Default::default()
        }
    }

    fn volume_body(state: &str, instances: &[&str]) -> String {
        serde_json::json!({
            "volumeID": "vol-1",
            "state": state,
            "shareable": false,
            "pvmInstanceIDs": instances
        })
        .to_string()
    }

    fn planned() -> DynamicValue {
        object(&[
            ("id", tfplug::types::Dynamic::Unknown),
            (CLOUD_INSTANCE_ID, "cloud-1".into()),
            (INSTANCE_ID, "ins-1".into()),
            (VOLUME_ID, "vol-1".into()),
        ])
    }

    fn prior() -> DynamicValue {
        with(&planned(), "id", "cloud-1/ins-1/vol-1")
    }

    async fn configured(url: &str) -> VolumeAttachResource {
        let mut resource = VolumeAttachResource::new();
        configure(&mut resource, url).await;
        resource
    }

    #[test]
    fn test_attach_guard() {
        assert!(check_attachable(&volume("available", false, &[])).is_ok());
        assert!(check_attachable(&volume("in-use", true, &["other"])).is_ok());

        let err = check_attachable(&volume("in-use", false, &["other"])).unwrap_err();
        assert!(err.detail.starts_with("the volume cannot be attached in the current state"));
    }

    #[test]
    fn test_attachment_states() {
        assert_eq!(attached_state(volume("in-use", false, &["ins-1"]), "ins-1").state, "in-use");
        assert_eq!(attached_state(volume("in-use", true, &["other"]), "ins-1").state, "attaching");

        assert_eq!(detached_state(volume("available", false, &[]), "ins-1").state, "detached");
        assert_eq!(detached_state(volume("in-use", true, &["other"]), "ins-1").state, "detached");
        assert_eq!(detached_state(volume("in-use", false, &["ins-1"]), "ins-1").state, "detaching");
    }

    #[tokio::test]
    async fn test_create_refuses_volume_in_use() {
        let mut server = Server::new_async().await;
        let _get = server
            .mock("GET", VOLUME_PATH)
            .with_status(200)
            .with_body(volume_body("in-use", &["other"]))
            .create_async()
            .await;
        let attach = server
            .mock("POST", ATTACH_PATH)
            .expect(0)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .create(Context::new(), create_request(TYPE, planned()))
            .await;

        attach.assert_async().await;
        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].summary, "Failed to attach volume");
    }

    #[tokio::test]
    async fn test_create_attaches_shareable_volume() {
        let mut server = Server::new_async().await;
        let _get = server
            .mock("GET", VOLUME_PATH)
            .with_status(200)
            .with_body(
                serde_json::json!({
                    "volumeID": "vol-1",
                    "state": "in-use",
                    "shareable": true,
                    "pvmInstanceIDs": ["other", "ins-1"]
                })
                .to_string(),
            )
            .create_async()
            .await;
        let attach = server
            .mock("POST", ATTACH_PATH)
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .create(Context::new(), create_request(TYPE, planned()))
            .await;

        attach.assert_async().await;
        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert_eq!(string_at(&response.new_state, "id"), "cloud-1/ins-1/vol-1");
        assert_eq!(string_at(&response.new_state, "status"), "in-use");
    }

    #[tokio::test]
    async fn test_read_missing_attachment() {
        let mut server = Server::new_async().await;
        let _check = server
            .mock("GET", ATTACH_PATH)
            .with_status(404)
            .with_body(r#"{"description": "volume not attached"}"#)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource.read(Context::new(), read_request(TYPE, prior())).await;

        assert!(response.diagnostics.is_empty());
        assert!(response.new_state.is_none());
    }

    #[tokio::test]
    async fn test_read_sets_status() {
        let mut server = Server::new_async().await;
        let _check = server
            .mock("GET", ATTACH_PATH)
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;
        let _get = server
            .mock("GET", VOLUME_PATH)
            .with_status(200)
            .with_body(volume_body("in-use", &["ins-1"]))
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource.read(Context::new(), read_request(TYPE, prior())).await;

        let state = response.new_state.unwrap();
        assert_eq!(string_at(&state, "status"), "in-use");
        assert_eq!(string_at(&state, VOLUME_ID), "vol-1");
    }

    #[tokio::test]
    async fn test_delete_waits_for_detach() {
        let mut server = Server::new_async().await;
        let detach = server
            .mock("DELETE", ATTACH_PATH)
            .with_status(202)
            .with_body("{}")
            .create_async()
            .await;
        let _get = server
            .mock("GET", VOLUME_PATH)
            .with_status(200)
            .with_body(volume_body("available", &[]))
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .delete(Context::new(), delete_request(TYPE, prior()))
            .await;

        detach.assert_async().await;
        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    }

    #[tokio::test]
    async fn test_delete_already_detached() {
        let mut server = Server::new_async().await;
        let _detach = server
            .mock("DELETE", ATTACH_PATH)
            .with_status(404)
            .with_body(r#"{"description": "not found"}"#)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .delete(Context::new(), delete_request(TYPE, prior()))
            .await;

        assert!(response.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn test_import_requires_three_parts() {
        let server = Server::new_async().await;
        let resource = configured(&server.url()).await;

        let response = resource
            .import_state(Context::new(), import_request(TYPE, "cloud-1/vol-1"))
            .await;

        assert_eq!(response.diagnostics[0].summary, "Invalid import ID");
    }
}
