#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::resources::test_support::*;
    use mockito::{Matcher, Server};
    use tfplug::types::has_errors;

    const TYPE: &str = "ppc_volume_group";
    const GROUPS_PATH: &str = "/ppc/v1/cloud-instances/cloud-1/volume-groups";
    const GROUP_PATH: &str = "/ppc/v1/cloud-instances/cloud-1/volume-groups/vg-1";
    const DETAILS_PATH: &str = "/ppc/v1/cloud-instances/cloud-1/volume-groups/vg-1/details";

    fn group_body(status: &str) -> String {
        serde_json::json!({"id": "vg-1", "name": "grp", "status": status}).to_string()
    }

    fn details_body(volumes: &[&str]) -> String {
        serde_json::json!({
            "id": "vg-1",
            "name": "grp",
            "status": "available",
            "replicationStatus": "enabled",
            "consistencyGroupName": "rccg-1",
            "volumeIDs": volumes,
            "statusDescription": {"errors": [
                {"key": "VOLUMEGROUP_WARN", "message": "copy lagging", "volIDs": ["vol-2"]}
            ]}
        })
        .to_string()
    }

    fn strings(items: &[&str]) -> Dynamic {
        Dynamic::string_list(items.iter().copied())
    }

    fn planned() -> DynamicValue {
        object(&[
            ("id", Dynamic::Unknown),
            (CLOUD_INSTANCE_ID, "cloud-1".into()),
            (GROUP_NAME, "grp".into()),
            (VOLUME_IDS, strings(&["vol-1", "vol-2"])),
        ])
    }

    fn prior() -> DynamicValue {
        with(&planned(), "id", "cloud-1/vg-1")
    }

    async fn configured(url: &str) -> VolumeGroupResource {
        let mut resource = VolumeGroupResource::new();
        configure(&mut resource, url).await;
        resource
    }

    #[test]
    fn test_membership_diff() {
        let prior = vec!["vol-1".to_string(), "vol-2".to_string()];
        let planned = vec!["vol-2".to_string(), "vol-3".to_string()];

        let diff = membership_diff(&prior, &planned);
        assert_eq!(diff.add_volumes, vec!["vol-3"]);
        assert_eq!(diff.remove_volumes, vec!["vol-1"]);

        assert_eq!(membership_diff(&prior, &prior), UpdateVolumeGroupRequest::default());
    }

    #[test]
    fn test_error_status_carries_fault() {
        let group: VolumeGroup = serde_json::from_str(&group_body("error")).unwrap();
        let observation = available_state(group);
        assert_eq!(observation.state, "error");
        assert!(observation.fault.is_some());
    }

    #[tokio::test]
    async fn test_validate_names_conflict() {
        let config = with(&planned(), CONSISTENCY_GROUP_NAME, "rccg-1");
        let response = VolumeGroupResource::new()
            .validate(Context::new(), validate_request(TYPE, config))
            .await;

        assert!(has_errors(&response.diagnostics));
    }

    #[tokio::test]
    async fn test_create_waits_then_reads_details() {
        let mut server = Server::new_async().await;
        let post = server
            .mock("POST", GROUPS_PATH)
            .match_body(Matcher::Json(serde_json::json!({
                "name": "grp",
                "volumeIDs": ["vol-1", "vol-2"]
            })))
            .with_status(202)
            .with_body(group_body("creating"))
            .create_async()
            .await;
        let _get = server
            .mock("GET", GROUP_PATH)
            .with_status(200)
            .with_body(group_body("available"))
            .create_async()
            .await;
        let _details = server
            .mock("GET", DETAILS_PATH)
            .with_status(200)
            .with_body(details_body(&["vol-1", "vol-2"]))
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .create(Context::new(), create_request(TYPE, planned()))
            .await;

        post.assert_async().await;
        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = &response.new_state;
        assert_eq!(string_at(state, "id"), "cloud-1/vg-1");
        assert_eq!(string_at(state, "consistency_group_name"), "rccg-1");

        let errors = state.get_list(&attr(STATUS_ERRORS)).unwrap();
        assert_eq!(errors.len(), 1);
        match &errors[0] {
            Dynamic::Map(fields) => {
                assert_eq!(fields.get("key").and_then(|v| v.as_str()), Some("VOLUMEGROUP_WARN"));
            }
            other => panic!("unexpected error entry {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_reports_group_gone_before_read() {
        let mut server = Server::new_async().await;
        let _post = server
            .mock("POST", GROUPS_PATH)
            .with_status(202)
            .with_body(group_body("creating"))
            .create_async()
            .await;
        let _get = server
            .mock("GET", GROUP_PATH)
            .with_status(200)
            .with_body(group_body("available"))
            .create_async()
            .await;
        let _details = server
            .mock("GET", DETAILS_PATH)
            .with_status(404)
            .with_body(r#"{"description": "volume group not found"}"#)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .create(Context::new(), create_request(TYPE, planned()))
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].summary, "Volume group not found");
        assert!(response.diagnostics[0].detail.contains("disappeared after create"));
        assert_eq!(string_at(&response.new_state, "id"), "cloud-1/vg-1");
    }

    #[tokio::test]
    async fn test_update_sends_membership_diff() {
        let mut server = Server::new_async().await;
        let put = server
            .mock("PUT", GROUP_PATH)
            .match_body(Matcher::Json(serde_json::json!({
                "addVolumes": ["vol-3"],
                "removeVolumes": ["vol-1"]
            })))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;
        let _get = server
            .mock("GET", GROUP_PATH)
            .with_status(200)
            .with_body(group_body("available"))
            .create_async()
            .await;
        let _details = server
            .mock("GET", DETAILS_PATH)
            .with_status(200)
            .with_body(details_body(&["vol-2", "vol-3"]))
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let planned = with(&prior(), VOLUME_IDS, strings(&["vol-2", "vol-3"]));
        let response = resource
            .update(Context::new(), update_request(TYPE, prior(), planned))
            .await;

        put.assert_async().await;
        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert_eq!(
            response.new_state.get_string_list(&attr(VOLUME_IDS)).unwrap(),
            vec!["vol-2", "vol-3"]
        );
    }

    #[tokio::test]
    async fn test_delete_empties_group_first() {
        let mut server = Server::new_async().await;
        let remove = server
            .mock("PUT", GROUP_PATH)
            .match_body(Matcher::Json(serde_json::json!({
                "removeVolumes": ["vol-1", "vol-2"]
            })))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", GROUP_PATH)
            .with_status(404)
            .with_body(r#"{"description": "volume group not found"}"#)
            .create_async()
            .await;
        let _get = server
            .mock("GET", GROUP_PATH)
            .with_status(200)
            .with_body(group_body("available"))
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .delete(Context::new(), delete_request(TYPE, prior()))
            .await;

        remove.assert_async().await;
        delete.assert_async().await;
        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    }

    #[tokio::test]
    async fn test_read_not_found() {
        let mut server = Server::new_async().await;
        let _details = server
            .mock("GET", DETAILS_PATH)
            .with_status(404)
            .with_body(r#"{"description": "volume group not found"}"#)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource.read(Context::new(), read_request(TYPE, prior())).await;

        assert!(response.diagnostics.is_empty());
        assert!(response.new_state.is_none());
    }

    #[tokio::test]
    async fn test_import() {
        let mut server = Server::new_async().await;
        let _details = server
            .mock("GET", DETAILS_PATH)
            .with_status(200)
            .with_body(details_body(&["vol-1"]))
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .import_state(Context::new(), import_request(TYPE, "cloud-1/vg-1"))
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = &response.imported_resources[0].state;
        assert_eq!(string_at(state, GROUP_NAME), "grp");
        assert_eq!(string_at(state, "volume_group_status"), "available");
    }
}
