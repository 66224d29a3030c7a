#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::resources::test_support::*;
    use crate::resources::AFFINITY_POLICY;
    use mockito::{Matcher, Server};
    use tfplug::types::has_errors;

    const TYPE: &str = "ppc_instance";
    const INSTANCE_PATH: &str = "/ppc/v1/cloud-instances/cloud-1/pvm-instances/ins-1";

    fn instance_body(status: &str, health: &str) -> String {
        serde_json::json!({
            "pvmInstanceID": "ins-1",
            "serverName": "lpar-a",
            "imageID": "img-1",
            "status": status,
            "health": {"status": health},
            "memory": 4,
            "processors": 0.5,
            "procType": "shared",
            "sysType": "s922",
            "minmem": 2,
            "maxmem": 8,
            "minproc": 0.25,
            "maxproc": 1,
            "placementGroup": "none",
            "virtualCores": {"assigned": 1, "min": 1, "max": 2},
            "networks": [
                {"ipAddress": "10.0.0.5", "macAddress": "fa:16:3e:00:00:01", "networkID": "net-1", "networkName": "private", "type": "fixed"}
            ]
        })
        .to_string()
    }

    fn network() -> Dynamic {
        Dynamic::List(vec![Dynamic::Map(HashMap::from([(
            "network_id".to_string(),
            Dynamic::from("net-1"),
        )]))])
    }

    fn planned() -> DynamicValue {
        object(&[
            ("id", Dynamic::Unknown),
            ("status", Dynamic::Unknown),
            (CLOUD_INSTANCE_ID, "cloud-1".into()),
            (INSTANCE_NAME, "lpar-a".into()),
            (IMAGE_ID, "img-1".into()),
            (NETWORK, network()),
            (MEMORY, Dynamic::Number(4.0)),
            (PROCESSORS, Dynamic::Number(0.5)),
            (PROC_TYPE, "shared".into()),
            (SYS_TYPE, "s922".into()),
            (STORAGE_POOL_AFFINITY, true.into()),
            (REPLICANTS, Dynamic::Number(1.0)),
            (REPLICATION_POLICY, "none".into()),
            (REPLICATION_SCHEME, "suffix".into()),
            (PIN_POLICY, "none".into()),
            (READY_STATUS, "OK".into()),
        ])
    }

    fn prior() -> DynamicValue {
        object(&[
            ("id", "cloud-1/ins-1".into()),
            (CLOUD_INSTANCE_ID, "cloud-1".into()),
            (INSTANCE_NAME, "lpar-a".into()),
            (IMAGE_ID, "img-1".into()),
            (MEMORY, Dynamic::Number(4.0)),
            (PROCESSORS, Dynamic::Number(0.5)),
            (PROC_TYPE, "shared".into()),
            (STORAGE_POOL_AFFINITY, true.into()),
            ("max_memory", Dynamic::Number(8.0)),
            ("max_processors", Dynamic::Number(1.0)),
            ("status", "ACTIVE".into()),
            ("health_status", "OK".into()),
        ])
    }

    async fn configured(url: &str) -> InstanceResource {
        let mut resource = InstanceResource::new();
        configure(&mut resource, url).await;
        resource
    }

    #[test]
    fn test_resource_type_name() {
        assert_eq!(InstanceResource::new().type_name(), TYPE);
    }

    #[tokio::test]
    async fn test_resource_schema() {
        let response = InstanceResource::new()
            .schema(Context::new(), ResourceSchemaRequest)
            .await;

        assert!(response.diagnostics.is_empty());
        let schema = response.schema;
        assert!(schema.attribute(CLOUD_INSTANCE_ID).unwrap().forces_replacement());
        assert!(schema.attribute(NETWORK).unwrap().required);
        let memory = schema.attribute(MEMORY).unwrap();
        assert!(memory.optional && memory.computed);
        assert!(schema.attribute("max_virtual_cores").unwrap().computed);
        assert!(schema.attribute(AFFINITY_POLICY).is_some());
        assert!(schema.attribute("timeouts").is_some());
    }

    #[tokio::test]
    async fn test_validate_rejects_bad_values() {
        let resource = InstanceResource::new();

        let ok = resource
            .validate(Context::new(), validate_request(TYPE, planned()))
            .await;
        assert!(ok.diagnostics.is_empty(), "{:?}", ok.diagnostics);

        let bad_proc = resource
            .validate(
                Context::new(),
                validate_request(TYPE, with(&planned(), PROC_TYPE, "turbo")),
            )
            .await;
        assert!(has_errors(&bad_proc.diagnostics));

        let sap_with_memory = resource
            .validate(
                Context::new(),
                validate_request(TYPE, with(&planned(), SAP_PROFILE_ID, "ush1-4x128")),
            )
            .await;
        assert!(has_errors(&sap_with_memory.diagnostics));

        let mut bad_timeout = planned();
        bad_timeout
            .set_string(&attr("timeouts").attribute("create"), "forever".to_string())
            .unwrap();
        let response = resource
            .validate(Context::new(), validate_request(TYPE, bad_timeout))
            .await;
        assert!(response
            .diagnostics
            .iter()
            .any(|d| d.summary == "Invalid timeout"));
    }

    #[tokio::test]
    async fn test_create_without_provider_data() {
        let response = InstanceResource::new()
            .create(Context::new(), create_request(TYPE, planned()))
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].summary, "Provider not configured");
    }

    #[tokio::test]
    async fn test_create_requires_sizing_without_sap_profile() {
        let mut server = Server::new_async().await;
        let post = server
            .mock("POST", "/ppc/v1/cloud-instances/cloud-1/pvm-instances")
            .expect(0)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .create(
                Context::new(),
                create_request(TYPE, with(&planned(), MEMORY, Dynamic::Unknown)),
            )
            .await;

        post.assert_async().await;
        assert_eq!(
            response.diagnostics[0].detail,
            "ppc_memory is required for creating pvm instances"
        );
    }

    #[tokio::test]
    async fn test_create_successful() {
        let mut server = Server::new_async().await;
        let post = server
            .mock("POST", "/ppc/v1/cloud-instances/cloud-1/pvm-instances")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "serverName": "lpar-a",
                "imageID": "img-1",
                "procType": "shared",
                "sysType": "s922",
                "replicantNamingScheme": "suffix",
                "replicantAffinityPolicy": "none",
                "migratable": false
            })))
            .with_status(201)
            .with_body(r#"[{"pvmInstanceID": "ins-1", "status": "BUILD"}]"#)
            .create_async()
            .await;
        let _get = server
            .mock("GET", INSTANCE_PATH)
            .with_status(200)
            .with_body(instance_body("ACTIVE", "OK"))
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .create(Context::new(), create_request(TYPE, planned()))
            .await;

        post.assert_async().await;
        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = response.new_state;
        assert_eq!(string_at(&state, "id"), "cloud-1/ins-1");
        assert_eq!(string_at(&state, "status"), "ACTIVE");
        assert_eq!(number_at(&state, "max_memory"), 8.0);
        assert_eq!(number_at(&state, "min_virtual_cores"), 1.0);
        assert_eq!(
            state
                .get_string(&attr(NETWORK).index(0).attribute("ip_address"))
                .unwrap(),
            "10.0.0.5"
        );
        assert!(state.get_optional_string(&attr(PLACEMENT_GROUP_ID)).is_none());
    }

    #[tokio::test]
    async fn test_create_persists_id_when_build_fails() {
        let mut server = Server::new_async().await;
        let _post = server
            .mock("POST", "/ppc/v1/cloud-instances/cloud-1/pvm-instances")
            .with_status(201)
            .with_body(r#"[{"pvmInstanceID": "ins-1"}]"#)
            .create_async()
            .await;
        let _get = server
            .mock("GET", INSTANCE_PATH)
            .with_status(200)
            .with_body(
                r#"{"pvmInstanceID": "ins-1", "status": "ERROR", "fault": {"message": "quota exceeded"}}"#,
            )
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .create(Context::new(), create_request(TYPE, planned()))
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert!(response.diagnostics[0]
            .detail
            .contains("failed to create the lpar: quota exceeded"));
        assert_eq!(string_at(&response.new_state, "id"), "cloud-1/ins-1");
    }

    #[tokio::test]
    async fn test_create_disables_storage_pool_affinity() {
        let mut server = Server::new_async().await;
        let _post = server
            .mock("POST", "/ppc/v1/cloud-instances/cloud-1/pvm-instances")
            .with_status(201)
            .with_body(r#"[{"pvmInstanceID": "ins-1"}]"#)
            .create_async()
            .await;
        let _get = server
            .mock("GET", INSTANCE_PATH)
            .with_status(200)
            .with_body(instance_body("ACTIVE", "OK"))
            .create_async()
            .await;
        let put = server
            .mock("PUT", INSTANCE_PATH)
            .match_body(Matcher::Json(serde_json::json!({"storagePoolAffinity": false})))
            .with_status(200)
            .with_body("{}")
            .expect(1)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .create(
                Context::new(),
                create_request(TYPE, with(&planned(), STORAGE_POOL_AFFINITY, false)),
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        put.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_sap_instance() {
        let mut server = Server::new_async().await;
        let post = server
            .mock("POST", "/ppc/v1/cloud-instances/cloud-1/sap")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "name": "lpar-a",
                "profileID": "ush1-4x128",
                "instances": {"count": 1, "affinityPolicy": "none", "numerical": "suffix"}
            })))
            .with_status(201)
            .with_body(r#"[{"pvmInstanceID": "ins-1"}]"#)
            .create_async()
            .await;
        let _get = server
            .mock("GET", INSTANCE_PATH)
            .with_status(200)
            .with_body(instance_body("ACTIVE", "OK"))
            .create_async()
            .await;

        let mut plan = with(&planned(), SAP_PROFILE_ID, "ush1-4x128");
        for name in [MEMORY, PROCESSORS, PROC_TYPE] {
            plan = with(&plan, name, Dynamic::Unknown);
        }

        let resource = configured(&server.url()).await;
        let response = resource.create(Context::new(), create_request(TYPE, plan)).await;

        post.assert_async().await;
        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert_eq!(string_at(&response.new_state, "id"), "cloud-1/ins-1");
    }

    #[tokio::test]
    async fn test_license_capacity_requires_vtl_image() {
        let mut server = Server::new_async().await;
        let _stock = server
            .mock("GET", "/ppc/v1/cloud-instances/cloud-1/stock-images/img-1")
            .with_status(404)
            .with_body(r#"{"description": "image not found"}"#)
            .create_async()
            .await;
        let _image = server
            .mock("GET", "/ppc/v1/cloud-instances/cloud-1/images/img-1")
            .with_status(200)
            .with_body(r#"{"imageID": "img-1", "specifications": {"imageType": "stock"}}"#)
            .create_async()
            .await;
        let post = server
            .mock("POST", "/ppc/v1/cloud-instances/cloud-1/pvm-instances")
            .expect(0)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .create(
                Context::new(),
                create_request(
                    TYPE,
                    with(&planned(), LICENSE_REPOSITORY_CAPACITY, Dynamic::Number(3.0)),
                ),
            )
            .await;

        post.assert_async().await;
        assert_eq!(
            response.diagnostics[0].detail,
            "ppc_license_repository_capacity should only be used when creating VTL instances"
        );
    }

    #[tokio::test]
    async fn test_read_maps_instance() {
        let mut server = Server::new_async().await;
        let _get = server
            .mock("GET", INSTANCE_PATH)
            .with_status(200)
            .with_body(instance_body("SHUTOFF", "OK"))
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .read(Context::new(), read_request(TYPE, prior()))
            .await;

        assert!(response.diagnostics.is_empty());
        let state = response.new_state.unwrap();
        assert_eq!(string_at(&state, "status"), "SHUTOFF");
        assert_eq!(string_at(&state, "instance_id"), "ins-1");
        assert_eq!(number_at(&state, VIRTUAL_CORES_ASSIGNED), 1.0);
        assert_eq!(string_at(&state, SYS_TYPE), "s922");
    }

    #[tokio::test]
    async fn test_read_not_found_is_idempotent() {
        let mut server = Server::new_async().await;
        let get = server
            .mock("GET", INSTANCE_PATH)
            .with_status(404)
            .with_body(r#"{"description": "pvm-instance ins-1 not found"}"#)
            .expect(2)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        for _ in 0..2 {
            let response = resource
                .read(Context::new(), read_request(TYPE, prior()))
                .await;
            assert!(response.diagnostics.is_empty());
            assert!(response.new_state.is_none());
        }
        get.assert_async().await;
    }

    #[tokio::test]
    async fn test_update_refused_when_health_is_warning() {
        let server = Server::new_async().await;
        let resource = configured(&server.url()).await;

        let prior = with(&prior(), "health_status", "WARNING");
        let planned = with(&prior, INSTANCE_NAME, "lpar-b");
        let response = resource
            .update(Context::new(), update_request(TYPE, prior.clone(), planned))
            .await;

        assert_eq!(
            response.diagnostics[0].detail,
            "the operation cannot be performed when the lpar health in the WARNING State"
        );
        assert_eq!(string_at(&response.new_state, INSTANCE_NAME), "lpar-a");
    }

    #[tokio::test]
    async fn test_update_renames_instance() {
        let mut server = Server::new_async().await;
        let _cloud = server
            .mock("GET", "/ppc/v1/cloud-instances/cloud-1")
            .with_status(200)
            .with_body(r#"{"capabilities": ["custom-virtualcores"]}"#)
            .create_async()
            .await;
        let put = server
            .mock("PUT", INSTANCE_PATH)
            .match_body(Matcher::Json(serde_json::json!({"serverName": "lpar-b"})))
            .with_status(200)
            .with_body("{}")
            .expect(1)
            .create_async()
            .await;
        let _get = server
            .mock("GET", INSTANCE_PATH)
            .with_status(200)
            .with_body(instance_body("ACTIVE", "OK").replace("lpar-a", "lpar-b"))
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .update(
                Context::new(),
                update_request(TYPE, prior(), with(&prior(), INSTANCE_NAME, "lpar-b")),
            )
            .await;

        put.assert_async().await;
        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert_eq!(string_at(&response.new_state, INSTANCE_NAME), "lpar-b");
        assert_eq!(string_at(&response.new_state, "id"), "cloud-1/ins-1");
    }

    #[tokio::test]
    async fn test_update_moves_placement_group() {
        let mut server = Server::new_async().await;
        let _cloud = server
            .mock("GET", "/ppc/v1/cloud-instances/cloud-1")
            .with_status(200)
            .with_body(r#"{"capabilities": []}"#)
            .create_async()
            .await;
        let remove = server
            .mock(
                "DELETE",
                "/ppc/v1/cloud-instances/cloud-1/placement-groups/pg-old/members",
            )
            .with_status(400)
            .with_body(r#"{"description": "instance ins-1 is not part of placement-group pg-old"}"#)
            .create_async()
            .await;
        let add = server
            .mock(
                "POST",
                "/ppc/v1/cloud-instances/cloud-1/placement-groups/pg-new/members",
            )
            .match_body(Matcher::Json(serde_json::json!({"id": "ins-1"})))
            .with_status(200)
            .with_body(r#"{"id": "pg-new", "name": "grp", "policy": "affinity", "members": ["ins-1"]}"#)
            .create_async()
            .await;
        let _get = server
            .mock("GET", INSTANCE_PATH)
            .with_status(200)
            .with_body(instance_body("ACTIVE", "OK").replace("\"none\"", "\"pg-new\""))
            .create_async()
            .await;

        let prior = with(&prior(), PLACEMENT_GROUP_ID, "pg-old");
        let planned = with(&prior, PLACEMENT_GROUP_ID, "pg-new");

        let resource = configured(&server.url()).await;
        let response = resource
            .update(Context::new(), update_request(TYPE, prior, planned))
            .await;

        remove.assert_async().await;
        add.assert_async().await;
        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert_eq!(string_at(&response.new_state, PLACEMENT_GROUP_ID), "pg-new");
    }

    #[tokio::test]
    async fn test_in_place_resize_sends_migratable_and_cores() {
        let mut server = Server::new_async().await;
        let _cloud = server
            .mock("GET", "/ppc/v1/cloud-instances/cloud-1")
            .with_status(200)
            .with_body(r#"{"capabilities": ["custom-virtualcores"]}"#)
            .create_async()
            .await;
        let put = server
            .mock("PUT", INSTANCE_PATH)
            .match_body(Matcher::Json(serde_json::json!({
                "memory": 6.0,
                "processors": 0.5,
                "migratable": true,
                "virtualCores": {"assigned": 1}
            })))
            .with_status(200)
            .with_body("{}")
            .expect(1)
            .create_async()
            .await;
        let _get = server
            .mock("GET", INSTANCE_PATH)
            .with_status(200)
            .with_body(instance_body("ACTIVE", "OK"))
            .create_async()
            .await;

        let prior = with(&prior(), VIRTUAL_CORES_ASSIGNED, Dynamic::Number(1.0));
        let planned = with(
            &with(&prior, MEMORY, Dynamic::Number(6.0)),
            MIGRATABLE,
            true,
        );

        let resource = configured(&server.url()).await;
        let response = resource
            .update(Context::new(), update_request(TYPE, prior, planned))
            .await;

        put.assert_async().await;
        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    }

    #[test]
    fn test_plan_changes_follow_fixed_order() {
        let prior = with(
            &with(&prior(), PLACEMENT_GROUP_ID, "pg-1"),
            SAP_PROFILE_ID,
            "ush1-4x128",
        );
        let mut planned = prior.clone();
        for (name, value) in [
            (PLACEMENT_GROUP_ID, Dynamic::from("pg-2")),
            (STORAGE_POOL_AFFINITY, Dynamic::Bool(false)),
            (SAP_PROFILE_ID, Dynamic::from("ush1-4x256")),
            (LICENSE_REPOSITORY_CAPACITY, Dynamic::Number(2.0)),
            (MEMORY, Dynamic::Number(16.0)),
            (VIRTUAL_CORES_ASSIGNED, Dynamic::Number(2.0)),
            (PROC_TYPE, Dynamic::from("dedicated")),
            (INSTANCE_NAME, Dynamic::from("lpar-b")),
        ] {
            planned = with(&planned, name, value);
        }

        let changes = plan_changes(&prior, &planned);

        assert_eq!(
            changes,
            vec![
                Change::Rename("lpar-b".to_string()),
                Change::ProcType {
                    proc_type: "dedicated".to_string(),
                    virtual_cores: Some(2),
                },
                Change::VirtualCores(2),
                Change::Resize {
                    memory: 16.0,
                    processors: 0.5,
                    migratable: None,
                    virtual_cores: Some(2),
                    reboot: true,
                },
                Change::LicenseRepository(2),
                Change::SapProfile("ush1-4x256".to_string()),
                Change::StoragePoolAffinity(false),
                Change::PlacementGroup {
                    from: Some("pg-1".to_string()),
                    to: Some("pg-2".to_string()),
                },
            ]
        );
    }

    #[test]
    fn test_plan_changes_ignore_unknown_and_unchanged() {
        let planned = with(&prior(), MEMORY, Dynamic::Unknown);
        assert!(plan_changes(&prior(), &planned).is_empty());
        assert!(plan_changes(&prior(), &prior()).is_empty());

        let grow_within_max = with(&prior(), PROCESSORS, Dynamic::Number(1.0));
        assert!(matches!(
            plan_changes(&prior(), &grow_within_max).as_slice(),
            [Change::Resize { reboot: false, .. }]
        ));
    }

    #[tokio::test]
    async fn test_delete_waits_until_gone() {
        let mut server = Server::new_async().await;
        let delete = server
            .mock("DELETE", INSTANCE_PATH)
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;
        let _get = server
            .mock("GET", INSTANCE_PATH)
            .with_status(404)
            .with_body(r#"{"description": "not found"}"#)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .delete(Context::new(), delete_request(TYPE, prior()))
            .await;

        delete.assert_async().await;
        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    }

    #[tokio::test]
    async fn test_delete_of_missing_instance_succeeds() {
        let mut server = Server::new_async().await;
        let _delete = server
            .mock("DELETE", INSTANCE_PATH)
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
    async fn test_import_state() {
        let mut server = Server::new_async().await;
        let _get = server
            .mock("GET", INSTANCE_PATH)
            .with_status(200)
            .with_body(instance_body("ACTIVE", "OK"))
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .import_state(Context::new(), import_request(TYPE, "cloud-1/ins-1"))
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = &response.imported_resources[0].state;
        assert_eq!(string_at(state, "id"), "cloud-1/ins-1");
        assert_eq!(string_at(state, CLOUD_INSTANCE_ID), "cloud-1");
        assert_eq!(string_at(state, INSTANCE_NAME), "lpar-a");
    }

    #[tokio::test]
    async fn test_import_state_invalid_id() {
        let server = Server::new_async().await;
        let resource = configured(&server.url()).await;

        let response = resource
            .import_state(Context::new(), import_request(TYPE, "ins-1"))
            .await;

        assert!(response.imported_resources.is_empty());
        assert_eq!(response.diagnostics[0].summary, "Invalid import ID");
    }

    fn observed(status: &str, health: &str) -> PvmInstance {
        serde_json::from_str(&instance_body(status, health)).unwrap()
    }

    #[test]
    fn test_available_state_mapping() {
        assert_eq!(available_state(observed("ACTIVE", "OK"), "OK").state, "ACTIVE");
        assert_eq!(available_state(observed("ACTIVE", "WARNING"), "OK").state, "BUILD");
        assert_eq!(
            available_state(observed("ACTIVE", "WARNING"), "WARNING").state,
            "ACTIVE"
        );
        assert_eq!(available_state(observed("BUILD", ""), "OK").state, "BUILD");

        let failed = available_state(observed("ERROR", ""), "OK");
        assert_eq!(failed.state, "ERROR");
        assert_eq!(failed.fault.as_deref(), Some("failed to create the lpar"));
    }

    #[test]
    fn test_power_state_mapping() {
        assert_eq!(stopped_state(observed("SHUTOFF", "OK"), "STOPPING").state, "SHUTOFF");
        assert_eq!(stopped_state(observed("SHUTOFF", "CRITICAL"), "STOPPING").state, "STOPPING");
        assert_eq!(stopped_state(observed("ACTIVE", "OK"), "STOPPING").state, "STOPPING");

        assert_eq!(resize_state(observed("ACTIVE", "OK")).state, "ACTIVE");
        assert_eq!(resize_state(observed("SHUTOFF", "OK")).state, "SHUTOFF");
        assert_eq!(resize_state(observed("RESIZE", "OK")).state, "RESIZE");
    }
}
