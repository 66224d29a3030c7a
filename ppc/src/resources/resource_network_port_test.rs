#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::resources::test_support::*;
    use mockito::{Matcher, Server};
    use tfplug::types::{has_errors, Dynamic};

    const TYPE: &str = "ppc_network_port";
    const PORTS_PATH: &str = "/ppc/v1/cloud-instances/cloud-1/networks/private/ports";
    const PORT_PATH: &str = "/ppc/v1/cloud-instances/cloud-1/networks/private/ports/port-1";

    fn port_body(status: &str) -> String {
        serde_json::json!({
            "portID": "port-1",
            "description": "app",
            "ipAddress": "10.0.0.9",
            "macAddress": "fa:16:3e:00:00:01",
            "status": status,
            "externalIP": "52.1.1.9"
        })
        .to_string()
    }

    fn planned() -> DynamicValue {
        object(&[
            ("id", Dynamic::Unknown),
            (CLOUD_INSTANCE_ID, "cloud-1".into()),
            (NETWORK_NAME, "private".into()),
            (PORT_DESCRIPTION, "app".into()),
        ])
    }

    fn prior() -> DynamicValue {
        with(&planned(), "id", "cloud-1/private/port-1")
    }

    async fn configured(url: &str) -> NetworkPortResource {
        let mut resource = NetworkPortResource::new();
        configure(&mut resource, url).await;
        resource
    }

    #[tokio::test]
    async fn test_validate_warns_about_deprecation() {
        let response = NetworkPortResource::new()
            .validate(Context::new(), validate_request(TYPE, planned()))
            .await;

        assert!(!has_errors(&response.diagnostics));
        assert_eq!(response.diagnostics[0].summary, "Deprecated resource");
    }

    #[test]
    fn test_down_state() {
        let port: NetworkPort = serde_json::from_str(&port_body("DOWN")).unwrap();
        assert_eq!(down_state(port).state, PORT_DOWN);

        let port: NetworkPort = serde_json::from_str(&port_body("BUILD")).unwrap();
        assert_eq!(down_state(port).state, PORT_BUILD);
    }

    #[tokio::test]
    async fn test_create_waits_for_down() {
        let mut server = Server::new_async().await;
        let post = server
            .mock("POST", PORTS_PATH)
            .match_body(Matcher::Json(serde_json::json!({"description": "app"})))
            .with_status(201)
            .with_body(port_body("BUILD"))
            .create_async()
            .await;
        let _get = server
            .mock("GET", PORT_PATH)
            .with_status(200)
            .with_body(port_body("DOWN"))
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .create(Context::new(), create_request(TYPE, planned()))
            .await;

        post.assert_async().await;
        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = response.new_state;
        assert_eq!(string_at(&state, "id"), "cloud-1/private/port-1");
        assert_eq!(string_at(&state, "status"), "DOWN");
        assert_eq!(string_at(&state, "macaddress"), "fa:16:3e:00:00:01");
        assert_eq!(string_at(&state, "public_ip"), "52.1.1.9");
        assert_eq!(string_at(&state, PORT_IP_ADDRESS), "10.0.0.9");
    }

    #[tokio::test]
    async fn test_update_is_a_no_op() {
        let server = Server::new_async().await;
        let resource = configured(&server.url()).await;

        let planned = with(&prior(), PORT_DESCRIPTION, "renamed");
        let response = resource
            .update(Context::new(), update_request(TYPE, prior(), planned.clone()))
            .await;

        assert!(response.diagnostics.is_empty());
        assert_eq!(response.new_state, planned);
    }

    #[tokio::test]
    async fn test_read_not_found() {
        let mut server = Server::new_async().await;
        let _get = server
            .mock("GET", PORT_PATH)
            .with_status(404)
            .with_body(r#"{"description": "port not found"}"#)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource.read(Context::new(), read_request(TYPE, prior())).await;

        assert!(response.diagnostics.is_empty());
        assert!(response.new_state.is_none());
    }

    #[tokio::test]
    async fn test_delete_tolerates_not_found() {
        let mut server = Server::new_async().await;
        let delete = server
            .mock("DELETE", PORT_PATH)
            .with_status(404)
            .with_body(r#"{"description": "port not found"}"#)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .delete(Context::new(), delete_request(TYPE, prior()))
            .await;

        delete.assert_async().await;
        assert!(response.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn test_import_state() {
        let mut server = Server::new_async().await;
        let _get = server
            .mock("GET", PORT_PATH)
            .with_status(200)
            .with_body(port_body("ACTIVE"))
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .import_state(Context::new(), import_request(TYPE, "cloud-1/private/port-1"))
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = &response.imported_resources[0].state;
        assert_eq!(string_at(state, NETWORK_NAME), "private");
        assert_eq!(string_at(state, "portid"), "port-1");
    }
}
