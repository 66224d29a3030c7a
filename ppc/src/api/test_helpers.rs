//! Test helpers for the PPC API

use std::sync::Once;

#[allow(dead_code)]
pub fn create_test_client(url: &str) -> super::Client {
    super::Client::new(url, "test-token", true).unwrap()
}

/// Client that retries quickly, for exercising the retry loop
#[allow(dead_code)]
pub fn create_fast_retry_client(url: &str, max_retries: u32) -> super::Client {
    super::Client::with_config(
        url,
        "test-token",
        true,
        super::RetryConfig {
            max_retries,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
            timeout_seconds: 5,
        },
    )
    .unwrap()
}

static TRACING: Once = Once::new();

/// Routes tracing output through the test harness. Safe to call repeatedly.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::super::*;
    use super::{create_fast_retry_client, create_test_client, init_tracing};
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn test_retry_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_backoff_ms, 100);
        assert_eq!(config.max_backoff_ms, 10000);
        assert_eq!(config.timeout_seconds, 30);
    }

    #[test]
    fn test_backoff_doubles_up_to_cap() {
        let config = RetryConfig {
            max_retries: 10,
            initial_backoff_ms: 100,
            max_backoff_ms: 1000,
            timeout_seconds: 30,
        };
        assert_eq!(config.backoff_ms(1), 100);
        assert_eq!(config.backoff_ms(2), 200);
        assert_eq!(config.backoff_ms(4), 800);
        assert_eq!(config.backoff_ms(5), 1000);
        assert_eq!(config.backoff_ms(40), 1000);
    }

    #[tokio::test]
    async fn test_api_query_params() {
        let params = ApiQueryParams::new()
            .add("filter", "name eq")
            .add("limit", 50)
            .add_optional("opt", Some("value"))
            .add_optional("none", None::<String>);

        let query = params.to_query_string();
        assert!(query.starts_with('?'));
        assert!(query.contains("filter=name%20eq"));
        assert!(query.contains("limit=50"));
        assert!(query.contains("opt=value"));
        assert!(!query.contains("none="));
        assert_eq!(ApiQueryParams::new().to_query_string(), "");
    }

    #[test]
    fn test_connection_pool_config() {
        use pool::{ConnectionPoolConfig, ConnectionPoolManager};

        let config = ConnectionPoolConfig::default();
        assert_eq!(config.max_idle_per_host, 10);
        assert_eq!(config.idle_timeout.as_secs(), 90);
        assert_eq!(config.connect_timeout.as_secs(), 10);
        assert_eq!(config.request_timeout.as_secs(), 60);
        assert_eq!(config.tcp_keepalive.unwrap().as_secs(), 30);
        assert!(config.user_agent.starts_with("terraform-provider-ppc/"));

        let manager = ConnectionPoolManager::new(config);
        assert_eq!(manager.config().max_idle_per_host, 10);
        assert!(manager.build_client(true).is_ok());
    }

    #[tokio::test]
    async fn test_connection_stats() {
        use pool::{ConnectionPoolConfig, ConnectionPoolManager, RequestOutcome};

        let manager = ConnectionPoolManager::new(ConnectionPoolConfig::default());

        let stats = manager.get_stats().await;
        assert_eq!(stats.total_requests, 0);
        assert!(stats.last_status.is_none());

        manager.record(RequestOutcome::Success(200)).await;
        manager.record(RequestOutcome::Status(429)).await;
        manager.record_retry().await;
        manager.record(RequestOutcome::Transport).await;

        let stats = manager.get_stats().await;
        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.failed_requests, 2);
        assert_eq!(stats.throttled_requests, 1);
        assert_eq!(stats.retried_requests, 1);
        assert_eq!(stats.last_status, Some(429));
        assert!(stats.last_request.is_some());
    }

    #[test]
    fn test_api_error_formatting() {
        let details = ApiErrorDetails {
            description: Some("volume vol-1 is in use".to_string()),
            error: Some("conflict".to_string()),
            code: Some(409),
        };

        let error = ApiError::ApiError {
            status: 409,
            message: "Conflict".to_string(),
            details: Some(Box::new(details)),
        };

        let error_str = error.to_string();
        assert!(error_str.contains("HTTP 409"));
        assert!(error_str.contains("Conflict"));
        assert!(error.message_contains("is in use"));
        assert!(!error.is_not_found());
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        assert!(matches!(
            Client::new("not a url", "token", false),
            Err(ApiError::InvalidEndpoint(_))
        ));
        assert!(matches!(
            Client::new("ftp://ppc.example.com", "token", false),
            Err(ApiError::InvalidEndpoint(_))
        ));
        tokio_test::assert_ok!(Client::new("https://ppc.example.com/", "token", false));
    }

    #[tokio::test]
    async fn test_bearer_auth_and_trailing_slash() {
        init_tracing();
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/ppc/v1/cloud-instances/cloud-1")
            .match_header("authorization", "Bearer test-token")
            .match_header("accept", "application/json")
            .with_status(200)
            .with_body(r#"{"data": {"capabilities": []}}"#)
            .create_async()
            .await;

        let client = create_test_client(&format!("{}/", server.url()));
        let cloud = client.cloud("cloud-1").get().await;

        tokio_test::assert_ok!(cloud);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unauthorized_is_auth_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/ppc/v1/cloud-instances/cloud-1")
            .with_status(401)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let result = client.cloud("cloud-1").get().await;
        assert!(matches!(result, Err(ApiError::AuthError)));
    }

    #[tokio::test]
    async fn test_get_retries_service_unavailable() {
        let mut server = Server::new_async().await;
        let failing = server
            .mock("GET", "/ppc/v1/cloud-instances/cloud-1/jobs/job-1")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let client = create_fast_retry_client(&server.url(), 2);
        let result = client.cloud("cloud-1").jobs().get("job-1").await;

        assert!(matches!(result, Err(ApiError::ServiceUnavailable)));
        failing.assert_async().await;

        let stats = client.get_connection_stats().await;
        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.failed_requests, 3);
        assert_eq!(stats.retried_requests, 2);
        assert_eq!(stats.last_status, Some(503));
    }

    #[tokio::test]
    async fn test_rate_limited_requests_are_counted() {
        let mut server = Server::new_async().await;
        let throttled = server
            .mock("GET", "/ppc/v1/cloud-instances/cloud-1/sshkeys/ops")
            .with_status(429)
            .expect(2)
            .create_async()
            .await;

        let client = create_fast_retry_client(&server.url(), 1);
        let result = client.cloud("cloud-1").keys().get("ops").await;

        assert!(matches!(result, Err(ApiError::RateLimited)));
        throttled.assert_async().await;

        let stats = client.get_connection_stats().await;
        assert_eq!(stats.throttled_requests, 2);
        assert_eq!(stats.retried_requests, 1);
        assert_eq!(stats.last_status, Some(429));
    }

    #[tokio::test]
    async fn test_post_not_retried_on_server_error() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/ppc/v1/cloud-instances/cloud-1/sshkeys")
            .with_status(500)
            .with_body(r#"{"description": "internal failure"}"#)
            .expect(1)
            .create_async()
            .await;

        let client = create_fast_retry_client(&server.url(), 3);
        let result = client.cloud("cloud-1").keys().create("ops", "ssh-rsa AAAA").await;

        mock.assert_async().await;
        let err = tokio_test::assert_err!(result);
        assert_eq!(err.status(), Some(500));
        assert!(err.message_contains("internal failure"));
    }

    #[tokio::test]
    async fn test_post_retried_on_rate_limit() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/ppc/v1/cloud-instances/cloud-1/sshkeys")
            .match_body(Matcher::PartialJson(serde_json::json!({"name": "ops"})))
            .with_status(429)
            .expect(2)
            .create_async()
            .await;

        let client = create_fast_retry_client(&server.url(), 1);
        let result = client.cloud("cloud-1").keys().create("ops", "ssh-rsa AAAA").await;

        mock.assert_async().await;
        assert!(matches!(result, Err(ApiError::RateLimited)));
    }

    #[tokio::test]
    async fn test_empty_body_parses_as_empty_object() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("DELETE", "/ppc/v1/cloud-instances/cloud-1/sshkeys/ops")
            .with_status(204)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        tokio_test::assert_ok!(client.cloud("cloud-1").keys().delete("ops").await);
    }

    #[tokio::test]
    async fn test_unparseable_body_is_parse_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/ppc/v1/cloud-instances/cloud-1/jobs/job-1")
            .with_status(200)
            .with_body("<html>gateway</html>")
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let result = client.cloud("cloud-1").jobs().get("job-1").await;
        assert!(matches!(result, Err(ApiError::ParseError(_))));
    }
}
