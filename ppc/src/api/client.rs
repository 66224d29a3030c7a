use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::cloud_instance::CloudApi;
use super::common::{ApiErrorDetails, ApiErrorResponse, ApiQueryParams, ApiResponse};
use super::error::ApiError;
use super::pool::{ConnectionPoolConfig, ConnectionPoolManager, RequestOutcome};

/// PPC control plane client
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    base_url: String,
    auth_header: String,
    retry_config: RetryConfig,
    pool_manager: ConnectionPoolManager,
}

#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub timeout_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10000,
            timeout_seconds: 30,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (1-based)
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        let factor = 2_u64.saturating_pow(attempt.saturating_sub(1));
        std::cmp::min(
            self.initial_backoff_ms.saturating_mul(factor),
            self.max_backoff_ms,
        )
    }
}

impl Client {
    /// Create a new API client with default configuration
    pub fn new(endpoint: &str, api_token: &str, insecure: bool) -> Result<Self, ApiError> {
        Self::with_config(endpoint, api_token, insecure, RetryConfig::default())
    }

    /// Create a new API client with custom retry configuration
    pub fn with_config(
        endpoint: &str,
        api_token: &str,
        insecure: bool,
        retry_config: RetryConfig,
    ) -> Result<Self, ApiError> {
        let parsed = url::Url::parse(endpoint)
            .map_err(|e| ApiError::InvalidEndpoint(format!("{}: {}", endpoint, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiError::InvalidEndpoint(format!(
                "{}: unsupported scheme {}",
                endpoint,
                parsed.scheme()
            )));
        }

        let pool_config = ConnectionPoolConfig {
            request_timeout: std::time::Duration::from_secs(retry_config.timeout_seconds),
            ..Default::default()
        };

        let pool_manager = ConnectionPoolManager::new(pool_config);
        let http_client = pool_manager.build_client(insecure)?;

        let base_url = endpoint.trim_end_matches('/').to_string();
        let auth_header = format!("Bearer {}", api_token);

        Ok(Self {
            inner: Arc::new(ClientInner {
                http_client,
                base_url,
                auth_header,
                retry_config,
                pool_manager,
            }),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.inner.retry_config
    }

    /// Operations scoped to one cloud instance (tenant workspace)
    pub fn cloud(&self, cloud_instance_id: &str) -> CloudApi<'_> {
        CloudApi::new(self, cloud_instance_id)
    }

    /// Execute a GET request with retry logic
    pub async fn get<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, ApiError> {
        self.execute_with_retry(
            || async {
                let url = format!("{}{}", self.inner.base_url, path);

                tracing::debug!("GET request to: {}", url);

                self.inner
                    .http_client
                    .get(&url)
                    .header(AUTHORIZATION, &self.inner.auth_header)
                    .send()
                    .await
            },
            path,
            true,
        )
        .await
    }

    /// Execute a GET request with query parameters
    pub async fn get_with_params<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        params: &ApiQueryParams,
    ) -> Result<T, ApiError> {
        let full_path = format!("{}{}", path, params.to_query_string());
        self.get(&full_path).await
    }

    /// Execute a POST request. Only rate limiting is retried since the
    /// server may already have acted on the first attempt.
    pub async fn post<T: for<'de> Deserialize<'de>, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.execute_with_retry(
            || async {
                let url = format!("{}{}", self.inner.base_url, path);

                tracing::debug!("POST request to: {}", url);

                self.inner
                    .http_client
                    .post(&url)
                    .header(AUTHORIZATION, &self.inner.auth_header)
                    .json(body)
                    .send()
                    .await
            },
            path,
            false,
        )
        .await
    }

    /// Execute a PUT request with retry logic
    pub async fn put<T: for<'de> Deserialize<'de>, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.execute_with_retry(
            || async {
                let url = format!("{}{}", self.inner.base_url, path);

                tracing::debug!("PUT request to: {}", url);

                self.inner
                    .http_client
                    .put(&url)
                    .header(AUTHORIZATION, &self.inner.auth_header)
                    .json(body)
                    .send()
                    .await
            },
            path,
            true,
        )
        .await
    }

    /// Execute a DELETE request with retry logic
    pub async fn delete<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, ApiError> {
        self.execute_with_retry(
            || async {
                let url = format!("{}{}", self.inner.base_url, path);

                tracing::debug!("DELETE request to: {}", url);

                self.inner
                    .http_client
                    .delete(&url)
                    .header(AUTHORIZATION, &self.inner.auth_header)
                    .send()
                    .await
            },
            path,
            true,
        )
        .await
    }

    /// DELETE carrying a JSON body, used by membership removals
    pub async fn delete_with_body<T: for<'de> Deserialize<'de>, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.execute_with_retry(
            || async {
                let url = format!("{}{}", self.inner.base_url, path);

                tracing::debug!("DELETE request with body to: {}", url);

                self.inner
                    .http_client
                    .delete(&url)
                    .header(AUTHORIZATION, &self.inner.auth_header)
                    .json(body)
                    .send()
                    .await
            },
            path,
            true,
        )
        .await
    }

    /// Get connection pool statistics
    pub async fn get_connection_stats(&self) -> super::pool::ConnectionStats {
        self.inner.pool_manager.get_stats().await
    }

    /// Execute request with retry logic
    async fn execute_with_retry<F, Fut, T>(
        &self,
        request_fn: F,
        path: &str,
        idempotent: bool,
    ) -> Result<T, ApiError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
        T: for<'de> Deserialize<'de>,
    {
        let mut attempt = 0;
        let mut last_error = None;

        while attempt <= self.inner.retry_config.max_retries {
            if attempt > 0 {
                let backoff = self.inner.retry_config.backoff_ms(attempt);
                tracing::debug!(
                    "Retrying request to {} after {}ms (attempt {})",
                    path,
                    backoff,
                    attempt
                );
                self.inner.pool_manager.record_retry().await;
                tokio::time::sleep(tokio::time::Duration::from_millis(backoff)).await;
            }

            match request_fn().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        self.inner
                            .pool_manager
                            .record(RequestOutcome::Success(status.as_u16()))
                            .await;
                        return self.parse_success_response(response).await;
                    }

                    self.inner
                        .pool_manager
                        .record(RequestOutcome::Status(status.as_u16()))
                        .await;

                    if status == reqwest::StatusCode::UNAUTHORIZED {
                        return Err(ApiError::AuthError);
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        last_error = Some(ApiError::RateLimited);
                    } else if status.is_server_error() && idempotent {
                        last_error = Some(ApiError::ServiceUnavailable);
                    } else {
                        return self.handle_error_response(response).await;
                    }
                }
                Err(e) => {
                    self.inner.pool_manager.record(RequestOutcome::Transport).await;

                    if !idempotent {
                        return Err(ApiError::RequestError(e));
                    }

                    if e.is_timeout() {
                        last_error =
                            Some(ApiError::Timeout(self.inner.retry_config.timeout_seconds));
                    } else if e.is_connect() || e.is_request() {
                        last_error = Some(ApiError::ServiceUnavailable);
                    } else {
                        return Err(ApiError::RequestError(e));
                    }
                }
            }

            attempt += 1;
        }

        let stats = self.inner.pool_manager.get_stats().await;
        tracing::warn!(
            total = stats.total_requests,
            failed = stats.failed_requests,
            throttled = stats.throttled_requests,
            last_status = ?stats.last_status,
            "Giving up on {} after {} attempts",
            path,
            attempt
        );
        Err(last_error.unwrap_or(ApiError::ServiceUnavailable))
    }

    /// Parse successful response
    async fn parse_success_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let text = response.text().await?;
        tracing::debug!("API response body: {}", text);

        // some operations answer 202/204 without a body
        let text = if text.trim().is_empty() {
            "{}".to_string()
        } else {
            text
        };

        match serde_json::from_str::<ApiResponse<T>>(&text) {
            Ok(wrapper) => Ok(wrapper.data),
            Err(_) => match serde_json::from_str::<T>(&text) {
                Ok(data) => Ok(data),
                Err(e) => {
                    tracing::error!("Failed to deserialize response: {}, body: {}", e, text);
                    Err(ApiError::ParseError(format!(
                        "Failed to parse response: {}",
                        e
                    )))
                }
            },
        }
    }

    /// Handle error response
    async fn handle_error_response<T>(&self, response: reqwest::Response) -> Result<T, ApiError> {
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        let details = match serde_json::from_str::<ApiErrorResponse>(&text) {
            Ok(err_resp) => Some(Box::new(ApiErrorDetails {
                description: err_resp.description,
                error: err_resp.error,
                code: err_resp.code,
            })),
            Err(_) => None,
        };

        Err(ApiError::ApiError {
            status,
            message: text,
            details,
        })
    }
}
