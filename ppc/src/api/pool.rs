//! HTTP transport settings and request accounting for the PPC API

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

const USER_AGENT: &str = concat!("terraform-provider-ppc/", env!("CARGO_PKG_VERSION"));

pub struct ConnectionPoolConfig {
    pub max_idle_per_host: usize,
    pub idle_timeout: Duration,
    pub connect_timeout: Duration,
    /// Upper bound for a single attempt; retries get their own budget
    pub request_timeout: Duration,
    pub tcp_keepalive: Option<Duration>,
    pub user_agent: String,
}

impl Default for ConnectionPoolConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: 10,
            idle_timeout: Duration::from_secs(90),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            tcp_keepalive: Some(Duration::from_secs(30)),
            user_agent: USER_AGENT.to_string(),
        }
    }
}

/// How a single attempt ended
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RequestOutcome {
    Success(u16),
    /// The control plane answered with a non-success status
    Status(u16),
    /// No response at all (connect error, timeout, ...)
    Transport,
}

#[derive(Debug, Default, Clone)]
pub struct ConnectionStats {
    pub total_requests: u64,
    pub failed_requests: u64,
    pub throttled_requests: u64,
    pub retried_requests: u64,
    pub last_status: Option<u16>,
    pub last_request: Option<Instant>,
}

pub struct ConnectionPoolManager {
    stats: RwLock<ConnectionStats>,
    config: ConnectionPoolConfig,
}

impl ConnectionPoolManager {
    pub fn new(config: ConnectionPoolConfig) -> Self {
        Self {
            stats: RwLock::new(ConnectionStats::default()),
            config,
        }
    }

    pub fn config(&self) -> &ConnectionPoolConfig {
        &self.config
    }

    pub async fn record(&self, outcome: RequestOutcome) {
        let mut stats = self.stats.write().await;
        stats.total_requests += 1;
        stats.last_request = Some(Instant::now());

        match outcome {
            RequestOutcome::Success(code) => stats.last_status = Some(code),
            RequestOutcome::Status(code) => {
                stats.failed_requests += 1;
                if code == 429 {
                    stats.throttled_requests += 1;
                }
                stats.last_status = Some(code);
            }
            RequestOutcome::Transport => stats.failed_requests += 1,
        }
    }

    pub async fn record_retry(&self) {
        self.stats.write().await.retried_requests += 1;
    }

    pub async fn get_stats(&self) -> ConnectionStats {
        self.stats.read().await.clone()
    }

    /// Every request to the control plane speaks JSON, so `Accept` is set
    /// once here instead of per call.
    pub fn build_client(&self, insecure: bool) -> Result<reqwest::Client, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let mut builder = reqwest::Client::builder()
            .user_agent(self.config.user_agent.as_str())
            .default_headers(headers)
            .danger_accept_invalid_certs(insecure)
            .timeout(self.config.request_timeout)
            .connect_timeout(self.config.connect_timeout)
            .pool_idle_timeout(self.config.idle_timeout)
            .pool_max_idle_per_host(self.config.max_idle_per_host);

        if let Some(keepalive) = self.config.tcp_keepalive {
            builder = builder.tcp_keepalive(keepalive);
        }

        builder.build()
    }
}
