//! Liveness probe for the local service.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::config::ServiceEndpoint;
use crate::error::Result;

/// Result of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Healthy,
    Unhealthy,
}

impl Health {
    pub fn is_healthy(self) -> bool {
        self == Health::Healthy
    }
}

/// Probes an endpoint once. Never fails: every problem is `Unhealthy`.
#[async_trait]
pub trait HealthChecker: Send + Sync {
    async fn check(&self, endpoint: &ServiceEndpoint) -> Health;
}

/// HTTP GET against the endpoint root; any 2xx is healthy.
pub struct HttpHealthChecker {
    client: reqwest::Client,
}

impl HttpHealthChecker {
    /// Build the probe client. Fails only if the HTTP client itself cannot
    /// be constructed, so a broken client never reads as a dead service.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            // Local probe: never route through a system proxy.
            .no_proxy()
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HealthChecker for HttpHealthChecker {
    async fn check(&self, endpoint: &ServiceEndpoint) -> Health {
        let url = endpoint.url();
        match self.client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => Health::Healthy,
            Ok(resp) => {
                debug!(%url, status = %resp.status(), "health check returned non-success");
                Health::Unhealthy
            }
            Err(e) => {
                debug!(%url, "health check failed: {}", e);
                Health::Unhealthy
            }
        }
    }
}
