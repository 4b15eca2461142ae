//! Tunnel provider trait.
//!
//! A provider knows how to launch one external tunneling mechanism against
//! a local port and how to recognize its public URL in the client output.

use async_trait::async_trait;

use crate::error::Result;
use crate::scrape;
use crate::tunnel::process::ProviderProcess;

/// Trait implemented by all tunnel providers.
///
/// `start()` only launches the client; the orchestrator watches the
/// returned process's output and asks [`TunnelProvider::extract_url`]
/// whether a public URL has appeared.
#[async_trait]
pub trait TunnelProvider: Send + Sync {
    /// Human-readable provider name (e.g., "localtunnel", "serveo", "bore").
    fn name(&self) -> &str;

    /// Launch the tunnel client forwarding to `local_port`.
    ///
    /// Every launch-time failure is returned as
    /// [`TunnelupError::ProviderStart`](crate::error::TunnelupError::ProviderStart).
    async fn start(&self, local_port: u16) -> Result<ProviderProcess>;

    /// Success predicate: the public URL in the client's output, if present.
    fn extract_url(&self, output: &str) -> Option<String> {
        scrape::scrape(output)
    }
}
