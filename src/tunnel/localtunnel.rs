//! localtunnel provider.
//!
//! Runs the `localtunnel` npm client through a package runner (`npx` by
//! default). The runner may download the client on first use. The client
//! prints `your url is: https://<slug>.loca.lt` once connected.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

use crate::config::LocalTunnelConfig;
use crate::error::Result;
use crate::tunnel::process::ProviderProcess;
use crate::tunnel::types::TunnelProvider;

/// localtunnel provider backed by a package runner.
pub struct LocalTunnel {
    config: LocalTunnelConfig,
}

impl LocalTunnel {
    pub fn new(config: LocalTunnelConfig) -> Self {
        Self { config }
    }

    fn command(&self, local_port: u16) -> Command {
        let mut cmd = Command::new(&self.config.runner);
        cmd.arg("--yes")
            .arg("localtunnel")
            .arg("--port")
            .arg(local_port.to_string());
        if let Some(ref subdomain) = self.config.subdomain {
            cmd.arg("--subdomain").arg(subdomain);
        }
        cmd
    }
}

#[async_trait]
impl TunnelProvider for LocalTunnel {
    fn name(&self) -> &str {
        "localtunnel"
    }

    async fn start(&self, local_port: u16) -> Result<ProviderProcess> {
        info!("Starting localtunnel on port {}", local_port);
        ProviderProcess::spawn(self.name(), self.command(local_port))
    }
}
