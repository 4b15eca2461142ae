//! SSH reverse-forward provider.
//!
//! Opens `ssh -R <remote>:localhost:<port> <relay>` against a public relay
//! such as serveo.net, which answers with
//! `Forwarding HTTP traffic from https://<slug>.serveo.net`.
//!
//! Host-key verification is controlled by
//! [`SshTunnelConfig::strict_host_key_checking`] and is off by default.
//! With it off, anyone able to intercept the connection can impersonate
//! the relay. Only use it for throwaway demo tunnels.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use crate::config::SshTunnelConfig;
use crate::error::Result;
use crate::tunnel::process::ProviderProcess;
use crate::tunnel::types::TunnelProvider;

/// Reverse SSH tunnel through a public relay host.
pub struct SshTunnel {
    config: SshTunnelConfig,
}

impl SshTunnel {
    pub fn new(config: SshTunnelConfig) -> Self {
        Self { config }
    }

    fn command(&self, local_port: u16) -> Command {
        let checking = if self.config.strict_host_key_checking {
            "yes"
        } else {
            "no"
        };
        let mut cmd = Command::new(&self.config.ssh_binary);
        cmd.arg("-o")
            .arg(format!("StrictHostKeyChecking={}", checking))
            .arg("-R")
            .arg(format!(
                "{}:localhost:{}",
                self.config.remote_port, local_port
            ))
            .arg(&self.config.relay_host);
        cmd
    }
}

#[async_trait]
impl TunnelProvider for SshTunnel {
    fn name(&self) -> &str {
        "serveo"
    }

    async fn start(&self, local_port: u16) -> Result<ProviderProcess> {
        if !self.config.strict_host_key_checking {
            warn!(
                relay = %self.config.relay_host,
                "Host key verification disabled for SSH tunnel; use for demo tunnels only"
            );
        }
        info!(
            "Starting SSH tunnel via {} (remote port {} -> local port {})",
            self.config.relay_host, self.config.remote_port, local_port
        );
        ProviderProcess::spawn(self.name(), self.command(local_port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(cmd: &Command) -> Vec<String> {
        cmd.as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_default_command() {
        let tunnel = SshTunnel::new(SshTunnelConfig::default());
        let cmd = tunnel.command(3000);
        assert_eq!(cmd.as_std().get_program(), "ssh");
        assert_eq!(
            args(&cmd),
            vec![
                "-o",
                "StrictHostKeyChecking=no",
                "-R",
                "80:localhost:3000",
                "serveo.net"
            ]
        );
        assert_eq!(tunnel.name(), "serveo");
    }

    #[test]
    fn test_strict_host_key_checking() {
        let tunnel = SshTunnel::new(SshTunnelConfig {
            strict_host_key_checking: true,
            relay_host: "localhost.run".into(),
            remote_port: 8080,
            ..Default::default()
        });
        let args = args(&tunnel.command(5000));
        assert!(args.contains(&"StrictHostKeyChecking=yes".to_string()));
        assert!(args.contains(&"8080:localhost:5000".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("localhost.run"));
    }

    #[test]
    fn test_extract_url() {
        let tunnel = SshTunnel::new(SshTunnelConfig::default());
        let output = "Forwarding HTTP traffic from https://f00dbabe.serveo.net\n";
        assert_eq!(
            tunnel.extract_url(output).as_deref(),
            Some("https://f00dbabe.serveo.net")
        );
    }

    #[tokio::test]
    async fn test_start_missing_ssh() {
        let tunnel = SshTunnel::new(SshTunnelConfig {
            ssh_binary: "/nonexistent/ssh".into(),
            ..Default::default()
        });
        match tunnel.start(3000).await {
            Err(e) => assert!(e.to_string().contains("serveo"), "got: {}", e),
            Ok(_) => panic!("expected start error for missing ssh"),
        }
    }
}
