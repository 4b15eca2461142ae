//! Downloaded-binary tunnel provider.
//!
//! Fetches a pinned release of the `bore` client for the host platform,
//! writes it to a scratch path, marks it executable and runs it in publish
//! mode against the local port. bore reports its public address as
//! `listening at bore.pub:<port>`, which is not an `https://` URL, so this
//! provider extends the default success predicate.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::BoreTunnelConfig;
use crate::error::{Result, TunnelupError};
use crate::scrape;
use crate::tunnel::process::ProviderProcess;
use crate::tunnel::types::TunnelProvider;

const BORE_USER_AGENT: &str = concat!("tunnelup/", env!("CARGO_PKG_VERSION"));

/// Phrase bore prints in front of the remote `host:port`.
const LISTENING_MARKER: &str = "listening at ";

/// Tunnel provider that downloads and runs a pinned client binary.
pub struct BoreTunnel {
    config: BoreTunnelConfig,
}

impl BoreTunnel {
    pub fn new(config: BoreTunnelConfig) -> Self {
        Self { config }
    }

    /// Download URL for this platform and pinned version.
    pub fn download_url(&self) -> String {
        self.config
            .download_url
            .replace("{version}", &self.config.version)
            .replace("{target}", &host_target())
    }

    fn command(&self, local_port: u16) -> Command {
        let mut cmd = Command::new(&self.config.scratch_path);
        for arg in &self.config.args {
            cmd.arg(arg.replace("{port}", &local_port.to_string()));
        }
        cmd
    }

    async fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, String> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.config.download_timeout_secs))
            .user_agent(BORE_USER_AGENT)
            .build()
            .map_err(|e| format!("failed to build HTTP client: {}", e))?;

        let resp = client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("download of {} failed: {}", url, e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(format!("download of {} returned HTTP {}", url, status));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| format!("failed reading {}: {}", url, e))?;
        if bytes.is_empty() {
            return Err(format!("download of {} was empty", url));
        }
        Ok(bytes.to_vec())
    }

    fn verify(&self, bytes: &[u8]) -> std::result::Result<(), String> {
        let Some(ref expected) = self.config.sha256 else {
            return Ok(());
        };
        let actual = format!("{:x}", Sha256::digest(bytes));
        if !actual.eq_ignore_ascii_case(expected.trim()) {
            return Err(format!(
                "checksum mismatch: expected {}, got {}",
                expected, actual
            ));
        }
        debug!("bore binary checksum verified");
        Ok(())
    }

    /// Download, verify and install the binary at the scratch path.
    async fn install(&self) -> std::result::Result<(), String> {
        let url = self.download_url();
        info!("Downloading bore {} from {}", self.config.version, url);
        let bytes = self.fetch(&url).await?;
        self.verify(&bytes)?;
        write_executable(&self.config.scratch_path, &bytes)
            .await
            .map_err(|e| {
                format!(
                    "failed to install {}: {}",
                    self.config.scratch_path.display(),
                    e
                )
            })
    }
}

#[async_trait]
impl TunnelProvider for BoreTunnel {
    fn name(&self) -> &str {
        "bore"
    }

    async fn start(&self, local_port: u16) -> Result<ProviderProcess> {
        self.install()
            .await
            .map_err(|cause| TunnelupError::provider_start(self.name(), cause))?;
        info!("Starting bore on port {}", local_port);
        ProviderProcess::spawn(self.name(), self.command(local_port))
    }

    fn extract_url(&self, output: &str) -> Option<String> {
        scrape::scrape(output).or_else(|| extract_listening_address(output))
    }
}

/// Turn `listening at bore.pub:41234` into `http://bore.pub:41234`.
pub fn extract_listening_address(output: &str) -> Option<String> {
    let start = output.find(LISTENING_MARKER)? + LISTENING_MARKER.len();
    let addr: String = output[start..]
        .chars()
        .take_while(|c| !c.is_whitespace())
        .collect();
    let (host, port) = addr.rsplit_once(':')?;
    if host.is_empty() || port.is_empty() || !port.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(format!("http://{}:{}", host, port))
}

/// Target triple used in release asset names.
pub fn host_target() -> String {
    let os = match std::env::consts::OS {
        "linux" => "unknown-linux-gnu",
        "macos" => "apple-darwin",
        "windows" => "pc-windows-msvc",
        other => other,
    };
    format!("{}-{}", std::env::consts::ARCH, os)
}

async fn write_executable(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    // Replace rather than overwrite in place: a previous run may still be
    // executing the old binary.
    let _ = tokio::fs::remove_file(path).await;
    tokio::fs::write(path, bytes).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).await?;
    }
    Ok(())
}
