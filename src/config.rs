//! Configuration for tunnelup.
//!
//! Values come from three layers, later ones winning: built-in defaults,
//! an optional JSON file, then `TUNNELUP_*` environment variables. The CLI
//! applies its own flags on top of the loaded [`Config`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TunnelupError};

/// Provider names understood by the registry, in default priority order.
pub const KNOWN_PROVIDERS: &[&str] = &["localtunnel", "serveo", "bore"];

/// The local service to expose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    pub host: String,
    pub port: u16,
}

impl ServiceEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Root URL probed by the health check.
    pub fn url(&self) -> String {
        format!("http://{}:{}/", self.host, self.port)
    }
}

impl std::fmt::Display for ServiceEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub tunnel: TunnelConfig,
}

/// How to find, probe and start the local service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    /// Directory the start command runs in.
    pub working_dir: PathBuf,
    /// Program followed by its arguments.
    pub start_command: Vec<String>,
    /// Wait after spawning the service before exposing it.
    pub settle_secs: u64,
    /// Upper bound for a single health probe.
    pub probe_timeout_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3000,
            working_dir: PathBuf::from("."),
            start_command: vec!["node".to_string(), "server/index.js".to_string()],
            settle_secs: 2,
            probe_timeout_ms: 3000,
        }
    }
}

impl ServiceConfig {
    pub fn endpoint(&self) -> ServiceEndpoint {
        ServiceEndpoint::new(self.host.clone(), self.port)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

/// Tunnel registry order, observation window and per-provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TunnelConfig {
    /// Providers to try, highest priority first.
    pub providers: Vec<String>,
    /// How long to watch a provider's output for a public URL.
    pub window_secs: u64,
    /// How often the output buffer is re-read during the window.
    pub poll_interval_ms: u64,
    pub localtunnel: LocalTunnelConfig,
    pub ssh: SshTunnelConfig,
    pub bore: BoreTunnelConfig,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            providers: KNOWN_PROVIDERS.iter().map(|p| p.to_string()).collect(),
            window_secs: 10,
            poll_interval_ms: 500,
            localtunnel: LocalTunnelConfig::default(),
            ssh: SshTunnelConfig::default(),
            bore: BoreTunnelConfig::default(),
        }
    }
}

impl TunnelConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// localtunnel client run through a package runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalTunnelConfig {
    /// Package runner used to fetch and run the client.
    pub runner: String,
    /// Requested subdomain on loca.lt, if any.
    pub subdomain: Option<String>,
}

impl Default for LocalTunnelConfig {
    fn default() -> Self {
        Self {
            runner: "npx".to_string(),
            subdomain: None,
        }
    }
}

/// Reverse-forward SSH session to a public relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SshTunnelConfig {
    pub ssh_binary: String,
    pub relay_host: String,
    pub remote_port: u16,
    /// Verify the relay's host key. Off by default: relays like serveo.net
    /// are used for throwaway demo tunnels only.
    pub strict_host_key_checking: bool,
}

impl Default for SshTunnelConfig {
    fn default() -> Self {
        Self {
            ssh_binary: "ssh".to_string(),
            relay_host: "serveo.net".to_string(),
            remote_port: 80,
            strict_host_key_checking: false,
        }
    }
}

/// Downloaded tunnel binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoreTunnelConfig {
    /// Pinned release.
    pub version: String,
    /// Download URL; `{version}` and `{target}` are substituted.
    pub download_url: String,
    /// Where the binary is written before it is run.
    pub scratch_path: PathBuf,
    /// Arguments passed to the binary; `{port}` is substituted.
    pub args: Vec<String>,
    /// Expected lowercase hex SHA-256 of the download.
    pub sha256: Option<String>,
    pub download_timeout_secs: u64,
}

impl Default for BoreTunnelConfig {
    fn default() -> Self {
        Self {
            version: "3.8.4".to_string(),
            download_url: "https://bore.pub/{version}/{target}/bore".to_string(),
            scratch_path: std::env::temp_dir().join("bore"),
            args: vec!["pub".to_string(), "localhost:{port}".to_string()],
            sha256: None,
            download_timeout_secs: 60,
        }
    }
}

impl Config {
    /// Load configuration from an optional JSON file, then apply environment
    /// overrides. Not validated: callers layer CLI flags on top first.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// [`Config::load`] with an explicit environment lookup.
    pub fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(lookup)?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            TunnelupError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            TunnelupError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Apply `TUNNELUP_*` overrides looked up through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = get("TUNNELUP_HOST") {
            self.service.host = host;
        }
        if let Some(port) = get("TUNNELUP_PORT") {
            self.service.port = parse_env("TUNNELUP_PORT", &port)?;
        }
        if let Some(dir) = get("TUNNELUP_SERVICE_DIR") {
            self.service.working_dir = PathBuf::from(dir);
        }
        if let Some(cmd) = get("TUNNELUP_START_COMMAND") {
            self.service.start_command = split_command(&cmd);
        }
        if let Some(secs) = get("TUNNELUP_SETTLE_SECS") {
            self.service.settle_secs = parse_env("TUNNELUP_SETTLE_SECS", &secs)?;
        }
        if let Some(providers) = get("TUNNELUP_PROVIDERS") {
            self.tunnel.providers = split_list(&providers);
        }
        if let Some(secs) = get("TUNNELUP_WAIT_SECS") {
            self.tunnel.window_secs = parse_env("TUNNELUP_WAIT_SECS", &secs)?;
        }
        if let Some(strict) = get("TUNNELUP_SSH_STRICT_HOST_KEY") {
            self.tunnel.ssh.strict_host_key_checking =
                parse_bool("TUNNELUP_SSH_STRICT_HOST_KEY", &strict)?;
        }
        if let Some(sha) = get("TUNNELUP_BORE_SHA256") {
            self.tunnel.bore.sha256 = Some(sha.trim().to_ascii_lowercase());
        }
        Ok(())
    }

    /// Reject configurations the orchestrator cannot run.
    pub fn validate(&self) -> Result<()> {
        if self.service.port == 0 {
            return Err(TunnelupError::Config("service port must be non-zero".into()));
        }
        if self.service.start_command.is_empty() {
            return Err(TunnelupError::Config("service start command is empty".into()));
        }
        if self.tunnel.providers.is_empty() {
            return Err(TunnelupError::Config("no tunnel providers configured".into()));
        }
        for name in &self.tunnel.providers {
            if !KNOWN_PROVIDERS.contains(&name.as_str()) {
                return Err(TunnelupError::Config(format!(
                    "Unknown tunnel provider '{}'. Supported: {}",
                    name,
                    KNOWN_PROVIDERS.join(", ")
                )));
            }
        }
        if self.tunnel.poll_interval_ms == 0 {
            return Err(TunnelupError::Config("poll interval must be non-zero".into()));
        }
        Ok(())
    }
}

/// Split a start command on whitespace. No shell quoting is supported.
pub fn split_command(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e| {
        TunnelupError::Config(format!("Invalid value for {}: '{}' ({})", key, value, e))
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(TunnelupError::Config(format!(
            "Invalid value for {}: '{}' (expected true/false)",
            key, value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.service.endpoint(), ServiceEndpoint::new("localhost", 3000));
        assert_eq!(config.service.start_command, vec!["node", "server/index.js"]);
        assert_eq!(config.tunnel.providers, vec!["localtunnel", "serveo", "bore"]);
        assert!(!config.tunnel.ssh.strict_host_key_checking);
        assert_eq!(config.tunnel.ssh.remote_port, 80);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_endpoint_url() {
        let endpoint = ServiceEndpoint::new("127.0.0.1", 8080);
        assert_eq!(endpoint.url(), "http://127.0.0.1:8080/");
        assert_eq!(endpoint.to_string(), "127.0.0.1:8080");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                ("TUNNELUP_PORT", "4000"),
                ("TUNNELUP_START_COMMAND", "python3 -m http.server 4000"),
                ("TUNNELUP_PROVIDERS", "Bore, serveo"),
                ("TUNNELUP_SSH_STRICT_HOST_KEY", "yes"),
                ("TUNNELUP_BORE_SHA256", "ABCDEF"),
            ]))
            .unwrap();
        assert_eq!(config.service.port, 4000);
        assert_eq!(
            config.service.start_command,
            vec!["python3", "-m", "http.server", "4000"]
        );
        assert_eq!(config.tunnel.providers, vec!["bore", "serveo"]);
        assert!(config.tunnel.ssh.strict_host_key_checking);
        assert_eq!(config.tunnel.bore.sha256.as_deref(), Some("abcdef"));
    }

    #[test]
    fn test_env_blank_values_ignored() {
        let mut config = Config::default();
        config.apply_env(env(&[("TUNNELUP_HOST", "  ")])).unwrap();
        assert_eq!(config.service.host, "localhost");
    }

    #[test]
    fn test_env_invalid_port() {
        let mut config = Config::default();
        let err = config
            .apply_env(env(&[("TUNNELUP_PORT", "eighty")]))
            .unwrap_err();
        assert!(err.to_string().contains("TUNNELUP_PORT"), "got: {}", err);
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = Config::default();
        config.tunnel.providers = vec!["teleport".into()];
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("Unknown tunnel provider"), "got: {}", err);
        assert!(err.contains("teleport"), "got: {}", err);
    }

    #[test]
    fn test_validate_empty_command() {
        let mut config = Config::default();
        config.service.start_command.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_partial() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("tunnelup.json");
        std::fs::write(
            &path,
            r#"{"service": {"port": 5173}, "tunnel": {"window_secs": 20, "ssh": {"relay_host": "localhost.run"}}}"#,
        )
        .unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.service.port, 5173);
        assert_eq!(config.service.host, "localhost");
        assert_eq!(config.tunnel.window_secs, 20);
        assert_eq!(config.tunnel.ssh.relay_host, "localhost.run");
        assert_eq!(config.tunnel.ssh.ssh_binary, "ssh");
    }

    #[test]
    fn test_load_leaves_validation_to_caller() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("tunnelup.json");
        std::fs::write(&path, r#"{"tunnel": {"providers": ["teleport"]}}"#).unwrap();

        let config = Config::load_with(Some(&path), env(&[("TUNNELUP_PORT", "0")])).unwrap();
        assert_eq!(config.service.port, 0);
        assert_eq!(config.tunnel.providers, vec!["teleport"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_missing() {
        let err = Config::from_file(Path::new("/nonexistent/tunnelup.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}
