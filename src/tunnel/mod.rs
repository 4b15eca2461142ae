//! Tunnel providers for exposing a local port at a public URL.
//!
//! Supports three providers:
//! - **localtunnel** — the npm client run through `npx`, public `*.loca.lt` URL
//! - **serveo** — reverse SSH forward to a public relay (serveo.net)
//! - **bore** — pinned client binary downloaded to a scratch path
//!
//! # Usage
//!
//! ```rust,no_run
//! use tunnelup::config::TunnelConfig;
//! use tunnelup::tunnel::registry;
//!
//! # async fn example() -> tunnelup::error::Result<()> {
//! let providers = registry(&TunnelConfig::default())?;
//! let process = providers[0].start(3000).await?;
//! println!("{} started: {:?}", process.provider(), process.id());
//! # Ok(())
//! # }
//! ```

pub mod bore;
pub mod localtunnel;
pub mod process;
pub mod ssh;
pub mod types;

pub use bore::BoreTunnel;
pub use localtunnel::LocalTunnel;
pub use process::{ProcessState, ProviderProcess};
pub use ssh::SshTunnel;
pub use types::TunnelProvider;

use crate::config::{TunnelConfig, KNOWN_PROVIDERS};
use crate::error::{Result, TunnelupError};

use tracing::debug;

/// Create a single tunnel provider by name.
pub fn create_provider(name: &str, config: &TunnelConfig) -> Result<Box<dyn TunnelProvider>> {
    match name {
        "localtunnel" => Ok(Box::new(LocalTunnel::new(config.localtunnel.clone()))),
        "serveo" => Ok(Box::new(SshTunnel::new(config.ssh.clone()))),
        "bore" => Ok(Box::new(BoreTunnel::new(config.bore.clone()))),
        other => Err(TunnelupError::Config(format!(
            "Unknown tunnel provider '{}'. Supported: {}",
            other,
            KNOWN_PROVIDERS.join(", ")
        ))),
    }
}

/// Build the ordered provider registry, highest priority first.
pub fn registry(config: &TunnelConfig) -> Result<Vec<Box<dyn TunnelProvider>>> {
    if config.providers.is_empty() {
        return Err(TunnelupError::Config("no tunnel providers configured".into()));
    }
    config
        .providers
        .iter()
        .map(|name| {
            debug!("Registering tunnel provider {}", name);
            create_provider(name, config)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_provider_localtunnel() {
        let provider = create_provider("localtunnel", &TunnelConfig::default()).unwrap();
        assert_eq!(provider.name(), "localtunnel");
    }

    #[test]
    fn test_create_provider_serveo() {
        let provider = create_provider("serveo", &TunnelConfig::default()).unwrap();
        assert_eq!(provider.name(), "serveo");
    }

    #[test]
    fn test_create_provider_bore() {
        let provider = create_provider("bore", &TunnelConfig::default()).unwrap();
        assert_eq!(provider.name(), "bore");
    }

    #[test]
    fn test_create_provider_unknown() {
        match create_provider("teleport", &TunnelConfig::default()) {
            Err(e) => {
                let msg = e.to_string();
                assert!(msg.contains("Unknown tunnel provider"), "got: {}", msg);
                assert!(msg.contains("teleport"), "got: {}", msg);
            }
            Ok(_) => panic!("expected error for unknown provider"),
        }
    }

    #[test]
    fn test_registry_default_order() {
        let providers = registry(&TunnelConfig::default()).unwrap();
        let names: Vec<&str> = providers.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["localtunnel", "serveo", "bore"]);
    }

    #[test]
    fn test_registry_custom_order() {
        let config = TunnelConfig {
            providers: vec!["bore".into(), "localtunnel".into()],
            ..Default::default()
        };
        let providers = registry(&config).unwrap();
        let names: Vec<&str> = providers.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["bore", "localtunnel"]);
    }

    #[test]
    fn test_registry_empty() {
        let config = TunnelConfig {
            providers: Vec::new(),
            ..Default::default()
        };
        assert!(registry(&config).is_err());
    }
}
