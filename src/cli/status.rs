//! `tunnelup check` and `tunnelup providers`.

use anyhow::{Context, Result};

use tunnelup::config::Config;
use tunnelup::health::{HealthChecker, HttpHealthChecker};
use tunnelup::tunnel;

/// Probe the local service once and print the classification.
pub(crate) async fn cmd_check(config: &Config) -> Result<()> {
    let endpoint = config.service.endpoint();
    let checker = HttpHealthChecker::new(config.service.probe_timeout())
        .with_context(|| "Failed to set up the health check")?;
    if checker.check(&endpoint).await.is_healthy() {
        println!("✅ {} is up", endpoint.url());
    } else {
        println!("❌ {} is not answering", endpoint.url());
    }
    Ok(())
}

/// List the provider registry in priority order.
pub(crate) fn cmd_providers(config: &Config) -> Result<()> {
    let providers =
        tunnel::registry(&config.tunnel).with_context(|| "Failed to build provider registry")?;
    println!("Tunnel providers (tried in order):");
    for (i, provider) in providers.iter().enumerate() {
        println!("  {}. {}", i + 1, provider.name());
    }
    if providers.iter().any(|p| p.name() == "serveo") && !config.tunnel.ssh.strict_host_key_checking
    {
        println!();
        println!(
            "Note: serveo runs with SSH host key verification disabled. \
             Set TUNNELUP_SSH_STRICT_HOST_KEY=true to require it."
        );
    }
    Ok(())
}
