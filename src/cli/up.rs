//! `tunnelup up`: provision and hold a public tunnel.

use anyhow::{Context, Result};
use tracing::{info, warn};

use tunnelup::config::Config;
use tunnelup::orchestrator::{Orchestrator, Outcome};
use tunnelup::report;

/// Run the orchestrator once and print its report.
///
/// A successful tunnel is held open until its client exits or Ctrl-C is
/// pressed. Advisory outcomes still exit with success.
pub(crate) async fn cmd_up(config: &Config) -> Result<()> {
    print!("{}", report::render_header(&config.service.endpoint().to_string()));

    let mut orchestrator =
        Orchestrator::from_config(config).with_context(|| "Failed to set up the orchestrator")?;
    // Tunnel clients run in their own process groups and miss the terminal's
    // SIGINT, so an interrupted run has to stop them itself.
    let outcome = tokio::select! {
        outcome = orchestrator.run() => Some(outcome),
        _ = tokio::signal::ctrl_c() => None,
    };
    let Some(outcome) = outcome else {
        info!("Interrupted, stopping tunnel clients");
        orchestrator.teardown().await;
        return Ok(());
    };
    print!("{}", report::render(&outcome));

    let Outcome::Reported { mut process, .. } = outcome else {
        return Ok(());
    };

    println!("\nTunnel is up. Press Ctrl-C to close it.");
    let provider = process.provider().to_string();
    let interrupted = tokio::select! {
        _ = tokio::signal::ctrl_c() => true,
        state = process.wait() => {
            warn!(%provider, ?state, "tunnel client exited");
            false
        }
    };
    if interrupted {
        info!("Closing tunnel");
        process.terminate().await;
    }
    Ok(())
}
