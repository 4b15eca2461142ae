//! Operator-facing text for a finished run.

use crate::orchestrator::{AttemptFailure, Outcome, TunnelResult};

const BANNER_WIDTH: usize = 50;

/// Manual alternatives offered when no tunnel could be created.
pub const FALLBACK_OPTIONS: &[&str] = &[
    "Deploy the service with Docker to a cloud server",
    "Use a one-click deploy on Railway or Render",
    "Run the service on a host with a public IP",
];

/// Render the outcome of a run for stdout.
pub fn render(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Reported { result, .. } => render_success(result),
        Outcome::Exhausted { attempts } => render_exhausted(attempts),
        Outcome::LaunchFailed { cause } => render_launch_failed(cause),
    }
}

/// Opening lines printed before a run starts.
pub fn render_header(endpoint: &str) -> String {
    let banner = "=".repeat(BANNER_WIDTH);
    format!("{banner}\n🌐 tunnelup: exposing {endpoint}\n{banner}\n")
}

fn render_success(result: &TunnelResult) -> String {
    let banner = "=".repeat(BANNER_WIDTH);
    let mut out = format!(
        "\n{banner}\n✅ {} connected!\n{banner}\n{}\n",
        result.provider,
        result.raw_output.trim_end()
    );
    if let Some(ref url) = result.extracted_url {
        out.push_str(&format!("\n🎮 Public URL: {}\n", url));
    }
    out
}

fn render_exhausted(attempts: &[AttemptFailure]) -> String {
    let mut out = String::from("\n❌ Could not create a public tunnel\n");
    for attempt in attempts {
        out.push_str(&format!("   - {}: {}\n", attempt.provider, attempt.reason));
    }
    out.push_str(&render_fallbacks());
    out
}

fn render_launch_failed(cause: &str) -> String {
    let mut out = format!("\n❌ Could not start the local service\n   {}\n", cause);
    out.push_str("\nStart the service manually and run tunnelup again.\n");
    out.push_str(&render_fallbacks());
    out
}

fn render_fallbacks() -> String {
    let mut out = String::from("\n💡 Fallback options:\n");
    for (i, option) in FALLBACK_OPTIONS.iter().enumerate() {
        out.push_str(&format!("   {}. {}\n", i + 1, option));
    }
    out
}
