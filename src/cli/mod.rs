//! Command-line interface.

mod status;
mod up;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tunnelup::config::{split_command, Config};

#[derive(Parser, Debug)]
#[command(name = "tunnelup")]
#[command(about = "Expose a local service through a public tunnel")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    overrides: Overrides,

    /// JSON configuration file
    #[arg(short, long, global = true, env = "TUNNELUP_CONFIG")]
    config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check the service, start it if needed and open a public tunnel (default)
    Up,
    /// Probe the local service once
    Check,
    /// List tunnel providers in the order they are tried
    Providers,
}

/// Flags layered over the loaded configuration.
#[derive(Args, Debug, Default)]
struct Overrides {
    /// Local service host
    #[arg(long, global = true)]
    host: Option<String>,

    /// Local service port
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Directory the service is started from
    #[arg(long, global = true)]
    service_dir: Option<PathBuf>,

    /// Command that starts the service, e.g. "node server/index.js"
    #[arg(long, global = true)]
    start_command: Option<String>,

    /// Tunnel provider to try; repeat to set the order
    #[arg(long = "provider", global = true)]
    providers: Vec<String>,

    /// Seconds to wait for each provider's public URL
    #[arg(long, global = true)]
    wait_secs: Option<u64>,
}

impl Overrides {
    fn apply(self, config: &mut Config) {
        if let Some(host) = self.host {
            config.service.host = host;
        }
        if let Some(port) = self.port {
            config.service.port = port;
        }
        if let Some(dir) = self.service_dir {
            config.service.working_dir = dir;
        }
        if let Some(cmd) = self.start_command {
            config.service.start_command = split_command(&cmd);
        }
        if !self.providers.is_empty() {
            config.tunnel.providers = self
                .providers
                .into_iter()
                .map(|p| p.to_ascii_lowercase())
                .collect();
        }
        if let Some(secs) = self.wait_secs {
            config.tunnel.window_secs = secs;
        }
    }
}

/// Parse arguments, set up logging and dispatch.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = resolve_config(cli.config.as_deref(), cli.overrides, |key| {
        std::env::var(key).ok()
    })?;

    match cli.command.unwrap_or(Commands::Up) {
        Commands::Up => up::cmd_up(&config).await,
        Commands::Check => status::cmd_check(&config).await,
        Commands::Providers => status::cmd_providers(&config),
    }
}

/// Defaults, then the file, then the environment, then flags. Validated once
/// at the end so a flag can replace a bad file or env value.
fn resolve_config<F>(path: Option<&Path>, overrides: Overrides, lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config =
        Config::load_with(path, lookup).with_context(|| "Failed to load configuration")?;
    overrides.apply(&mut config);
    config
        .validate()
        .with_context(|| "Invalid configuration")?;
    Ok(config)
}

/// Logs go to stderr; stdout carries the report.
fn init_logging(verbose: bool) {
    let default = if verbose { "tunnelup=debug" } else { "tunnelup=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
