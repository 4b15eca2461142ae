//! Provisioning state machine.
//!
//! One run walks `Idle → CheckingHealth → (LaunchingService)? →
//! StartingTunnel → Waiting → Scraping` and ends in `Reported`,
//! `Exhausted` or `LaunchFailed`. Providers are tried one at a time in
//! registry order; the first one whose output yields a public URL wins.
//!
//! Waiting is a bounded polling loop over the provider's captured output,
//! not a readiness handshake: a provider that prints its URL after the
//! window closes counts as a miss.

use std::path::PathBuf;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::{Config, ServiceEndpoint};
use crate::error::Result;
use crate::health::{HealthChecker, HttpHealthChecker};
use crate::launcher::{ProcessLauncher, ServiceLauncher};
use crate::tunnel::{self, ProcessState, ProviderProcess, TunnelProvider};

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    CheckingHealth,
    LaunchingService,
    StartingTunnel,
    Waiting,
    Scraping,
    Reported,
    Exhausted,
    LaunchFailed,
}

/// What one provider attempt produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelResult {
    pub provider: String,
    pub raw_output: String,
    pub extracted_url: Option<String>,
}

/// Why a provider yielded no public URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptFailure {
    pub provider: String,
    pub reason: String,
}

/// Terminal result of a run.
#[derive(Debug)]
pub enum Outcome {
    /// A provider produced a URL. Its process is still running.
    Reported {
        result: TunnelResult,
        process: ProviderProcess,
    },
    /// Every provider in the registry failed.
    Exhausted { attempts: Vec<AttemptFailure> },
    /// The local service could not be started.
    LaunchFailed { cause: String },
}

impl Outcome {
    pub fn is_reported(&self) -> bool {
        matches!(self, Outcome::Reported { .. })
    }
}

#[derive(Debug, Clone, Copy)]
struct Timing {
    settle_delay: Duration,
    window: Duration,
    poll_interval: Duration,
}

enum Attempt {
    Success(TunnelResult, ProviderProcess),
    Miss(AttemptFailure, Option<ProviderProcess>),
}

/// Sequences health check, launch and tunnel providers for one run.
pub struct Orchestrator {
    endpoint: ServiceEndpoint,
    working_dir: PathBuf,
    start_command: Vec<String>,
    health: Box<dyn HealthChecker>,
    launcher: Box<dyn ServiceLauncher>,
    providers: Vec<Box<dyn TunnelProvider>>,
    timing: Timing,
    phase: Phase,
    abandoned: Vec<ProviderProcess>,
}

impl Orchestrator {
    /// Create an orchestrator with explicit collaborators.
    pub fn new(
        config: &Config,
        health: Box<dyn HealthChecker>,
        launcher: Box<dyn ServiceLauncher>,
        providers: Vec<Box<dyn TunnelProvider>>,
    ) -> Self {
        Self {
            endpoint: config.service.endpoint(),
            working_dir: config.service.working_dir.clone(),
            start_command: config.service.start_command.clone(),
            health,
            launcher,
            providers,
            timing: Timing {
                settle_delay: config.service.settle_delay(),
                window: config.tunnel.window(),
                poll_interval: config.tunnel.poll_interval(),
            },
            phase: Phase::Idle,
            abandoned: Vec::new(),
        }
    }

    /// Create an orchestrator using the HTTP health check, the process
    /// launcher and the configured provider registry.
    pub fn from_config(config: &Config) -> Result<Self> {
        let providers = tunnel::registry(&config.tunnel)?;
        let health = HttpHealthChecker::new(config.service.probe_timeout())?;
        Ok(Self::new(
            config,
            Box::new(health),
            Box::new(ProcessLauncher),
            providers,
        ))
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Run the whole sequence once. Never returns an error: every failure
    /// ends in an advisory [`Outcome`].
    pub async fn run(&mut self) -> Outcome {
        enter(&mut self.phase, Phase::CheckingHealth);
        let health = self.health.check(&self.endpoint).await;

        if health.is_healthy() {
            info!("Service already running at {}", self.endpoint);
        } else {
            info!("Service not reachable at {}, starting it", self.endpoint);
            enter(&mut self.phase, Phase::LaunchingService);
            if let Err(e) = self
                .launcher
                .launch(&self.working_dir, &self.start_command)
                .await
            {
                error!("{}", e);
                enter(&mut self.phase, Phase::LaunchFailed);
                return Outcome::LaunchFailed {
                    cause: e.to_string(),
                };
            }

            tokio::time::sleep(self.timing.settle_delay).await;
            if !self.health.check(&self.endpoint).await.is_healthy() {
                warn!(
                    "Service still not answering at {} after {:?}; exposing it anyway",
                    self.endpoint, self.timing.settle_delay
                );
            }
        }

        let mut failures = Vec::new();
        let mut winner = None;
        for provider in &self.providers {
            match attempt(
                provider.as_ref(),
                self.endpoint.port,
                self.timing,
                &mut self.phase,
            )
            .await
            {
                Attempt::Success(result, process) => {
                    winner = Some((result, process));
                    break;
                }
                Attempt::Miss(failure, process) => {
                    warn!(provider = %failure.provider, "{}", failure.reason);
                    failures.push(failure);
                    self.abandoned.extend(process);
                }
            }
        }

        self.teardown().await;

        match winner {
            Some((result, process)) => {
                enter(&mut self.phase, Phase::Reported);
                Outcome::Reported { result, process }
            }
            None => {
                enter(&mut self.phase, Phase::Exhausted);
                Outcome::Exhausted { attempts: failures }
            }
        }
    }

    /// Terminate every provider process that did not yield a URL.
    pub async fn teardown(&mut self) {
        for mut process in std::mem::take(&mut self.abandoned) {
            debug!(provider = %process.provider(), "tearing down abandoned tunnel client");
            process.terminate().await;
        }
    }
}

fn enter(phase: &mut Phase, next: Phase) {
    debug!(from = ?*phase, to = ?next, "orchestrator phase");
    *phase = next;
}

async fn attempt(
    provider: &dyn TunnelProvider,
    port: u16,
    timing: Timing,
    phase: &mut Phase,
) -> Attempt {
    enter(phase, Phase::StartingTunnel);
    let mut process = match provider.start(port).await {
        Ok(process) => process,
        Err(e) => {
            return Attempt::Miss(
                AttemptFailure {
                    provider: provider.name().to_string(),
                    reason: e.to_string(),
                },
                None,
            );
        }
    };

    enter(phase, Phase::Waiting);
    let state = observe(provider, &mut process, timing).await;

    enter(phase, Phase::Scraping);
    let raw_output = process.output();
    match provider.extract_url(&raw_output) {
        Some(url) => {
            info!(provider = provider.name(), "Public URL: {}", url);
            Attempt::Success(
                TunnelResult {
                    provider: provider.name().to_string(),
                    raw_output,
                    extracted_url: Some(url),
                },
                process,
            )
        }
        None => {
            let reason = match state {
                ProcessState::Exited | ProcessState::Failed => {
                    format!("{} exited without providing a public URL", provider.name())
                }
                _ => format!(
                    "no public URL from {} within {}s",
                    provider.name(),
                    timing.window.as_secs()
                ),
            };
            Attempt::Miss(
                AttemptFailure {
                    provider: provider.name().to_string(),
                    reason,
                },
                Some(process),
            )
        }
    }
}

/// Poll the captured output until the success predicate matches, the
/// client is gone, or the window closes.
async fn observe(
    provider: &dyn TunnelProvider,
    process: &mut ProviderProcess,
    timing: Timing,
) -> ProcessState {
    let deadline = Instant::now() + timing.window;
    loop {
        if provider.extract_url(&process.output()).is_some() {
            return process.refresh();
        }
        let state = process.refresh();
        if matches!(state, ProcessState::Exited | ProcessState::Failed) && process.output_closed()
        {
            return state;
        }
        let now = Instant::now();
        if now >= deadline {
            return state;
        }
        tokio::time::sleep(timing.poll_interval.min(deadline - now)).await;
    }
}
