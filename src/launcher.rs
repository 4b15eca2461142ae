//! Background launch of the local service.
//!
//! The service is spawned detached with its output discarded. The working
//! directory is set on the spawned command only, so the caller's current
//! directory is never changed. The launcher does not wait for readiness.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

use crate::error::{Result, TunnelupError};

/// Handle to a launched service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchHandle {
    pub pid: Option<u32>,
}

/// Starts the service when the health check finds it absent.
#[async_trait]
pub trait ServiceLauncher: Send + Sync {
    async fn launch(&self, working_dir: &Path, start_command: &[String]) -> Result<LaunchHandle>;
}

/// Spawns the start command as a detached OS process.
#[derive(Debug, Default)]
pub struct ProcessLauncher;

#[async_trait]
impl ServiceLauncher for ProcessLauncher {
    async fn launch(&self, working_dir: &Path, start_command: &[String]) -> Result<LaunchHandle> {
        let (program, args) = start_command
            .split_first()
            .ok_or_else(|| TunnelupError::Launch("start command is empty".into()))?;

        if !working_dir.is_dir() {
            return Err(TunnelupError::Launch(format!(
                "working directory {} does not exist",
                working_dir.display()
            )));
        }

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(false);
        // Own process group: Ctrl-C on the CLI must not take the service down.
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd.spawn().map_err(|e| {
            TunnelupError::Launch(format!(
                "failed to run '{}' in {}: {}",
                start_command.join(" "),
                working_dir.display(),
                e
            ))
        })?;

        let pid = child.id();
        info!(pid = ?pid, dir = %working_dir.display(), "Service started: {}", start_command.join(" "));
        // Dropping the handle leaves the process running.
        drop(child);
        Ok(LaunchHandle { pid })
    }
}
