//! Running tunnel client process.

use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::error::{Result, TunnelupError};
use crate::output::OutputCollector;

/// Lifecycle of a provider's client process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Spawned, nothing written yet.
    Starting,
    /// Alive and has produced output.
    Running,
    /// Exited with a success status, or was terminated by us.
    Exited,
    /// Exited with a failure status.
    Failed,
}

/// A spawned tunnel client and its captured output.
///
/// On unix the client leads its own process group, so wrappers such as
/// `npx` that start the real client as a grandchild are torn down as a
/// whole. Dropping the value kills the group as well; hold it for as long
/// as the tunnel should stay up.
#[derive(Debug)]
pub struct ProviderProcess {
    provider: String,
    child: Child,
    /// Process group to signal on teardown; `None` once it has been killed.
    pgid: Option<u32>,
    output: OutputCollector,
    state: ProcessState,
}

impl ProviderProcess {
    /// Spawn `cmd` with stdout and stderr captured and stdin closed.
    pub fn spawn(provider: impl Into<String>, mut cmd: Command) -> Result<Self> {
        let provider = provider.into();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false);
        #[cfg(unix)]
        cmd.process_group(0);

        let program = cmd.as_std().get_program().to_string_lossy().into_owned();
        let mut child = cmd.spawn().map_err(|e| {
            TunnelupError::provider_start(
                &provider,
                format!("failed to run '{}' (is it installed?): {}", program, e),
            )
        })?;

        let mut output = OutputCollector::new();
        if let Some(stdout) = child.stdout.take() {
            output.attach("stdout", stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            output.attach("stderr", stderr);
        }

        let pgid = child.id();
        info!(provider = %provider, pid = ?pgid, "tunnel client started");
        Ok(Self {
            provider,
            child,
            pgid,
            output,
            state: ProcessState::Starting,
        })
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// OS process id, if the process has not been reaped yet.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Output captured so far.
    pub fn output(&self) -> String {
        self.output.snapshot()
    }

    /// True once the process closed both of its output streams.
    pub fn output_closed(&self) -> bool {
        self.output.is_closed()
    }

    /// Poll the OS for the process status and update [`ProcessState`].
    pub fn refresh(&mut self) -> ProcessState {
        if matches!(self.state, ProcessState::Exited | ProcessState::Failed) {
            return self.state;
        }
        self.state = match self.child.try_wait() {
            Ok(Some(status)) if status.success() => ProcessState::Exited,
            Ok(Some(status)) => {
                debug!(provider = %self.provider, %status, "tunnel client exited");
                ProcessState::Failed
            }
            Ok(None) if self.output.snapshot().is_empty() => ProcessState::Starting,
            Ok(None) => ProcessState::Running,
            Err(e) => {
                warn!(provider = %self.provider, "failed to poll tunnel client: {}", e);
                ProcessState::Failed
            }
        };
        self.state
    }

    /// Wait for the process to exit on its own.
    pub async fn wait(&mut self) -> ProcessState {
        self.state = match self.child.wait().await {
            Ok(status) if status.success() => ProcessState::Exited,
            _ => ProcessState::Failed,
        };
        self.state
    }

    /// Kill the process together with anything it spawned, and reap it.
    pub async fn terminate(&mut self) {
        let running = !matches!(self.refresh(), ProcessState::Exited | ProcessState::Failed);
        if running {
            info!(provider = %self.provider, "stopping tunnel client");
        }
        // The direct child may be gone while its children still run.
        self.kill_group();
        if running {
            let _ = self.child.kill().await;
            self.state = ProcessState::Exited;
        }
        self.output.detach();
    }

    #[cfg(unix)]
    fn kill_group(&mut self) {
        use nix::errno::Errno;
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        let Some(pgid) = self.pgid.take() else {
            return;
        };
        match killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => {
                warn!(provider = %self.provider, pgid, "failed to kill process group: {}", e)
            }
        }
    }

    #[cfg(not(unix))]
    fn kill_group(&mut self) {
        self.pgid = None;
    }
}

impl Drop for ProviderProcess {
    fn drop(&mut self) {
        if self.pgid.is_some() {
            debug!(provider = %self.provider, "tunnel client dropped, killing it");
            self.kill_group();
            let _ = self.child.start_kill();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_spawn_missing_binary() {
        let cmd = Command::new("/nonexistent/tunnel-client");
        let err = ProviderProcess::spawn("test", cmd).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Tunnel provider 'test' failed to start"), "got: {}", msg);
        assert!(msg.contains("/nonexistent/tunnel-client"), "got: {}", msg);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_captures_merged_output() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo out; echo err >&2");
        let mut process = ProviderProcess::spawn("test", cmd).unwrap();
        assert_eq!(process.provider(), "test");

        tokio::time::timeout(Duration::from_secs(5), async {
            while !process.output_closed() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        let output = process.output();
        assert!(output.contains("out"), "got: {}", output);
        assert!(output.contains("err"), "got: {}", output);
        assert_eq!(process.wait().await, ProcessState::Exited);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_exit_status() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("exit 3");
        let mut process = ProviderProcess::spawn("test", cmd).unwrap();
        assert_eq!(process.wait().await, ProcessState::Failed);
        assert_eq!(process.refresh(), ProcessState::Failed);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_terminate_running_process() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("sleep 30");
        let mut process = ProviderProcess::spawn("test", cmd).unwrap();
        assert_eq!(process.refresh(), ProcessState::Starting);

        process.terminate().await;
        assert_eq!(process.state(), ProcessState::Exited);
        assert!(process.id().is_none());
    }

    /// A pid counts as gone once it no longer exists or is a zombie
    /// waiting for a reaper.
    #[cfg(target_os = "linux")]
    fn is_gone(pid: u32) -> bool {
        match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
            Ok(stat) => stat
                .rsplit_once(')')
                .map(|(_, rest)| rest.trim_start().starts_with('Z'))
                .unwrap_or(false),
            Err(_) => true,
        }
    }

    #[cfg(target_os = "linux")]
    async fn wait_gone(pid: u32) -> bool {
        for _ in 0..100 {
            if is_gone(pid) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }

    #[cfg(target_os = "linux")]
    async fn spawn_with_grandchild() -> (ProviderProcess, u32) {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("sleep 30 & echo $!; wait");
        let process = ProviderProcess::spawn("test", cmd).unwrap();

        let grandchild = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Ok(pid) = process.output().trim().parse::<u32>() {
                    return pid;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        (process, grandchild)
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_terminate_kills_grandchild() {
        let (mut process, grandchild) = spawn_with_grandchild().await;
        assert!(!is_gone(grandchild));

        process.terminate().await;
        assert!(wait_gone(grandchild).await, "grandchild {} survived", grandchild);
        assert!(process.output_closed());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_drop_kills_process_group() {
        let (process, grandchild) = spawn_with_grandchild().await;
        drop(process);
        assert!(wait_gone(grandchild).await, "grandchild {} survived", grandchild);
    }
}
