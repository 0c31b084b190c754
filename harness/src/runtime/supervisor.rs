//! External process supervision
//!
//! Spawns the store emulator and the ingestion worker as child processes
//! with stdout and stderr merged into a single line stream, and owns their
//! termination. Exactly one owner (the run driver or the active scenario)
//! may stop a supervised process.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use crate::error::{HarnessError, HarnessResult};
use crate::runtime::cancel::CancelSignal;
use crate::runtime::log_gate::{GateOutcome, LogGate};

const LINE_CHANNEL_CAPACITY: usize = 1024;
const SIGTERM_GRACE: Duration = Duration::from_secs(2);

/// Merged, single-pass stream of output lines from a child process.
///
/// Finite: ends when the process closes both stdio pipes (normally on
/// exit). Not restartable.
pub struct LineStream {
    rx: mpsc::Receiver<String>,
}

impl LineStream {
    /// Create a connected sender/stream pair.
    pub fn channel() -> (mpsc::Sender<String>, LineStream) {
        let (tx, rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);
        (tx, LineStream { rx })
    }

    /// Next line, or `None` once every sender is gone and the buffer is
    /// drained.
    pub async fn next_line(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

/// A running external process and its merged output stream.
pub struct SupervisedProcess {
    role: String,
    child: Option<Child>,
    lines: LineStream,
}

impl SupervisedProcess {
    /// Launch `cmd` with stdout and stderr piped into one [`LineStream`].
    pub fn spawn(role: &str, mut cmd: Command) -> HarnessResult<SupervisedProcess> {
        cmd.stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null());

        let mut child = cmd.spawn().map_err(|e| HarnessError::Launch {
            command: format!("{:?}", cmd.as_std()),
            source: e,
        })?;

        let (tx, lines) = LineStream::channel();
        if let Some(stdout) = child.stdout.take() {
            pump_lines(stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            pump_lines(stderr, tx);
        }

        tracing::info!(
            "🚀 Started {} (PID: {})",
            role,
            child.id().map(|id| id.to_string()).unwrap_or_else(|| "?".into())
        );

        Ok(SupervisedProcess {
            role: role.to_string(),
            child: Some(child),
            lines,
        })
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    /// The merged output stream.
    pub fn lines(&mut self) -> &mut LineStream {
        &mut self.lines
    }

    /// Block scenario progress on a log-derived condition.
    pub async fn wait_for(&mut self, gate: &LogGate, cancel: &CancelSignal) -> GateOutcome {
        gate.wait(&self.role, &mut self.lines, cancel).await
    }

    /// Whether the process is still running.
    pub fn is_running(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Terminate the process and wait for full exit, releasing OS
    /// resources. No-op when already stopped. Unconsumed output is
    /// discarded.
    pub async fn stop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        if let Ok(Some(status)) = child.try_wait() {
            tracing::debug!("{} already exited with {}", self.role, status);
            return;
        }

        #[cfg(unix)]
        if let Some(id) = child.id() {
            use nix::sys::signal::{self, Signal};
            use nix::unistd::Pid;
            let _ = signal::kill(Pid::from_raw(id as i32), Signal::SIGTERM);
        }

        match tokio::time::timeout(SIGTERM_GRACE, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::info!("🛑 Stopped {} ({})", self.role, status);
            }
            Ok(Err(e)) => {
                tracing::warn!("⚠️ Error waiting for {}: {}", self.role, e);
            }
            Err(_) => {
                tracing::warn!("🔨 {} ignored SIGTERM, force killing", self.role);
                let _ = child.kill().await;
                let _ = child.wait().await;
            }
        }
    }
}

impl Drop for SupervisedProcess {
    fn drop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            if matches!(child.try_wait(), Ok(None)) {
                tracing::warn!("🚨 Emergency cleanup: killing {}", self.role);
                let _ = child.start_kill();
            }
        }
    }
}

fn pump_lines(pipe: impl AsyncRead + Unpin + Send + 'static, tx: mpsc::Sender<String>) {
    tokio::spawn(async move {
        let mut reader = BufReader::new(pipe).lines();
        while let Ok(Some(line)) = reader.next_line().await {
            if tx.send(line).await.is_err() {
                break;
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::cancel::cancel_pair;
    use std::time::Duration;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[tokio::test]
    async fn merges_stdout_and_stderr_into_one_stream() {
        let mut proc = SupervisedProcess::spawn("merge-test", sh("echo out; echo err >&2; echo done"))
            .expect("spawn sh");

        let mut seen = Vec::new();
        while let Some(line) = proc.lines().next_line().await {
            seen.push(line);
        }

        assert!(seen.contains(&"out".to_string()));
        assert!(seen.contains(&"err".to_string()));
        assert!(seen.contains(&"done".to_string()));
        proc.stop().await;
    }

    #[tokio::test]
    async fn gate_resolves_on_child_output() {
        let mut proc = SupervisedProcess::spawn(
            "ready-test",
            sh("echo starting up; echo service ready; sleep 5"),
        )
        .expect("spawn sh");
        let (_handle, cancel) = cancel_pair();

        let gate = LogGate::until("service ready").deadline(Duration::from_secs(10));
        let outcome = proc.wait_for(&gate, &cancel).await;
        assert!(matches!(outcome, GateOutcome::Matched { ref line } if line.contains("ready")));

        proc.stop().await;
        assert!(!proc.is_running());
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let mut proc = SupervisedProcess::spawn("stop-test", sh("sleep 10")).expect("spawn sh");
        assert!(proc.is_running());

        proc.stop().await;
        assert!(!proc.is_running());
        // Second stop on an already-stopped process must be a no-op.
        proc.stop().await;
    }

    #[tokio::test]
    async fn stop_after_natural_exit_is_a_noop() {
        let mut proc = SupervisedProcess::spawn("exit-test", sh("true")).expect("spawn sh");
        // Drain the (empty) stream so we know the process has exited.
        while proc.lines().next_line().await.is_some() {}
        proc.stop().await;
        assert!(!proc.is_running());
    }

    #[tokio::test]
    async fn spawn_of_missing_executable_is_a_launch_error() {
        let cmd = Command::new("definitely-not-a-real-binary-9c2f");
        let err = SupervisedProcess::spawn("missing", cmd).err().expect("must fail");
        assert!(matches!(err, HarnessError::Launch { .. }));
    }
}
