//! Local connection module
//!
//! Runs device commands in a local shell. Used when confpush runs on the
//! device itself (for example the Junos FreeBSD shell) or against a lab
//! container that exposes the vendor CLI as a local binary.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, trace};

use super::{CommandResult, Connection, ConnectionError, ConnectionResult, ExecuteOptions};

/// Local connection for executing commands on the current host
#[derive(Debug, Clone)]
pub struct LocalConnection {
    /// Identifier for this connection
    identifier: String,
}

impl LocalConnection {
    /// Create a local connection with a custom identifier
    pub fn with_identifier(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
        }
    }

    fn build_command(&self, command: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    }
}

#[async_trait]
impl Connection for LocalConnection {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    async fn execute(
        &self,
        command: &str,
        options: Option<ExecuteOptions>,
    ) -> ConnectionResult<CommandResult> {
        let options = options.unwrap_or_default();
        debug!(command = %command, "Executing local command");
        let cmd = self.build_command(command);
        run_process(cmd, &options).await
    }

    async fn close(&self) -> ConnectionResult<()> {
        Ok(())
    }
}

/// Spawn a prepared command, feed stdin, and collect its output.
///
/// Shared by the local and SSH transports; both build a [`Command`] and let
/// this function own the process lifecycle.
pub(crate) async fn run_process(
    mut cmd: Command,
    options: &ExecuteOptions,
) -> ConnectionResult<CommandResult> {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|e| {
        ConnectionError::ExecutionFailed(format!("Failed to spawn process: {}", e))
    })?;

    let stdin = child.stdin.take();
    let input = options.stdin.as_deref();
    let feed = async move {
        if let (Some(mut stdin), Some(input)) = (stdin, input) {
            stdin.write_all(input.as_bytes()).await?;
        }
        // Dropping stdin closes the pipe so the child sees EOF.
        Ok::<(), std::io::Error>(())
    };
    // Feeding and waiting run together so a child that never reads stdin
    // still hits the timeout.
    let run = async move { tokio::join!(feed, child.wait_with_output()) };

    let (fed, waited) = match options.timeout {
        Some(timeout_secs) => {
            let timeout = tokio::time::Duration::from_secs(timeout_secs);
            tokio::time::timeout(timeout, run)
                .await
                .map_err(|_| ConnectionError::Timeout(timeout_secs))?
        }
        None => run.await,
    };

    let output = waited.map_err(|e| {
        ConnectionError::ExecutionFailed(format!("Failed to wait for process: {}", e))
    })?;
    match fed {
        Ok(()) => {}
        // The child exited without reading all of its input
        Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
            debug!(error = %e, "Process closed stdin early");
        }
        Err(e) => {
            return Err(ConnectionError::ExecutionFailed(format!(
                "Failed to write stdin: {}",
                e
            )))
        }
    }

    let exit_code = output.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    trace!(exit_code = %exit_code, stdout_len = %stdout.len(), stderr_len = %stderr.len(), "Command completed");

    if output.status.success() {
        Ok(CommandResult::success(stdout, stderr))
    } else {
        Ok(CommandResult::failure(exit_code, stdout, stderr))
    }
}
