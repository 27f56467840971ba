//! SSH transport backed by the system `ssh` binary.
//!
//! Every command runs in its own `ssh` invocation, so connection reuse is left
//! to OpenSSH multiplexing (`ControlMaster`, configured through
//! `[ssh] args`). When a password is supplied the invocation is wrapped in
//! `sshpass -e` and the password travels through the `SSHPASS` environment
//! variable, never on the command line.

use async_trait::async_trait;
use std::fmt;
use tokio::process::Command;
use tracing::debug;

use super::local::run_process;
use super::{CommandResult, Connection, ConnectionError, ConnectionResult, ExecuteOptions};
use crate::config::SshSettings;

/// Exit status OpenSSH uses for its own (non-remote) failures
const SSH_TRANSPORT_FAILURE: i32 = 255;

/// SSH connection to a single device
#[derive(Clone)]
pub struct SshConnection {
    host: String,
    port: Option<u16>,
    user: String,
    password: Option<String>,
    connect_timeout: u64,
    settings: SshSettings,
}

impl fmt::Debug for SshConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshConnection")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "********"))
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl SshConnection {
    /// Create a new SSH connection description (nothing is spawned yet)
    pub fn new(host: impl Into<String>, user: impl Into<String>, settings: &SshSettings) -> Self {
        Self {
            host: host.into(),
            port: None,
            user: user.into(),
            password: None,
            connect_timeout: 30,
            settings: settings.clone(),
        }
    }

    /// Set the SSH port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Authenticate with a password via sshpass
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the connect timeout in seconds
    pub fn with_connect_timeout(mut self, seconds: u64) -> Self {
        self.connect_timeout = seconds;
        self
    }

    /// Arguments passed to `ssh` (excluding the executable itself)
    pub fn ssh_args(&self, command: &str) -> Vec<String> {
        let mut args: Vec<String> = self.settings.args.clone();

        if self.password.is_none() {
            args.push("-o".to_string());
            args.push("BatchMode=yes".to_string());
        }
        args.push("-o".to_string());
        args.push(format!("ConnectTimeout={}", self.connect_timeout));
        args.push("-o".to_string());
        args.push(format!(
            "StrictHostKeyChecking={}",
            if self.settings.host_key_checking { "yes" } else { "no" }
        ));
        if let Some(port) = self.port {
            args.push("-p".to_string());
            args.push(port.to_string());
        }
        args.push("-l".to_string());
        args.push(self.user.clone());
        args.push(self.host.clone());
        args.push("--".to_string());
        args.push(command.to_string());
        args
    }

    fn build_command(&self, command: &str) -> Command {
        let mut cmd = match self.password {
            Some(ref password) => {
                let mut c = Command::new(&self.settings.sshpass_executable);
                c.arg("-e").arg(&self.settings.executable);
                c.env("SSHPASS", password);
                c
            }
            None => Command::new(&self.settings.executable),
        };
        cmd.args(self.ssh_args(command));
        cmd
    }
}

#[async_trait]
impl Connection for SshConnection {
    fn identifier(&self) -> &str {
        &self.host
    }

    async fn execute(
        &self,
        command: &str,
        options: Option<ExecuteOptions>,
    ) -> ConnectionResult<CommandResult> {
        let options = options.unwrap_or_default();
        debug!(host = %self.host, command = %command, "Executing command over ssh");

        let cmd = self.build_command(command);
        let result = run_process(cmd, &options).await?;

        if result.exit_code == SSH_TRANSPORT_FAILURE {
            let stderr = result.stderr.trim().to_string();
            if stderr.contains("Permission denied") || stderr.contains("Authentication failed") {
                return Err(ConnectionError::AuthenticationFailed(format!(
                    "{}@{}: {}",
                    self.user, self.host, stderr
                )));
            }
            return Err(ConnectionError::ConnectionFailed(format!(
                "{}: {}",
                self.host, stderr
            )));
        }

        Ok(result)
    }

    async fn close(&self) -> ConnectionResult<()> {
        Ok(())
    }
}
