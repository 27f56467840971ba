//! Transport layer for device communication.
//!
//! Device sessions for CLI-driven platforms (Junos, EOS, IOS) do not talk to
//! the wire themselves; they build command strings and hand them to a
//! [`Connection`]. Two transports are provided:
//!
//! - **SSH** ([`ssh::SshConnection`]): runs each command through the system
//!   `ssh` binary, optionally wrapped in `sshpass` when a password is given
//! - **Local** ([`local::LocalConnection`]): runs commands in a local shell,
//!   useful when the tool runs on the device itself or in a lab container
//!
//! # Example
//!
//! ```rust,ignore
//! use confpush::connection::{Connection, ExecuteOptions, ssh::SshConnection};
//!
//! let conn = SshConnection::new("router1", "admin", &ssh_settings).with_port(22);
//! let result = conn
//!     .execute("show version", Some(ExecuteOptions::new().with_timeout(30)))
//!     .await?;
//! println!("{}", result.stdout);
//! ```

/// Local shell execution.
pub mod local;

/// SSH execution through the system `ssh` binary.
pub mod ssh;

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub use local::LocalConnection;
pub use ssh::SshConnection;

/// Errors that can occur during connection operations.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Failed to establish initial connection to the host.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication was rejected by the remote host.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Command execution failed (not to be confused with non-zero exit code).
    #[error("Command execution failed: {0}")]
    ExecutionFailed(String),

    /// Connection or operation timed out.
    #[error("Connection timeout after {0} seconds")]
    Timeout(u64),

    /// Configuration is invalid or incomplete.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error during connection operations.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for connection operations.
pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// The result of executing a command on a connection.
///
/// # Example
///
/// ```rust
/// use confpush::connection::CommandResult;
///
/// let result = CommandResult::success("Hello".into(), String::new());
/// assert!(result.success);
/// assert_eq!(result.exit_code, 0);
///
/// let failed = CommandResult::failure(1, String::new(), "error".into());
/// assert!(!failed.success);
/// ```
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit code of the command (0 typically indicates success).
    pub exit_code: i32,
    /// Content written to standard output.
    pub stdout: String,
    /// Content written to standard error.
    pub stderr: String,
    /// Convenience flag: `true` if `exit_code == 0`.
    pub success: bool,
}

impl CommandResult {
    /// Create a new successful command result
    pub fn success(stdout: String, stderr: String) -> Self {
        Self {
            exit_code: 0,
            stdout,
            stderr,
            success: true,
        }
    }

    /// Create a new failed command result
    pub fn failure(exit_code: i32, stdout: String, stderr: String) -> Self {
        Self {
            exit_code,
            stdout,
            stderr,
            success: false,
        }
    }

    /// Get the combined output (stdout + stderr)
    pub fn combined_output(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// Options for command execution
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Timeout in seconds (None for no timeout)
    pub timeout: Option<u64>,
    /// Text written to the command's standard input
    pub stdin: Option<String>,
}

impl ExecuteOptions {
    /// Create new execute options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the timeout
    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Feed text to the command's standard input
    pub fn with_stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }
}

/// The connection trait that all transports implement
#[async_trait]
pub trait Connection: Send + Sync {
    /// Get the connection identifier (hostname)
    fn identifier(&self) -> &str;

    /// Execute a command on the device
    async fn execute(
        &self,
        command: &str,
        options: Option<ExecuteOptions>,
    ) -> ConnectionResult<CommandResult>;

    /// Close the connection
    async fn close(&self) -> ConnectionResult<()>;
}

/// Transport selector, chosen from `optional_args.transport`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
    /// System `ssh` binary (default)
    #[default]
    Ssh,
    /// Local shell
    Local,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Ssh => write!(f, "ssh"),
            TransportKind::Local => write!(f, "local"),
        }
    }
}

impl std::str::FromStr for TransportKind {
    type Err = ConnectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ssh" | "cli" => Ok(TransportKind::Ssh),
            "local" => Ok(TransportKind::Local),
            _ => Err(ConnectionError::InvalidConfig(format!(
                "Unknown transport: {}. Valid options: ssh, local",
                s
            ))),
        }
    }
}
