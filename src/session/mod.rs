//! Device sessions.
//!
//! A [`DeviceSession`] is the only boundary the transaction core depends on:
//! it opens a connection to one device and exposes the candidate-staging,
//! diff, commit and discard primitives of that device family. Drivers are
//! looked up once, by family tag, through the [`DriverRegistry`].
//!
//! # Built-in families
//!
//! | Tag     | Driver           | Candidate model                                  |
//! |---------|------------------|--------------------------------------------------|
//! | `mock`  | [`MockSession`]  | in-memory device, optional on-disk state         |
//! | `junos` | [`JunosSession`] | shared candidate database, `show \| compare`     |
//! | `eos`   | [`EosSession`]   | named configure session                          |
//! | `ios`   | [`IosSession`]   | candidate held locally, diffed against running   |

pub mod common;
pub mod eos;
pub mod ios;
pub mod junos;
pub mod mock;
pub mod registry;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

use crate::connection::ConnectionError;

pub use eos::EosSession;
pub use ios::IosSession;
pub use junos::JunosSession;
pub use mock::{MockCall, MockDevice, MockSession};
pub use registry::{DriverRegistry, FamilyInfo, SessionFactory};

// ============================================================================
// Phase errors
// ============================================================================

/// Opening the session failed; nothing was staged.
#[derive(Error, Debug)]
pub enum ConnectError {
    /// Device could not be reached
    #[error("device unreachable: {0}")]
    Unreachable(String),

    /// Credentials were rejected
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Transport failure
    #[error(transparent)]
    Transport(#[from] ConnectionError),
}

/// The device rejected the candidate.
#[derive(Error, Debug)]
pub enum StageError {
    /// Candidate rejected (syntax error, unknown statement)
    #[error("candidate rejected: {0}")]
    Rejected(String),

    /// The candidate datastore is locked by another user
    #[error("configuration database locked: {0}")]
    Locked(String),

    /// Transport failure
    #[error(transparent)]
    Transport(#[from] ConnectionError),
}

/// Computing the diff failed (as opposed to being unsupported).
#[derive(Error, Debug)]
pub enum DiffError {
    /// Device returned an error for the compare request
    #[error("compare failed: {0}")]
    Failed(String),

    /// Transport failure
    #[error(transparent)]
    Transport(#[from] ConnectionError),
}

/// Commit or discard failed; device candidate state is whatever the device left.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// Device refused the operation
    #[error("{0}")]
    Rejected(String),

    /// Transport failure
    #[error(transparent)]
    Transport(#[from] ConnectionError),
}

// ============================================================================
// Session contract
// ============================================================================

/// Result of asking a session for a diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffAvailability {
    /// The device produced a diff (possibly empty)
    Available(String),
    /// The device cannot produce a diff
    Unavailable,
}

/// Connection-level parameters for one device.
#[derive(Clone)]
pub struct DeviceParams {
    /// Device hostname or address
    pub hostname: String,
    /// Login user
    pub username: String,
    /// Login password; `None` means key-based auth
    pub password: Option<String>,
    /// Family tag as given by the caller
    pub family: String,
    /// Per-command timeout in seconds
    pub timeout: u64,
    /// Driver-specific extra arguments
    pub optional_args: IndexMap<String, Value>,
}

impl fmt::Debug for DeviceParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceParams")
            .field("hostname", &self.hostname)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "********"))
            .field("family", &self.family)
            .field("timeout", &self.timeout)
            .field("optional_args", &self.optional_args)
            .finish()
    }
}

impl DeviceParams {
    /// Create parameters with no password and no optional args
    pub fn new(
        hostname: impl Into<String>,
        username: impl Into<String>,
        family: impl Into<String>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            username: username.into(),
            password: None,
            family: family.into(),
            timeout: 60,
            optional_args: IndexMap::new(),
        }
    }

    /// Set the password
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the timeout
    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add an optional argument
    pub fn with_optional_arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.optional_args.insert(key.into(), value.into());
        self
    }

    /// String-valued optional argument
    pub fn optional_str(&self, key: &str) -> Option<&str> {
        self.optional_args.get(key).and_then(|v| v.as_str())
    }
}

/// A live session to a single network device.
///
/// Sessions are exclusively owned by one transaction. `close` must be
/// idempotent and safe to call after a failed `open`.
#[async_trait]
pub trait DeviceSession: Send {
    /// Canonical family tag of this driver
    fn family(&self) -> &str;

    /// Device this session talks to
    fn hostname(&self) -> &str;

    /// Open the connection
    async fn open(&mut self) -> Result<(), ConnectError>;

    /// Close the connection. Problems are logged, never returned.
    async fn close(&mut self);

    /// Stage `config` as a full replacement of the running configuration
    async fn load_replace_candidate(&mut self, config: &str) -> Result<(), StageError>;

    /// Stage `config` as an incremental change on top of the running configuration
    async fn load_merge_candidate(&mut self, config: &str) -> Result<(), StageError>;

    /// Diff between the running configuration and the staged candidate
    async fn compare_config(&mut self) -> Result<DiffAvailability, DiffError>;

    /// Activate the staged candidate
    async fn commit_config(&mut self) -> Result<(), ResolveError>;

    /// Drop the staged candidate
    async fn discard_config(&mut self) -> Result<(), ResolveError>;

    /// Current running configuration, if the driver can fetch it
    async fn get_running_config(&mut self) -> Result<Option<String>, DiffError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_params_debug_redacts_password() {
        let params = DeviceParams::new("r1", "admin", "junos").with_password("hunter2");
        let debug = format!("{:?}", params);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("********"));
    }

    #[test]
    fn test_optional_str() {
        let params = DeviceParams::new("r1", "admin", "eos")
            .with_optional_arg("transport", "local")
            .with_optional_arg("port", 2222);
        assert_eq!(params.optional_str("transport"), Some("local"));
        assert_eq!(params.optional_str("port"), None);
        assert_eq!(params.optional_str("missing"), None);
    }

    #[test]
    fn test_stage_error_transport_display() {
        let err: StageError = ConnectionError::Timeout(30).into();
        assert_eq!(err.to_string(), "Connection timeout after 30 seconds");
    }
}
