//! Juniper Junos driver.
//!
//! Drives the Junos CLI from the device shell (`cli -c '...'`). The candidate
//! lives in the shared candidate database, so it survives between the
//! separate `cli` invocations used for load, compare, commit and rollback.
//! The candidate text is uploaded to `/var/tmp` first and loaded with
//! `load override` (replace) or `load merge`.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use super::common::{
    build_connection, clean_config_output, connect_error, failure_message, find_error_line,
    run_command,
};
use super::{
    ConnectError, DeviceParams, DeviceSession, DiffAvailability, DiffError, ResolveError,
    StageError,
};
use crate::config::Config;
use crate::connection::{CommandResult, Connection, ConnectionError};
use crate::error::{Error, Result};

/// Lines Junos prints for rejected statements or failed operations
const ERROR_MARKERS: &[&str] = &["error:", "syntax error", "missing mandatory statement"];

/// Chatter printed by `configure` that is not part of a diff
const MODE_CHATTER: &[&str] = &[
    "Entering configuration mode",
    "Exiting configuration mode",
    "The configuration has been changed but not committed",
    "[edit]",
];

type CliResult = std::result::Result<CommandResult, ConnectionError>;

/// Session against a Junos device
pub struct JunosSession {
    hostname: String,
    conn: Arc<dyn Connection>,
    timeout: u64,
    staged_file: Option<String>,
}

impl JunosSession {
    /// Create a session over an existing transport
    pub fn new(hostname: impl Into<String>, conn: Arc<dyn Connection>, timeout: u64) -> Self {
        Self {
            hostname: hostname.into(),
            conn,
            timeout,
            staged_file: None,
        }
    }

    /// Build a session from device parameters (registry entry point)
    pub fn from_params(params: &DeviceParams, config: &Config) -> Result<Self> {
        let conn = build_connection(params, config)
            .map_err(|e| Error::invalid_parameter(format!("optional_args: {}", e)))?;
        Ok(Self::new(params.hostname.clone(), conn, params.timeout))
    }

    async fn shell(&self, command: &str, stdin: Option<&str>) -> CliResult {
        run_command(self.conn.as_ref(), command, stdin, self.timeout).await
    }

    /// Run statements inside configuration mode
    async fn configure(&self, statements: &[&str]) -> CliResult {
        let script = format!("cli -c 'configure; {}; exit'", statements.join("; "));
        self.shell(&script, None).await
    }

    async fn load(&mut self, operation: &str, config: &str) -> std::result::Result<(), StageError> {
        let path = match self.staged_file {
            Some(ref path) => path.clone(),
            None => {
                let path = format!("/var/tmp/confpush-{}.conf", uuid::Uuid::new_v4().simple());
                self.staged_file = Some(path.clone());
                path
            }
        };

        let upload = self.shell(&format!("cat > {}", path), Some(config)).await?;
        if !upload.success {
            return Err(StageError::Rejected(format!(
                "upload to {} failed: {}",
                path,
                failure_message(&upload, ERROR_MARKERS)
            )));
        }

        let load_cmd = format!("load {} {}", operation, path);
        let result = self.configure(&[&load_cmd]).await?;
        let output = result.combined_output();

        if output.contains("configuration database locked") {
            return Err(StageError::Locked(
                find_error_line(&output, ERROR_MARKERS).unwrap_or_else(|| output.trim().to_string()),
            ));
        }
        if !result.success || find_error_line(&output, ERROR_MARKERS).is_some() {
            return Err(StageError::Rejected(failure_message(&result, ERROR_MARKERS)));
        }

        debug!(host = %self.hostname, operation = %operation, "Candidate loaded");
        Ok(())
    }
}

/// Strip configuration-mode chatter from `show | compare` output
fn clean_compare_output(output: &str) -> String {
    let mut cleaned = String::new();
    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || MODE_CHATTER.contains(&trimmed) {
            continue;
        }
        cleaned.push_str(line.trim_end());
        cleaned.push('\n');
    }
    cleaned
}

#[async_trait]
impl DeviceSession for JunosSession {
    fn family(&self) -> &str {
        "junos"
    }

    fn hostname(&self) -> &str {
        &self.hostname
    }

    async fn open(&mut self) -> std::result::Result<(), ConnectError> {
        let result = self
            .shell("cli -c 'show version | match Junos:'", None)
            .await
            .map_err(connect_error)?;
        if !result.success {
            return Err(ConnectError::Unreachable(format!(
                "{}: {}",
                self.hostname,
                failure_message(&result, ERROR_MARKERS)
            )));
        }
        debug!(host = %self.hostname, "Junos session opened");
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(path) = self.staged_file.take() {
            if let Err(e) = self.shell(&format!("rm -f {}", path), None).await {
                warn!(host = %self.hostname, error = %e, "Failed to remove staged candidate {}", path);
            }
        }
        if let Err(e) = self.conn.close().await {
            warn!(host = %self.hostname, error = %e, "Error closing connection");
        }
    }

    async fn load_replace_candidate(&mut self, config: &str) -> std::result::Result<(), StageError> {
        self.load("override", config).await
    }

    async fn load_merge_candidate(&mut self, config: &str) -> std::result::Result<(), StageError> {
        self.load("merge", config).await
    }

    async fn compare_config(&mut self) -> std::result::Result<DiffAvailability, DiffError> {
        let result = self.configure(&["show | compare"]).await?;
        if !result.success || find_error_line(&result.stdout, ERROR_MARKERS).is_some() {
            return Err(DiffError::Failed(failure_message(&result, ERROR_MARKERS)));
        }
        Ok(DiffAvailability::Available(clean_compare_output(&result.stdout)))
    }

    async fn commit_config(&mut self) -> std::result::Result<(), ResolveError> {
        let result = self.configure(&["commit"]).await?;
        let output = result.combined_output();
        if output.contains("commit complete") && find_error_line(&output, ERROR_MARKERS).is_none() {
            debug!(host = %self.hostname, "Commit complete");
            return Ok(());
        }
        Err(ResolveError::Rejected(failure_message(&result, ERROR_MARKERS)))
    }

    async fn discard_config(&mut self) -> std::result::Result<(), ResolveError> {
        let result = self.configure(&["rollback 0"]).await?;
        if !result.success || find_error_line(&result.combined_output(), ERROR_MARKERS).is_some() {
            return Err(ResolveError::Rejected(failure_message(&result, ERROR_MARKERS)));
        }
        Ok(())
    }

    async fn get_running_config(&mut self) -> std::result::Result<Option<String>, DiffError> {
        let result = self.shell("cli -c 'show configuration'", None).await?;
        if !result.success {
            return Err(DiffError::Failed(failure_message(&result, ERROR_MARKERS)));
        }
        Ok(Some(clean_config_output(&result.stdout)))
    }
}
