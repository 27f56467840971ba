//! Arista EOS driver.
//!
//! Stages the candidate in a named configure session: `configure session
//! <name>` is the command and the candidate lines arrive on its stdin,
//! since an exec channel runs a single command line. Replace mode starts
//! the session with `rollback clean-config` so the candidate is the whole
//! configuration; merge mode applies the lines on top of running. The
//! session is diffed with `show session-config named <name> diffs` and
//! resolved with `configure session <name> commit|abort`.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use super::common::{
    build_connection, clean_config_output, connect_error, failure_message, find_error_line,
    run_command, significant_lines,
};
use super::{
    ConnectError, DeviceParams, DeviceSession, DiffAvailability, DiffError, ResolveError,
    StageError,
};
use crate::config::Config;
use crate::connection::{CommandResult, Connection, ConnectionError};
use crate::error::{Error, Result};

/// EOS prefixes CLI errors with `%`
const ERROR_MARKERS: &[&str] = &["% "];

type CliResult = std::result::Result<CommandResult, ConnectionError>;

/// Session against an EOS device
pub struct EosSession {
    hostname: String,
    conn: Arc<dyn Connection>,
    timeout: u64,
    session_name: String,
    staged: bool,
}

impl EosSession {
    /// Create a session over an existing transport
    pub fn new(hostname: impl Into<String>, conn: Arc<dyn Connection>, timeout: u64) -> Self {
        let id = uuid::Uuid::new_v4().simple().to_string();
        Self {
            hostname: hostname.into(),
            conn,
            timeout,
            session_name: format!("confpush_{}", &id[..12]),
            staged: false,
        }
    }

    /// Build a session from device parameters (registry entry point)
    ///
    /// `optional_args.session_name` overrides the generated session name.
    pub fn from_params(params: &DeviceParams, config: &Config) -> Result<Self> {
        let conn = build_connection(params, config)
            .map_err(|e| Error::invalid_parameter(format!("optional_args: {}", e)))?;
        let mut session = Self::new(params.hostname.clone(), conn, params.timeout);

        if let Some(name) = params.optional_str("session_name") {
            if name.is_empty()
                || !name
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
            {
                return Err(Error::invalid_parameter(format!(
                    "Invalid session name '{}': must contain only alphanumeric characters, underscores, and hyphens",
                    name
                )));
            }
            session.session_name = name.to_string();
        }
        Ok(session)
    }

    /// Name of the configure session used for the candidate
    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    async fn cli(&self, command: &str) -> CliResult {
        run_command(self.conn.as_ref(), command, None, self.timeout).await
    }

    /// Statements fed to `configure session <name>` on stdin
    fn stage_script(config: &str, replace: bool) -> String {
        let mut script = String::new();
        if replace {
            script.push_str("rollback clean-config\n");
        }
        for line in significant_lines(config) {
            script.push_str(line.trim_end());
            script.push('\n');
        }
        script.push_str("end\n");
        script
    }

    async fn stage(&mut self, config: &str, replace: bool) -> std::result::Result<(), StageError> {
        let command = format!("configure session {}", self.session_name);
        let script = Self::stage_script(config, replace);
        let result = run_command(self.conn.as_ref(), &command, Some(&script), self.timeout).await?;
        self.staged = true;

        let output = result.combined_output();
        if !result.success || find_error_line(&output, ERROR_MARKERS).is_some() {
            return Err(StageError::Rejected(failure_message(&result, ERROR_MARKERS)));
        }
        debug!(host = %self.hostname, session = %self.session_name, replace, "Candidate staged");
        Ok(())
    }
}

#[async_trait]
impl DeviceSession for EosSession {
    fn family(&self) -> &str {
        "eos"
    }

    fn hostname(&self) -> &str {
        &self.hostname
    }

    async fn open(&mut self) -> std::result::Result<(), ConnectError> {
        let result = self.cli("show version").await.map_err(connect_error)?;
        if !result.success {
            return Err(ConnectError::Unreachable(format!(
                "{}: {}",
                self.hostname,
                failure_message(&result, ERROR_MARKERS)
            )));
        }
        Ok(())
    }

    async fn close(&mut self) {
        if self.staged {
            // A still-pending session would hold the candidate on the device
            let abort = format!("configure session {} abort", self.session_name);
            if let Err(e) = self.cli(&abort).await {
                warn!(host = %self.hostname, error = %e, "Failed to abort configure session");
            }
            self.staged = false;
        }
        if let Err(e) = self.conn.close().await {
            warn!(host = %self.hostname, error = %e, "Error closing connection");
        }
    }

    async fn load_replace_candidate(&mut self, config: &str) -> std::result::Result<(), StageError> {
        self.stage(config, true).await
    }

    async fn load_merge_candidate(&mut self, config: &str) -> std::result::Result<(), StageError> {
        self.stage(config, false).await
    }

    async fn compare_config(&mut self) -> std::result::Result<DiffAvailability, DiffError> {
        let cmd = format!("show session-config named {} diffs", self.session_name);
        let result = self.cli(&cmd).await?;
        if !result.success || find_error_line(&result.stdout, ERROR_MARKERS).is_some() {
            return Err(DiffError::Failed(failure_message(&result, ERROR_MARKERS)));
        }
        Ok(DiffAvailability::Available(clean_config_output(&result.stdout)))
    }

    async fn commit_config(&mut self) -> std::result::Result<(), ResolveError> {
        let cmd = format!("configure session {} commit", self.session_name);
        let result = self.cli(&cmd).await?;
        if !result.success || find_error_line(&result.combined_output(), ERROR_MARKERS).is_some() {
            return Err(ResolveError::Rejected(failure_message(&result, ERROR_MARKERS)));
        }
        self.staged = false;
        Ok(())
    }

    async fn discard_config(&mut self) -> std::result::Result<(), ResolveError> {
        let cmd = format!("configure session {} abort", self.session_name);
        let result = self.cli(&cmd).await?;
        if !result.success || find_error_line(&result.combined_output(), ERROR_MARKERS).is_some() {
            return Err(ResolveError::Rejected(failure_message(&result, ERROR_MARKERS)));
        }
        self.staged = false;
        Ok(())
    }

    async fn get_running_config(&mut self) -> std::result::Result<Option<String>, DiffError> {
        let result = self.cli("show running-config").await?;
        if !result.success {
            return Err(DiffError::Failed(failure_message(&result, ERROR_MARKERS)));
        }
        Ok(Some(clean_config_output(&result.stdout)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::LocalConnection;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_stage_script_replace() {
        let script = EosSession::stage_script("hostname leaf1\n!\nntp server 10.0.0.1\n", true);
        assert_eq!(
            script,
            "rollback clean-config\nhostname leaf1\nntp server 10.0.0.1\nend\n"
        );
    }

    #[test]
    fn test_stage_script_merge() {
        let script = EosSession::stage_script("ntp server 10.0.0.1\n", false);
        assert_eq!(script, "ntp server 10.0.0.1\nend\n");
    }

    #[test]
    fn test_generated_session_name_is_valid() {
        let conn = Arc::new(LocalConnection::with_identifier("leaf1"));
        let session = EosSession::new("leaf1", conn, 10);
        assert!(session.session_name().starts_with("confpush_"));
        assert!(session
            .session_name()
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_'));
    }

    #[test]
    fn test_invalid_session_name_rejected() {
        let params = DeviceParams::new("leaf1", "admin", "eos")
            .with_optional_arg("transport", "local")
            .with_optional_arg("session_name", "bad name;");
        assert!(EosSession::from_params(&params, &Config::default()).is_err());
    }
}
