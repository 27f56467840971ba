//! Cisco IOS / IOS-XE driver.
//!
//! IOS has no candidate datastore, so the candidate is held in the session
//! and only sent to the device on commit. Diffs are computed locally against
//! `show running-config`: a unified diff in replace mode, the missing lines
//! in merge mode. Commit feeds the generated commands to `configure
//! terminal` on stdin; discard just drops the local candidate.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use super::common::{
    build_connection, clean_config_output, config_commands, connect_error, failure_message,
    find_error_line, merge_config_diff, run_command, significant_lines, unified_config_diff,
};
use super::{
    ConnectError, DeviceParams, DeviceSession, DiffAvailability, DiffError, ResolveError,
    StageError,
};
use crate::config::Config;
use crate::connection::{CommandResult, Connection, ConnectionError};
use crate::error::{Error, Result};

/// IOS prefixes CLI errors with `%`
const ERROR_MARKERS: &[&str] = &["% Invalid", "% Incomplete", "% Ambiguous", "% Error"];

type CliResult = std::result::Result<CommandResult, ConnectionError>;

#[derive(Debug, Clone)]
struct Candidate {
    text: String,
    replace: bool,
}

/// Session against an IOS device
pub struct IosSession {
    hostname: String,
    conn: Arc<dyn Connection>,
    timeout: u64,
    candidate: Option<Candidate>,
    running: Option<String>,
}

impl IosSession {
    /// Create a session over an existing transport
    pub fn new(hostname: impl Into<String>, conn: Arc<dyn Connection>, timeout: u64) -> Self {
        Self {
            hostname: hostname.into(),
            conn,
            timeout,
            candidate: None,
            running: None,
        }
    }

    /// Build a session from device parameters (registry entry point)
    pub fn from_params(params: &DeviceParams, config: &Config) -> Result<Self> {
        let conn = build_connection(params, config)
            .map_err(|e| Error::invalid_parameter(format!("optional_args: {}", e)))?;
        Ok(Self::new(params.hostname.clone(), conn, params.timeout))
    }

    async fn cli(&self, command: &str) -> CliResult {
        run_command(self.conn.as_ref(), command, None, self.timeout).await
    }

    async fn fetch_running(&mut self) -> std::result::Result<String, DiffError> {
        if let Some(ref running) = self.running {
            return Ok(running.clone());
        }
        let result = self.cli("show running-config").await?;
        if !result.success {
            return Err(DiffError::Failed(failure_message(&result, ERROR_MARKERS)));
        }
        let running = canonical_config(&clean_config_output(&result.stdout));
        self.running = Some(running.clone());
        Ok(running)
    }

    fn stage(&mut self, config: &str, replace: bool) -> std::result::Result<(), StageError> {
        if let Some((n, _)) = config.lines().enumerate().find(|(_, l)| l.contains('\0')) {
            return Err(StageError::Rejected(format!(
                "line {} contains a null character",
                n + 1
            )));
        }
        self.candidate = Some(Candidate {
            text: config.to_string(),
            replace,
        });
        Ok(())
    }
}

/// Significant configuration lines, without the banner IOS prints around
/// `show running-config`
fn canonical_config(config: &str) -> String {
    significant_lines(config)
        .into_iter()
        .map(str::trim_end)
        .filter(|line| {
            !(line.starts_with("Building configuration")
                || line.starts_with("Current configuration")
                || *line == "end")
        })
        .fold(String::new(), |mut out, line| {
            out.push_str(line);
            out.push('\n');
            out
        })
}

/// Commands fed to `configure terminal` on stdin, closed with `end`
fn configure_block(commands: &[String]) -> String {
    let mut block = String::new();
    for command in commands {
        block.push_str(command);
        block.push('\n');
    }
    block.push_str("end\n");
    block
}

#[async_trait]
impl DeviceSession for IosSession {
    fn family(&self) -> &str {
        "ios"
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
        self.candidate = None;
        self.running = None;
        if let Err(e) = self.conn.close().await {
            warn!(host = %self.hostname, error = %e, "Error closing connection");
        }
    }

    async fn load_replace_candidate(&mut self, config: &str) -> std::result::Result<(), StageError> {
        self.stage(config, true)
    }

    async fn load_merge_candidate(&mut self, config: &str) -> std::result::Result<(), StageError> {
        self.stage(config, false)
    }

    async fn compare_config(&mut self) -> std::result::Result<DiffAvailability, DiffError> {
        let candidate = match self.candidate.clone() {
            Some(candidate) => candidate,
            None => return Ok(DiffAvailability::Available(String::new())),
        };
        let running = self.fetch_running().await?;

        let diff = if candidate.replace {
            unified_config_diff(&running, &canonical_config(&candidate.text))
        } else {
            merge_config_diff(&running, &candidate.text)
        };
        Ok(DiffAvailability::Available(diff))
    }

    async fn commit_config(&mut self) -> std::result::Result<(), ResolveError> {
        let candidate = match self.candidate.clone() {
            Some(candidate) => candidate,
            None => return Ok(()),
        };
        let running = self
            .fetch_running()
            .await
            .map_err(|e| ResolveError::Rejected(e.to_string()))?;

        let commands = config_commands(&running, &candidate.text, candidate.replace);
        debug!(host = %self.hostname, commands = commands.len(), "Applying configuration");

        let block = configure_block(&commands);
        let result =
            run_command(self.conn.as_ref(), "configure terminal", Some(&block), self.timeout).await?;
        if !result.success || find_error_line(&result.combined_output(), ERROR_MARKERS).is_some() {
            return Err(ResolveError::Rejected(failure_message(&result, ERROR_MARKERS)));
        }

        self.candidate = None;
        self.running = None;
        Ok(())
    }

    async fn discard_config(&mut self) -> std::result::Result<(), ResolveError> {
        self.candidate = None;
        Ok(())
    }

    async fn get_running_config(&mut self) -> std::result::Result<Option<String>, DiffError> {
        self.fetch_running().await.map(Some)
    }
}
