//! Shared test utilities and fixtures for the confpush test suite.
//!
//! This module provides:
//! - A scripted, recording [`MockConnection`] for driving real session drivers
//! - Builders for install requests against the in-memory `mock` family
//! - Temporary directory helpers for candidate and params files
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tempfile::TempDir;

use confpush::connection::{
    CommandResult, Connection, ConnectionError, ConnectionResult, ExecuteOptions,
};
use confpush::session::DeviceParams;
use confpush::transaction::{CandidateConfig, LoadMode, RunIntent};
use confpush::params::InstallRequest;

// ============================================================================
// Mock Connection
// ============================================================================

/// One command seen by a [`MockConnection`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedCommand {
    /// Command line
    pub command: String,
    /// Text fed on stdin
    pub stdin: Option<String>,
}

/// A connection that records every command and answers from a script.
///
/// Responses are matched by substring, most recently added rule first, so
/// a test can override an earlier, broader rule.
pub struct MockConnection {
    identifier: String,
    commands_executed: RwLock<Vec<ExecutedCommand>>,
    responses: RwLock<Vec<(String, CommandResult)>>,
    failures: RwLock<Vec<(String, ConnectionError)>>,
    default_result: RwLock<CommandResult>,
    close_count: AtomicU32,
}

impl MockConnection {
    /// Create a new mock connection with the given identifier.
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            commands_executed: RwLock::new(Vec::new()),
            responses: RwLock::new(Vec::new()),
            failures: RwLock::new(Vec::new()),
            default_result: RwLock::new(CommandResult::success(String::new(), String::new())),
            close_count: AtomicU32::new(0),
        }
    }

    /// Answer commands containing `pattern` with `result`.
    pub fn respond(&self, pattern: impl Into<String>, result: CommandResult) -> &Self {
        self.responses.write().push((pattern.into(), result));
        self
    }

    /// Answer commands containing `pattern` with a successful `stdout`.
    pub fn respond_ok(&self, pattern: impl Into<String>, stdout: impl Into<String>) -> &Self {
        self.respond(pattern, CommandResult::success(stdout.into(), String::new()))
    }

    /// Fail commands containing `pattern` at the transport level.
    pub fn fail_on(&self, pattern: impl Into<String>, error: ConnectionError) -> &Self {
        self.failures.write().push((pattern.into(), error));
        self
    }

    /// Set the default result for commands not explicitly configured.
    pub fn set_default_result(&self, result: CommandResult) {
        *self.default_result.write() = result;
    }

    /// Get all commands that were executed.
    pub fn get_commands(&self) -> Vec<String> {
        self.commands_executed
            .read()
            .iter()
            .map(|c| c.command.clone())
            .collect()
    }

    /// Get all commands with their stdin.
    pub fn get_executed(&self) -> Vec<ExecutedCommand> {
        self.commands_executed.read().clone()
    }

    /// Number of executed commands containing `pattern`.
    pub fn count_matching(&self, pattern: &str) -> usize {
        self.commands_executed
            .read()
            .iter()
            .filter(|c| c.command.contains(pattern))
            .count()
    }

    /// Number of times `close` was called.
    pub fn close_count(&self) -> u32 {
        self.close_count.load(Ordering::SeqCst)
    }

    /// Share as a trait object.
    pub fn shared(self: &Arc<Self>) -> Arc<dyn Connection> {
        Arc::clone(self) as Arc<dyn Connection>
    }

    fn clone_error(err: &ConnectionError) -> ConnectionError {
        match err {
            ConnectionError::ConnectionFailed(m) => ConnectionError::ConnectionFailed(m.clone()),
            ConnectionError::AuthenticationFailed(m) => {
                ConnectionError::AuthenticationFailed(m.clone())
            }
            ConnectionError::ExecutionFailed(m) => ConnectionError::ExecutionFailed(m.clone()),
            ConnectionError::Timeout(t) => ConnectionError::Timeout(*t),
            ConnectionError::InvalidConfig(m) => ConnectionError::InvalidConfig(m.clone()),
            ConnectionError::IoError(e) => ConnectionError::ExecutionFailed(e.to_string()),
        }
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    async fn execute(
        &self,
        command: &str,
        options: Option<ExecuteOptions>,
    ) -> ConnectionResult<CommandResult> {
        self.commands_executed.write().push(ExecutedCommand {
            command: command.to_string(),
            stdin: options.and_then(|o| o.stdin),
        });

        if let Some((_, err)) = self
            .failures
            .read()
            .iter()
            .rev()
            .find(|(pattern, _)| command.contains(pattern.as_str()))
        {
            return Err(Self::clone_error(err));
        }

        let result = self
            .responses
            .read()
            .iter()
            .rev()
            .find(|(pattern, _)| command.contains(pattern.as_str()))
            .map(|(_, result)| result.clone());
        Ok(result.unwrap_or_else(|| self.default_result.read().clone()))
    }

    async fn close(&self) -> ConnectionResult<()> {
        self.close_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// Temporary working directory for a test.
pub struct TestDir {
    dir: TempDir,
}

impl TestDir {
    /// Create a new temporary directory.
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create temp dir"),
        }
    }

    /// Path of the directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `content` to `name` inside the directory.
    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content).expect("failed to write fixture");
        path
    }

    /// Read `name` from the directory.
    pub fn read(&self, name: &str) -> String {
        std::fs::read_to_string(self.dir.path().join(name)).expect("failed to read fixture")
    }
}

/// Install request against the in-memory `mock` family.
pub fn mock_request(host: &str, candidate: &str, mode: LoadMode, intent: RunIntent) -> InstallRequest {
    InstallRequest {
        device: DeviceParams::new(host, "admin", "mock"),
        candidate: CandidateConfig::new(candidate, mode),
        intent,
        diff_file: None,
        archive_file: None,
    }
}

/// Commit with diffs, not in check mode.
pub fn commit_intent() -> RunIntent {
    RunIntent::new(false, true, true)
}

/// Check mode with diffs.
pub fn check_intent() -> RunIntent {
    RunIntent::new(true, true, true)
}
