//! In-memory device for tests and dry runs.
//!
//! A [`MockDevice`] is shared state (running configuration, staged candidate,
//! call journal, injected faults); any number of [`MockSession`]s can be
//! opened against it, one at a time. With a `state_file` the running
//! configuration is read on open and written back on commit, so separate
//! processes see each other's commits.
//!
//! Recognised `optional_args`:
//!
//! | Key                  | Meaning                                              |
//! |----------------------|------------------------------------------------------|
//! | `running_config`     | initial running configuration                        |
//! | `state_file`         | file holding the running configuration               |
//! | `diff_supported`     | `false` makes `compare_config` return `Unavailable`  |
//! | `archive_supported`  | `false` makes `get_running_config` return `None`     |
//! | `fail_on`            | operation name (or list) that should fail            |

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use super::common::{significant_lines, unified_config_diff};
use super::{
    ConnectError, DeviceParams, DeviceSession, DiffAvailability, DiffError, ResolveError,
    StageError,
};
use crate::config::Config;
use crate::error::{Error, Result};

/// Operations recorded by a [`MockDevice`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockCall {
    /// `open`
    Open,
    /// `close`
    Close,
    /// `load_replace_candidate`
    LoadReplace,
    /// `load_merge_candidate`
    LoadMerge,
    /// `compare_config`
    Compare,
    /// `commit_config`
    Commit,
    /// `discard_config`
    Discard,
    /// `get_running_config`
    GetRunning,
}

impl MockCall {
    /// Parse a `fail_on` entry; `stage` covers both load operations.
    fn parse_fault(name: &str) -> Option<Vec<MockCall>> {
        let calls = match name.to_lowercase().as_str() {
            "open" | "connect" => vec![MockCall::Open],
            "stage" | "load" => vec![MockCall::LoadReplace, MockCall::LoadMerge],
            "load_replace" => vec![MockCall::LoadReplace],
            "load_merge" => vec![MockCall::LoadMerge],
            "compare" | "diff" => vec![MockCall::Compare],
            "commit" => vec![MockCall::Commit],
            "discard" => vec![MockCall::Discard],
            "backup" | "get_running" => vec![MockCall::GetRunning],
            _ => return None,
        };
        Some(calls)
    }
}

#[derive(Debug)]
struct MockState {
    running: String,
    candidate: Option<String>,
    calls: Vec<MockCall>,
    faults: HashSet<MockCall>,
    diff_supported: bool,
    archive_supported: bool,
}

/// Shared in-memory device
#[derive(Debug, Clone)]
pub struct MockDevice {
    state: Arc<Mutex<MockState>>,
}

impl MockDevice {
    /// Device whose running configuration is `running`
    pub fn new(running: impl Into<String>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                running: running.into(),
                candidate: None,
                calls: Vec::new(),
                faults: HashSet::new(),
                diff_supported: true,
                archive_supported: true,
            })),
        }
    }

    /// Make `call` fail from now on
    pub fn fail_on(self, call: MockCall) -> Self {
        self.state.lock().faults.insert(call);
        self
    }

    /// Toggle diff support
    pub fn with_diff_supported(self, supported: bool) -> Self {
        self.state.lock().diff_supported = supported;
        self
    }

    /// Toggle running-config retrieval
    pub fn with_archive_supported(self, supported: bool) -> Self {
        self.state.lock().archive_supported = supported;
        self
    }

    /// Current running configuration
    pub fn running(&self) -> String {
        self.state.lock().running.clone()
    }

    /// Currently staged candidate
    pub fn candidate(&self) -> Option<String> {
        self.state.lock().candidate.clone()
    }

    /// Every operation called so far, in order
    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().calls.clone()
    }

    /// Number of times `call` was made
    pub fn count(&self, call: MockCall) -> usize {
        self.state.lock().calls.iter().filter(|c| **c == call).count()
    }

    /// Open a session against this device
    pub fn session(&self, hostname: impl Into<String>) -> MockSession {
        MockSession {
            device: self.clone(),
            hostname: hostname.into(),
            state_file: None,
            open: false,
        }
    }

    /// Record `call`, failing if a fault is injected for it
    fn record(&self, call: MockCall) -> std::result::Result<(), String> {
        let mut state = self.state.lock();
        state.calls.push(call);
        if state.faults.contains(&call) {
            return Err(format!("injected {:?} failure", call));
        }
        Ok(())
    }
}

/// Session against a [`MockDevice`]
#[derive(Debug)]
pub struct MockSession {
    device: MockDevice,
    hostname: String,
    state_file: Option<PathBuf>,
    open: bool,
}

impl MockSession {
    /// Build a session from device parameters (registry entry point)
    pub fn from_params(params: &DeviceParams, _config: &Config) -> Result<Self> {
        let device = MockDevice::new(params.optional_str("running_config").unwrap_or_default());

        if let Some(value) = params.optional_args.get("diff_supported") {
            device.state.lock().diff_supported = bool_arg("diff_supported", value)?;
        }
        if let Some(value) = params.optional_args.get("archive_supported") {
            device.state.lock().archive_supported = bool_arg("archive_supported", value)?;
        }
        if let Some(value) = params.optional_args.get("fail_on") {
            let invalid = || {
                Error::invalid_parameter("fail_on: expected an operation name or a list of names")
            };
            let names: Vec<&str> = match value {
                Value::String(s) => vec![s.as_str()],
                Value::Array(items) => items
                    .iter()
                    .map(|v| v.as_str().ok_or_else(invalid))
                    .collect::<Result<_>>()?,
                _ => return Err(invalid()),
            };
            for name in names {
                let calls = MockCall::parse_fault(name).ok_or_else(|| {
                    Error::invalid_parameter(format!("fail_on: unknown operation '{}'", name))
                })?;
                device.state.lock().faults.extend(calls);
            }
        }

        let mut session = device.session(params.hostname.clone());
        session.state_file = params.optional_str("state_file").map(PathBuf::from);
        Ok(session)
    }

    /// The device this session is attached to
    pub fn device(&self) -> &MockDevice {
        &self.device
    }

    fn ensure_open(&self) -> std::result::Result<(), StageError> {
        if self.open {
            Ok(())
        } else {
            Err(StageError::Rejected(format!(
                "{}: session is not open",
                self.hostname
            )))
        }
    }
}

fn bool_arg(key: &str, value: &Value) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) => crate::params::parse_bool(s)
            .ok_or_else(|| Error::invalid_parameter(format!("{}: expected a boolean", key))),
        _ => Err(Error::invalid_parameter(format!(
            "{}: expected a boolean",
            key
        ))),
    }
}

#[async_trait]
impl DeviceSession for MockSession {
    fn family(&self) -> &str {
        "mock"
    }

    fn hostname(&self) -> &str {
        &self.hostname
    }

    async fn open(&mut self) -> std::result::Result<(), ConnectError> {
        self.device.record(MockCall::Open).map_err(ConnectError::Unreachable)?;

        if let Some(ref path) = self.state_file {
            if path.exists() {
                let running = tokio::fs::read_to_string(path).await.map_err(|e| {
                    ConnectError::Unreachable(format!("{}: {}", path.display(), e))
                })?;
                self.device.state.lock().running = running;
            }
        }

        self.open = true;
        debug!(host = %self.hostname, "Mock session opened");
        Ok(())
    }

    async fn close(&mut self) {
        let _ = self.device.record(MockCall::Close);
        self.open = false;
    }

    async fn load_replace_candidate(&mut self, config: &str) -> std::result::Result<(), StageError> {
        self.ensure_open()?;
        self.device.record(MockCall::LoadReplace).map_err(StageError::Rejected)?;
        self.device.state.lock().candidate = Some(config.to_string());
        Ok(())
    }

    async fn load_merge_candidate(&mut self, config: &str) -> std::result::Result<(), StageError> {
        self.ensure_open()?;
        self.device.record(MockCall::LoadMerge).map_err(StageError::Rejected)?;

        let mut state = self.device.state.lock();
        let mut merged = state.candidate.clone().unwrap_or_else(|| state.running.clone());
        let additions: Vec<String> = {
            let present: HashSet<&str> = significant_lines(&merged)
                .into_iter()
                .map(str::trim)
                .collect();
            significant_lines(config)
                .into_iter()
                .filter(|line| !present.contains(line.trim()))
                .map(String::from)
                .collect()
        };
        if !additions.is_empty() && !merged.is_empty() && !merged.ends_with('\n') {
            merged.push('\n');
        }
        for line in additions {
            merged.push_str(&line);
            merged.push('\n');
        }
        state.candidate = Some(merged);
        Ok(())
    }

    async fn compare_config(&mut self) -> std::result::Result<DiffAvailability, DiffError> {
        self.device.record(MockCall::Compare).map_err(DiffError::Failed)?;

        let state = self.device.state.lock();
        if !state.diff_supported {
            return Ok(DiffAvailability::Unavailable);
        }
        let diff = match state.candidate {
            Some(ref candidate) => unified_config_diff(&state.running, candidate),
            None => String::new(),
        };
        Ok(DiffAvailability::Available(diff))
    }

    async fn commit_config(&mut self) -> std::result::Result<(), ResolveError> {
        self.device.record(MockCall::Commit).map_err(ResolveError::Rejected)?;

        let running = {
            let mut state = self.device.state.lock();
            if let Some(candidate) = state.candidate.take() {
                state.running = candidate;
            }
            state.running.clone()
        };

        if let Some(ref path) = self.state_file {
            tokio::fs::write(path, running).await.map_err(|e| {
                ResolveError::Rejected(format!("{}: {}", path.display(), e))
            })?;
        }
        Ok(())
    }

    async fn discard_config(&mut self) -> std::result::Result<(), ResolveError> {
        self.device.record(MockCall::Discard).map_err(ResolveError::Rejected)?;
        self.device.state.lock().candidate = None;
        Ok(())
    }

    async fn get_running_config(&mut self) -> std::result::Result<Option<String>, DiffError> {
        self.device.record(MockCall::GetRunning).map_err(DiffError::Failed)?;
        let state = self.device.state.lock();
        if !state.archive_supported {
            return Ok(None);
        }
        Ok(Some(state.running.clone()))
    }
}
