//! Turning transaction outcomes into structured results.
//!
//! [`ChangeReporter::report`] produces the [`StructuredResult`] that is the
//! only externally visible summary of a run. [`ChangeReporter::persist`]
//! writes diff or archive text to disk atomically; a persist failure is
//! recorded on the result and never touches `changed` or `applied`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::transaction::{Resolution, TransactionOutcome};

/// Writing a diff or archive file failed
#[derive(Error, Debug)]
pub enum PersistError {
    /// Destination directory does not exist
    #[error("cannot write {path}: directory {} does not exist", .path.parent().map(|p| p.display().to_string()).unwrap_or_default())]
    MissingDirectory {
        /// Requested destination
        path: PathBuf,
    },

    /// Writing or renaming failed
    #[error("cannot write {path}: {source}")]
    Write {
        /// Requested destination
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },
}

/// Overall status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    /// Nothing changed
    Ok,
    /// The device changed (or would change)
    Changed,
    /// Reporting failed after the transaction finished
    Failed,
}

/// Structured summary of one device run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredResult {
    /// Device hostname
    pub host: String,
    /// Device family tag
    pub family: String,
    /// Whether the candidate changes the device
    pub changed: bool,
    /// Whether a commit happened
    pub applied: bool,
    /// Diff text, empty when none was obtained
    pub diff: String,
    /// How the candidate was resolved
    pub resolution: Resolution,
    /// Overall status
    pub status: ResultStatus,
    /// Human readable summary
    pub msg: String,
    /// Whether the run was a dry run
    pub check_mode: bool,
    /// SHA-256 of the candidate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_checksum: Option<String>,
    /// Where the diff was written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff_file: Option<PathBuf>,
    /// Where the running configuration was archived
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_file: Option<PathBuf>,
    /// Non-fatal problems
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// Set when reporting failed after the transaction finished
    pub failed: bool,
    /// When the result was produced
    pub timestamp: DateTime<Utc>,
}

impl StructuredResult {
    /// Add a non-fatal warning
    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Record a persist failure without touching `changed` or `applied`
    pub fn record_persist_failure(&mut self, err: &PersistError) {
        self.failed = true;
        self.status = ResultStatus::Failed;
        self.msg = format!("{} ({})", self.msg, err);
        self.warnings.push(err.to_string());
    }
}

/// Builds [`StructuredResult`]s for one device
#[derive(Debug, Clone)]
pub struct ChangeReporter {
    host: String,
    family: String,
    check_mode: bool,
    candidate_checksum: Option<String>,
}

impl ChangeReporter {
    /// Reporter for `host`
    pub fn new(host: impl Into<String>, family: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            family: family.into(),
            check_mode: false,
            candidate_checksum: None,
        }
    }

    /// Mark results as dry runs
    pub fn with_check_mode(mut self, check_mode: bool) -> Self {
        self.check_mode = check_mode;
        self
    }

    /// Attach the candidate checksum
    pub fn with_candidate_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.candidate_checksum = Some(checksum.into());
        self
    }

    /// Package a transaction outcome
    pub fn report(&self, outcome: &TransactionOutcome) -> StructuredResult {
        let msg = if outcome.applied {
            "Configuration committed"
        } else if !outcome.changed {
            "Configuration already up to date"
        } else if self.check_mode {
            "Check mode: changes discarded"
        } else {
            "Commit not requested: changes discarded"
        };

        StructuredResult {
            host: self.host.clone(),
            family: self.family.clone(),
            changed: outcome.changed,
            applied: outcome.applied,
            diff: outcome.diff_text.clone().unwrap_or_default(),
            resolution: outcome.resolution,
            status: if outcome.changed {
                ResultStatus::Changed
            } else {
                ResultStatus::Ok
            },
            msg: msg.to_string(),
            check_mode: self.check_mode,
            candidate_checksum: self.candidate_checksum.clone(),
            diff_file: None,
            backup_file: None,
            warnings: Vec::new(),
            failed: false,
            timestamp: Utc::now(),
        }
    }

    /// Write `text` to `path` atomically; no-op when `text` is `None`.
    ///
    /// The text goes to a temporary file in the destination directory,
    /// which is then renamed over `path`.
    pub fn persist(text: Option<&str>, path: &Path) -> Result<Option<PathBuf>, PersistError> {
        let text = match text {
            Some(text) => text,
            None => return Ok(None),
        };

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        if !dir.is_dir() {
            return Err(PersistError::MissingDirectory {
                path: path.to_path_buf(),
            });
        }

        let write_err = |source: std::io::Error| PersistError::Write {
            path: path.to_path_buf(),
            source,
        };

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(text.as_bytes()).map_err(write_err)?;
        tmp.flush().map_err(write_err)?;
        tmp.persist(path).map_err(|e| write_err(e.error))?;

        debug!(path = %path.display(), bytes = text.len(), "File written");
        Ok(Some(path.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::TransactionState;
    use pretty_assertions::assert_eq;

    fn outcome(changed: bool, applied: bool, diff: Option<&str>) -> TransactionOutcome {
        TransactionOutcome {
            changed,
            diff_text: diff.map(String::from),
            applied,
            resolution: if applied {
                Resolution::Commit
            } else {
                Resolution::Discard
            },
            state: if applied {
                TransactionState::Committed
            } else {
                TransactionState::Discarded
            },
        }
    }

    #[test]
    fn test_report_committed() {
        let reporter = ChangeReporter::new("r1", "junos").with_candidate_checksum("abc");
        let result = reporter.report(&outcome(true, true, Some("+host-name r2;\n")));
        assert!(result.changed);
        assert!(result.applied);
        assert_eq!(result.diff, "+host-name r2;\n");
        assert_eq!(result.status, ResultStatus::Changed);
        assert_eq!(result.resolution, Resolution::Commit);
        assert_eq!(result.candidate_checksum.as_deref(), Some("abc"));
        assert!(!result.failed);
    }

    #[test]
    fn test_report_missing_diff_is_empty_string() {
        let reporter = ChangeReporter::new("r1", "mock");
        let result = reporter.report(&outcome(true, true, None));
        assert_eq!(result.diff, "");
    }

    #[test]
    fn test_report_messages() {
        let check = ChangeReporter::new("r1", "mock").with_check_mode(true);
        assert_eq!(
            check.report(&outcome(true, false, Some("+x\n"))).msg,
            "Check mode: changes discarded"
        );
        let plain = ChangeReporter::new("r1", "mock");
        assert_eq!(
            plain.report(&outcome(false, false, Some(""))).status,
            ResultStatus::Ok
        );
        assert_eq!(
            plain.report(&outcome(true, false, Some("+x\n"))).msg,
            "Commit not requested: changes discarded"
        );
    }

    #[test]
    fn test_persist_none_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("diff.txt");
        assert_eq!(ChangeReporter::persist(None, &path).unwrap(), None);
        assert!(!path.exists());
    }

    #[test]
    fn test_persist_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("diff.txt");
        std::fs::write(&path, "old").unwrap();

        let written = ChangeReporter::persist(Some("+hostname r2\n"), &path).unwrap();
        assert_eq!(written.as_deref(), Some(path.as_path()));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "+hostname r2\n");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_persist_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("diff.txt");
        let err = ChangeReporter::persist(Some("x"), &path).unwrap_err();
        assert!(matches!(err, PersistError::MissingDirectory { .. }));
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_record_persist_failure_keeps_outcome() {
        let reporter = ChangeReporter::new("r1", "mock");
        let mut result = reporter.report(&outcome(true, true, Some("+x\n")));
        let err = PersistError::MissingDirectory {
            path: PathBuf::from("/nope/diff.txt"),
        };
        result.record_persist_failure(&err);
        assert!(result.failed);
        assert!(result.changed);
        assert!(result.applied);
        assert_eq!(result.status, ResultStatus::Failed);
        assert_eq!(result.warnings.len(), 1);
    }
}
