//! Staged configuration transaction.
//!
//! A [`ConfigTransaction`] drives one device through
//! stage → diff → decide → resolve:
//!
//! ```text
//! Idle ─open─> Open ─stage─> Staged ─┬─diff──> Diffed ──────┬─> Committed ─┐
//!                                    └─skip──> DiffSkipped ─┴─> Discarded ─┴─close─> Closed
//!
//! any error ─> Failed ─close─> Closed
//! ```
//!
//! The commit-or-discard decision is the pure function [`decide`]. When no
//! diff is requested, or the device cannot produce one, the candidate is
//! assumed to change the device (`changed = true`).
//!
//! Every error after staging attempts a best-effort discard before it is
//! returned, except a failing discard itself. Nothing is retried.
//!
//! # Example
//!
//! ```rust,ignore
//! use confpush::transaction::{run_transaction, CandidateConfig, LoadMode, RunIntent};
//!
//! let candidate = CandidateConfig::from_file("r1.conf", LoadMode::Replace)?;
//! let intent = RunIntent::new(false, true, true);
//! let outcome = run_transaction(session, &candidate, &intent).await?;
//! println!("changed={} applied={}", outcome.changed, outcome.applied);
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::session::{
    ConnectError, DeviceSession, DiffAvailability, DiffError, ResolveError, StageError,
};

// ============================================================================
// Inputs
// ============================================================================

/// How the candidate is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadMode {
    /// Candidate replaces the whole running configuration
    Replace,
    /// Candidate is merged into the running configuration
    #[default]
    Merge,
}

impl fmt::Display for LoadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadMode::Replace => write!(f, "replace"),
            LoadMode::Merge => write!(f, "merge"),
        }
    }
}

/// Configuration text to stage, immutable once loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateConfig {
    content: String,
    mode: LoadMode,
}

impl CandidateConfig {
    /// Candidate from in-memory text
    pub fn new(content: impl Into<String>, mode: LoadMode) -> Self {
        Self {
            content: content.into(),
            mode,
        }
    }

    /// Read the candidate from a file
    pub fn from_file(path: impl AsRef<Path>, mode: LoadMode) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Ok(Self::new(content, mode))
    }

    /// Raw configuration text
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Application mode
    pub fn mode(&self) -> LoadMode {
        self.mode
    }

    /// SHA-256 of the content, hex encoded
    pub fn checksum(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.content.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// What the caller wants from this run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunIntent {
    /// Dry run: never commit
    pub check_mode: bool,
    /// Commit when the candidate changes the device
    pub commit_requested: bool,
    /// Ask the device for a diff
    pub diffs_requested: bool,
}

impl RunIntent {
    /// Build an intent
    pub fn new(check_mode: bool, commit_requested: bool, diffs_requested: bool) -> Self {
        Self {
            check_mode,
            commit_requested,
            diffs_requested,
        }
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// How a staged candidate was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    /// Candidate activated
    Commit,
    /// Candidate dropped
    Discard,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Commit => write!(f, "commit"),
            Resolution::Discard => write!(f, "discard"),
        }
    }
}

/// State of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionState {
    /// Session not opened yet
    Idle,
    /// Session open, nothing staged
    Open,
    /// Candidate staged on the device
    Staged,
    /// Diff obtained
    Diffed,
    /// Diff not requested or not available
    DiffSkipped,
    /// Candidate committed
    Committed,
    /// Candidate discarded
    Discarded,
    /// A phase failed
    Failed,
    /// Session closed
    Closed,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionState::Idle => "idle",
            TransactionState::Open => "open",
            TransactionState::Staged => "staged",
            TransactionState::Diffed => "diffed",
            TransactionState::DiffSkipped => "diff_skipped",
            TransactionState::Committed => "committed",
            TransactionState::Discarded => "discarded",
            TransactionState::Failed => "failed",
            TransactionState::Closed => "closed",
        };
        write!(f, "{}", name)
    }
}

/// Result of a completed transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionOutcome {
    /// Whether the candidate changes (or is assumed to change) the device
    pub changed: bool,
    /// Diff text; `None` when no diff was requested or available
    pub diff_text: Option<String>,
    /// Whether a commit happened
    pub applied: bool,
    /// Resolution that was applied
    pub resolution: Resolution,
    /// Terminal state (`Committed` or `Discarded`)
    pub state: TransactionState,
}

// ============================================================================
// Errors
// ============================================================================

/// Phase in which a transaction failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionPhase {
    /// Opening the session
    Connect,
    /// Capturing the running configuration
    Backup,
    /// Staging the candidate
    Stage,
    /// Computing the diff
    Diff,
    /// Commit or discard
    Resolve,
    /// Operation called in the wrong state
    Lifecycle,
}

impl fmt::Display for TransactionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionPhase::Connect => "connect",
            TransactionPhase::Backup => "backup",
            TransactionPhase::Stage => "stage",
            TransactionPhase::Diff => "diff",
            TransactionPhase::Resolve => "resolve",
            TransactionPhase::Lifecycle => "lifecycle",
        };
        write!(f, "{}", name)
    }
}

/// Error type for transaction operations
#[derive(Error, Debug)]
pub enum TransactionError {
    /// Session could not be opened
    #[error("connect failed: {0}")]
    Connect(#[from] ConnectError),

    /// Running configuration could not be captured
    #[error("backup failed: {0}")]
    Backup(#[source] DiffError),

    /// Device rejected the candidate
    #[error("stage failed: {0}")]
    Stage(#[from] StageError),

    /// Diff could not be computed
    #[error("diff failed: {0}")]
    Diff(#[from] DiffError),

    /// Commit or discard failed
    #[error("{resolution} failed: {source}")]
    Resolve {
        /// Resolution that was attempted
        resolution: Resolution,
        /// Underlying error
        #[source]
        source: ResolveError,
    },

    /// Operation called in the wrong state
    #[error("invalid transaction state: expected {expected}, got {actual}")]
    InvalidState {
        /// Required state
        expected: TransactionState,
        /// Actual state
        actual: TransactionState,
    },
}

/// Result type for transaction operations
pub type TxResult<T> = std::result::Result<T, TransactionError>;

impl TransactionError {
    /// Phase that produced this error
    pub fn phase(&self) -> TransactionPhase {
        match self {
            TransactionError::Connect(_) => TransactionPhase::Connect,
            TransactionError::Backup(_) => TransactionPhase::Backup,
            TransactionError::Stage(_) => TransactionPhase::Stage,
            TransactionError::Diff(_) => TransactionPhase::Diff,
            TransactionError::Resolve { .. } => TransactionPhase::Resolve,
            TransactionError::InvalidState { .. } => TransactionPhase::Lifecycle,
        }
    }
}

// ============================================================================
// Decision
// ============================================================================

/// Decide how to resolve a staged candidate.
///
/// Check mode always discards; otherwise a commit happens only when it was
/// requested and the candidate changes the device.
pub fn decide(intent: &RunIntent, changed: bool) -> Resolution {
    if intent.check_mode || !intent.commit_requested || !changed {
        Resolution::Discard
    } else {
        Resolution::Commit
    }
}

// ============================================================================
// Transaction
// ============================================================================

/// One staged-configuration transaction against one device
pub struct ConfigTransaction {
    session: Box<dyn DeviceSession>,
    state: TransactionState,
}

impl ConfigTransaction {
    /// Take ownership of an unopened session
    pub fn new(session: Box<dyn DeviceSession>) -> Self {
        Self {
            session,
            state: TransactionState::Idle,
        }
    }

    /// Current state
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Device hostname
    pub fn hostname(&self) -> &str {
        self.session.hostname()
    }

    /// Device family tag
    pub fn family(&self) -> &str {
        self.session.family()
    }

    fn expect_state(&self, expected: TransactionState) -> TxResult<()> {
        if self.state != expected {
            return Err(TransactionError::InvalidState {
                expected,
                actual: self.state,
            });
        }
        Ok(())
    }

    /// Open the session
    pub async fn open(&mut self) -> TxResult<()> {
        self.expect_state(TransactionState::Idle)?;
        debug!(host = %self.hostname(), family = %self.family(), "Opening session");

        if let Err(e) = self.session.open().await {
            self.state = TransactionState::Failed;
            warn!(host = %self.hostname(), phase = "connect", error = %e, "Failed to open session");
            return Err(TransactionError::Connect(e));
        }
        self.state = TransactionState::Open;
        Ok(())
    }

    /// Fetch the running configuration before anything is staged.
    ///
    /// `None` means the driver cannot provide it.
    pub async fn capture_running_config(&mut self) -> TxResult<Option<String>> {
        self.expect_state(TransactionState::Open)?;
        match self.session.get_running_config().await {
            Ok(running) => Ok(running),
            Err(e) => {
                self.state = TransactionState::Failed;
                warn!(
                    host = %self.hostname(),
                    phase = "backup",
                    error = %e,
                    "Failed to capture running configuration"
                );
                Err(TransactionError::Backup(e))
            }
        }
    }

    /// Stage, diff, decide and resolve
    pub async fn execute(
        &mut self,
        candidate: &CandidateConfig,
        intent: &RunIntent,
    ) -> TxResult<TransactionOutcome> {
        self.expect_state(TransactionState::Open)?;

        let staged = match candidate.mode() {
            LoadMode::Replace => self.session.load_replace_candidate(candidate.content()).await,
            LoadMode::Merge => self.session.load_merge_candidate(candidate.content()).await,
        };
        if let Err(e) = staged {
            return Err(self.abort(TransactionError::Stage(e)).await);
        }
        self.state = TransactionState::Staged;
        debug!(host = %self.hostname(), mode = %candidate.mode(), "Candidate staged");

        let (changed, diff_text) = if intent.diffs_requested {
            match self.session.compare_config().await {
                Ok(DiffAvailability::Available(text)) => {
                    self.state = TransactionState::Diffed;
                    (!text.is_empty(), Some(text))
                }
                Ok(DiffAvailability::Unavailable) => {
                    self.state = TransactionState::DiffSkipped;
                    debug!(host = %self.hostname(), "Diff unavailable, assuming changed");
                    (true, None)
                }
                Err(e) => return Err(self.abort(TransactionError::Diff(e)).await),
            }
        } else {
            self.state = TransactionState::DiffSkipped;
            (true, None)
        };

        let resolution = decide(intent, changed);
        let resolved = match resolution {
            Resolution::Commit => self.session.commit_config().await,
            Resolution::Discard => self.session.discard_config().await,
        };

        if let Err(source) = resolved {
            let err = TransactionError::Resolve { resolution, source };
            return Err(match resolution {
                Resolution::Commit => self.abort(err).await,
                Resolution::Discard => {
                    self.state = TransactionState::Failed;
                    warn!(host = %self.hostname(), phase = "resolve", error = %err, "Discard failed");
                    err
                }
            });
        }

        self.state = match resolution {
            Resolution::Commit => TransactionState::Committed,
            Resolution::Discard => TransactionState::Discarded,
        };
        let applied = resolution == Resolution::Commit;

        info!(
            host = %self.hostname(),
            changed,
            applied,
            resolution = %resolution,
            check_mode = intent.check_mode,
            "Transaction resolved"
        );

        Ok(TransactionOutcome {
            changed,
            diff_text,
            applied,
            resolution,
            state: self.state,
        })
    }

    /// Best-effort discard after a failure, then mark the transaction failed
    async fn abort(&mut self, err: TransactionError) -> TransactionError {
        warn!(
            host = %self.hostname(),
            phase = %err.phase(),
            error = %err,
            "Transaction failed, discarding candidate"
        );
        if let Err(e) = self.session.discard_config().await {
            warn!(host = %self.hostname(), error = %e, "Cleanup discard failed");
        }
        self.state = TransactionState::Failed;
        err
    }

    /// Close the session. Safe to call in any state, more than once.
    pub async fn close(&mut self) {
        if self.state == TransactionState::Closed {
            return;
        }
        self.session.close().await;
        debug!(host = %self.hostname(), from = %self.state, "Session closed");
        self.state = TransactionState::Closed;
    }
}

impl Drop for ConfigTransaction {
    fn drop(&mut self) {
        if !matches!(self.state, TransactionState::Idle | TransactionState::Closed) {
            warn!(
                host = %self.session.hostname(),
                state = %self.state,
                "Transaction dropped without closing its session"
            );
        }
    }
}

/// Open, execute and close, closing the session on every path
pub async fn run_transaction(
    session: Box<dyn DeviceSession>,
    candidate: &CandidateConfig,
    intent: &RunIntent,
) -> TxResult<TransactionOutcome> {
    let mut tx = ConfigTransaction::new(session);
    let result = match tx.open().await {
        Ok(()) => tx.execute(candidate, intent).await,
        Err(e) => Err(e),
    };
    tx.close().await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{MockCall, MockDevice};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decide() {
        let commit = RunIntent::new(false, true, true);
        assert_eq!(decide(&commit, true), Resolution::Commit);
        assert_eq!(decide(&commit, false), Resolution::Discard);

        let check = RunIntent::new(true, true, true);
        assert_eq!(decide(&check, true), Resolution::Discard);

        let no_commit = RunIntent::new(false, false, true);
        assert_eq!(decide(&no_commit, true), Resolution::Discard);
    }

    #[test]
    fn test_candidate_checksum() {
        let candidate = CandidateConfig::new("hostname r1\n", LoadMode::Replace);
        assert_eq!(candidate.checksum().len(), 64);
        assert_eq!(
            candidate.checksum(),
            CandidateConfig::new("hostname r1\n", LoadMode::Merge).checksum()
        );
        assert_ne!(
            candidate.checksum(),
            CandidateConfig::new("hostname r2\n", LoadMode::Replace).checksum()
        );
    }

    #[test]
    fn test_candidate_from_missing_file() {
        let err = CandidateConfig::from_file("/nonexistent/r1.conf", LoadMode::Merge).unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_state_progression() {
        let device = MockDevice::new("hostname r1\n");
        let mut tx = ConfigTransaction::new(Box::new(device.session("r1")));
        assert_eq!(tx.state(), TransactionState::Idle);

        tx.open().await.unwrap();
        assert_eq!(tx.state(), TransactionState::Open);

        let candidate = CandidateConfig::new("hostname r2\n", LoadMode::Replace);
        let outcome = tx
            .execute(&candidate, &RunIntent::new(false, true, true))
            .await
            .unwrap();
        assert_eq!(outcome.state, TransactionState::Committed);
        assert_eq!(tx.state(), TransactionState::Committed);

        tx.close().await;
        tx.close().await;
        assert_eq!(tx.state(), TransactionState::Closed);
        assert_eq!(device.count(MockCall::Close), 1);
    }

    #[tokio::test]
    async fn test_execute_before_open_is_invalid() {
        let device = MockDevice::new("");
        let mut tx = ConfigTransaction::new(Box::new(device.session("r1")));
        let candidate = CandidateConfig::new("x\n", LoadMode::Merge);
        let err = tx
            .execute(&candidate, &RunIntent::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransactionError::InvalidState {
                expected: TransactionState::Open,
                actual: TransactionState::Idle
            }
        ));
        assert_eq!(err.phase(), TransactionPhase::Lifecycle);
        assert!(device.calls().is_empty());
    }

    #[tokio::test]
    async fn test_execute_twice_is_invalid() {
        let device = MockDevice::new("a\n");
        let mut tx = ConfigTransaction::new(Box::new(device.session("r1")));
        tx.open().await.unwrap();
        let candidate = CandidateConfig::new("b\n", LoadMode::Replace);
        let intent = RunIntent::new(false, true, true);
        tx.execute(&candidate, &intent).await.unwrap();

        let err = tx.execute(&candidate, &intent).await.unwrap_err();
        assert!(matches!(
            err,
            TransactionError::InvalidState {
                actual: TransactionState::Committed,
                ..
            }
        ));
        tx.close().await;
        assert_eq!(device.count(MockCall::Commit), 1);
    }

    #[tokio::test]
    async fn test_any_non_empty_diff_counts_as_changed() {
        struct BlankLineDiff;

        #[async_trait::async_trait]
        impl DeviceSession for BlankLineDiff {
            fn family(&self) -> &str {
                "test"
            }
            fn hostname(&self) -> &str {
                "r1"
            }
            async fn open(&mut self) -> std::result::Result<(), ConnectError> {
                Ok(())
            }
            async fn close(&mut self) {}
            async fn load_replace_candidate(
                &mut self,
                _config: &str,
            ) -> std::result::Result<(), StageError> {
                Ok(())
            }
            async fn load_merge_candidate(
                &mut self,
                _config: &str,
            ) -> std::result::Result<(), StageError> {
                Ok(())
            }
            async fn compare_config(
                &mut self,
            ) -> std::result::Result<DiffAvailability, DiffError> {
                Ok(DiffAvailability::Available("\n".to_string()))
            }
            async fn commit_config(&mut self) -> std::result::Result<(), ResolveError> {
                Ok(())
            }
            async fn discard_config(&mut self) -> std::result::Result<(), ResolveError> {
                Ok(())
            }
        }

        let candidate = CandidateConfig::new("x\n", LoadMode::Merge);
        let outcome = run_transaction(
            Box::new(BlankLineDiff),
            &candidate,
            &RunIntent::new(false, true, true),
        )
        .await
        .unwrap();
        assert!(outcome.changed);
        assert!(outcome.applied);
        assert_eq!(outcome.diff_text.as_deref(), Some("\n"));
        assert_eq!(outcome.resolution, Resolution::Commit);
    }
}
