//! Install runner: from a typed request to a structured result.
//!
//! [`InstallRunner::run`] builds the session through the [`DriverRegistry`],
//! optionally archives the running configuration, runs the transaction,
//! always closes the session and finally persists the diff. Several
//! devices are processed concurrently with [`InstallRunner::run_many`].

use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{error, info, instrument, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::params::InstallRequest;
use crate::report::{ChangeReporter, StructuredResult};
use crate::session::DriverRegistry;
use crate::transaction::{ConfigTransaction, TransactionOutcome};

/// What happened before and during the transaction
struct Execution {
    outcome: TransactionOutcome,
    backup_file: Option<PathBuf>,
    warnings: Vec<String>,
}

/// Runs install requests against devices
pub struct InstallRunner {
    registry: DriverRegistry,
    config: Config,
}

impl InstallRunner {
    /// Runner with the built-in drivers
    pub fn new(config: Config) -> Self {
        Self::with_registry(DriverRegistry::with_builtins(), config)
    }

    /// Runner with a custom registry
    pub fn with_registry(registry: DriverRegistry, config: Config) -> Self {
        Self { registry, config }
    }

    /// Registered drivers
    pub fn registry(&self) -> &DriverRegistry {
        &self.registry
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run one request. The session is closed on every path.
    ///
    /// A failure to write the diff file does not fail the run: it is
    /// recorded on the returned result (`failed = true`).
    #[instrument(skip_all, fields(host = %request.device.hostname))]
    pub async fn run(&self, request: &InstallRequest) -> Result<StructuredResult> {
        let host = request.device.hostname.clone();
        let session = self.registry.create(&request.device, &self.config)?;
        let mut tx = ConfigTransaction::new(session);

        let reporter = ChangeReporter::new(host.clone(), tx.family())
            .with_check_mode(request.intent.check_mode)
            .with_candidate_checksum(request.candidate.checksum());

        let executed = self.execute(&mut tx, request).await;
        tx.close().await;
        let execution = executed?;

        let mut result = reporter.report(&execution.outcome);
        result.backup_file = execution.backup_file;
        result.warnings.extend(execution.warnings);

        if let Some(ref path) = request.diff_file {
            match ChangeReporter::persist(execution.outcome.diff_text.as_deref(), path) {
                Ok(written) => result.diff_file = written,
                Err(e) => {
                    error!(host = %host, error = %e, "Failed to write diff file");
                    result.record_persist_failure(&e);
                }
            }
        }

        info!(
            host = %host,
            changed = result.changed,
            applied = result.applied,
            failed = result.failed,
            "Install finished"
        );
        Ok(result)
    }

    async fn execute(
        &self,
        tx: &mut ConfigTransaction,
        request: &InstallRequest,
    ) -> Result<Execution> {
        let host = request.device.hostname.as_str();
        tx.open().await.map_err(|e| Error::transaction(host, e))?;

        let mut warnings = Vec::new();
        let backup_file = match request.archive_file {
            Some(ref path) => archive(tx, host, path, &mut warnings).await?,
            None => None,
        };

        let outcome = tx
            .execute(&request.candidate, &request.intent)
            .await
            .map_err(|e| Error::transaction(host, e))?;

        Ok(Execution {
            outcome,
            backup_file,
            warnings,
        })
    }

    /// Run independent requests concurrently, at most `forks` at a time.
    ///
    /// Results come back in input order. A hostname that appears more than
    /// once is only run for its first occurrence.
    pub async fn run_many(
        &self,
        requests: &[InstallRequest],
        forks: usize,
    ) -> Vec<(String, Result<StructuredResult>)> {
        let mut seen = HashSet::new();
        let duplicates: Vec<bool> = requests
            .iter()
            .map(|r| !seen.insert(r.device.hostname.clone()))
            .collect();

        let mut results: Vec<(usize, String, Result<StructuredResult>)> =
            stream::iter(requests.iter().enumerate())
                .map(|(index, request)| {
                    let duplicate = duplicates[index];
                    async move {
                        let host = request.device.hostname.clone();
                        let result = if duplicate {
                            Err(Error::invalid_parameter(format!(
                                "device '{}' is listed more than once",
                                host
                            )))
                        } else {
                            self.run(request).await
                        };
                        (index, host, result)
                    }
                })
                .buffer_unordered(forks.max(1))
                .collect()
                .await;

        results.sort_by_key(|(index, _, _)| *index);
        results
            .into_iter()
            .map(|(_, host, result)| (host, result))
            .collect()
    }
}

/// Capture the running configuration and write it to `path` before staging
async fn archive(
    tx: &mut ConfigTransaction,
    host: &str,
    path: &Path,
    warnings: &mut Vec<String>,
) -> Result<Option<PathBuf>> {
    let running = tx
        .capture_running_config()
        .await
        .map_err(|e| Error::transaction(host, e))?;

    match running {
        Some(text) => {
            let written = ChangeReporter::persist(Some(&text), path)?;
            info!(host = %host, path = %path.display(), "Running configuration archived");
            Ok(written)
        }
        None => {
            let message = format!(
                "{} driver cannot provide the running configuration, archive skipped",
                tx.family()
            );
            warn!(host = %host, "{}", message);
            warnings.push(message);
            Ok(None)
        }
    }
}
