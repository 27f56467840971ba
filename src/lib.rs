//! # confpush - Staged configuration pushes for network devices
//!
//! confpush replaces or merges a configuration on a network device as a
//! transaction: the candidate is staged on the device, optionally diffed
//! against the running configuration, and then either committed or
//! discarded. Check mode always discards, so a dry run never changes the
//! device but still reports what would change.
//!
//! ## Core Concepts
//!
//! - **Sessions**: A [`DeviceSession`](session::DeviceSession) wraps one
//!   device family's stage/diff/commit/discard primitives
//! - **Transactions**: [`ConfigTransaction`](transaction::ConfigTransaction)
//!   drives a session through stage → diff → decide → resolve
//! - **Reports**: [`ChangeReporter`](report::ChangeReporter) turns the outcome
//!   into a [`StructuredResult`](report::StructuredResult) and writes diff files
//! - **Runner**: [`InstallRunner`](runner::InstallRunner) ties parameters,
//!   driver registry, transaction and report together
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                           CLI Interface                              │
//! │              (clap; params file or key=value pairs)                  │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          Install Runner                              │
//! │        (params → request → archive → transaction → report)           │
//! └─────────────────────────────────────────────────────────────────────┘
//!          │                         │                         │
//!          ▼                         ▼                         ▼
//! ┌─────────────────┐   ┌─────────────────────┐   ┌─────────────────────┐
//! │ Driver Registry │   │  ConfigTransaction  │   │   ChangeReporter    │
//! │  (family tag →  │   │  (state machine +   │   │  (result + atomic   │
//! │   session)      │   │   decide)           │   │   diff persist)     │
//! └─────────────────┘   └─────────────────────┘   └─────────────────────┘
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    Device Sessions / Transport                       │
//! │            (Junos, EOS, IOS, mock; system ssh or local)              │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use confpush::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load(None)?;
//!     let params = load_params_file("r1.yml")?;
//!     let request = InstallRequest::from_params(&params[0], &config.defaults, false)?;
//!
//!     let runner = InstallRunner::new(config);
//!     let result = runner.run(&request).await?;
//!     println!("changed={} applied={}", result.changed, result.applied);
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Re-export commonly used items in prelude
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    // Transport
    pub use crate::connection::{
        CommandResult, Connection, ConnectionError, ExecuteOptions, LocalConnection,
        SshConnection, TransportKind,
    };

    // Error handling
    pub use crate::error::{Error, Result};

    // Configuration
    pub use crate::config::Config;

    // Sessions
    pub use crate::session::{
        DeviceParams, DeviceSession, DiffAvailability, DriverRegistry, MockDevice, MockSession,
    };

    // Transactions
    pub use crate::transaction::{
        decide, run_transaction, CandidateConfig, ConfigTransaction, LoadMode, Resolution,
        RunIntent, TransactionError, TransactionOutcome, TransactionState,
    };

    // Parameters, reporting and the runner
    pub use crate::params::{load_params_file, parse_key_value, InstallRequest, TaskParams};
    pub use crate::report::{ChangeReporter, PersistError, StructuredResult};
    pub use crate::runner::InstallRunner;
}

// ============================================================================
// Core Modules
// ============================================================================

/// Error types and result aliases for confpush operations.
///
/// The crate-level [`Error`](error::Error) aggregates the per-layer errors
/// and maps them to process exit codes.
pub mod error;

/// Configuration management: settings files and environment overrides.
pub mod config;

/// Logging initialisation.
pub mod telemetry;

// ============================================================================
// Device Access
// ============================================================================

/// Command transports (system `ssh` and local shell).
pub mod connection;

/// Device sessions, per-family drivers and the driver registry.
pub mod session;

// ============================================================================
// Transaction Core
// ============================================================================

/// The staged configuration transaction and its commit/discard decision.
pub mod transaction;

/// Structured results and atomic diff/archive persistence.
pub mod report;

// ============================================================================
// Task Boundary
// ============================================================================

/// Untyped task parameters and their validation into install requests.
pub mod params;

/// Runs install requests against one or many devices.
pub mod runner;

pub use error::{Error, Result};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
