//! Error types for confpush.
//!
//! Each layer owns its own error enum (transport [`ConnectionError`], the
//! per-phase session errors, [`TransactionError`], [`PersistError`]); this
//! module aggregates them into the crate-level [`Error`] used by the runner
//! and the CLI, and maps them to process exit codes.
//!
//! [`ConnectionError`]: crate::connection::ConnectionError

use std::path::PathBuf;
use thiserror::Error;

use crate::report::PersistError;
use crate::transaction::{TransactionError, TransactionPhase};

/// Result type alias for confpush operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for confpush.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Transaction Errors
    // ========================================================================
    /// A phase of the configuration transaction failed.
    #[error("{host}: {source}")]
    Transaction {
        /// Device the transaction ran against
        host: String,
        /// Phase error
        #[source]
        source: TransactionError,
    },

    /// Writing a diff or archive file failed.
    #[error(transparent)]
    Persist(#[from] PersistError),

    // ========================================================================
    // Parameter Errors
    // ========================================================================
    /// A parameter had an unusable value.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A required parameter was not supplied.
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    /// No driver is registered for the requested device family.
    #[error("Unknown device family '{family}'. Registered families: {known}")]
    UnknownDeviceFamily {
        /// Requested family tag
        family: String,
        /// Comma-separated list of registered families
        known: String,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidConfig {
        /// Configuration key
        key: String,
        /// Error message
        message: String,
    },

    // ========================================================================
    // IO Errors
    // ========================================================================
    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ========================================================================
    // Serialization Errors
    // ========================================================================
    /// YAML parsing error.
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    // ========================================================================
    // Other Errors
    // ========================================================================
    /// Generic error with source.
    #[error("{message}")]
    Other {
        /// Error message
        message: String,
        /// Source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Creates a new transaction error for a host.
    pub fn transaction(host: impl Into<String>, source: TransactionError) -> Self {
        Self::Transaction {
            host: host.into(),
            source,
        }
    }

    /// Creates a new invalid parameter error.
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }

    /// The transaction phase that failed, if this is a transaction error.
    pub fn phase(&self) -> Option<TransactionPhase> {
        match self {
            Error::Transaction { source, .. } => Some(source.phase()),
            _ => None,
        }
    }

    /// Returns the error code for CLI exit status.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Transaction { source, .. } => match source.phase() {
                TransactionPhase::Connect => 3,
                TransactionPhase::Lifecycle => 1,
                _ => 2,
            },
            Error::InvalidParameter(_)
            | Error::MissingParameter(_)
            | Error::UnknownDeviceFamily { .. } => 4,
            Error::Persist(_) => 5,
            _ => 1,
        }
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context with a closure that is only evaluated on error.
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| Error::Other {
            message: f().into(),
            source: Some(Box::new(e)),
        })
    }
}
