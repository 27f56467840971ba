//! Telemetry for confpush.
//!
//! Only structured logging is provided: `tracing` events carry `host`,
//! `family` and `phase` fields, and [`init_logging`] installs a
//! `tracing-subscriber` registry with an `EnvFilter` once at startup.
//!
//! ```rust,ignore
//! use confpush::telemetry::{init_logging, LogFormat};
//!
//! init_logging(1, "warn", LogFormat::Compact, true)?;
//! tracing::info!(host = %host, "Opening session");
//! ```

pub mod logging;

pub use logging::{verbosity_directive, LogFormat, LoggingBuilder};

/// Initialize the global subscriber from a `-v` count and configured defaults.
///
/// `RUST_LOG` still takes precedence over both.
pub fn init_logging(
    verbosity: u8,
    base_level: &str,
    format: LogFormat,
    ansi: bool,
) -> crate::error::Result<()> {
    LoggingBuilder::new()
        .with_level(verbosity_directive(verbosity, base_level))
        .with_format(format)
        .with_ansi(ansi)
        .with_target(verbosity >= 2)
        .init()
}
