//! Subcommands module for confpush CLI
//!
//! This module contains all the subcommand implementations.

pub mod families;
pub mod install;

use crate::cli::output::OutputFormatter;
use confpush::config::Config;

/// Common context shared between commands
pub struct CommandContext {
    /// Configuration
    pub config: Config,
    /// Output formatter
    pub output: OutputFormatter,
    /// Verbosity level
    pub verbosity: u8,
    /// Check mode (dry-run)
    pub check_mode: bool,
    /// Number of devices processed in parallel
    pub forks: usize,
}

impl CommandContext {
    /// Create a new command context from CLI arguments
    pub fn new(cli: &crate::cli::Cli, config: Config, use_color: bool) -> Self {
        let output = OutputFormatter::new(use_color, cli.is_json(), cli.verbosity());
        let forks = cli.forks.unwrap_or(config.defaults.forks).max(1);

        Self {
            config,
            output,
            verbosity: cli.verbosity(),
            check_mode: cli.check_mode,
            forks,
        }
    }
}
