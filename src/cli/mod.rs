//! CLI module for confpush
//!
//! This module provides the command-line interface: argument parsing and
//! subcommand dispatch.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// confpush - staged configuration pushes for network devices
///
/// Stages a candidate configuration, shows what would change, and commits
/// or discards it.
#[derive(Parser, Debug, Clone)]
#[command(name = "confpush")]
#[command(author = "confpush Contributors")]
#[command(version)]
#[command(about = "Staged configuration pushes for network devices", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Run in check mode (stage and diff, never commit)
    #[arg(long = "check", global = true)]
    pub check_mode: bool,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Human)]
    pub output: OutputFormat,

    /// Number of devices processed in parallel (defaults to the configured forks)
    #[arg(short = 'f', long, global = true)]
    pub forks: Option<usize>,

    /// Path to configuration file
    #[arg(short = 'c', long, global = true, env = "CONFPUSH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output with colors
    #[default]
    Human,
    /// JSON output for scripting
    Json,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Push a configuration to one or more devices
    Install(commands::install::InstallArgs),

    /// List supported device families
    Families(commands::families::FamiliesArgs),
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Get the effective verbosity level (0-3)
    pub fn verbosity(&self) -> u8 {
        self.verbose.min(3)
    }

    /// Check if JSON output is requested
    pub fn is_json(&self) -> bool {
        matches!(self.output, OutputFormat::Json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from([
            "confpush",
            "install",
            "--params",
            "r1.yml",
            "-a",
            "commit_changes=true",
        ])
        .unwrap();
        assert!(!cli.check_mode);
        assert_eq!(cli.output, OutputFormat::Human);
        match cli.command {
            Commands::Install(args) => {
                assert_eq!(args.params, Some(PathBuf::from("r1.yml")));
                assert_eq!(args.args, vec!["commit_changes=true".to_string()]);
            }
            Commands::Families(_) => panic!("expected install"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "confpush", "install", "-a", "hostname=r1", "--check", "-vv", "--output", "json",
            "-f", "10",
        ])
        .unwrap();
        assert!(cli.check_mode);
        assert_eq!(cli.verbosity(), 2);
        assert!(cli.is_json());
        assert_eq!(cli.forks, Some(10));
    }

    #[test]
    fn test_verbosity_capped() {
        let cli = Cli::try_parse_from(["confpush", "-vvvvv", "families"]).unwrap();
        assert_eq!(cli.verbosity(), 3);
    }
}
