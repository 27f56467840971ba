//! confpush - staged configuration pushes for network devices
//!
//! This is the main entry point for the confpush CLI.

mod cli;

use anyhow::Result;
use cli::commands::CommandContext;
use cli::{Cli, Commands};
use confpush::config::Config;
use confpush::telemetry::init_logging;
use is_terminal::IsTerminal;

/// Application version information
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration; an explicit --config must exist and parse
    let config = match Config::load(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) if cli.config.is_some() => {
            eprintln!("ERROR: {}", e);
            std::process::exit(e.exit_code());
        }
        Err(e) => {
            eprintln!("WARNING: Failed to load config: {}", e);
            Config::default()
        }
    };

    let use_color = !cli.no_color && config.colors.enabled && std::io::stdout().is_terminal();
    let log_ansi = !cli.no_color && config.colors.enabled && std::io::stderr().is_terminal();

    // Initialize logging based on verbosity
    if let Err(e) = init_logging(
        cli.verbosity(),
        &config.logging.level,
        config.logging.format,
        log_ansi,
    ) {
        eprintln!("WARNING: {}", e);
    }
    tracing::debug!(version = VERSION, "confpush starting");

    // Create command context
    let mut ctx = CommandContext::new(&cli, config, use_color);

    // Execute the appropriate command
    let exit_code = match &cli.command {
        Commands::Install(args) => args.execute(&mut ctx).await?,
        Commands::Families(args) => args.execute(&mut ctx).await?,
    };

    std::process::exit(exit_code);
}
