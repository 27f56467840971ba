//! Install command
//!
//! Pushes a candidate configuration to every device described by a params
//! file and/or `-a key=value` pairs.

use super::CommandContext;
use crate::cli::output::OutputFormatter;
use anyhow::Result;
use clap::Parser;
use confpush::error::Error;
use confpush::params::{apply_overrides, load_params_file, parse_key_value, InstallRequest};
use confpush::report::StructuredResult;
use confpush::runner::InstallRunner;
use serde_json::Value;
use std::path::PathBuf;
use tracing::debug;

/// Arguments for the install command
#[derive(Parser, Debug, Clone)]
pub struct InstallArgs {
    /// YAML or JSON file with the parameters of one device or a list of devices
    #[arg(short = 'p', long)]
    pub params: Option<PathBuf>,

    /// Parameters as key=value pairs, applied on top of the params file
    #[arg(short = 'a', long = "args", action = clap::ArgAction::Append)]
    pub args: Vec<String>,
}

impl InstallArgs {
    /// Execute the install command, returning the process exit code
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let requests = match self.requests(ctx) {
            Ok(requests) => requests,
            Err(e) => {
                ctx.output.error(&e.to_string());
                return Ok(e.exit_code());
            }
        };
        debug!(
            devices = requests.len(),
            forks = ctx.forks,
            check_mode = ctx.check_mode,
            "Starting install"
        );

        let runner = InstallRunner::new(ctx.config.clone());
        let results = runner.run_many(&requests, ctx.forks).await;

        self.print(ctx, &results);
        Ok(exit_code(&results))
    }

    /// Parse every parameter entry into a typed request
    fn requests(&self, ctx: &CommandContext) -> confpush::Result<Vec<InstallRequest>> {
        let overrides = parse_key_value(&self.args)?;
        let entries = match self.params {
            Some(ref path) => {
                let mut entries = load_params_file(path)?;
                apply_overrides(&mut entries, &overrides);
                entries
            }
            None if !overrides.is_empty() => vec![overrides],
            None => {
                return Err(Error::MissingParameter(
                    "--params FILE or -a key=value".to_string(),
                ))
            }
        };

        entries
            .iter()
            .map(|entry| InstallRequest::from_params(entry, &ctx.config.defaults, ctx.check_mode))
            .collect()
    }

    fn print(&self, ctx: &CommandContext, results: &[(String, confpush::Result<StructuredResult>)]) {
        if ctx.output.is_json() {
            let mut documents: Vec<Value> = results
                .iter()
                .map(|(host, result)| match result {
                    Ok(r) => serde_json::to_value(r)
                        .unwrap_or_else(|e| serde_json::json!({"host": host, "msg": e.to_string()})),
                    Err(e) => OutputFormatter::error_json(host, e),
                })
                .collect();
            if documents.len() == 1 {
                ctx.output.json(&documents.remove(0));
            } else {
                ctx.output.json(&Value::Array(documents));
            }
            return;
        }

        for (host, result) in results {
            match result {
                Ok(r) => ctx.output.result(r),
                Err(e) => ctx.output.failure(host, e),
            }
        }
        if results.len() > 1 || ctx.verbosity >= 1 {
            let rows: Vec<(String, Option<&StructuredResult>)> = results
                .iter()
                .map(|(host, result)| (host.clone(), result.as_ref().ok()))
                .collect();
            ctx.output.recap(&rows);
        }
    }
}

/// First non-zero device exit code, in input order
fn exit_code(results: &[(String, confpush::Result<StructuredResult>)]) -> i32 {
    results
        .iter()
        .map(|(_, result)| match result {
            Ok(r) if r.failed => 5,
            Ok(_) => 0,
            Err(e) => e.exit_code(),
        })
        .find(|code| *code != 0)
        .unwrap_or(0)
}
