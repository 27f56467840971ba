//! Families command - list the registered device drivers

use super::CommandContext;
use anyhow::Result;
use clap::Parser;
use confpush::session::DriverRegistry;

/// Arguments for the families command
#[derive(Parser, Debug, Clone)]
pub struct FamiliesArgs {}

impl FamiliesArgs {
    /// Execute the families command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let registry = DriverRegistry::with_builtins();
        ctx.output.families(&registry.families());
        Ok(0)
    }
}
