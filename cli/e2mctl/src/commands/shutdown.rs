//! Mass shutdown.

use anyhow::Result;
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::output::{print_single, print_success, print_warning, OutputFormat};

use super::CommandContext;

#[derive(Debug, Args)]
pub struct ShutdownCommand {
    /// Skip the confirmation guard.
    #[arg(long)]
    yes: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShutdownReport {
    total: usize,
    shutting_down: usize,
    shut_down_immediately: usize,
    skipped: usize,
    finalized: usize,
    failed: usize,
}

impl ShutdownCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        if !self.yes {
            anyhow::bail!("Shutdown disconnects every node. Re-run with --yes to proceed.");
        }

        let client = ctx.client()?;
        let report: ShutdownReport = client
            .put::<_, serde_json::Value>("/v1/nodebs/shutdown", None)
            .await?;

        if ctx.format == OutputFormat::Json {
            print_single(&report, ctx.format);
            return Ok(());
        }

        let message = format!(
            "{} nodes: {} shut down after draining, {} shut down immediately, {} already down",
            report.total, report.finalized, report.shut_down_immediately, report.skipped
        );
        if report.failed > 0 {
            print_warning(&format!("{message}, {} failed", report.failed));
        } else {
            print_success(&message);
        }
        Ok(())
    }
}
