//! Terminator instance commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::{Deserialize, Serialize};
use tabled::Tabled;

use crate::output::print_output;

use super::CommandContext;

#[derive(Debug, Args)]
pub struct TerminatorsCommand {
    #[command(subcommand)]
    command: TerminatorsSubcommand,
}

#[derive(Debug, Subcommand)]
enum TerminatorsSubcommand {
    /// List registered terminator instances.
    List,
}

#[derive(Debug, Clone, Serialize, Deserialize, Tabled)]
#[serde(rename_all = "camelCase")]
struct TerminatorRow {
    #[tabled(rename = "Address")]
    #[serde(rename = "e2tAddress")]
    address: String,

    #[tabled(rename = "State")]
    state: String,

    #[tabled(rename = "Nodes", display = "display_nodes")]
    ran_names: Vec<String>,

    #[tabled(rename = "Last keep-alive")]
    last_keep_alive: String,
}

fn display_nodes(nodes: &[String]) -> String {
    if nodes.is_empty() {
        "-".to_string()
    } else {
        nodes.join(",")
    }
}

impl TerminatorsCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        match self.command {
            TerminatorsSubcommand::List => {
                let client = ctx.client()?;
                let rows: Vec<TerminatorRow> = client.get("/v1/e2t/list").await?;
                print_output(&rows, ctx.format);
                Ok(())
            }
        }
    }
}
