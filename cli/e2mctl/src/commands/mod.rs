//! CLI commands.

mod nodes;
mod shutdown;
mod terminators;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::client::ApiClient;
use crate::output::OutputFormat;

/// e2mctl - inspect and drive the E2 manager.
#[derive(Debug, Parser)]
#[command(name = "e2mctl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Manager API base URL.
    #[arg(long, global = true, env = "E2M_URL", default_value = "http://127.0.0.1:3800")]
    url: String,

    /// Output format (table or json).
    #[arg(long, global = true, default_value = "table")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Manage RAN nodes.
    Nodes(nodes::NodesCommand),

    /// Shut down every node.
    Shutdown(shutdown::ShutdownCommand),

    /// Inspect terminator instances.
    Terminators(terminators::TerminatorsCommand),

    /// Show CLI version.
    Version,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let ctx = CommandContext {
            url: self.url,
            format: OutputFormat::parse(&self.format),
        };

        match self.command {
            Commands::Nodes(cmd) => cmd.run(ctx).await,
            Commands::Shutdown(cmd) => cmd.run(ctx).await,
            Commands::Terminators(cmd) => cmd.run(ctx).await,
            Commands::Version => {
                println!("e2mctl {}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
        }
    }
}

/// Shared command context.
pub struct CommandContext {
    pub url: String,
    pub format: OutputFormat,
}

impl CommandContext {
    pub fn client(&self) -> Result<ApiClient> {
        ApiClient::new(&self.url)
    }
}
