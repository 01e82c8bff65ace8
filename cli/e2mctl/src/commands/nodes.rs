//! Node commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::{Deserialize, Serialize};
use tabled::Tabled;

use crate::output::{display_option, print_output, print_single, print_success, print_warning};

use super::CommandContext;

#[derive(Debug, Args)]
pub struct NodesCommand {
    #[command(subcommand)]
    command: NodesSubcommand,
}

#[derive(Debug, Subcommand)]
enum NodesSubcommand {
    /// List known nodes with their connection status.
    List,

    /// Get a node's full record.
    Get(NodeArgs),

    /// Connect a node (X2 setup, or EN-DC X2 setup with --endc).
    Setup(SetupArgs),

    /// Reset a connected node.
    Reset(ResetArgs),

    /// Forget a node that is not connected.
    Remove(NodeArgs),
}

#[derive(Debug, Args)]
struct NodeArgs {
    /// Node name.
    name: String,
}

#[derive(Debug, Args)]
struct SetupArgs {
    /// Node name.
    name: String,

    /// Node IP address.
    #[arg(long)]
    ip: String,

    /// Node SCTP port.
    #[arg(long)]
    port: u16,

    /// Run an EN-DC X2 setup instead of X2.
    #[arg(long)]
    endc: bool,
}

#[derive(Debug, Args)]
struct ResetArgs {
    /// Node name.
    name: String,

    /// Reset cause as `group:value`, e.g. `misc:om-intervention`.
    #[arg(long)]
    cause: Option<String>,
}

impl NodesCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        match self.command {
            NodesSubcommand::List => list_nodes(ctx).await,
            NodesSubcommand::Get(args) => get_node(ctx, args).await,
            NodesSubcommand::Setup(args) => setup_node(ctx, args).await,
            NodesSubcommand::Reset(args) => reset_node(ctx, args).await,
            NodesSubcommand::Remove(args) => remove_node(ctx, args).await,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Tabled)]
#[serde(rename_all = "camelCase")]
struct NodeRow {
    #[tabled(rename = "Name")]
    name: String,

    #[tabled(rename = "Type")]
    node_type: String,

    #[tabled(rename = "Status")]
    connection_status: String,

    #[tabled(rename = "Global ID", display = "display_global_id")]
    #[serde(default)]
    global_id: Option<GlobalId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GlobalId {
    plmn_id: String,
    nb_id: String,
}

fn display_global_id(id: &Option<GlobalId>) -> String {
    display_option(&id.as_ref().map(|id| format!("{}/{}", id.plmn_id, id.nb_id)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SetupBody<'a> {
    ran_name: &'a str,
    ran_ip: &'a str,
    ran_port: u16,
}

#[derive(Debug, Serialize)]
struct ResetBody<'a> {
    cause: &'a str,
}

#[derive(Debug, Serialize, Deserialize)]
struct ResetOutcome {
    node: String,
    cause: String,
    confirmed: bool,
}

async fn list_nodes(ctx: CommandContext) -> Result<()> {
    let client = ctx.client()?;
    let nodes: Vec<NodeRow> = client.get("/v1/nodebs/ids").await?;
    print_output(&nodes, ctx.format);
    Ok(())
}

async fn get_node(ctx: CommandContext, args: NodeArgs) -> Result<()> {
    let client = ctx.client()?;
    let record: serde_json::Value = client
        .get(&format!("/v1/nodebs/{}", args.name))
        .await
        .map_err(|e| e.or_not_found(|| format!("Node '{}' not found", args.name)))?;

    print_single(&record, ctx.format);
    Ok(())
}

async fn setup_node(ctx: CommandContext, args: SetupArgs) -> Result<()> {
    let client = ctx.client()?;
    let path = if args.endc {
        "/v1/nodebs/endc-setup"
    } else {
        "/v1/nodebs/x2-setup"
    };
    let body = SetupBody {
        ran_name: &args.name,
        ran_ip: &args.ip,
        ran_port: args.port,
    };
    let record: serde_json::Value = client.post(path, &body).await?;

    match ctx.format {
        crate::output::OutputFormat::Table => print_success(&format!(
            "Setup request sent for '{}' via {}",
            args.name,
            record["associatedTerminator"].as_str().unwrap_or("-")
        )),
        crate::output::OutputFormat::Json => print_single(&record, ctx.format),
    }
    Ok(())
}

async fn reset_node(ctx: CommandContext, args: ResetArgs) -> Result<()> {
    let client = ctx.client()?;
    let body = args.cause.as_deref().map(|cause| ResetBody { cause });
    let outcome: ResetOutcome = client
        .put(&format!("/v1/nodebs/{}/reset", args.name), body.as_ref())
        .await
        .map_err(|e| e.or_not_found(|| format!("Node '{}' not found", args.name)))?;

    match ctx.format {
        crate::output::OutputFormat::Table if outcome.confirmed => print_success(&format!(
            "Node '{}' reset ({})",
            outcome.node, outcome.cause
        )),
        crate::output::OutputFormat::Table => print_warning(&format!(
            "Reset sent to '{}' ({}) but not confirmed",
            outcome.node, outcome.cause
        )),
        crate::output::OutputFormat::Json => print_single(&outcome, ctx.format),
    }
    Ok(())
}

async fn remove_node(ctx: CommandContext, args: NodeArgs) -> Result<()> {
    let client = ctx.client()?;
    client
        .delete(&format!("/v1/nodebs/{}", args.name))
        .await
        .map_err(|e| e.or_not_found(|| format!("Node '{}' not found", args.name)))?;

    print_success(&format!("Node '{}' removed", args.name));
    Ok(())
}
