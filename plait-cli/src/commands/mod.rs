pub mod execute;
pub mod visualize;

use std::collections::HashSet;

use clap::Subcommand;
use tracing::info;

use plait_core::config::Config;
use plait_core::error::GraphError;
use plait_core::graph::builder::GraphBuilder;
use plait_core::graph::WorkflowGraph;
use plait_core::metadata::MetadataClient;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build and render the workflow graph without executing it
    Visualize(visualize::VisualizeArgs),
    /// Build and execute the full pipeline workflow
    Execute(execute::ExecuteArgs),
}

pub async fn run(
    cmd: Command,
    url: Option<String>,
    artifact_url: Option<String>,
) -> anyhow::Result<()> {
    let config = Config::from_env()?
        .with_metadata_base(url)
        .with_artifact_base(artifact_url)?;

    match cmd {
        Command::Visualize(args) => visualize::run(args, &config).await,
        Command::Execute(args) => execute::run(args, &config).await,
    }
}

/// Build, validate, and return the combined workflow graph.
pub(crate) async fn build_graph(
    config: &Config,
    start_uuid: &str,
    regenerate: &[String],
) -> anyhow::Result<WorkflowGraph> {
    println!("--- Building combined workflow graph (starting from {start_uuid}) ---");

    let client = MetadataClient::new(config.metadata_base.clone());
    let regenerate: HashSet<String> = regenerate.iter().cloned().collect();
    let graph = GraphBuilder::new(&client).build(start_uuid, &regenerate).await?;

    if graph.is_empty() {
        return Err(GraphError::Empty.into());
    }
    // Reject cyclic graphs before any side effects.
    graph.topo_order()?;

    info!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "Built combined graph"
    );
    Ok(graph)
}
