use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use tracing::{info, warn};

use plait_core::config::Config;
use plait_core::graph::dot;

#[derive(Args, Debug)]
pub struct VisualizeArgs {
    /// The starting pipeline UUID to visualize
    pub start_uuid: String,

    /// Where to write the Graphviz DOT rendering
    #[arg(short, long, default_value = "combined_workflow.dot")]
    pub output: PathBuf,
}

pub async fn run(args: VisualizeArgs, config: &Config) -> anyhow::Result<()> {
    let graph = super::build_graph(config, &args.start_uuid, &[]).await?;

    let rendered = dot::to_dot(&graph);
    std::fs::write(&args.output, &rendered)
        .with_context(|| format!("Cannot write {}", args.output.display()))?;
    println!("Wrote workflow graph to {}", args.output.display());

    // Produce a PNG too when Graphviz is around; its absence is not an error.
    if which::which("dot").is_ok() {
        let png = args.output.with_extension("png");
        let status = tokio::process::Command::new("dot")
            .arg("-Tpng")
            .arg(&args.output)
            .arg("-o")
            .arg(&png)
            .status()
            .await;
        match status {
            Ok(status) if status.success() => {
                println!("Wrote workflow image to {}", png.display());
            }
            Ok(status) => warn!(code = ?status.code(), "Graphviz dot exited with failure"),
            Err(e) => warn!(error = %e, "Could not invoke Graphviz dot"),
        }
    } else {
        info!("Graphviz `dot` not found; skipping PNG rendering");
    }

    Ok(())
}
