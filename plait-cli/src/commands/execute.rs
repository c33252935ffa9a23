use anyhow::Context;
use clap::Args;

use plait_core::config::Config;
use plait_core::error::ExecError;
use plait_core::exec::{DryRunBackend, LiveBackend, Orchestrator, CONTAINER_RUNTIME};

#[derive(Args, Debug)]
pub struct ExecuteArgs {
    /// The starting pipeline UUID to execute
    pub start_uuid: String,

    /// A dataset UUID to regenerate instead of reusing its published
    /// distribution; can be given multiple times
    #[arg(short = 'r', long = "regenerate")]
    pub regenerate: Vec<String>,

    /// Print the execution steps without running them
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn run(args: ExecuteArgs, config: &Config) -> anyhow::Result<()> {
    // A live run is pointless without the container runtime; fail before
    // fetching anything.
    if !args.dry_run && which::which(CONTAINER_RUNTIME).is_err() {
        return Err(ExecError::RuntimeMissing {
            runtime: CONTAINER_RUNTIME.to_string(),
        }
        .into());
    }

    let graph = super::build_graph(config, &args.start_uuid, &args.regenerate).await?;

    if args.dry_run {
        println!();
        println!("--- Starting dry run ---");
        let backend = DryRunBackend::new();
        Orchestrator::new(&graph, &backend, config)
            .run()
            .await
            .context("Pipeline execution failed")?;
        for line in backend.plan() {
            println!("[dry run] {line}");
        }
    } else {
        println!();
        println!("--- Starting pipeline orchestration ---");
        let backend = LiveBackend::new();
        let results = Orchestrator::new(&graph, &backend, config)
            .run()
            .await
            .context("Pipeline execution failed")?;

        println!();
        println!("Orchestration finished; {} result(s) staged:", results.len());
        let mut entries: Vec<_> = results.iter().collect();
        entries.sort();
        for (variable, path) in entries {
            println!("  {variable} -> {}", path.display());
        }
    }

    Ok(())
}
