//! Walks a normalized execution graph and drives a backend through it.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use petgraph::stable_graph::NodeIndex;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::ExecError;
use crate::exec::StepBackend;
use crate::graph::{EdgeLabel, NodeKind, WorkflowGraph};
use crate::iri::{image_tag, sanitize_label};

/// Executes a normalized pipeline graph end-to-end, strictly sequentially.
///
/// `results_map` maps a variable IRI to the local path holding its data. An
/// entry appears after an initial-dataset download or after the producing
/// step completes, and is never rewritten.
#[derive(Debug)]
pub struct Orchestrator<'a> {
    graph: &'a WorkflowGraph,
    backend: &'a dyn StepBackend,
    config: &'a Config,
    results: HashMap<String, PathBuf>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        graph: &'a WorkflowGraph,
        backend: &'a dyn StepBackend,
        config: &'a Config,
    ) -> Self {
        Self {
            graph,
            backend,
            config,
            results: HashMap::new(),
        }
    }

    /// Run every step in topological order and return the final results map.
    pub async fn run(mut self) -> crate::error::Result<HashMap<String, PathBuf>> {
        let order = self.graph.topo_order()?;

        self.backend.setup_workspace(&self.config.workspace).await?;
        self.prepare_initial_datasets().await?;

        for &idx in &order {
            if self.graph.node(idx).kind == NodeKind::Step {
                let label = self.graph.node(idx).label.clone();
                info!(step = %label, "Executing step");
                self.execute_step(idx)
                    .await
                    .map_err(|e| ExecError::Step {
                        step: label.clone(),
                        source: Box::new(e),
                    })?;
            }
        }

        info!("Orchestration finished successfully");
        for &idx in &order {
            let node = self.graph.node(idx);
            if node.kind == NodeKind::Variable && self.graph.out_degree(idx) == 0 {
                match self.results.get(&node.iri) {
                    Some(path) => {
                        info!(output = %node.label, path = %path.display(), "Final output available");
                    }
                    None => warn!(output = %node.label, "Final output was never produced"),
                }
            }
        }

        Ok(self.results)
    }

    /// Download distributions for datasets whose variable is not produced by
    /// any step, and record the download directory as that variable's result.
    async fn prepare_initial_datasets(&mut self) -> crate::error::Result<()> {
        let step_outputs: HashSet<String> = self
            .graph
            .nodes_sorted()
            .into_iter()
            .filter(|&idx| self.graph.node(idx).kind == NodeKind::Step)
            .flat_map(|step| self.graph.outgoing(step, EdgeLabel::Output))
            .map(|var| self.graph.node(var).iri.clone())
            .collect();

        for idx in self.graph.nodes_sorted() {
            let dataset = self.graph.node(idx);
            if dataset.kind != NodeKind::Dataset || dataset.access_urls.is_empty() {
                continue;
            }
            let Some(&var_idx) = self.graph.incoming(idx, EdgeLabel::InstanceOf).first() else {
                continue;
            };
            let variable = self.graph.node(var_idx);
            if step_outputs.contains(&variable.iri) {
                continue;
            }

            let target_dir = self
                .config
                .workspace
                .join("initial_datasets")
                .join(sanitize_label(&variable.label));
            for url in &dataset.access_urls {
                self.backend
                    .fetch_file(url, &target_dir, self.config.artifact_base.as_ref())
                    .await?;
            }
            info!(
                dataset = %dataset.label,
                variable = %variable.label,
                path = %target_dir.display(),
                "Staged initial dataset"
            );
            self.results.entry(variable.iri.clone()).or_insert(target_dir);
        }
        Ok(())
    }

    async fn execute_step(&mut self, step_idx: NodeIndex) -> crate::error::Result<()> {
        let step = self.graph.node(step_idx);
        let ws = self
            .backend
            .prepare_step_workspace(&self.config.workspace, &step.label, &step.iri)
            .await?;

        for var_idx in self.graph.incoming(step_idx, EdgeLabel::Input) {
            let variable = self.graph.node(var_idx);
            let source = self.results.get(&variable.iri).ok_or_else(|| {
                ExecError::MissingInput {
                    variable: variable.iri.clone(),
                }
            })?;
            let target = ws.inputs.join(sanitize_label(&variable.label));
            self.backend.stage_input(source, &target).await?;
            info!(input = %variable.label, source = %source.display(), "Staged input");
        }

        let plugin_idx = self
            .graph
            .outgoing(step_idx, EdgeLabel::Uses)
            .into_iter()
            .find(|&p| self.graph.node(p).kind == NodeKind::Plugin)
            .ok_or_else(|| ExecError::MalformedStep {
                step: step.label.clone(),
                what: "plugin",
            })?;
        let plugin = self.graph.node(plugin_idx);
        let plugin_url = plugin
            .access_urls
            .first()
            .ok_or_else(|| ExecError::MissingAccessUrl {
                node: plugin.iri.clone(),
            })?;

        let archive = self
            .backend
            .fetch_file(
                plugin_url,
                &self.config.workspace.join("artifact_cache"),
                self.config.artifact_base.as_ref(),
            )
            .await?;
        self.backend.unpack_archive(&archive, &ws.plugin).await?;

        let plugin_config = self.backend.read_plugin_config(&ws.plugin).await?;
        let tag = image_tag(&plugin.label);

        self.backend.build_image(&tag, &ws.plugin).await?;
        self.backend
            .run_container(&tag, &ws.inputs, &ws.outputs, &plugin_config)
            .await?;

        let output_idx = self
            .graph
            .outgoing(step_idx, EdgeLabel::Output)
            .into_iter()
            .find(|&v| self.graph.node(v).kind == NodeKind::Variable)
            .ok_or_else(|| ExecError::MalformedStep {
                step: step.label.clone(),
                what: "output variable",
            })?;
        let output = self.graph.node(output_idx);

        let final_path = self
            .backend
            .finalize_output(
                &ws.outputs,
                &self.config.workspace.join("results"),
                &sanitize_label(&output.label),
            )
            .await?;
        info!(output = %output.label, path = %final_path.display(), "Step output finalized");
        self.results
            .entry(output.iri.clone())
            .or_insert(final_path);

        Ok(())
    }
}
