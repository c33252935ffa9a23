//! The dry-run backend: records what the live backend would do.
//!
//! Every operation appends one plan line and returns the same path the live
//! backend would have produced, so the orchestrator walks the full graph
//! without touching the filesystem or the network.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::info;
use url::Url;

use crate::exec::{PluginConfig, StepBackend, StepWorkspace, CONTAINER_RUNTIME};
use crate::iri::{rewrite_url_base, url_basename};

#[derive(Debug, Default)]
pub struct DryRunBackend {
    plan: Mutex<Vec<String>>,
}

impl DryRunBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// The recorded plan, one line per operation, in execution order.
    pub fn plan(&self) -> Vec<String> {
        self.plan.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }

    fn record(&self, line: String) {
        info!("[dry run] {line}");
        self.plan
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(line);
    }
}

#[async_trait::async_trait]
impl StepBackend for DryRunBackend {
    async fn setup_workspace(&self, root: &Path) -> crate::error::Result<()> {
        self.record(format!("would set up main workspace at {}", root.display()));
        Ok(())
    }

    async fn prepare_step_workspace(
        &self,
        root: &Path,
        step_label: &str,
        step_iri: &str,
    ) -> crate::error::Result<StepWorkspace> {
        let ws = super::step_workspace_paths(root, step_label, step_iri);
        self.record(format!(
            "would prepare workspace for step '{step_label}' at {}",
            super::step_dir(root, step_label, step_iri).display()
        ));
        Ok(ws)
    }

    async fn stage_input(&self, source: &Path, target: &Path) -> crate::error::Result<()> {
        self.record(format!(
            "would stage input from {} to {}",
            source.display(),
            target.display()
        ));
        Ok(())
    }

    async fn fetch_file(
        &self,
        url: &str,
        target_dir: &Path,
        artifact_base: Option<&Url>,
    ) -> crate::error::Result<PathBuf> {
        let url = match artifact_base {
            Some(base) => rewrite_url_base(url, base)?,
            None => url.to_string(),
        };
        let local_path = target_dir.join(url_basename(&url));
        self.record(format!("would fetch {url} to {}", local_path.display()));
        Ok(local_path)
    }

    async fn unpack_archive(
        &self,
        archive: &Path,
        target_dir: &Path,
    ) -> crate::error::Result<()> {
        self.record(format!(
            "would unpack plugin {} into {}",
            archive.display(),
            target_dir.display()
        ));
        Ok(())
    }

    async fn read_plugin_config(&self, plugin_dir: &Path) -> crate::error::Result<PluginConfig> {
        self.record(format!(
            "would read config.json from {}",
            plugin_dir.display()
        ));
        // Synthetic paths keep the orchestrator walking.
        Ok(PluginConfig {
            input_directory: "/dry_run/in".to_string(),
            output_directory: "/dry_run/out".to_string(),
        })
    }

    async fn build_image(&self, tag: &str, context_dir: &Path) -> crate::error::Result<()> {
        self.record(format!(
            "would run in {}: {CONTAINER_RUNTIME} build -t {tag} .",
            context_dir.display()
        ));
        Ok(())
    }

    async fn run_container(
        &self,
        tag: &str,
        inputs: &Path,
        outputs: &Path,
        config: &PluginConfig,
    ) -> crate::error::Result<()> {
        self.record(format!(
            "would run: {CONTAINER_RUNTIME} run --rm -v {}:{} -v {}:{} {tag}",
            inputs.display(),
            config.input_directory,
            outputs.display(),
            config.output_directory,
        ));
        Ok(())
    }

    async fn finalize_output(
        &self,
        outputs_dir: &Path,
        persistent_dir: &Path,
        base_name: &str,
    ) -> crate::error::Result<PathBuf> {
        let final_dir = persistent_dir.join(base_name);
        self.record(format!(
            "would move {} to {}",
            outputs_dir.display(),
            final_dir.display()
        ));
        Ok(final_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn operations_are_recorded_in_order() {
        let backend = DryRunBackend::new();
        backend.setup_workspace(Path::new("/w")).await.unwrap();
        backend
            .fetch_file("http://repo/plugin.zip", Path::new("/w/artifact_cache"), None)
            .await
            .unwrap();
        backend
            .build_image("plugin-sample", Path::new("/w/step/plugin"))
            .await
            .unwrap();

        let plan = backend.plan();
        assert_eq!(plan.len(), 3);
        assert!(plan[0].starts_with("would set up main workspace"));
        assert!(plan[1].contains("plugin.zip"));
        assert!(plan[2].contains("docker build -t plugin-sample"));
    }

    #[tokio::test]
    async fn fetch_applies_url_rewriting() {
        let backend = DryRunBackend::new();
        let base = Url::parse("http://mirror:9000").unwrap();
        let path = backend
            .fetch_file("http://repo/objects/d.zip", Path::new("/cache"), Some(&base))
            .await
            .unwrap();

        assert_eq!(path, PathBuf::from("/cache/d.zip"));
        assert!(backend.plan()[0].contains("http://mirror:9000/objects/d.zip"));
    }

    #[tokio::test]
    async fn synthetic_paths_match_the_live_layout() {
        let backend = DryRunBackend::new();
        let ws = backend
            .prepare_step_workspace(Path::new("/w"), "My Step", "http://ex/step#s1")
            .await
            .unwrap();
        assert_eq!(ws.inputs, PathBuf::from("/w/My_Step_s1/inputs"));

        let final_dir = backend
            .finalize_output(&ws.outputs, Path::new("/w/results"), "Out")
            .await
            .unwrap();
        assert_eq!(final_dir, PathBuf::from("/w/results/Out"));
    }
}
