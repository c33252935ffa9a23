//! Side-effecting execution operations and the orchestrator that drives
//! them.
//!
//! All filesystem, network, and container work goes through [`StepBackend`].
//! [`LiveBackend`] performs the operations; [`DryRunBackend`] records what
//! would be done and returns the paths the live backend would produce, so a
//! dry run walks the identical plan.

pub mod archive;
pub mod dry_run;
pub mod live;
pub mod orchestrator;

use std::path::{Path, PathBuf};

use serde::Deserialize;
use url::Url;

pub use dry_run::DryRunBackend;
pub use live::LiveBackend;
pub use orchestrator::Orchestrator;

use crate::iri::{sanitize_label, uuid_from_iri};

/// The container runtime CLI the backends shell out to.
pub const CONTAINER_RUNTIME: &str = "docker";

/// Scratch directories for one step.
#[derive(Debug, Clone)]
pub struct StepWorkspace {
    pub inputs: PathBuf,
    pub outputs: PathBuf,
    pub plugin: PathBuf,
}

/// `config.json` at a plugin archive's root. Paths are absolute inside the
/// container; extra fields are plugin-private and ignored here.
#[derive(Debug, Clone, Deserialize)]
pub struct PluginConfig {
    pub input_directory: String,
    pub output_directory: String,
}

/// Step scratch directory under the workspace root. The step UUID keeps
/// steps with the same label apart.
pub fn step_dir(root: &Path, step_label: &str, step_iri: &str) -> PathBuf {
    root.join(format!(
        "{}_{}",
        sanitize_label(step_label),
        uuid_from_iri(step_iri)
    ))
}

pub(crate) fn step_workspace_paths(root: &Path, step_label: &str, step_iri: &str) -> StepWorkspace {
    let dir = step_dir(root, step_label, step_iri);
    StepWorkspace {
        inputs: dir.join("inputs"),
        outputs: dir.join("outputs"),
        plugin: dir.join("plugin"),
    }
}

/// All actions with side effects, in the order the orchestrator drives them.
#[async_trait::async_trait]
pub trait StepBackend: std::fmt::Debug {
    /// Create a fresh workspace root, removing any previous run's tree.
    async fn setup_workspace(&self, root: &Path) -> crate::error::Result<()>;

    /// Create `inputs/`, `outputs/`, and `plugin/` for one step.
    async fn prepare_step_workspace(
        &self,
        root: &Path,
        step_label: &str,
        step_iri: &str,
    ) -> crate::error::Result<StepWorkspace>;

    /// Recursively copy a staged result into a step's inputs. A missing
    /// source is a no-op.
    async fn stage_input(&self, source: &Path, target: &Path) -> crate::error::Result<()>;

    /// Download `url` into `target_dir`, named after the URL basename. When
    /// `artifact_base` is set, the URL's scheme+authority are rewritten to
    /// it first.
    async fn fetch_file(
        &self,
        url: &str,
        target_dir: &Path,
        artifact_base: Option<&Url>,
    ) -> crate::error::Result<PathBuf>;

    /// Unpack a plugin archive, detecting the format from its content.
    async fn unpack_archive(&self, archive: &Path, target_dir: &Path)
        -> crate::error::Result<()>;

    /// Read and parse `config.json` from an unpacked plugin.
    async fn read_plugin_config(&self, plugin_dir: &Path) -> crate::error::Result<PluginConfig>;

    /// Build the plugin's container image from its build context.
    async fn build_image(&self, tag: &str, context_dir: &Path) -> crate::error::Result<()>;

    /// Run the plugin container with inputs/outputs bind-mounted where its
    /// config expects them.
    async fn run_container(
        &self,
        tag: &str,
        inputs: &Path,
        outputs: &Path,
        config: &PluginConfig,
    ) -> crate::error::Result<()>;

    /// Move a completed step's outputs into the persistent results area and
    /// return the new location.
    async fn finalize_output(
        &self,
        outputs_dir: &Path,
        persistent_dir: &Path,
        base_name: &str,
    ) -> crate::error::Result<PathBuf>;
}
