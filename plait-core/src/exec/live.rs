//! The live backend: real filesystem staging, HTTP downloads, and container
//! builds/runs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};
use url::Url;

use crate::error::ExecError;
use crate::exec::{archive, PluginConfig, StepBackend, StepWorkspace, CONTAINER_RUNTIME};
use crate::iri::{rewrite_url_base, url_basename};

/// Artifact download timeout.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct LiveBackend {
    client: Client,
}

impl LiveBackend {
    pub fn new() -> Self {
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
        Self {
            client: Client::builder()
                .timeout(DOWNLOAD_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }
}

impl Default for LiveBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl StepBackend for LiveBackend {
    async fn setup_workspace(&self, root: &Path) -> crate::error::Result<()> {
        if tokio::fs::try_exists(root).await.map_err(ExecError::Io)? {
            tokio::fs::remove_dir_all(root).await.map_err(ExecError::Io)?;
        }
        tokio::fs::create_dir_all(root).await.map_err(ExecError::Io)?;
        info!(workspace = %root.display(), "Main workspace created");
        Ok(())
    }

    async fn prepare_step_workspace(
        &self,
        root: &Path,
        step_label: &str,
        step_iri: &str,
    ) -> crate::error::Result<StepWorkspace> {
        let ws = super::step_workspace_paths(root, step_label, step_iri);
        for dir in [&ws.inputs, &ws.outputs, &ws.plugin] {
            tokio::fs::create_dir_all(dir).await.map_err(ExecError::Io)?;
        }
        Ok(ws)
    }

    async fn stage_input(&self, source: &Path, target: &Path) -> crate::error::Result<()> {
        if !tokio::fs::try_exists(source).await.map_err(ExecError::Io)? {
            debug!(source = %source.display(), "Stage source missing; skipping");
            return Ok(());
        }
        copy_tree(source, target).map_err(ExecError::Io)?;
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

        tokio::fs::create_dir_all(target_dir)
            .await
            .map_err(ExecError::Io)?;
        let local_path = target_dir.join(url_basename(&url));
        info!(url = %url, path = %local_path.display(), "Downloading file");

        let fetch_err = |message: String| ExecError::ArtifactFetch {
            url: url.clone(),
            message,
        };

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(fetch_err(format!("HTTP {status}")).into());
        }

        // Stream to disk in chunks; artifacts are never buffered whole.
        let mut response = response;
        let mut file = tokio::fs::File::create(&local_path)
            .await
            .map_err(ExecError::Io)?;
        while let Some(chunk) = response.chunk().await.map_err(|e| fetch_err(e.to_string()))? {
            file.write_all(&chunk).await.map_err(ExecError::Io)?;
        }
        file.flush().await.map_err(ExecError::Io)?;

        Ok(local_path)
    }

    async fn unpack_archive(
        &self,
        archive: &Path,
        target_dir: &Path,
    ) -> crate::error::Result<()> {
        archive::detect_and_unpack(archive, target_dir)?;
        Ok(())
    }

    async fn read_plugin_config(&self, plugin_dir: &Path) -> crate::error::Result<PluginConfig> {
        let path = plugin_dir.join("config.json");
        let bytes = tokio::fs::read(&path).await.map_err(ExecError::Io)?;
        let config = serde_json::from_slice(&bytes).map_err(|e| ExecError::PluginConfig {
            path,
            message: e.to_string(),
        })?;
        Ok(config)
    }

    async fn build_image(&self, tag: &str, context_dir: &Path) -> crate::error::Result<()> {
        info!(tag = %tag, context = %context_dir.display(), "Building container image");
        let output = Command::new(CONTAINER_RUNTIME)
            .args(["build", "-t", tag, "."])
            .current_dir(context_dir)
            .output()
            .await
            .map_err(ExecError::Io)?;

        if !output.status.success() {
            return Err(ExecError::ContainerBuild {
                tag: tag.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }
            .into());
        }
        Ok(())
    }

    async fn run_container(
        &self,
        tag: &str,
        inputs: &Path,
        outputs: &Path,
        config: &PluginConfig,
    ) -> crate::error::Result<()> {
        let inputs = std::fs::canonicalize(inputs).map_err(ExecError::Io)?;
        let outputs = std::fs::canonicalize(outputs).map_err(ExecError::Io)?;
        info!(tag = %tag, "Running container");

        let output = Command::new(CONTAINER_RUNTIME)
            .args([
                "run",
                "--rm",
                "-v",
                &format!("{}:{}", inputs.display(), config.input_directory),
                "-v",
                &format!("{}:{}", outputs.display(), config.output_directory),
                tag,
            ])
            .output()
            .await
            .map_err(ExecError::Io)?;

        if !output.status.success() {
            let code = output.status.code();
            debug!(tag = %tag, exit_code = ?code, "Container exited with failure");
            return Err(ExecError::ContainerRun {
                tag: tag.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }
            .into());
        }
        Ok(())
    }

    async fn finalize_output(
        &self,
        outputs_dir: &Path,
        persistent_dir: &Path,
        base_name: &str,
    ) -> crate::error::Result<PathBuf> {
        tokio::fs::create_dir_all(persistent_dir)
            .await
            .map_err(ExecError::Io)?;
        let final_dir = persistent_dir.join(base_name);
        tokio::fs::rename(outputs_dir, &final_dir)
            .await
            .map_err(ExecError::Io)?;
        Ok(final_dir)
    }
}

/// Recursive directory copy; creates missing target directories.
fn copy_tree(source: &Path, target: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(target)?;
    for entry in std::fs::read_dir(source)? {
        let entry = entry?;
        let dest = target.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_tree(&entry.path(), &dest)?;
        } else {
            std::fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}
