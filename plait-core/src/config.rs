use std::path::PathBuf;

use url::Url;

use crate::error::ConfigError;

/// Metadata store base URL used when neither flag nor environment sets one.
pub const DEFAULT_METADATA_BASE: &str = "http://localhost:8083/api/v1/pipelines";

/// Workspace root used when neither flag nor environment sets one.
pub const DEFAULT_WORKSPACE: &str = "./tmp/executor_workspace";

/// Immutable run configuration, resolved once at startup.
///
/// Sources, in increasing precedence: built-in defaults, the environment
/// (`PIPELINE_ENDPOINT`, `ARTIFACT_REPOSITORY_URL`, `MAIN_WORKSPACE`), then
/// CLI flags via the `with_*` overrides.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the metadata store; pipeline Turtle is fetched from
    /// `{metadata_base}/{uuid}`.
    pub metadata_base: String,
    /// When set, the scheme+authority of every observed access URL is
    /// rewritten to this base before downloading.
    pub artifact_base: Option<Url>,
    /// Workspace root owned exclusively by one run.
    pub workspace: PathBuf,
}

impl Config {
    /// Resolve configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let metadata_base = std::env::var("PIPELINE_ENDPOINT")
            .unwrap_or_else(|_| DEFAULT_METADATA_BASE.to_string());

        let artifact_base = match std::env::var("ARTIFACT_REPOSITORY_URL") {
            Ok(raw) if !raw.is_empty() => Some(parse_artifact_base(&raw)?),
            _ => None,
        };

        let workspace = std::env::var("MAIN_WORKSPACE")
            .map_or_else(|_| PathBuf::from(DEFAULT_WORKSPACE), PathBuf::from);

        Ok(Self {
            metadata_base,
            artifact_base,
            workspace,
        })
    }

    /// Override the metadata base URL (CLI flag wins over environment).
    pub fn with_metadata_base(mut self, base: Option<String>) -> Self {
        if let Some(base) = base {
            self.metadata_base = base;
        }
        self
    }

    /// Override the artifact repository base URL.
    pub fn with_artifact_base(mut self, base: Option<String>) -> Result<Self, ConfigError> {
        if let Some(raw) = base {
            self.artifact_base = Some(parse_artifact_base(&raw)?);
        }
        Ok(self)
    }
}

fn parse_artifact_base(raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::InvalidArtifactUrl {
        url: raw.to_string(),
        message: e.to_string(),
    })
}
