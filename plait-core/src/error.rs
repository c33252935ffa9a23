/// Top-level Plait error type.
#[derive(thiserror::Error, Debug)]
pub enum PlaitError {
    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Execution error: {0}")]
    Exec(#[from] ExecError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Failures talking to the metadata store. During graph building these are
/// per-pipeline warnings; anywhere else they are fatal.
#[derive(thiserror::Error, Debug)]
pub enum MetadataError {
    #[error("Failed to fetch pipeline {uuid}: {source}")]
    Fetch {
        uuid: String,
        source: reqwest::Error,
    },

    #[error("Metadata store returned HTTP {status} for pipeline {uuid}")]
    Status { uuid: String, status: u16 },
}

#[derive(thiserror::Error, Debug)]
pub enum GraphError {
    #[error("Failed to parse Turtle for pipeline {uuid}: {message}")]
    Parse { uuid: String, message: String },

    #[error("Semantic query failed: {0}")]
    Query(String),

    #[error("Combined graph is empty; check the starting UUID and endpoint")]
    Empty,

    #[error("Execution graph contains a cycle through {0}")]
    Cycle(String),

    #[error("Graph normalization failed: {0}")]
    Normalization(String),
}

#[derive(thiserror::Error, Debug)]
pub enum ExecError {
    #[error("No result recorded for input variable '{variable}'")]
    MissingInput { variable: String },

    #[error("Node '{node}' has no access URL to fetch from")]
    MissingAccessUrl { node: String },

    #[error("Step '{step}' has no {what} in the graph")]
    MalformedStep { step: String, what: &'static str },

    #[error("Failed to download {url}: {message}")]
    ArtifactFetch { url: String, message: String },

    #[error("{path} is not a recognized archive format")]
    UnsupportedArchive { path: std::path::PathBuf },

    #[error("Failed to unpack archive {path}: {message}")]
    Unpack {
        path: std::path::PathBuf,
        message: String,
    },

    #[error("Invalid plugin config at {path}: {message}")]
    PluginConfig {
        path: std::path::PathBuf,
        message: String,
    },

    #[error("Container image build '{tag}' failed: {stderr}")]
    ContainerBuild { tag: String, stderr: String },

    #[error("Container run '{tag}' failed: {stderr}")]
    ContainerRun { tag: String, stderr: String },

    #[error("Container runtime '{runtime}' not found on PATH")]
    RuntimeMissing { runtime: String },

    #[error("Step '{step}' failed: {source}")]
    Step {
        step: String,
        source: Box<PlaitError>,
    },

    #[error("Invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Invalid artifact repository URL '{url}': {message}")]
    InvalidArtifactUrl { url: String, message: String },
}

pub type Result<T> = std::result::Result<T, PlaitError>;
