//! Errors from invoking and parsing output from the external check tools.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{tool} exited with status {status}: {stderr}")]
    ToolFailed { tool: &'static str, status: String, stderr: String },

    #[error("launching {tool}: {source}")]
    Spawn { tool: &'static str, #[source] source: std::io::Error },

    #[error("parsing {tool} output: {source}")]
    Parse { tool: &'static str, #[source] source: serde_json::Error },

    #[error("converting manifests to yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("writing manifest scratch file: {0}")]
    Io(#[from] std::io::Error),

    #[error("kubernetes api error: {0}")]
    Kube(#[from] kube::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
