//! Errors from talking to the delivery controller: the Kubernetes API
//! client, CRD conversion, and local manifest rendering.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("kubernetes api error: {0}")]
    Kube(#[from] kube::Error),

    #[error("application {0:?} has no source")]
    NoSource(String),

    #[error("reading manifest file {path}: {source}")]
    ReadManifest {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing manifest yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("converting manifest to json: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for kubechecks_core::Error {
    fn from(err: Error) -> Self {
        kubechecks_core::Error::Other(anyhow::anyhow!(err))
    }
}
