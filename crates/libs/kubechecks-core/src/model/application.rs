use serde::{Deserialize, Serialize};

use crate::types::CloneUrl;

/// One source of an [`Application`]: a repo, a path within it, and the
/// revision to render at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationSource {
    pub repo_url: CloneUrl,
    pub path: String,
    pub target_revision: String,
    /// Helm value files, resolved relative to `path` (§4.2).
    #[serde(default)]
    pub helm_value_files: Vec<String>,
    /// Helm `--set-file`-style file parameters, resolved relative to `path`.
    #[serde(default)]
    pub helm_file_parameters: Vec<String>,
}

/// A declarative unit the delivery controller renders and applies (§3).
///
/// Read-only from the pipeline's perspective; the only writer is the
/// cluster watcher that feeds the Application Index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub name: String,
    pub project: String,
    pub destination_cluster: String,
    pub primary_source: ApplicationSource,
    #[serde(default)]
    pub additional_sources: Vec<ApplicationSource>,
}

impl Application {
    pub fn sources(&self) -> impl Iterator<Item = &ApplicationSource> {
        std::iter::once(&self.primary_source).chain(self.additional_sources.iter())
    }

    /// Structural equality used by the pipeline's `appsSeen` dedup (§4.5):
    /// two applications are "the same enqueue" iff their full spec matches,
    /// not just their name.
    pub fn structurally_equal(&self, other: &Application) -> bool {
        self == other
    }
}
