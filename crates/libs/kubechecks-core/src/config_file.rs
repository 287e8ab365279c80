//! Repository project config (§6): optional `.kubechecks.yaml`/`.yml` at
//! the repo root, read by the Config Matcher as an alternative to the live
//! Application Index.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigApplication {
    pub name: String,
    pub cluster: String,
    pub path: String,
    #[serde(default)]
    pub additional_paths: Vec<String>,
    #[serde(default = "default_true")]
    pub enable_conf_test: bool,
    #[serde(default = "default_true")]
    pub enable_kube_conform: bool,
    #[serde(default = "default_true")]
    pub enable_kube_pug: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigApplicationSet {
    pub name: String,
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub applications: Vec<ConfigApplication>,
    #[serde(default, rename = "applicationSets")]
    pub application_sets: Vec<ConfigApplicationSet>,
}

pub const CONFIG_FILE_NAMES: &[&str] = &[".kubechecks.yaml", ".kubechecks.yml"];

impl ProjectConfig {
    /// Looks for a project config file at the repo root and parses it if
    /// present. Returns `Ok(None)` when neither filename exists — absence
    /// is not an error, it just means the Config Matcher has nothing to
    /// contribute (§4.4).
    pub fn load(repo_root: &Path) -> Result<Option<Self>> {
        for name in CONFIG_FILE_NAMES {
            let path = repo_root.join(name);
            if path.exists() {
                let content = std::fs::read_to_string(&path)?;
                let config: ProjectConfig = serde_yaml::from_str(&content)?;
                config.validate()?;
                return Ok(Some(config));
            }
        }
        Ok(None)
    }

    /// Per §6: non-empty name/cluster/path for each app; non-empty name
    /// and at least one path for each appset. A parse failure here aborts
    /// the whole pipeline run with an Error status (§7) — this function
    /// only covers the "parsed but structurally invalid" half of that.
    pub fn validate(&self) -> Result<()> {
        for app in &self.applications {
            if app.name.trim().is_empty() || app.cluster.trim().is_empty() || app.path.trim().is_empty() {
                return Err(Error::InvalidProjectConfig(format!(
                    "application {:?} is missing name/cluster/path",
                    app.name
                )));
            }
        }
        for appset in &self.application_sets {
            if appset.name.trim().is_empty() || appset.paths.is_empty() {
                return Err(Error::InvalidProjectConfig(format!(
                    "applicationSet {:?} is missing name or paths",
                    appset.name
                )));
            }
        }
        Ok(())
    }
}
