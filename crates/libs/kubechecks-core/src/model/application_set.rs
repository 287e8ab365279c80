use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single generator inside an [`ApplicationSet`] (§3, §4.3). `Matrix` and
/// `Merge` compose exactly two base generators, enforced one level deep by
/// [`crate::error::Error::GeneratorNestingTooDeep`] at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Generator {
    /// Inline list of parameter maps, one application per entry.
    List { elements: Vec<BTreeMap<String, String>> },
    /// Filtered by label selector over the live cluster view.
    Clusters {
        #[serde(default)]
        selector: BTreeMap<String, String>,
    },
    /// Compose two base generators, cross-producting their parameter sets.
    Matrix { generators: Vec<Generator> },
    /// Compose two base generators, overlaying matching keys.
    Merge { generators: Vec<Generator> },
    /// Recognized but not implemented: Git directory/file generators,
    /// Pull Request generators, SCM provider generators. Per §4.3 these
    /// produce zero applications and a non-fatal warning rather than an
    /// error.
    Unsupported { kind: String },
}

impl Generator {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Generator::List { .. } => "List",
            Generator::Clusters { .. } => "Clusters",
            Generator::Matrix { .. } => "Matrix",
            Generator::Merge { .. } => "Merge",
            Generator::Unsupported { .. } => "Unsupported",
        }
    }
}

/// Template that yields zero or more [`crate::model::Application`]s when
/// combined with its generators (§3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationSet {
    pub name: String,
    pub project: String,
    pub source_repo_url: crate::types::CloneUrl,
    /// Raw template body (name/path/value-file strings with `{{ param }}`
    /// placeholders); rendered per-application by [`crate::appset::template`].
    pub template: ApplicationTemplate,
    pub generators: Vec<Generator>,
    /// Selects the templating flavor carried by the appset: `true` uses
    /// Go-template-style `{{ .key }}` placeholders, `false` uses plain
    /// `{{key}}` substitution (§4.3).
    #[serde(default)]
    pub go_template_mode: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationTemplate {
    pub name_pattern: String,
    pub path_pattern: String,
    pub target_revision_pattern: String,
    pub destination_cluster_pattern: String,
}
