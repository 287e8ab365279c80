//! Error types for the check-pipeline core.
//!
//! Errors are categorized into:
//!
//! - **External errors**: wrapped errors from dependencies (git2, serde_yaml, serde_json, io)
//! - **Domain errors**: pipeline-specific failure modes named in the error-handling design
//! - **Not-found errors**: entity lookups against the application index

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Git repository error from clone/fetch/checkout/merge.
    #[error("git error: {0}")]
    Git2(#[from] git2::Error),

    /// YAML parse error (project config, appset templates).
    #[error("yaml error: {0}")]
    SerdeYaml(#[from] serde_yaml::Error),

    /// JSON parse error (rendered manifests, debug index dump).
    #[error("json error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// `MergeInto` produced a conflict. Surfaced by the pipeline as a
    /// per-PR Warning result, never as a fatal error (§7).
    #[error("merge conflict between {head_ref} and {base_ref}")]
    MergeConflict { head_ref: String, base_ref: String },

    /// Clone URL could not be parsed/canonicalized.
    #[error("invalid clone url: {0}")]
    InvalidCloneUrl(String),

    /// A ref could not be resolved to a commit (e.g. unknown branch).
    #[error("unresolvable ref {r#ref} for {clone_url}")]
    UnresolvableRef { clone_url: String, r#ref: String },

    /// `.kubechecks.yaml`/`.yml` failed schema validation. Per §7, this
    /// aborts the whole pipeline run with an Error commit status.
    #[error("invalid project config: {0}")]
    InvalidProjectConfig(String),

    /// An appset generator composition exceeded the one-level Matrix/Merge
    /// nesting invariant (§3).
    #[error("appset {name} nests generators more than one level deep")]
    GeneratorNestingTooDeep { name: String },

    /// Application not found by name in the index.
    #[error("application not found: {0}")]
    ApplicationNotFound(String),

    /// ApplicationSet not found by name in the index.
    #[error("applicationset not found: {0}")]
    ApplicationSetNotFound(String),

    /// A repo's bounded PR queue had no room left (§5). The pipeline turns
    /// this into the replan-comment overflow behaviour rather than dropping
    /// the PR silently.
    #[error("queue for repo {repo_url} is full")]
    RepoQueueFull { repo_url: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn merge_conflict(head_ref: impl Into<String>, base_ref: impl Into<String>) -> Self {
        Error::MergeConflict {
            head_ref: head_ref.into(),
            base_ref: base_ref.into(),
        }
    }

    /// True for errors the error-handling design marks as per-app/per-PR
    /// results rather than aborts (merge conflicts, unresolvable refs).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::MergeConflict { .. } | Error::UnresolvableRef { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
