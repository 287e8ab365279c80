use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::types::CloneUrl;

/// Neutral view of a PR/MR, independent of the hosting provider (§3).
///
/// Created by Webhook Intake once a provider payload has been parsed,
/// immutable thereafter, and dropped when its pipeline run completes — no
/// value outlives a single `Process(pr)` invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    /// Provider-scoped identifier, e.g. `"github:acme/widgets#42"`.
    pub provider_id: String,
    pub check_id: u64,
    pub owner: String,
    pub name: String,
    pub clone_url: CloneUrl,
    pub head_ref: String,
    pub head_sha: String,
    pub base_ref: String,
    pub default_branch: String,
    pub author: String,
    pub labels: BTreeSet<String>,
}

impl PullRequest {
    /// `(cloneUrl, ref)` key this PR's base checkout should be fetched
    /// under, per §4.1.
    pub fn base_repo_key(&self) -> (CloneUrl, String) {
        (self.clone_url.clone(), self.base_ref.clone())
    }

    /// Returns the value of the `kubechecks:<value>` label, if the PR
    /// carries exactly one such label. Multiple `kubechecks:*` labels are
    /// unusual but not this method's concern; the label filter in
    /// `kubechecks-vcs` decides how to treat that.
    pub fn kubechecks_label_values(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().filter_map(|l| l.strip_prefix("kubechecks:"))
    }

    /// Human-readable `owner/name#check_id` used in log lines and comment
    /// headers.
    pub fn display_name(&self) -> String {
        format!("{}/{}#{}", self.owner, self.name, self.check_id)
    }
}
