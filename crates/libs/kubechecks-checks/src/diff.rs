//! Diff check (§4.5 step 2): compares each rendered manifest against its
//! live counterpart in the destination cluster and reports drift. Discovery
//! of the serialized resource on the API server (group/version/kind) and
//! retrieval of the live object are driven through [`kube::discovery`] and
//! [`kube::core::DynamicObject`], the same crate `kubechecks-controller`
//! uses for its CRD adapter.

use async_trait::async_trait;
use kube::api::DynamicObject;
use kube::core::GroupVersionKind;
use kube::discovery::pinned_kind;
use kube::{Api, Client};

use kubechecks_core::model::{CheckResult, State};
use kubechecks_core::pipeline::{Check, CheckRequest};

use crate::error::Result;

/// `None` when no live cluster is configured for this run (e.g. a
/// destination this instance has no credentials for); the check then
/// degrades to reporting the render succeeded without comparing drift.
pub struct DiffCheck {
    client: Option<Client>,
}

impl DiffCheck {
    pub fn new(client: Option<Client>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Check for DiffCheck {
    fn name(&self) -> &str {
        "diff"
    }

    async fn run(&self, request: &CheckRequest) -> anyhow::Result<CheckResult> {
        let Some(client) = &self.client else {
            return Ok(CheckResult::success(self.name(), "rendered manifests (no live cluster configured)"));
        };

        let manifests = match &request.manifests_json {
            serde_json::Value::Array(items) => items.clone(),
            serde_json::Value::Null => Vec::new(),
            other => vec![other.clone()],
        };

        let mut drifted = Vec::new();
        let mut unreachable = Vec::new();

        for manifest in &manifests {
            match diff_one(client, manifest).await {
                Ok(Some(label)) => drifted.push(label),
                Ok(None) => {}
                Err(e) => unreachable.push(format!("{}: {e}", manifest_label(manifest))),
            }
        }

        Ok(summarize(self.name(), &drifted, &unreachable))
    }
}

/// Splits a manifest's `apiVersion` into `(group, version)`; the core `v1`
/// group has no `/` separator and an empty group string.
fn split_api_version(api_version: &str) -> (&str, &str) {
    match api_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", api_version),
    }
}

fn manifest_label(manifest: &serde_json::Value) -> String {
    let kind = manifest.get("kind").and_then(|v| v.as_str()).unwrap_or("Unknown");
    let name = manifest
        .get("metadata")
        .and_then(|m| m.get("name"))
        .and_then(|v| v.as_str())
        .unwrap_or("unnamed");
    format!("{kind}/{name}")
}

async fn diff_one(client: &Client, manifest: &serde_json::Value) -> Result<Option<String>> {
    let api_version = manifest.get("apiVersion").and_then(|v| v.as_str()).unwrap_or_default();
    let kind = manifest.get("kind").and_then(|v| v.as_str()).unwrap_or_default();
    let name = manifest
        .get("metadata")
        .and_then(|m| m.get("name"))
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    let namespace = manifest.get("metadata").and_then(|m| m.get("namespace")).and_then(|v| v.as_str());

    if kind.is_empty() || name.is_empty() {
        return Ok(None);
    }

    let (group, version) = split_api_version(api_version);
    let gvk = GroupVersionKind::gvk(group, version, kind);

    let (api_resource, _caps) = pinned_kind(client, &gvk).await?;
    let api: Api<DynamicObject> = match namespace {
        Some(ns) => Api::namespaced_with(client.clone(), ns, &api_resource),
        None => Api::all_with(client.clone(), &api_resource),
    };

    let live = match api.get_opt(name).await? {
        Some(live) => live,
        None => return Ok(Some(format!("{} (not yet applied)", manifest_label(manifest)))),
    };

    let desired_norm = normalize_for_diff(manifest);
    let live_norm = normalize_for_diff(&serde_json::to_value(&live).unwrap_or(serde_json::Value::Null));

    if desired_norm == live_norm {
        Ok(None)
    } else {
        Ok(Some(manifest_label(manifest)))
    }
}

/// Strips fields the API server mutates on every read (resourceVersion,
/// uid, generation, managedFields, status) so a diff reflects actual
/// desired-vs-live drift rather than server bookkeeping noise.
fn normalize_for_diff(value: &serde_json::Value) -> serde_json::Value {
    let mut value = value.clone();
    if let Some(metadata) = value.get_mut("metadata").and_then(|m| m.as_object_mut()) {
        for field in ["resourceVersion", "uid", "generation", "managedFields", "creationTimestamp", "selfLink"] {
            metadata.remove(field);
        }
    }
    if let Some(object) = value.as_object_mut() {
        object.remove("status");
    }
    value
}

fn summarize(check_name: &str, drifted: &[String], unreachable: &[String]) -> CheckResult {
    if !drifted.is_empty() {
        CheckResult::new(check_name, State::Warning, format!("{} resource(s) drifted from live state", drifted.len()))
            .with_details(drifted.join("\n"))
    } else if !unreachable.is_empty() {
        CheckResult::new(check_name, State::Error, format!("{} resource(s) could not be compared", unreachable.len()))
            .with_details(unreachable.join("\n"))
    } else {
        CheckResult::success(check_name, "no drift from live cluster state")
    }
}
