//! Kube-backed adapter for the [`DeliveryControllerClient`] port (§6). One
//! concrete implementation, since a contract needs at least one adapter to
//! be exercised end to end (§1, SPEC_FULL §0.1).
//!
//! `get_applications`/`get_application_sets`/`get_application_by_name`/
//! `get_applications_by_appset` list the controller's CRDs through the
//! Kubernetes API. `get_manifests` renders locally by reading the YAML
//! files under each already-cloned source path rather than delegating to
//! the controller's own render API — §9's open question (c) leaves
//! server-side vs. local rendering to a config flag without a preference,
//! and a local render needs nothing beyond the working copy the pipeline
//! already resolved.

use std::path::Path;

use async_trait::async_trait;
use kube::api::{Api, ListParams};
use kube::Client;
use serde::Deserialize as _;

use kubechecks_core::error::Result as CoreResult;
use kubechecks_core::model::{Application, ApplicationSet};
use kubechecks_core::pipeline::DeliveryControllerClient;

use crate::convert::{application_from_crd, application_set_from_crd};
use crate::crd;
use crate::error::Error;

pub struct KubeControllerClient {
    client: Client,
    namespace: Option<String>,
}

impl KubeControllerClient {
    pub fn new(client: Client) -> Self {
        Self { client, namespace: None }
    }

    /// Restricts CRD listing to a single namespace. Without this the
    /// adapter lists cluster-wide, matching a controller run with
    /// cluster-scoped RBAC.
    pub fn namespaced(client: Client, namespace: impl Into<String>) -> Self {
        Self { client, namespace: Some(namespace.into()) }
    }

    fn applications_api(&self) -> Api<crd::Application> {
        match &self.namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }

    fn application_sets_api(&self) -> Api<crd::ApplicationSet> {
        match &self.namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }
}

#[async_trait]
impl DeliveryControllerClient for KubeControllerClient {
    async fn get_applications(&self) -> CoreResult<Vec<Application>> {
        let list = self.applications_api().list(&ListParams::default()).await.map_err(Error::Kube)?;
        list.items
            .iter()
            .map(|item| application_from_crd(item).map_err(Into::into))
            .collect()
    }

    async fn get_application_sets(&self) -> CoreResult<Vec<ApplicationSet>> {
        let list = self.application_sets_api().list(&ListParams::default()).await.map_err(Error::Kube)?;
        list.items
            .iter()
            .map(|item| application_set_from_crd(item).map_err(Into::into))
            .collect()
    }

    async fn get_application_by_name(&self, name: &str) -> CoreResult<Option<Application>> {
        match self.applications_api().get_opt(name).await.map_err(Error::Kube)? {
            Some(item) => Ok(Some(application_from_crd(&item)?)),
            None => Ok(None),
        }
    }

    async fn get_applications_by_appset(&self, name: &str) -> CoreResult<Vec<Application>> {
        let owner_label = format!("argocd.argoproj.io/application-set-name={name}");
        let params = ListParams::default().labels(&owner_label);
        let list = self.applications_api().list(&params).await.map_err(Error::Kube)?;
        list.items
            .iter()
            .map(|item| application_from_crd(item).map_err(Into::into))
            .collect()
    }

    async fn get_manifests(&self, app: &Application, source_paths: &[&Path]) -> CoreResult<serde_json::Value> {
        let mut manifests = Vec::new();
        for source_path in source_paths {
            for entry in read_yaml_documents(source_path).map_err(Error::from)? {
                manifests.push(entry);
            }
        }
        tracing::debug!(app = %app.name, count = manifests.len(), "rendered manifests locally");
        Ok(serde_json::Value::Array(manifests))
    }

    async fn get_kubernetes_version_by_application(&self, _app: &Application) -> CoreResult<String> {
        let version_info = self.client.apiserver_version().await.map_err(Error::Kube)?;
        Ok(format!("{}.{}", version_info.major, version_info.minor))
    }
}

/// Reads every `*.yaml`/`*.yml` file directly under `dir` (non-recursive;
/// nested directories are a kustomize base/overlay's job to have already
/// flattened) and parses each as one or more YAML documents, converting to
/// JSON.
fn read_yaml_documents(dir: &Path) -> crate::error::Result<Vec<serde_json::Value>> {
    let mut out = Vec::new();
    if !dir.is_dir() {
        return Ok(out);
    }
    let mut entries: Vec<_> = std::fs::read_dir(dir)
        .map_err(|source| Error::ReadManifest { path: dir.to_path_buf(), source })?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| matches!(p.extension().and_then(|e| e.to_str()), Some("yaml") | Some("yml")))
        .collect();
    entries.sort();

    for path in entries {
        let content =
            std::fs::read_to_string(&path).map_err(|source| Error::ReadManifest { path: path.clone(), source })?;
        for doc in serde_yaml::Deserializer::from_str(&content) {
            let value = serde_yaml::Value::deserialize(doc)?;
            if value.is_null() {
                continue;
            }
            out.push(serde_json::to_value(value)?);
        }
    }
    Ok(out)
}
