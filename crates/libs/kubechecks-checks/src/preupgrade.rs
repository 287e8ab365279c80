//! Pre-upgrade check (`enableKubePug`, §6): flags deprecated and removed
//! Kubernetes APIs in the rendered manifests against the target cluster's
//! resolved version, via `kubepug`.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

use kubechecks_core::model::{CheckResult, State};
use kubechecks_core::pipeline::{Check, CheckRequest};

use crate::error::{Error, Result};
use crate::manifests::to_yaml_stream;

const TOOL: &str = "kubepug";

pub struct KubepugCheck {
    binary: String,
}

impl Default for KubepugCheck {
    fn default() -> Self {
        Self { binary: TOOL.to_string() }
    }
}

#[async_trait]
impl Check for KubepugCheck {
    fn name(&self) -> &str {
        "pre-upgrade"
    }

    async fn run(&self, request: &CheckRequest) -> anyhow::Result<CheckResult> {
        let yaml = to_yaml_stream(&request.manifests_json)?;
        if yaml.is_empty() {
            return Ok(CheckResult::success(self.name(), "no manifests to check"));
        }

        let scratch = tempfile::NamedTempFile::new().map_err(Error::Io)?;
        tokio::fs::write(scratch.path(), yaml.as_bytes()).await.map_err(Error::Io)?;

        let report =
            run_kubepug(&self.binary, scratch.path(), &request.kubernetes_version).await?;
        Ok(summarize(self.name(), &report))
    }
}

#[derive(Debug, Default, serde::Deserialize)]
struct KubepugItem {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Kind")]
    kind: String,
}

#[derive(Debug, Default, serde::Deserialize)]
struct KubepugReport {
    #[serde(rename = "DeprecatedAPIs", default)]
    deprecated: Vec<KubepugItem>,
    #[serde(rename = "DeletedAPIs", default)]
    deleted: Vec<KubepugItem>,
}

async fn run_kubepug(binary: &str, manifest_path: &std::path::Path, k8s_version: &str) -> Result<KubepugReport> {
    let output = Command::new(binary)
        .args(["--input-file", &manifest_path.to_string_lossy()])
        .args(["--k8s-version", k8s_version])
        .args(["--format", "json"])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|source| Error::Spawn { tool: TOOL, source })?;

    if !output.status.success() && output.stdout.is_empty() {
        return Err(Error::ToolFailed {
            tool: TOOL,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    serde_json::from_slice(&output.stdout).map_err(|source| Error::Parse { tool: TOOL, source })
}

fn summarize(check_name: &str, report: &KubepugReport) -> CheckResult {
    if !report.deleted.is_empty() {
        let names: Vec<String> = report.deleted.iter().map(|i| format!("{} {}", i.kind, i.name)).collect();
        CheckResult::new(check_name, State::Failure, format!("{} removed API(s) in use", names.len()))
            .with_details(names.join("\n"))
    } else if !report.deprecated.is_empty() {
        let names: Vec<String> = report.deprecated.iter().map(|i| format!("{} {}", i.kind, i.name)).collect();
        CheckResult::new(check_name, State::Warning, format!("{} deprecated API(s) in use", names.len()))
            .with_details(names.join("\n"))
    } else {
        CheckResult::success(check_name, "no deprecated or removed APIs in use")
    }
}
