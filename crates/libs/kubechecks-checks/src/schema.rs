//! Schema validation check (`enableKubeConform`, §6 repository project
//! config): runs `kubeconform` over the rendered manifests and maps its
//! summary into a [`CheckResult`].

use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use kubechecks_core::model::{CheckResult, State};
use kubechecks_core::pipeline::{Check, CheckRequest};

use crate::error::{Error, Result};
use crate::manifests::to_yaml_stream;

const TOOL: &str = "kubeconform";

pub struct KubeconformCheck {
    binary: String,
    schema_location: Option<String>,
}

impl KubeconformCheck {
    pub fn new(schema_location: Option<String>) -> Self {
        Self { binary: TOOL.to_string(), schema_location }
    }
}

#[async_trait]
impl Check for KubeconformCheck {
    fn name(&self) -> &str {
        "schema"
    }

    async fn run(&self, request: &CheckRequest) -> anyhow::Result<CheckResult> {
        let yaml = to_yaml_stream(&request.manifests_json)?;
        if yaml.is_empty() {
            return Ok(CheckResult::success(self.name(), "no manifests to validate"));
        }

        let summary = run_kubeconform(&self.binary, self.schema_location.as_deref(), &yaml).await?;
        Ok(summarize(self.name(), &summary))
    }
}

#[derive(Debug, serde::Deserialize)]
struct KubeconformSummary {
    valid: u32,
    invalid: u32,
    errors: u32,
    skipped: u32,
}

#[derive(Debug, serde::Deserialize)]
struct KubeconformReport {
    summary: KubeconformSummary,
}

async fn run_kubeconform(binary: &str, schema_location: Option<&str>, yaml: &str) -> Result<KubeconformSummary> {
    let mut command = Command::new(binary);
    command
        .args(["-summary", "-output", "json"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(location) = schema_location {
        command.args(["-schema-location", location]);
    }

    let mut child = command.spawn().map_err(|source| Error::Spawn { tool: TOOL, source })?;
    let mut stdin = child.stdin.take().expect("piped stdin");
    stdin.write_all(yaml.as_bytes()).await.map_err(Error::Io)?;
    drop(stdin);

    let output = child.wait_with_output().await.map_err(|source| Error::Spawn { tool: TOOL, source })?;
    // kubeconform exits non-zero both on invalid resources and on a broken
    // invocation; only the latter leaves stdout empty, so that's the only
    // case treated as `ToolFailed` (mirrors conftest/kubepug below).
    if output.stdout.is_empty() {
        return Err(Error::ToolFailed {
            tool: TOOL,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    let report: KubeconformReport =
        serde_json::from_slice(&output.stdout).map_err(|source| Error::Parse { tool: TOOL, source })?;
    Ok(report.summary)
}

fn summarize(check_name: &str, summary: &KubeconformSummary) -> CheckResult {
    let details = format!(
        "valid={} invalid={} errors={} skipped={}",
        summary.valid, summary.invalid, summary.errors, summary.skipped
    );
    if summary.errors > 0 {
        CheckResult::new(check_name, State::Error, "kubeconform could not validate every resource").with_details(details)
    } else if summary.invalid > 0 {
        CheckResult::new(check_name, State::Failure, "one or more resources fail schema validation").with_details(details)
    } else {
        CheckResult::success(check_name, "all resources pass schema validation").with_details(details)
    }
}
