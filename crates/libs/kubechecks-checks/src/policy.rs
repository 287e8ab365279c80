//! Policy check (`enableConfTest`, §6): runs Open Policy Agent policies
//! against rendered manifests via `conftest`.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use kubechecks_core::model::{CheckResult, State};
use kubechecks_core::pipeline::{Check, CheckRequest};

use crate::error::{Error, Result};
use crate::manifests::to_yaml_stream;

const TOOL: &str = "conftest";

pub struct ConftestCheck {
    binary: String,
    policy_location: Option<String>,
}

impl ConftestCheck {
    pub fn new(policy_location: Option<String>) -> Self {
        Self { binary: TOOL.to_string(), policy_location }
    }
}

#[async_trait]
impl Check for ConftestCheck {
    fn name(&self) -> &str {
        "policy"
    }

    async fn run(&self, request: &CheckRequest) -> anyhow::Result<CheckResult> {
        let Some(policy_location) = self.policy_location.as_deref() else {
            return Ok(CheckResult::success(self.name(), "no policy location configured, skipping"));
        };

        let yaml = to_yaml_stream(&request.manifests_json)?;
        if yaml.is_empty() {
            return Ok(CheckResult::success(self.name(), "no manifests to check"));
        }

        let results = run_conftest(&self.binary, policy_location, &yaml).await?;
        Ok(summarize(self.name(), &results))
    }
}

#[derive(Debug, Default, serde::Deserialize)]
struct ConftestFailure {
    msg: String,
}

#[derive(Debug, Default, serde::Deserialize)]
struct ConftestFileResult {
    #[serde(default)]
    failures: Vec<ConftestFailure>,
    #[serde(default)]
    warnings: Vec<ConftestFailure>,
}

async fn run_conftest(binary: &str, policy_location: &str, yaml: &str) -> Result<Vec<ConftestFileResult>> {
    let mut child = Command::new(binary)
        .args(["test", "-", "--input", "yaml", "--policy", policy_location, "--output", "json"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| Error::Spawn { tool: TOOL, source })?;

    let mut stdin = child.stdin.take().expect("piped stdin");
    stdin.write_all(yaml.as_bytes()).await.map_err(Error::Io)?;
    drop(stdin);

    let output = child.wait_with_output().await.map_err(|source| Error::Spawn { tool: TOOL, source })?;
    // conftest exits non-zero when any policy fails; that's an expected
    // outcome, not a launch failure, so only a missing/crashed binary (empty
    // stdout) is treated as `ToolFailed`.
    if output.stdout.is_empty() {
        return Err(Error::ToolFailed {
            tool: TOOL,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    serde_json::from_slice(&output.stdout).map_err(|source| Error::Parse { tool: TOOL, source })
}

fn summarize(check_name: &str, results: &[ConftestFileResult]) -> CheckResult {
    let failures: Vec<&str> = results.iter().flat_map(|r| r.failures.iter()).map(|f| f.msg.as_str()).collect();
    let warnings: Vec<&str> = results.iter().flat_map(|r| r.warnings.iter()).map(|f| f.msg.as_str()).collect();

    if !failures.is_empty() {
        CheckResult::new(check_name, State::Failure, format!("{} policy violation(s)", failures.len()))
            .with_details(failures.join("\n"))
    } else if !warnings.is_empty() {
        CheckResult::new(check_name, State::Warning, format!("{} policy warning(s)", warnings.len()))
            .with_details(warnings.join("\n"))
    } else {
        CheckResult::success(check_name, "no policy violations")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_outrank_warnings() {
        let results = vec![ConftestFileResult {
            failures: vec![ConftestFailure { msg: "no root containers".into() }],
            warnings: vec![ConftestFailure { msg: "missing owner label".into() }],
        }];
        let result = summarize("policy", &results);
        assert_eq!(result.state, State::Failure);
        assert!(result.details.contains("no root containers"));
    }

    #[test]
    fn warnings_without_failures_summarize_to_warning() {
        let results = vec![ConftestFileResult {
            failures: Vec::new(),
            warnings: vec![ConftestFailure { msg: "missing owner label".into() }],
        }];
        assert_eq!(summarize("policy", &results).state, State::Warning);
    }

    #[test]
    fn clean_results_summarize_to_success() {
        let results = vec![ConftestFileResult::default()];
        assert_eq!(summarize("policy", &results).state, State::Success);
    }

    #[test]
    fn conftest_json_output_parses() {
        let json = r#"[{"failures":[{"msg":"deny: x"}],"warnings":[]}]"#;
        let results: Vec<ConftestFileResult> = serde_json::from_str(json).unwrap();
        assert_eq!(results[0].failures.len(), 1);
    }
}
