//! Runner (§4.6): per-application concurrent execution of a list of checks
//! with panic isolation.

use async_trait::async_trait;
use std::sync::Arc;

use crate::model::{Application, CheckResult, State};

/// One check, represented as a tagged async function value plus metadata —
/// the pipeline depends only on this capability, never on a concrete check
/// type (§9 design note: "Polymorphism over checks").
#[async_trait]
pub trait Check: Send + Sync {
    fn name(&self) -> &str;
    async fn run(&self, request: &CheckRequest) -> anyhow::Result<CheckResult>;
}

/// A check plus the clamp state an operator has configured for it via
/// `worst-<check>-state` (§6).
pub struct CheckSpec {
    pub check: Arc<dyn Check>,
    pub worst_allowed_state: State,
}

/// Queues a newly discovered application for processing in the same run —
/// passed into every check request as a function value rather than global
/// state, supporting the app-of-apps case (§9 design note).
pub type QueueAppFn = Arc<dyn Fn(Application) + Send + Sync>;
/// Removes a previously queued application from the run (its companion
/// hook, §9 design note).
pub type RemoveAppFn = Arc<dyn Fn(&str) + Send + Sync>;

/// Everything a check function needs: the application, its rendered
/// manifests, the resolved Kubernetes version, a path to the app's working
/// copy, and the two app-of-apps hooks (§4.5 step 5, §4.6).
pub struct CheckRequest {
    pub app: Application,
    pub manifests_json: serde_json::Value,
    pub kubernetes_version: String,
    pub repo_path: std::path::PathBuf,
    pub queue_app: QueueAppFn,
    pub remove_app: RemoveAppFn,
}

/// Runs every configured check for one application concurrently, isolating
/// panics per check (§4.6). `tokio::spawn` is the panic boundary: a
/// panicking check unwinds only its own task, and `JoinHandle::await`
/// surfaces that as an `Err` we turn into a `Panic` result rather than
/// letting it take down the worker.
pub async fn run_all(checks: &[CheckSpec], request: Arc<CheckRequest>) -> Vec<CheckResult> {
    let mut handles = Vec::with_capacity(checks.len());

    for spec in checks {
        let check = spec.check.clone();
        let worst_allowed = spec.worst_allowed_state;
        let request = request.clone();
        let name = check.name().to_string();

        handles.push(tokio::spawn(async move {
            let outcome = check.run(&request).await;
            let result = match outcome {
                Ok(result) => result,
                Err(e) => CheckResult::error(&name, e),
            };
            result.clamped_for_display(worst_allowed)
        }));
    }

    let mut results = Vec::with_capacity(handles.len());
    for (spec, handle) in checks.iter().zip(handles) {
        match handle.await {
            Ok(result) => results.push(result),
            Err(join_err) => {
                let stack = if join_err.is_panic() {
                    panic_message(join_err.into_panic())
                } else {
                    "task was cancelled".to_string()
                };
                results.push(CheckResult::panicked(spec.check.name(), stack).clamped_for_display(spec.worst_allowed_state));
            }
        }
    }
    results
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "check panicked with a non-string payload".to_string()
    }
}
