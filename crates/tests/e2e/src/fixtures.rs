//! Faked [`GitHostingClient`]/[`DeliveryControllerClient`] collaborators
//! (SPEC_FULL §0.1, §0.5) plus a [`ServiceState`] builder, so scenario
//! tests drive the real HTTP router and real `kubechecks-core` pipeline
//! without any network access.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Instant;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use sha2::Sha256;

use kubechecks_common::config::AppConfig;
use kubechecks_common::context::RuntimeContext;
use kubechecks_core::error::Result as CoreResult;
use kubechecks_core::index::ApplicationIndex;
use kubechecks_core::model::{Application, ApplicationSet, PullRequest};
use kubechecks_core::pipeline::{
    CheckSpec, CommentHandle, CommitState, DeliveryControllerClient, GitHostingClient, HookOutcome, Pipeline,
    RepoQueueManager,
};
use kubechecks_core::store::repo_manager::RepoManager;
use kubechecks::state::ServiceState;

type HmacSha256 = Hmac<Sha256>;

/// Signs `body` the same way a real provider would, so webhook-intake
/// tests exercise the production HMAC verification path.
pub fn sign_body(body: &[u8], secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key length");
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

/// Builds a minimal GitHub-shaped `pull_request` webhook payload, enough
/// for [`FakeGitHosting::parse_hook`] to turn into a neutral [`PullRequest`].
pub fn github_pr_payload(action: &str, number: u64, labels: &[&str], clone_url: &str) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "action": action,
        "number": number,
        "pull_request": {
            "head": {"ref": "feature", "sha": "abc123"},
            "base": {"ref": "main", "sha": "def456"},
            "user": {"login": "octocat"},
            "labels": labels.iter().map(|l| serde_json::json!({"name": l})).collect::<Vec<_>>(),
        },
        "repository": {
            "owner": {"login": "acme"},
            "name": "widgets",
            "clone_url": clone_url,
            "default_branch": "main",
        },
    }))
    .unwrap()
}

#[derive(Debug, serde::Deserialize)]
struct FakeEvent {
    action: String,
    number: u64,
    pull_request: FakePr,
    repository: FakeRepo,
}

#[derive(Debug, serde::Deserialize)]
struct FakePr {
    head: FakeRef,
    base: FakeRef,
    user: FakeUser,
    labels: Vec<FakeLabel>,
}

#[derive(Debug, serde::Deserialize)]
struct FakeRef {
    r#ref: String,
    sha: String,
}

#[derive(Debug, serde::Deserialize)]
struct FakeUser {
    login: String,
}

#[derive(Debug, serde::Deserialize)]
struct FakeLabel {
    name: String,
}

#[derive(Debug, serde::Deserialize)]
struct FakeRepo {
    owner: FakeUser,
    name: String,
    clone_url: String,
    default_branch: String,
}

const HANDLED_ACTIONS: &[&str] = &["opened", "synchronize", "reopened"];

/// `kubechecks_core::Error` has no signature/payload variants of its own —
/// those belong to a provider adapter crate (`kubechecks-vcs::Error`) and
/// convert in via `Other`. Mirrors that conversion for this fake adapter.
fn signature_invalid() -> kubechecks_core::error::Error {
    kubechecks_core::error::Error::Other(anyhow::anyhow!("webhook signature verification failed"))
}

fn malformed_payload(detail: impl std::fmt::Display) -> kubechecks_core::error::Error {
    kubechecks_core::error::Error::Other(anyhow::anyhow!("malformed webhook payload: {detail}"))
}

/// A [`GitHostingClient`] that never touches the network: signature
/// verification is the real HMAC algorithm, everything else is recorded
/// in-memory so tests can assert on what the pipeline posted.
#[derive(Default)]
pub struct FakeGitHosting {
    pub posted: Mutex<Vec<(String, String)>>,
    pub updated: Mutex<Vec<(String, String)>>,
    pub statuses: Mutex<Vec<(String, CommitState)>>,
    pub tidy_calls: Mutex<u32>,
    pub changed_files_by_pr: Mutex<HashMap<u64, Vec<PathBuf>>>,
    next_comment_id: AtomicU64,
}

impl FakeGitHosting {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_changed_files(self, check_id: u64, files: Vec<PathBuf>) -> Self {
        self.changed_files_by_pr.lock().unwrap().insert(check_id, files);
        self
    }

    pub fn posted_bodies(&self) -> Vec<String> {
        self.posted.lock().unwrap().iter().map(|(_, b)| b.clone()).collect()
    }

    pub fn last_status(&self) -> Option<CommitState> {
        self.statuses.lock().unwrap().last().map(|(_, s)| *s)
    }
}

#[async_trait]
impl GitHostingClient for FakeGitHosting {
    fn verify_hook(&self, body: &[u8], signature_header: Option<&str>, secret: &str) -> CoreResult<Vec<u8>> {
        let Some(signature) = signature_header else {
            return Err(signature_invalid());
        };
        let expected = sign_body(body, secret);
        if signature != expected {
            return Err(signature_invalid());
        }
        Ok(body.to_vec())
    }

    fn parse_hook(&self, payload: &[u8]) -> CoreResult<HookOutcome> {
        let event: FakeEvent =
            serde_json::from_slice(payload).map_err(|e| malformed_payload(e.to_string()))?;

        if !HANDLED_ACTIONS.contains(&event.action.as_str()) {
            return Ok(HookOutcome::Skip(format!("unsupported pull_request action: {}", event.action)));
        }

        let clone_url = kubechecks_core::types::CloneUrl::parse(&event.repository.clone_url)
            .map_err(|e| malformed_payload(e.to_string()))?;

        let pr = PullRequest {
            provider_id: format!("github:{}/{}#{}", event.repository.owner.login, event.repository.name, event.number),
            check_id: event.number,
            owner: event.repository.owner.login,
            name: event.repository.name,
            clone_url,
            head_ref: event.pull_request.head.r#ref,
            head_sha: event.pull_request.head.sha,
            base_ref: event.pull_request.base.r#ref,
            default_branch: event.repository.default_branch,
            author: event.pull_request.user.login,
            labels: event.pull_request.labels.into_iter().map(|l| l.name).collect(),
        };
        Ok(HookOutcome::Process(pr))
    }

    fn username(&self) -> &str {
        "kubechecks[bot]"
    }

    fn clone_username(&self) -> &str {
        "x-access-token"
    }

    async fn changed_files(&self, pr: &PullRequest) -> CoreResult<Vec<PathBuf>> {
        Ok(self
            .changed_files_by_pr
            .lock()
            .unwrap()
            .get(&pr.check_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn post_message(&self, pr: &PullRequest, body: &str) -> CoreResult<CommentHandle> {
        self.posted.lock().unwrap().push((pr.display_name(), body.to_string()));
        let id = self.next_comment_id.fetch_add(1, Ordering::SeqCst);
        Ok(CommentHandle(format!("comment-{id}")))
    }

    async fn update_message(&self, handle: &CommentHandle, body: &str) -> CoreResult<()> {
        self.updated.lock().unwrap().push((handle.0.clone(), body.to_string()));
        Ok(())
    }

    async fn tidy_outdated_comments(&self, _pr: &PullRequest) -> CoreResult<()> {
        *self.tidy_calls.lock().unwrap() += 1;
        Ok(())
    }

    async fn commit_status(&self, pr: &PullRequest, state: CommitState) -> CoreResult<()> {
        self.statuses.lock().unwrap().push((pr.display_name(), state));
        Ok(())
    }
}

/// A [`DeliveryControllerClient`] backed entirely by in-memory fixtures —
/// no `kube` client, no cluster required.
#[derive(Default)]
pub struct FakeDeliveryController {
    pub applications: Vec<Application>,
    pub application_sets: Vec<ApplicationSet>,
    pub manifests: serde_json::Value,
    pub kubernetes_version: String,
}

impl FakeDeliveryController {
    pub fn new() -> Self {
        Self {
            manifests: serde_json::json!([]),
            kubernetes_version: "1.28.0".to_string(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl DeliveryControllerClient for FakeDeliveryController {
    async fn get_applications(&self) -> CoreResult<Vec<Application>> {
        Ok(self.applications.clone())
    }

    async fn get_application_sets(&self) -> CoreResult<Vec<ApplicationSet>> {
        Ok(self.application_sets.clone())
    }

    async fn get_application_by_name(&self, name: &str) -> CoreResult<Option<Application>> {
        Ok(self.applications.iter().find(|a| a.name == name).cloned())
    }

    async fn get_applications_by_appset(&self, _name: &str) -> CoreResult<Vec<Application>> {
        Ok(Vec::new())
    }

    async fn get_manifests(&self, _app: &Application, _source_paths: &[&std::path::Path]) -> CoreResult<serde_json::Value> {
        Ok(self.manifests.clone())
    }

    async fn get_kubernetes_version_by_application(&self, _app: &Application) -> CoreResult<String> {
        Ok(self.kubernetes_version.clone())
    }
}

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// A Prometheus recorder is a process-wide global, so installing it twice
/// in one test binary panics. Every test that needs a handle shares one
/// lazily-installed recorder instead.
fn shared_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            PrometheusBuilder::new()
                .install_recorder()
                .expect("installing the shared test prometheus recorder")
        })
        .clone()
}

/// Assembles a real [`ServiceState`] — real `Pipeline`, real
/// `ApplicationIndex`, real `RepoManager` rooted at a throwaway temp
/// directory — wired to the faked VCS/controller ports passed in.
pub fn test_service_state(
    vcs: Arc<dyn GitHostingClient>,
    controller: Arc<dyn DeliveryControllerClient>,
    index: Arc<ApplicationIndex>,
    checks: Vec<CheckSpec>,
    config: AppConfig,
) -> ServiceState {
    let base_dir = std::env::temp_dir().join(format!("kubechecks-e2e-{}", uuid::Uuid::new_v4()));
    let repo_manager = Arc::new(RepoManager::new(base_dir));

    let pipeline = Arc::new(Pipeline::new(
        vcs.clone(),
        controller,
        repo_manager,
        index.clone(),
        checks,
        config.pipeline.clone(),
    ));

    ServiceState {
        pipeline,
        vcs,
        index,
        repo_queues: Arc::new(RepoQueueManager::new(config.pipeline.max_repo_worker_queue_size)),
        runtime: RuntimeContext::for_test(),
        config: Arc::new(config),
        metrics_handle: shared_metrics_handle(),
        start_time: Instant::now(),
        in_flight: Arc::new(std::sync::atomic::AtomicUsize::new(0)),
    }
}
