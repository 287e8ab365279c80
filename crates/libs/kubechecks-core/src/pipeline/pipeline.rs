//! Check Pipeline (§4.5): orchestrates one PR run end to end — merge,
//! discovery, fan-out, aggregation, posting.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span, warn};

use kubechecks_common::config::PipelineConfig;

use crate::error::Result;
use crate::index::ApplicationIndex;
use crate::index::matcher::affected_apps;
use crate::model::{Application, CheckResult, State};
use crate::pipeline::aggregator::Aggregator;
use crate::pipeline::ports::{CommitState, DeliveryControllerClient, GitHostingClient, HookOutcome};
use crate::pipeline::queue::{SeenApps, app_channel, worker_pool_size};
use crate::pipeline::runner::{CheckRequest, CheckSpec, run_all};
use crate::pipeline::state::PrState;
use crate::store::repo_manager::RepoManager;

/// Everything one PR run needs that outlives the run itself: the two
/// external ports, the shared Repo Manager and Application Index, the
/// configured check list, and pipeline-wide limits (§4.5, §5).
pub struct Pipeline {
    vcs: Arc<dyn GitHostingClient>,
    controller: Arc<dyn DeliveryControllerClient>,
    repo_manager: Arc<RepoManager>,
    index: Arc<ApplicationIndex>,
    checks: Vec<CheckSpec>,
    config: PipelineConfig,
}

/// Outcome of one `Process(pr)` call, mostly useful for tests — production
/// callers observe the run's effects through the posted comment and commit
/// status, not this return value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub final_state: PrState,
    pub worst_state: State,
    pub affected_app_count: usize,
}

impl Pipeline {
    pub fn new(
        vcs: Arc<dyn GitHostingClient>,
        controller: Arc<dyn DeliveryControllerClient>,
        repo_manager: Arc<RepoManager>,
        index: Arc<ApplicationIndex>,
        checks: Vec<CheckSpec>,
        config: PipelineConfig,
    ) -> Self {
        Self { vcs, controller, repo_manager, index, checks, config }
    }

    /// `Process(pr)` (§4.5): runs the full state machine for one PR. Side
    /// effects are the PR comment and commit status; the returned
    /// [`RunOutcome`] is informational only. Always reaches `Done`,
    /// including when individual applications fail — only early-stage
    /// failures (merge conflict, repo clone) short-circuit (§7).
    pub async fn process(&self, pr: &crate::model::PullRequest, cancel: CancellationToken) -> Result<RunOutcome> {
        let span = info_span!("pipeline_run", pr = %pr.display_name());
        self.process_inner(pr, cancel).instrument(span).await
    }

    async fn process_inner(&self, pr: &crate::model::PullRequest, cancel: CancellationToken) -> Result<RunOutcome> {
        // MERGING
        let base_repo = self.repo_manager.clone_or_fetch(&pr.clone_url, &pr.base_ref).await?;
        if let Err(e) = self.repo_manager.merge_into(&base_repo, &pr.head_ref, &pr.head_sha).await {
            if e.is_recoverable() {
                warn!(error = %e, "merge conflict, reporting and stopping");
                let body = format!("## Kubechecks\n\n**Conflict:** {pr_ref} could not be merged into {base_ref}: {e}", pr_ref = pr.head_ref, base_ref = pr.base_ref);
                self.vcs.post_message(pr, &body).await?;
                self.vcs.commit_status(pr, CommitState::Failure).await?;
                return Ok(RunOutcome { final_state: PrState::Done, worst_state: State::Warning, affected_app_count: 0 });
            }
            return Err(e);
        }

        // DISCOVERING_FILES
        let changed_files = self.vcs.changed_files(pr).await?;

        // DISCOVERING_APPS
        let affected = affected_apps(&self.index, &pr.clone_url, &changed_files, &base_repo.local_path)?;
        if affected.is_empty() {
            info!("no applications affected, posting no-changes comment");
            self.vcs.post_message(pr, "## Kubechecks\n\nNo changes affecting any application.").await?;
            self.vcs.commit_status(pr, CommitState::Success).await?;
            return Ok(RunOutcome { final_state: PrState::Done, worst_state: State::Success, affected_app_count: 0 });
        }

        // Appsets discovered by the matcher still need their applications
        // unioned in; the generator itself already ran inside the matcher
        // for the config-matcher path, so here we only fold in any
        // appset-sourced applications the index matcher surfaced directly.
        let mut apps = affected.applications;
        apps.sort_by(|a, b| a.name.cmp(&b.name));
        apps.dedup_by(|a, b| a.name == b.name);

        // POST_INITIAL_COMMENT
        let aggregator = Arc::new(Aggregator::new());
        for app in &apps {
            aggregator.add_new_app(&app.name);
        }
        let initial_body = aggregator.build_comment();
        let handle = self.vcs.post_message(pr, &initial_body).await?;
        aggregator.set_comment_id(handle.0.clone());

        // FANOUT
        let seen = Arc::new(SeenApps::new());
        let (sender, mut receiver) = app_channel(apps.len());
        for app in &apps {
            seen.observe(app);
            sender.send(app.clone()).await.ok();
        }

        let pool_size = worker_pool_size(self.config.max_concurrent_checks, apps.len());
        // Both counters are plain atomics, not a mutex-guarded usize: `queue_app`
        // below must be able to bump `sent` synchronously, in the same instant it
        // registers the child with `seen`, so that "sent == received" never reads
        // true while a just-discovered child is still only half-queued.
        let sent = Arc::new(std::sync::atomic::AtomicUsize::new(apps.len()));
        let received = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        // Signals every parked worker the instant the last one observes
        // sent == received, so `recv()` calls blocked on an empty channel wake
        // immediately instead of waiting for the channel to close naturally (the
        // sender is held open for the lifetime of the fan-out) or for the
        // pipeline's overall deadline to fire.
        let fanout_done = CancellationToken::new();

        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let mut workers = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            let receiver = receiver.clone();
            let sender = sender.clone();
            let seen = seen.clone();
            let aggregator = aggregator.clone();
            let received = received.clone();
            let sent = sent.clone();
            let controller = self.controller.clone();
            let repo_manager = self.repo_manager.clone();
            let checks: Vec<CheckSpec> = self.checks.iter().map(clone_check_spec).collect();
            let cancel = cancel.clone();
            let fanout_done = fanout_done.clone();
            let fallback_k8s_version = self.config.fallback_k8s_version.clone();

            workers.push(tokio::spawn(async move {
                loop {
                    if cancel.is_cancelled() {
                        return;
                    }
                    let app = {
                        let mut rx = receiver.lock().await;
                        tokio::select! {
                            biased;
                            () = fanout_done.cancelled() => None,
                            maybe = rx.recv() => maybe,
                        }
                    };
                    let Some(app) = app else { return };

                    let app_sender = sender.clone();
                    let app_seen = seen.clone();
                    let app_sent = sent.clone();
                    let queue_app = {
                        let app_sender = app_sender.clone();
                        let app_seen = app_seen.clone();
                        let app_sent = app_sent.clone();
                        let aggregator = aggregator.clone();
                        Arc::new(move |child: Application| {
                            if app_seen.observe(&child) {
                                // Bump `sent` here, synchronously, before the child is
                                // even handed to the async sender task below — not
                                // inside that spawned task — so a concurrent
                                // `sent == received` check on another worker can never
                                // observe this child as "not yet sent".
                                app_sent.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                                aggregator.add_new_app(&child.name);
                                let app_sender = app_sender.clone();
                                tokio::spawn(async move {
                                    app_sender.send(child).await.ok();
                                });
                            }
                        })
                    };
                    let remove_app = {
                        let aggregator = aggregator.clone();
                        let app_seen = app_seen.clone();
                        Arc::new(move |name: &str| {
                            app_seen.forget(name);
                            aggregator.remove_app(name);
                        })
                    };

                    process_one_app(
                        app,
                        &controller,
                        &repo_manager,
                        &aggregator,
                        &checks,
                        &fallback_k8s_version,
                        queue_app,
                        remove_app,
                        &cancel,
                    )
                    .await;

                    received.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    let done = sent.load(std::sync::atomic::Ordering::SeqCst) == received.load(std::sync::atomic::Ordering::SeqCst);
                    if done {
                        fanout_done.cancel();
                        return;
                    }
                }
            }));
        }

        let drain = futures::future::join_all(workers);
        match tokio::time::timeout(self.config.pr_deadline(), drain).await {
            Ok(_) => {}
            Err(_) => warn!("pipeline deadline exceeded, finalizing with whatever completed"),
        }

        // FINALIZE / POST_STATUS
        let worst = aggregator.worst_state();
        self.vcs.update_message(&handle, &aggregator.build_comment()).await?;
        self.vcs.commit_status(pr, map_commit_state(worst)).await?;

        Ok(RunOutcome { final_state: PrState::Done, worst_state: worst, affected_app_count: apps.len() })
    }
}

#[allow(clippy::too_many_arguments)]
async fn process_one_app(
    app: Application,
    controller: &Arc<dyn DeliveryControllerClient>,
    repo_manager: &Arc<RepoManager>,
    aggregator: &Arc<Aggregator>,
    checks: &[CheckSpec],
    fallback_k8s_version: &str,
    queue_app: crate::pipeline::runner::QueueAppFn,
    remove_app: crate::pipeline::runner::RemoveAppFn,
    cancel: &CancellationToken,
) {
    if cancel.is_cancelled() {
        aggregator.add_to_app_message(&app.name, CheckResult::new("pipeline", State::Warning, "cancelled before start"));
        return;
    }

    let mut source_repo_paths: Vec<PathBuf> = Vec::with_capacity(1 + app.additional_sources.len());
    for source in app.sources() {
        match repo_manager.clone_or_fetch(&source.repo_url, &source.target_revision).await {
            Ok(repo) => source_repo_paths.push(repo.local_path),
            Err(e) => {
                aggregator.add_to_app_message(&app.name, CheckResult::error("render", format!("failed to clone source: {e}")));
                return;
            }
        }
    }

    let source_path_refs: Vec<&std::path::Path> = source_repo_paths.iter().map(|p| p.as_path()).collect();
    let manifests_json = match controller.get_manifests(&app, &source_path_refs).await {
        Ok(json) => json,
        Err(e) => {
            aggregator.add_to_app_message(&app.name, CheckResult::error("render", format!("manifest render failed: {e}")));
            return;
        }
    };

    let kubernetes_version = controller
        .get_kubernetes_version_by_application(&app)
        .await
        .unwrap_or_else(|_| fallback_k8s_version.to_string());

    let repo_path = source_repo_paths.first().cloned().unwrap_or_default();
    let request = Arc::new(CheckRequest {
        app: app.clone(),
        manifests_json,
        kubernetes_version,
        repo_path,
        queue_app,
        remove_app,
    });

    let results = run_all(checks, request).await;
    for result in results {
        aggregator.add_to_app_message(&app.name, result);
    }
}

fn map_commit_state(worst: State) -> CommitState {
    match worst {
        State::Success | State::Warning => CommitState::Success,
        State::Failure => CommitState::Failure,
        State::Error | State::Panic => CommitState::Error,
    }
}

fn clone_check_spec(spec: &CheckSpec) -> CheckSpec {
    CheckSpec { check: spec.check.clone(), worst_allowed_state: spec.worst_allowed_state }
}

/// Converts the outcome of [`GitHostingClient::parse_hook`] plus the
/// configured label filter into either a PR to process or a skip reason
/// (§4.8). Kept free-standing so the webhook-intake HTTP layer in the
/// service binary can call it without depending on the full Pipeline.
pub fn apply_label_filter(outcome: HookOutcome, label_filter: &str) -> std::result::Result<crate::model::PullRequest, String> {
    let pr = match outcome {
        HookOutcome::Skip(reason) => return Err(reason),
        HookOutcome::Process(pr) => pr,
    };

    if label_filter.is_empty() {
        return Ok(pr);
    }

    let labels: Vec<&str> = pr.kubechecks_label_values().collect();
    if labels.is_empty() {
        return Err("label-filter configured but PR carries no kubechecks:* label".to_string());
    }
    // Stricter interpretation (DESIGN Open Question (a)): any kubechecks:* label
    // that doesn't match the configured filter rejects the PR, even if another
    // label on the same PR does match.
    if labels.iter().all(|l| *l == label_filter) {
        Ok(pr)
    } else {
        Err(format!("PR labels {labels:?} do not match configured label-filter {label_filter:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_filter_accepts_unlabeled_pr() {
        let pr = test_pr(&[]);
        let outcome = HookOutcome::Process(pr.clone());
        assert_eq!(apply_label_filter(outcome, "").unwrap().provider_id, pr.provider_id);
    }

    #[test]
    fn filter_rejects_mismatched_label() {
        let pr = test_pr(&["kubechecks:dev"]);
        let outcome = HookOutcome::Process(pr);
        assert!(apply_label_filter(outcome, "prod").is_err());
    }

    #[test]
    fn filter_accepts_matching_label() {
        let pr = test_pr(&["kubechecks:prod"]);
        let outcome = HookOutcome::Process(pr);
        assert!(apply_label_filter(outcome, "prod").is_ok());
    }

    #[test]
    fn filter_rejects_pr_with_one_mismatched_label_among_several() {
        let pr = test_pr(&["kubechecks:prod", "kubechecks:dev"]);
        let outcome = HookOutcome::Process(pr);
        assert!(apply_label_filter(outcome, "prod").is_err());
    }

    #[test]
    fn filter_rejects_pr_with_no_kubechecks_label_when_filter_set() {
        let pr = test_pr(&[]);
        let outcome = HookOutcome::Process(pr);
        assert!(apply_label_filter(outcome, "prod").is_err());
    }

    #[test]
    fn map_commit_state_matches_rollup_semantics() {
        assert_eq!(map_commit_state(State::Success), CommitState::Success);
        assert_eq!(map_commit_state(State::Warning), CommitState::Success);
        assert_eq!(map_commit_state(State::Failure), CommitState::Failure);
        assert_eq!(map_commit_state(State::Error), CommitState::Error);
        assert_eq!(map_commit_state(State::Panic), CommitState::Error);
    }

    fn test_pr(labels: &[&str]) -> crate::model::PullRequest {
        crate::model::PullRequest {
            provider_id: "github:acme/widgets#1".into(),
            check_id: 1,
            owner: "acme".into(),
            name: "widgets".into(),
            clone_url: crate::types::CloneUrl::parse("https://github.com/acme/widgets").unwrap(),
            head_ref: "feature".into(),
            head_sha: "abc123".into(),
            base_ref: "main".into(),
            default_branch: "main".into(),
            author: "octocat".into(),
            labels: labels.iter().map(|s| s.to_string()).collect(),
        }
    }
}
