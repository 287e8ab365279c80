//! Process entry point: CLI/flag wiring, HTTP server assembly (§6),
//! startup index population, and the `SIGTERM` graceful-shutdown drain
//! (§6 Process signals). Individually thin — the interesting behavior
//! lives in `kubechecks-core` and its adapters; this binary only wires
//! them together.

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::time::{Duration, Instant};

use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{info, warn};

use kubechecks::cli::Cli;
use kubechecks::error::Result;
use kubechecks::state::ServiceState;
use kubechecks::build_router;
use kubechecks_checks::{ConftestCheck, DiffCheck, KubeconformCheck, KubepugCheck};
use kubechecks_common::config::AppConfig;
use kubechecks_common::context::RuntimeContext;
use kubechecks_common::tracing_setup::setup_tracing;
use kubechecks_core::index::ApplicationIndex;
use kubechecks_core::model::State as CheckState;
use kubechecks_core::model::{Application, ApplicationSet};
use kubechecks_core::pipeline::{
    Check, CheckSpec, DeliveryControllerClient, GitHostingClient, Pipeline, RepoQueueManager,
};
use kubechecks_core::store::repo_manager::RepoManager;
use kubechecks_core::store::resource_cache::run_ttl_sweeper;
use kubechecks_vcs::GitHubClient;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_tracing(cli.json_logs);

    let mut config = AppConfig::load()?;
    apply_cli_overrides(&mut config, &cli);
    let config = Arc::new(config);

    let hostname = hostname();
    let runtime = RuntimeContext::new(hostname);
    info!(instance_id = %runtime.instance_id(), "starting kubechecks");

    let vcs: Arc<dyn GitHostingClient> =
        Arc::new(GitHubClient::new(cli.vcs_token.clone().unwrap_or_default(), cli.bot_username.clone()));

    let repo_manager = Arc::new(RepoManager::new(cli.base_dir.clone()));
    let index = Arc::new(ApplicationIndex::new());

    let controller: Arc<dyn DeliveryControllerClient> = match build_controller(&cli).await {
        Some(client) => {
            populate_index(&index, client.as_ref()).await;
            client
        }
        None => {
            warn!("no reachable kubernetes cluster; Application Index starts empty");
            Arc::new(UnreachableController)
        }
    };

    let checks = build_checks(&config);

    let pipeline = Arc::new(Pipeline::new(
        vcs.clone(),
        controller,
        repo_manager.clone(),
        index.clone(),
        checks,
        config.pipeline.clone(),
    ));

    let repo_queues = Arc::new(RepoQueueManager::new(config.pipeline.max_repo_worker_queue_size));

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("installing the global prometheus recorder exactly once at startup");

    let service_state = ServiceState {
        pipeline,
        vcs,
        index,
        repo_queues,
        runtime: runtime.clone(),
        config: config.clone(),
        metrics_handle,
        start_time: Instant::now(),
        in_flight: Arc::new(AtomicUsize::new(0)),
    };

    let sweeper = tokio::spawn(run_ttl_sweeper(
        repo_manager,
        config.pipeline.repo_cache_ttl(),
        config.pipeline.repo_refresh_interval(),
        runtime.shutdown_token(),
    ));

    let app = build_router(service_state, &config.server.webhook_prefix);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "listening");

    let shutdown = runtime.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            wait_for_signal().await;
            info!("SIGTERM received, draining in-flight runs");
            shutdown.shutdown();
        })
        .await?;

    sweeper.abort();
    Ok(())
}

/// Builds the `kube`-backed controller adapter from the ambient in-cluster
/// or local kubeconfig, if one is reachable. Startup continues without a
/// live cluster so the HTTP surface still comes up (health probes must
/// never depend on cluster connectivity).
async fn build_controller(cli: &Cli) -> Option<Arc<kubechecks_controller::KubeControllerClient>> {
    match kube::Client::try_default().await {
        Ok(client) => {
            let adapter = match &cli.namespace {
                Some(ns) => kubechecks_controller::KubeControllerClient::namespaced(client, ns.clone()),
                None => kubechecks_controller::KubeControllerClient::new(client),
            };
            Some(Arc::new(adapter))
        }
        Err(e) => {
            warn!(error = %e, "no reachable kubernetes cluster");
            None
        }
    }
}

/// Stands in for the delivery-controller client when no cluster was
/// reachable at startup, so the pipeline always has a collaborator to call
/// (§4.5) without threading an `Option` through `Pipeline::new`. Every
/// method returns an empty/error result; the Application Index simply
/// starts (and stays) empty until the process is restarted against a
/// reachable cluster.
struct UnreachableController;

#[async_trait::async_trait]
impl DeliveryControllerClient for UnreachableController {
    async fn get_applications(&self) -> kubechecks_core::error::Result<Vec<Application>> {
        Ok(Vec::new())
    }

    async fn get_application_sets(&self) -> kubechecks_core::error::Result<Vec<ApplicationSet>> {
        Ok(Vec::new())
    }

    async fn get_application_by_name(&self, _name: &str) -> kubechecks_core::error::Result<Option<Application>> {
        Ok(None)
    }

    async fn get_applications_by_appset(&self, _name: &str) -> kubechecks_core::error::Result<Vec<Application>> {
        Ok(Vec::new())
    }

    async fn get_manifests(
        &self,
        _app: &Application,
        _source_paths: &[&std::path::Path],
    ) -> kubechecks_core::error::Result<serde_json::Value> {
        Err(kubechecks_core::error::Error::Other(anyhow::anyhow!("no reachable kubernetes cluster")))
    }

    async fn get_kubernetes_version_by_application(&self, _app: &Application) -> kubechecks_core::error::Result<String> {
        Err(kubechecks_core::error::Error::Other(anyhow::anyhow!("no reachable kubernetes cluster")))
    }
}

async fn populate_index(index: &ApplicationIndex, controller: &kubechecks_controller::KubeControllerClient) {
    match controller.get_applications().await {
        Ok(apps) => {
            info!(count = apps.len(), "loaded applications from delivery controller");
            for app in apps {
                // Startup indexing works against the already-checked-out
                // working copy; a clone hasn't happened yet for any app at
                // this point, so kustomize graph walking is skipped until
                // a PR touching that repo actually triggers one (§4.2: the
                // index is also updated incrementally by watcher events).
                let _ = index.add_app(app, std::path::Path::new("."));
            }
        }
        Err(e) => warn!(error = %e, "failed to list applications at startup"),
    }

    match controller.get_application_sets().await {
        Ok(appsets) => {
            info!(count = appsets.len(), "loaded applicationsets from delivery controller");
            for appset in appsets {
                index.add_appset(appset);
            }
        }
        Err(e) => warn!(error = %e, "failed to list applicationsets at startup"),
    }
}

/// Builds the configured check list, applying each check's
/// `worst-<check>-state` clamp (§6). Unrecognized clamp values default to
/// `Panic` (no clamp) with a warning rather than aborting startup.
fn build_checks(config: &AppConfig) -> Vec<CheckSpec> {
    let clamp_for = |name: &str| -> CheckState {
        config
            .pipeline
            .worst_check_state
            .get(name)
            .and_then(|raw| match raw.parse() {
                Ok(state) => Some(state),
                Err(_) => {
                    warn!(check = name, value = raw, "unrecognized worst-check-state, defaulting to panic");
                    None
                }
            })
            .unwrap_or(CheckState::Panic)
    };

    let diff: Arc<dyn Check> = Arc::new(DiffCheck::new(None));
    let schema: Arc<dyn Check> = Arc::new(KubeconformCheck::new(config.pipeline.schemas_location.clone()));
    let policy: Arc<dyn Check> = Arc::new(ConftestCheck::new(config.pipeline.policies_location.clone()));
    let preupgrade: Arc<dyn Check> = Arc::new(KubepugCheck::default());

    vec![
        CheckSpec { check: diff, worst_allowed_state: clamp_for("diff") },
        CheckSpec { check: schema, worst_allowed_state: clamp_for("schema") },
        CheckSpec { check: policy, worst_allowed_state: clamp_for("policy") },
        CheckSpec { check: preupgrade, worst_allowed_state: clamp_for("pre-upgrade") },
    ]
}

fn apply_cli_overrides(config: &mut AppConfig, cli: &Cli) {
    if let Some(v) = &cli.vcs_type {
        config.vcs.vcs_type = v.clone();
    }
    if let Some(v) = &cli.webhook_secret {
        config.vcs.webhook_secret = Some(v.clone());
    }
    if let Some(v) = &cli.label_filter {
        config.vcs.label_filter = v.clone();
    }
    if let Some(v) = &cli.replan_comment_msg {
        config.vcs.replan_comment_msg = v.clone();
    }
    if let Some(v) = cli.max_concurrent_checks {
        config.pipeline.max_concurrent_checks = v;
    }
    if let Some(v) = cli.max_queue_size {
        config.pipeline.max_queue_size = v;
    }
    if let Some(v) = cli.max_repo_worker_queue_size {
        config.pipeline.max_repo_worker_queue_size = v;
    }
    if let Some(v) = &cli.fallback_k8s_version {
        config.pipeline.fallback_k8s_version = v.clone();
    }
    if let Some(v) = &cli.tidy_outdated_comments_mode {
        config.pipeline.tidy_outdated_comments_mode = v.clone();
    }
    if let Some(v) = &cli.schemas_location {
        config.pipeline.schemas_location = Some(v.clone());
    }
    if let Some(v) = &cli.policies_location {
        config.pipeline.policies_location = Some(v.clone());
    }
    for (check, state) in &cli.worst_check_state {
        config.pipeline.worst_check_state.insert(check.clone(), state.clone());
    }
    config.vcs.ensure_webhooks = config.vcs.ensure_webhooks || cli.ensure_webhooks;
    config.pipeline.monitor_all_applications = config.pipeline.monitor_all_applications || cli.monitor_all_applications;
    if let Some(v) = &cli.host {
        config.server.host = v.clone();
    }
    if let Some(v) = cli.port {
        config.server.port = v;
    }
}

fn hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "kubechecks".to_string())
}

/// Waits for `SIGTERM` (or, off Unix, for Ctrl-C) so graceful shutdown
/// works both under an orchestrator and when run locally.
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        let mut term = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("installing SIGTERM handler");
        tokio::select! {
            _ = term.recv() => {}
            _ = tokio::signal::ctrl_c() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[allow(dead_code)]
fn drain_deadline() -> Duration {
    Duration::from_secs(30)
}
