//! Thin CLI/flag wiring (§1: explicitly out of scope for deep design, but
//! still needed to start the process). Every flag here maps onto an
//! [`AppConfig`](kubechecks_common::config::AppConfig) field or a startup
//! secret that isn't part of the layered config at all (tokens).

use clap::Parser;

/// Kubechecks: pre-merge validation for GitOps repositories.
#[derive(Debug, Parser)]
#[command(name = "kubechecks", version, about)]
pub struct Cli {
    /// Host-hosting provider selector (github, gitlab, ...). Overrides config.
    #[arg(long, env = "KUBECHECKS_VCS_TYPE")]
    pub vcs_type: Option<String>,

    /// HMAC key used to verify inbound webhook signatures.
    #[arg(long, env = "KUBECHECKS_WEBHOOK_SECRET")]
    pub webhook_secret: Option<String>,

    /// Token used to authenticate against the Git hosting API.
    #[arg(long, env = "KUBECHECKS_VCS_TOKEN")]
    pub vcs_token: Option<String>,

    /// Identity this service comments/posts statuses as.
    #[arg(long, env = "KUBECHECKS_BOT_USERNAME", default_value = "kubechecks[bot]")]
    pub bot_username: String,

    /// Restrict processing to PRs labeled `kubechecks:<value>`.
    #[arg(long, env = "KUBECHECKS_LABEL_FILTER")]
    pub label_filter: Option<String>,

    /// Phrase that re-triggers a run when posted as a PR comment.
    #[arg(long, env = "KUBECHECKS_REPLAN_COMMENT_MSG")]
    pub replan_comment_msg: Option<String>,

    /// Per-run worker pool size.
    #[arg(long, env = "KUBECHECKS_MAX_CONCURRENT_CHECKS")]
    pub max_concurrent_checks: Option<usize>,

    /// Global webhook-acceptance queue depth.
    #[arg(long, env = "KUBECHECKS_MAX_QUEUE_SIZE")]
    pub max_queue_size: Option<usize>,

    /// Per-repo queue depth.
    #[arg(long, env = "KUBECHECKS_MAX_REPO_WORKER_QUEUE_SIZE")]
    pub max_repo_worker_queue_size: Option<usize>,

    /// Fallback Kubernetes version used when the controller can't tell.
    #[arg(long, env = "KUBECHECKS_FALLBACK_K8S_VERSION")]
    pub fallback_k8s_version: Option<String>,

    /// `hide` or `delete`.
    #[arg(long, env = "KUBECHECKS_TIDY_OUTDATED_COMMENTS_MODE")]
    pub tidy_outdated_comments_mode: Option<String>,

    /// URL or path to kubeconform schemas.
    #[arg(long, env = "KUBECHECKS_SCHEMAS_LOCATION")]
    pub schemas_location: Option<String>,

    /// URL or path to conftest policies.
    #[arg(long, env = "KUBECHECKS_POLICIES_LOCATION")]
    pub policies_location: Option<String>,

    /// Per-check clamp, repeatable: `--worst-check-state diff=warning`.
    #[arg(long = "worst-check-state", value_parser = parse_worst_check_state)]
    pub worst_check_state: Vec<(String, String)>,

    /// Register this service's webhook with the hosting provider at startup.
    #[arg(long)]
    pub ensure_webhooks: bool,

    /// Watch every application in the cluster, not just ones touched by a PR diff.
    #[arg(long)]
    pub monitor_all_applications: bool,

    /// Directory the Repo Manager clones working copies into.
    #[arg(long, env = "KUBECHECKS_BASE_DIR", default_value = "/tmp/kubechecks")]
    pub base_dir: String,

    /// Kubernetes namespace to restrict Application/ApplicationSet listing to.
    /// Cluster-wide when unset.
    #[arg(long, env = "KUBECHECKS_NAMESPACE")]
    pub namespace: Option<String>,

    /// HTTP bind host. Overrides config.
    #[arg(long, env = "HOST")]
    pub host: Option<String>,

    /// HTTP bind port. Overrides config.
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Emit logs as JSON instead of pretty-printed text.
    #[arg(long)]
    pub json_logs: bool,
}

fn parse_worst_check_state(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected `<check>=<state>`, got {raw:?}"))
}
