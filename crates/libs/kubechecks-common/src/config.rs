//! Application configuration, loaded 12-factor style.
//!
//! Priority order (highest to lowest):
//! 1. `PORT` / `HOST` and `KUBECHECKS_*` env vars
//! 2. Config files (`config/default.toml`, `config/{RUN_MODE}.toml`)
//! 3. Hardcoded defaults below, which match spec.md §6's configuration table.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::time::Duration;

use crate::error::Result;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub vcs: VcsConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Path prefix for the webhook route: `/<prefix>/hooks/<provider>/project`.
    #[serde(default = "default_webhook_prefix")]
    pub webhook_prefix: String,
}

fn default_webhook_prefix() -> String {
    "webhooks".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct VcsConfig {
    /// Provider selector (gitlab/github/...).
    pub vcs_type: String,
    /// HMAC key used to verify inbound webhook signatures.
    pub webhook_secret: Option<String>,
    /// Restrict processing to PRs labeled `kubechecks:<value>`. Empty = no filter.
    #[serde(default)]
    pub label_filter: String,
    /// Phrase that re-triggers a run when posted as a PR comment.
    #[serde(default)]
    pub replan_comment_msg: String,
    /// Register webhooks with the hosting provider at startup.
    #[serde(default)]
    pub ensure_webhooks: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    #[serde(default = "default_max_concurrent_checks")]
    pub max_concurrent_checks: usize,
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
    #[serde(default = "default_max_repo_worker_queue_size")]
    pub max_repo_worker_queue_size: usize,
    #[serde(default = "default_repo_refresh_interval_secs")]
    pub repo_refresh_interval_secs: u64,
    #[serde(default = "default_repo_cache_ttl_secs")]
    pub repo_cache_ttl_secs: u64,
    #[serde(default = "default_archive_cache_ttl_secs")]
    pub archive_cache_ttl_secs: u64,
    #[serde(default = "default_fallback_k8s_version")]
    pub fallback_k8s_version: String,
    /// `hide` or `delete`.
    #[serde(default = "default_tidy_mode")]
    pub tidy_outdated_comments_mode: String,
    #[serde(default)]
    pub schemas_location: Option<String>,
    #[serde(default)]
    pub policies_location: Option<String>,
    /// Per-check clamp state, keyed by check name. Values are one of
    /// success/warning/failure/error/panic. Defaults to "panic" (no clamp)
    /// for any check not present in the map.
    #[serde(default)]
    pub worst_check_state: HashMap<String, String>,
    #[serde(default)]
    pub monitor_all_applications: bool,
    #[serde(default = "default_pr_deadline_secs")]
    pub pr_deadline_secs: u64,
}

fn default_max_concurrent_checks() -> usize {
    32
}
fn default_max_queue_size() -> usize {
    1024
}
fn default_max_repo_worker_queue_size() -> usize {
    100
}
fn default_repo_refresh_interval_secs() -> u64 {
    5 * 60
}
fn default_repo_cache_ttl_secs() -> u64 {
    24 * 60 * 60
}
fn default_archive_cache_ttl_secs() -> u64 {
    60 * 60
}
fn default_fallback_k8s_version() -> String {
    "1.23.0".to_string()
}
fn default_tidy_mode() -> String {
    "hide".to_string()
}
fn default_pr_deadline_secs() -> u64 {
    15 * 60
}

impl PipelineConfig {
    pub fn repo_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.repo_refresh_interval_secs)
    }
    pub fn repo_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.repo_cache_ttl_secs)
    }
    pub fn archive_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.archive_cache_ttl_secs)
    }
    pub fn pr_deadline(&self) -> Duration {
        Duration::from_secs(self.pr_deadline_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                webhook_prefix: default_webhook_prefix(),
            },
            vcs: VcsConfig {
                vcs_type: "github".to_string(),
                webhook_secret: None,
                label_filter: String::new(),
                replan_comment_msg: "kubechecks run".to_string(),
                ensure_webhooks: false,
            },
            pipeline: PipelineConfig {
                max_concurrent_checks: default_max_concurrent_checks(),
                max_queue_size: default_max_queue_size(),
                max_repo_worker_queue_size: default_max_repo_worker_queue_size(),
                repo_refresh_interval_secs: default_repo_refresh_interval_secs(),
                repo_cache_ttl_secs: default_repo_cache_ttl_secs(),
                archive_cache_ttl_secs: default_archive_cache_ttl_secs(),
                fallback_k8s_version: default_fallback_k8s_version(),
                tidy_outdated_comments_mode: default_tidy_mode(),
                schemas_location: None,
                policies_location: None,
                worst_check_state: HashMap::new(),
                monitor_all_applications: false,
                pr_deadline_secs: default_pr_deadline_secs(),
            },
        }
    }
}

impl AppConfig {
    /// Loads configuration from files and environment, falling back to the
    /// documented defaults for anything unset.
    pub fn load() -> Result<Self> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        let defaults = AppConfig::default();

        let mut builder = Config::builder()
            .set_default("server.host", defaults.server.host.clone())?
            .set_default("server.port", i64::from(defaults.server.port))?
            .set_default("server.webhook_prefix", defaults.server.webhook_prefix)?
            .set_default("vcs.vcs_type", defaults.vcs.vcs_type)?
            .set_default("vcs.label_filter", defaults.vcs.label_filter)?
            .set_default("vcs.replan_comment_msg", defaults.vcs.replan_comment_msg)?
            .set_default("vcs.ensure_webhooks", defaults.vcs.ensure_webhooks)?
            .set_default(
                "pipeline.max_concurrent_checks",
                defaults.pipeline.max_concurrent_checks as i64,
            )?
            .set_default("pipeline.max_queue_size", defaults.pipeline.max_queue_size as i64)?
            .set_default(
                "pipeline.max_repo_worker_queue_size",
                defaults.pipeline.max_repo_worker_queue_size as i64,
            )?
            .set_default(
                "pipeline.repo_refresh_interval_secs",
                defaults.pipeline.repo_refresh_interval_secs as i64,
            )?
            .set_default(
                "pipeline.repo_cache_ttl_secs",
                defaults.pipeline.repo_cache_ttl_secs as i64,
            )?
            .set_default(
                "pipeline.archive_cache_ttl_secs",
                defaults.pipeline.archive_cache_ttl_secs as i64,
            )?
            .set_default(
                "pipeline.fallback_k8s_version",
                defaults.pipeline.fallback_k8s_version,
            )?
            .set_default(
                "pipeline.tidy_outdated_comments_mode",
                defaults.pipeline.tidy_outdated_comments_mode,
            )?
            .set_default(
                "pipeline.monitor_all_applications",
                defaults.pipeline.monitor_all_applications,
            )?
            .set_default("pipeline.pr_deadline_secs", defaults.pipeline.pr_deadline_secs as i64)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(Environment::with_prefix("KUBECHECKS").separator("__"));

        if let Ok(port) = env::var("PORT") {
            if let Ok(p) = port.parse::<i64>() {
                builder = builder.set_override("server.port", p)?;
            }
        }
        if let Ok(host) = env::var("HOST") {
            builder = builder.set_override("server.host", host)?;
        }

        Ok(builder.build()?.try_deserialize()?)
    }
}
