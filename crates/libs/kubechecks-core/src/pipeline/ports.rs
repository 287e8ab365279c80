//! The two external collaborators the Check Pipeline depends on (§6),
//! expressed as traits so this crate never depends on `kubechecks-vcs` or
//! `kubechecks-controller` — they depend on this crate and implement these
//! ports instead.

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{Application, ApplicationSet, PullRequest};

/// A provider-scoped handle to a posted comment, opaque to the pipeline —
/// only the adapter that produced it knows how to address it again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentHandle(pub String);

/// `CommitStatus(pr, state)` states (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitState {
    Pending,
    Success,
    Failure,
    Error,
}

/// Outcome of `ParseHook`: either a neutral [`PullRequest`] ready for the
/// pipeline, or an acknowledged no-op (§4.8: "Skipped events... are
/// acknowledged with HTTP 200 and no work").
pub enum HookOutcome {
    Process(PullRequest),
    Skip(String),
}

/// The Git hosting client contract (§6): posting comments, reading
/// webhooks, cloning usernames. Cloning itself is delegated to the Repo
/// Manager; this port only covers what the pipeline needs directly from
/// the provider API.
#[async_trait]
pub trait GitHostingClient: Send + Sync {
    /// Verifies an inbound webhook's signature against `secret`, returning
    /// the raw payload bytes on success. A signature failure must surface
    /// as HTTP 401 (§6), not a generic error.
    fn verify_hook(&self, body: &[u8], signature_header: Option<&str>, secret: &str) -> Result<Vec<u8>>;

    /// Parses a verified payload into a neutral [`PullRequest`] or a
    /// [`HookOutcome::Skip`] for events this service doesn't act on.
    fn parse_hook(&self, payload: &[u8]) -> Result<HookOutcome>;

    /// Identity used when posting as this service (comment attribution,
    /// commit-status author).
    fn username(&self) -> &str;

    /// Identity used for authenticating git operations (distinct from
    /// `username` on some providers, e.g. a machine-user token).
    fn clone_username(&self) -> &str;

    /// Files changed by `pr`'s diff against its base, repo-root-relative.
    /// Drives Affected-Apps Matcher discovery (§4.5 step 3).
    async fn changed_files(&self, pr: &PullRequest) -> Result<Vec<std::path::PathBuf>>;

    async fn post_message(&self, pr: &PullRequest, body: &str) -> Result<CommentHandle>;
    async fn update_message(&self, handle: &CommentHandle, body: &str) -> Result<()>;

    /// Hides or deletes prior Kubechecks comments on `pr`, per the
    /// `tidy-outdated-comments-mode` config (§6), before a fresh comment is
    /// posted in a mode that can't edit in place.
    async fn tidy_outdated_comments(&self, pr: &PullRequest) -> Result<()>;

    async fn commit_status(&self, pr: &PullRequest, state: CommitState) -> Result<()>;

    /// Registers this service's webhook with the hosting provider.
    /// Optional: only exercised when `ensure-webhooks` is enabled (§6).
    async fn ensure_webhook(&self, _clone_url: &str, _target_url: &str) -> Result<()> {
        Ok(())
    }
}

/// The delivery-controller client contract (§6): listing
/// applications/appsets and rendering manifests.
#[async_trait]
pub trait DeliveryControllerClient: Send + Sync {
    async fn get_applications(&self) -> Result<Vec<Application>>;
    async fn get_application_sets(&self) -> Result<Vec<ApplicationSet>>;
    async fn get_application_by_name(&self, name: &str) -> Result<Option<Application>>;
    async fn get_applications_by_appset(&self, name: &str) -> Result<Vec<Application>>;

    /// Renders `app`'s manifests as JSON. `source_paths` gives the
    /// already-cloned working copy for each of the app's sources, obtained
    /// by the pipeline via the Repo Manager beforehand (§4.5 step 1–2) —
    /// this is the "getRepo" callback from the spec's contract, inverted
    /// into data the pipeline already resolved.
    async fn get_manifests(&self, app: &Application, source_paths: &[&Path]) -> Result<serde_json::Value>;

    async fn get_kubernetes_version_by_application(&self, app: &Application) -> Result<String>;
}
