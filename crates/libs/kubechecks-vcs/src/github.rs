//! GitHub adapter for the `GitHostingClient` port (§6). One concrete
//! implementation, since a contract needs at least one adapter to be
//! exercised end to end (§1, SPEC_FULL §0.1).

use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use kubechecks_core::error::Result as CoreResult;
use kubechecks_core::model::PullRequest;
use kubechecks_core::pipeline::{CommentHandle, CommitState, GitHostingClient, HookOutcome};
use kubechecks_core::types::CloneUrl;

use crate::error::{Error, Result};
use crate::signature::verify_hmac_sha256;

/// Minimal shape of a GitHub `pull_request` webhook payload — only the
/// fields the pipeline's neutral [`PullRequest`] needs (§3).
#[derive(Debug, Deserialize)]
struct PullRequestEvent {
    action: String,
    number: u64,
    pull_request: GhPullRequest,
    repository: GhRepository,
}

#[derive(Debug, Deserialize)]
struct GhPullRequest {
    head: GhRef,
    base: GhRef,
    user: GhUser,
    labels: Vec<GhLabel>,
}

#[derive(Debug, Deserialize)]
struct GhRef {
    r#ref: String,
    sha: String,
}

#[derive(Debug, Deserialize)]
struct GhUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct GhLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct GhRepository {
    owner: GhUser,
    name: String,
    clone_url: String,
    default_branch: String,
}

/// Actions the pipeline cares about; everything else is a skip (§4.8).
const HANDLED_ACTIONS: &[&str] = &["opened", "synchronize", "reopened"];

pub struct GitHubClient {
    http: Client,
    token: String,
    bot_username: String,
}

impl GitHubClient {
    pub fn new(token: impl Into<String>, bot_username: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            token: token.into(),
            bot_username: bot_username.into(),
        }
    }

    fn api_base(&self, owner: &str, repo: &str) -> String {
        format!("https://api.github.com/repos/{owner}/{repo}")
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

#[async_trait]
impl GitHostingClient for GitHubClient {
    fn verify_hook(&self, body: &[u8], signature_header: Option<&str>, secret: &str) -> CoreResult<Vec<u8>> {
        let Some(signature) = signature_header else {
            return Err(Error::SignatureInvalid.into());
        };
        if !verify_hmac_sha256(body, signature, secret) {
            return Err(Error::SignatureInvalid.into());
        }
        Ok(body.to_vec())
    }

    fn parse_hook(&self, payload: &[u8]) -> CoreResult<HookOutcome> {
        let event: PullRequestEvent =
            serde_json::from_slice(payload).map_err(|e| Error::MalformedPayload(e.to_string()))?;

        if !HANDLED_ACTIONS.contains(&event.action.as_str()) {
            return Ok(HookOutcome::Skip(format!("unsupported pull_request action: {}", event.action)));
        }

        let clone_url = CloneUrl::parse(&event.repository.clone_url)
            .map_err(|e| Error::MalformedPayload(e.to_string()))?;

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
        &self.bot_username
    }

    fn clone_username(&self) -> &str {
        "x-access-token"
    }

    async fn changed_files(&self, pr: &PullRequest) -> CoreResult<Vec<PathBuf>> {
        let url = format!("{}/pulls/{}/files", self.api_base(&pr.owner, &pr.name), pr.check_id);
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth_header())
            .header("User-Agent", "kubechecks")
            .send()
            .await
            .map_err(Error::Api)?;

        #[derive(Deserialize)]
        struct FileEntry {
            filename: String,
        }
        let files: Vec<FileEntry> = response.json().await.map_err(Error::Api)?;
        Ok(files.into_iter().map(|f| PathBuf::from(f.filename)).collect())
    }

    async fn post_message(&self, pr: &PullRequest, body: &str) -> CoreResult<CommentHandle> {
        let url = format!("{}/issues/{}/comments", self.api_base(&pr.owner, &pr.name), pr.check_id);
        let response = self
            .http
            .post(url)
            .header("Authorization", self.auth_header())
            .header("User-Agent", "kubechecks")
            .json(&serde_json::json!({ "body": body }))
            .send()
            .await
            .map_err(Error::Api)?;

        #[derive(Deserialize)]
        struct CommentResponse {
            id: u64,
        }
        let comment: CommentResponse = response.json().await.map_err(Error::Api)?;
        // The handle packs owner/repo alongside the comment id since
        // GitHub's edit endpoint needs both, not just the id (§4.7 comment
        // identity).
        Ok(CommentHandle(format!("{}/{}#{}", pr.owner, pr.name, comment.id)))
    }

    async fn update_message(&self, handle: &CommentHandle, body: &str) -> CoreResult<()> {
        let (repo_part, comment_id) = handle
            .0
            .rsplit_once('#')
            .ok_or_else(|| Error::MalformedPayload(format!("malformed comment handle: {}", handle.0)))?;
        let url = format!("https://api.github.com/repos/{repo_part}/comments/{comment_id}");
        let _ = self
            .http
            .patch(url)
            .header("Authorization", self.auth_header())
            .header("User-Agent", "kubechecks")
            .json(&serde_json::json!({ "body": body }))
            .send()
            .await
            .map_err(Error::Api)?;
        Ok(())
    }

    async fn tidy_outdated_comments(&self, _pr: &PullRequest) -> CoreResult<()> {
        // Hide-vs-delete mode is a config concern resolved by the caller;
        // GitHub has no native "hide" primitive for issue comments, so both
        // modes currently delete. Left as a no-op placeholder for a
        // provider-specific implementation to fill in.
        Ok(())
    }

    async fn commit_status(&self, pr: &PullRequest, state: CommitState) -> CoreResult<()> {
        let url = format!("{}/statuses/{}", self.api_base(&pr.owner, &pr.name), pr.head_sha);
        let state_str = match state {
            CommitState::Pending => "pending",
            CommitState::Success => "success",
            CommitState::Failure => "failure",
            CommitState::Error => "error",
        };
        self.http
            .post(url)
            .header("Authorization", self.auth_header())
            .header("User-Agent", "kubechecks")
            .json(&serde_json::json!({ "state": state_str, "context": "kubechecks" }))
            .send()
            .await
            .map_err(Error::Api)?;
        Ok(())
    }
}
