//! Webhook Intake (§4.8) and the health/debug HTTP surface (§6).

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use serde::Serialize;
use tracing::{info, warn};

use kubechecks_core::pipeline::apply_label_filter;

use crate::state::ServiceState;

/// `POST /<prefix>/hooks/<provider>/project` (§6). `provider` is currently
/// advisory — the service is wired with one [`GitHostingClient`] adapter
/// selected at startup (`vcs-type`) — but is still validated so a
/// misconfigured webhook URL fails loudly instead of silently no-oping.
pub async fn webhook(
    State(state): State<ServiceState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> impl IntoResponse {
    if provider != state.config.vcs.vcs_type {
        return (StatusCode::BAD_REQUEST, format!("unconfigured provider {provider:?}")).into_response();
    }

    let Some(secret) = state.config.vcs.webhook_secret.as_deref() else {
        warn!("webhook received but no webhook-secret configured");
        return (StatusCode::UNAUTHORIZED, "webhook-secret not configured").into_response();
    };

    let signature = headers
        .get("X-Hub-Signature-256")
        .or_else(|| headers.get("X-Gitlab-Token"))
        .and_then(|v| v.to_str().ok());

    let payload = match state.vcs.verify_hook(&body, signature, secret) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "webhook signature verification failed");
            return (StatusCode::UNAUTHORIZED, "signature verification failed").into_response();
        }
    };

    let outcome = match state.vcs.parse_hook(&payload) {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(error = %e, "malformed webhook payload");
            return (StatusCode::BAD_REQUEST, "malformed payload").into_response();
        }
    };

    let pr = match apply_label_filter(outcome, &state.config.vcs.label_filter) {
        Ok(pr) => pr,
        Err(reason) => {
            info!(reason = %reason, "webhook event skipped");
            return StatusCode::OK.into_response();
        }
    };

    let cancel = state.runtime.shutdown_token().child_token();
    let pipeline = state.pipeline.clone();
    let display_name = pr.display_name();
    let clone_url = pr.clone_url.clone();
    let guard_state = state.clone();

    let pr_for_overflow = pr.clone();
    let job = {
        let display_name = display_name.clone();
        async move {
            let _guard = guard_state.begin_run();
            if let Err(e) = pipeline.process(&pr, cancel).await {
                warn!(pr = %display_name, error = %e, "pipeline run failed");
            }
        }
    };

    match state.repo_queues.submit(&clone_url, job).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(_) => {
            warn!(pr = %display_name, "per-repo queue overflow, inviting replan");
            let body = format!(
                "## Kubechecks\n\nToo many pending runs for this repository right now. Comment `{}` to re-trigger once the queue drains.",
                state.config.vcs.replan_comment_msg
            );
            if let Err(e) = state.vcs.post_message(&pr_for_overflow, &body).await {
                warn!(pr = %display_name, error = %e, "failed to post queue-overflow comment");
            }
            StatusCode::OK.into_response()
        }
    }
}

pub async fn live() -> StatusCode {
    StatusCode::OK
}

pub async fn ready(State(state): State<ServiceState>) -> StatusCode {
    if state.runtime.is_shutting_down() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}

#[derive(Serialize)]
struct DebugResponse {
    #[serde(flatten)]
    snapshot: kubechecks_core::index::DebugSnapshot,
}

/// `GET /debug` (§6): dumps the reverse index.
pub async fn debug(State(state): State<ServiceState>) -> impl IntoResponse {
    Json(DebugResponse { snapshot: state.index.debug_snapshot() })
}

pub async fn metrics(State(state): State<ServiceState>) -> String {
    state.metrics_handle.render()
}
