//! §4.8 Webhook Intake: signature verification, label filtering, and
//! per-repo queue overflow, driven over the real HTTP router.

use std::sync::Arc;
use std::time::Duration;

use tower::ServiceExt;

use e2e_tests::{FakeDeliveryController, FakeGitHosting, github_pr_payload, sign_body, test_service_state};
use kubechecks_common::config::AppConfig;
use kubechecks_core::index::ApplicationIndex;

const SECRET: &str = "s3cr3t";

fn config() -> AppConfig {
    let mut config = AppConfig::default();
    config.vcs.webhook_secret = Some(SECRET.to_string());
    config.vcs.vcs_type = "github".to_string();
    config
}

fn post(path: &str, body: Vec<u8>, signature: Option<String>) -> axum::http::Request<axum::body::Body> {
    let mut builder = axum::http::Request::builder().method("POST").uri(path);
    if let Some(sig) = signature {
        builder = builder.header("X-Hub-Signature-256", sig);
    }
    builder.body(axum::body::Body::from(body)).unwrap()
}

#[tokio::test]
async fn missing_signature_is_rejected_with_401() {
    let vcs = Arc::new(FakeGitHosting::new());
    let controller = Arc::new(FakeDeliveryController::new());
    let index = Arc::new(ApplicationIndex::new());
    let state = test_service_state(vcs, controller, index, Vec::new(), config());
    let app = kubechecks::build_router(state, "kubechecks");

    let body = github_pr_payload("opened", 1, &[], "https://github.com/acme/widgets");
    let request = post("/kubechecks/hooks/github/project", body, None);
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_secret_is_rejected_with_401() {
    let vcs = Arc::new(FakeGitHosting::new());
    let controller = Arc::new(FakeDeliveryController::new());
    let index = Arc::new(ApplicationIndex::new());
    let state = test_service_state(vcs, controller, index, Vec::new(), config());
    let app = kubechecks::build_router(state, "kubechecks");

    let body = github_pr_payload("opened", 1, &[], "https://github.com/acme/widgets");
    let bad_signature = sign_body(&body, "wrong-secret");
    let request = post("/kubechecks/hooks/github/project", body, Some(bad_signature));
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_payload_is_rejected_with_400() {
    let vcs = Arc::new(FakeGitHosting::new());
    let controller = Arc::new(FakeDeliveryController::new());
    let index = Arc::new(ApplicationIndex::new());
    let state = test_service_state(vcs, controller, index, Vec::new(), config());
    let app = kubechecks::build_router(state, "kubechecks");

    let body = b"not json".to_vec();
    let signature = sign_body(&body, SECRET);
    let request = post("/kubechecks/hooks/github/project", body, Some(signature));
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unsupported_action_is_skipped_with_200_and_no_work() {
    let vcs = Arc::new(FakeGitHosting::new());
    let controller = Arc::new(FakeDeliveryController::new());
    let index = Arc::new(ApplicationIndex::new());
    let state = test_service_state(vcs, controller, index, Vec::new(), config());
    let app = kubechecks::build_router(state, "kubechecks");

    let body = github_pr_payload("closed", 1, &[], "https://github.com/acme/widgets");
    let signature = sign_body(&body, SECRET);
    let request = post("/kubechecks/hooks/github/project", body, Some(signature));
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);
}

/// Scenario 5 (§8): a PR with a `kubechecks:*` label that doesn't match
/// the configured filter is rejected regardless of other labels.
#[tokio::test]
async fn mismatched_label_filter_is_skipped_with_200_and_no_post() {
    let vcs = Arc::new(FakeGitHosting::new());
    let controller = Arc::new(FakeDeliveryController::new());
    let index = Arc::new(ApplicationIndex::new());
    let mut cfg = config();
    cfg.vcs.label_filter = "prod".to_string();
    let state = test_service_state(vcs.clone(), controller, index, Vec::new(), cfg);
    let app = kubechecks::build_router(state, "kubechecks");

    let body = github_pr_payload("opened", 1, &["kubechecks:dev"], "https://github.com/acme/widgets");
    let signature = sign_body(&body, SECRET);
    let request = post("/kubechecks/hooks/github/project", body, Some(signature));
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);

    // Filtered events never reach the pipeline, so nothing was ever posted.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(vcs.posted_bodies().is_empty());
}

#[tokio::test]
async fn accepted_event_is_queued_and_returns_200() {
    let vcs = Arc::new(FakeGitHosting::new());
    let controller = Arc::new(FakeDeliveryController::new());
    let index = Arc::new(ApplicationIndex::new());
    let state = test_service_state(vcs, controller, index, Vec::new(), config());
    let app = kubechecks::build_router(state, "kubechecks");

    let body = github_pr_payload("opened", 7, &[], "https://example.invalid/acme/widgets");
    let signature = sign_body(&body, SECRET);
    let request = post("/kubechecks/hooks/github/project", body, Some(signature));
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);
}

/// Scenario 6 (§8): two rapid PRs on the same repo with a per-repo queue
/// depth of one. Both webhook calls return 200; the second is told to
/// replan rather than blocking until the first drains.
#[tokio::test]
async fn same_repo_queue_overflow_invites_replan_but_still_returns_200() {
    let vcs = Arc::new(FakeGitHosting::new());
    let controller = Arc::new(FakeDeliveryController::new());
    let index = Arc::new(ApplicationIndex::new());
    let mut cfg = config();
    cfg.pipeline.max_repo_worker_queue_size = 1;
    cfg.vcs.replan_comment_msg = "kubechecks run".to_string();
    let state = test_service_state(vcs.clone(), controller, index, Vec::new(), cfg);
    let app = kubechecks::build_router(state, "kubechecks");

    let clone_url = "https://example.invalid/acme/widgets";
    let first = github_pr_payload("opened", 1, &[], clone_url);
    let first_sig = sign_body(&first, SECRET);
    let second = github_pr_payload("opened", 2, &[], clone_url);
    let second_sig = sign_body(&second, SECRET);
    let third = github_pr_payload("opened", 3, &[], clone_url);
    let third_sig = sign_body(&third, SECRET);

    let r1 = app
        .clone()
        .oneshot(post("/kubechecks/hooks/github/project", first, Some(first_sig)))
        .await
        .unwrap();
    assert_eq!(r1.status(), axum::http::StatusCode::OK);

    let r2 = app
        .clone()
        .oneshot(post("/kubechecks/hooks/github/project", second, Some(second_sig)))
        .await
        .unwrap();
    assert_eq!(r2.status(), axum::http::StatusCode::OK);

    // The per-repo queue depth is 1, and both of the above submissions may
    // have already been claimed by the worker; send one more to guarantee
    // we observe an overflow regardless of scheduling timing.
    let r3 = app
        .oneshot(post("/kubechecks/hooks/github/project", third, Some(third_sig)))
        .await
        .unwrap();
    assert_eq!(r3.status(), axum::http::StatusCode::OK);

    // At least one of the three submissions overflowed the depth-1 queue
    // and should have posted a replan-inviting comment.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(vcs.posted_bodies().iter().any(|b| b.contains("kubechecks run")));
}
