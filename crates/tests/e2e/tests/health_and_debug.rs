//! §6 HTTP surface: health probes and the debug index dump.

use std::sync::Arc;

use http_body_util::BodyExt;
use tower::ServiceExt;

use e2e_tests::{FakeDeliveryController, FakeGitHosting, test_service_state};
use kubechecks_common::config::AppConfig;
use kubechecks_core::index::ApplicationIndex;
use kubechecks_core::model::{Application, ApplicationSource};
use kubechecks_core::types::CloneUrl;

fn router() -> axum::Router {
    let vcs = Arc::new(FakeGitHosting::new());
    let controller = Arc::new(FakeDeliveryController::new());
    let index = Arc::new(ApplicationIndex::new());
    let state = test_service_state(vcs, controller, index, Vec::new(), AppConfig::default());
    kubechecks::build_router(state, "kubechecks")
}

#[tokio::test]
async fn live_is_bodyless_200() {
    let app = router();
    let request = axum::http::Request::builder().uri("/live").body(axum::body::Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(body.is_empty());
}

#[tokio::test]
async fn ready_is_200_before_shutdown() {
    let app = router();
    let request = axum::http::Request::builder().uri("/ready").body(axum::body::Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);
}

#[tokio::test]
async fn ready_is_503_once_shutdown_begins() {
    let vcs = Arc::new(FakeGitHosting::new());
    let controller = Arc::new(FakeDeliveryController::new());
    let index = Arc::new(ApplicationIndex::new());
    let state = test_service_state(vcs, controller, index, Vec::new(), AppConfig::default());
    state.runtime.shutdown();
    let app = kubechecks::build_router(state, "kubechecks");

    let request = axum::http::Request::builder().uri("/ready").body(axum::body::Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn debug_reflects_indexed_applications() {
    let vcs = Arc::new(FakeGitHosting::new());
    let controller = Arc::new(FakeDeliveryController::new());
    let index = Arc::new(ApplicationIndex::new());

    let repo_url = CloneUrl::parse("https://github.com/acme/gitops").unwrap();
    index
        .add_app(
            Application {
                name: "web".to_string(),
                project: "default".to_string(),
                destination_cluster: "in-cluster".to_string(),
                primary_source: ApplicationSource {
                    repo_url,
                    path: "charts/web".to_string(),
                    target_revision: "main".to_string(),
                    helm_value_files: vec!["env/prod.yaml".to_string()],
                    helm_file_parameters: Vec::new(),
                },
                additional_sources: Vec::new(),
            },
            std::path::Path::new("/nonexistent"),
        )
        .unwrap();

    let state = test_service_state(vcs, controller, index, Vec::new(), AppConfig::default());
    let app = kubechecks::build_router(state, "kubechecks");

    let request = axum::http::Request::builder().uri("/debug").body(axum::body::Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let dump = json.to_string();
    assert!(dump.contains("web"), "debug dump should mention the indexed app: {dump}");
}

#[tokio::test]
async fn metrics_endpoint_returns_prometheus_text() {
    let app = router();
    let request = axum::http::Request::builder().uri("/metrics").body(axum::body::Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);
}
