//! Library surface of the `kubechecks` service binary: CLI flag wiring,
//! the HTTP surface (§6), and the per-connection [`state::ServiceState`].
//! Split out from `main.rs` so the end-to-end test crate can stand up the
//! real router in-process against faked [`kubechecks_core::pipeline::GitHostingClient`]
//! / [`kubechecks_core::pipeline::DeliveryControllerClient`] adapters instead of
//! driving it through an actual TCP listener and a live provider.

pub mod cli;
pub mod error;
pub mod handlers;
pub mod state;

use axum::Router;
use axum::routing::{get, post};

use crate::state::ServiceState;

/// Assembles the HTTP surface (§6) described in SPEC_FULL §0.1: the
/// provider webhook endpoint, health probes, the debug index dump, and
/// Prometheus metrics, all sharing one [`ServiceState`].
pub fn build_router(state: ServiceState, webhook_prefix: &str) -> Router {
    let webhook_path = format!("/{webhook_prefix}/hooks/{{provider}}/project");
    Router::new()
        .route(&webhook_path, post(handlers::webhook))
        .route("/live", get(handlers::live))
        .route("/ready", get(handlers::ready))
        .route("/debug", get(handlers::debug))
        .route("/metrics", get(handlers::metrics))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}
