//! Error type for the service binary's own wiring: CLI parsing, HTTP
//! handler glue, and process startup. Domain errors still come from the
//! library crates and are wrapped here rather than re-invented.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Common(#[from] kubechecks_common::Error),

    #[error(transparent)]
    Core(#[from] kubechecks_core::Error),

    #[error(transparent)]
    Vcs(#[from] kubechecks_vcs::Error),

    #[error(transparent)]
    Controller(#[from] kubechecks_controller::Error),

    #[error(transparent)]
    Kube(#[from] kube::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Only used by the CLI's `main` return type; HTTP handlers report their
/// own status codes directly rather than relying on this conversion (§4.8:
/// webhook responses have protocol-specific semantics — 200 on skip, 401 on
/// bad signature — that a blanket `IntoResponse` can't express).
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "unhandled service error");
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}
