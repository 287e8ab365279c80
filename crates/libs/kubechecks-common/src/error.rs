//! Shared error type for the binary-level wiring crates.
//!
//! Domain crates (`kubechecks-core`, `kubechecks-vcs`, `kubechecks-controller`)
//! define their own error enums; this one exists for the config/tracing/server
//! wiring layer that doesn't belong to any single domain crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
