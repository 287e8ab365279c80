//! Shared infrastructure for the kubechecks workspace: configuration loading,
//! tracing setup, the shared error alias, and the explicit runtime context
//! that replaces module-level globals.

pub mod config;
pub mod context;
pub mod error;
pub mod tracing_setup;

pub use config::AppConfig;
pub use context::RuntimeContext;
pub use error::{Error, Result};
