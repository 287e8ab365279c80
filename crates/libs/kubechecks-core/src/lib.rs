//! The hard core of kubechecks: data model (§3), Repo Manager (§4.1),
//! Application Index (§4.2), AppSet Generator (§4.3), Affected-Apps Matcher
//! (§4.4), Check Pipeline (§4.5), Runner (§4.6), Message Aggregator (§4.7),
//! and the Resource Cache (§4.9).
//!
//! This crate depends on nothing outside the workspace except
//! `kubechecks-common`. It defines the two ports (`GitHostingClient`,
//! `DeliveryControllerClient`) that `kubechecks-vcs` and
//! `kubechecks-controller` implement, so the pipeline can be driven end to
//! end without this crate depending on either adapter.

pub mod appset;
pub mod config_file;
pub mod error;
pub mod index;
pub mod model;
pub mod pipeline;
pub mod store;
pub mod types;

pub use error::{Error, Result};
