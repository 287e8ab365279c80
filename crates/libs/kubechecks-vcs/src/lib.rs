//! The Git hosting client contract (§6) and a GitHub adapter implementing
//! it. Only the contract is deeply specified (§1); this crate's adapter
//! exists so the contract can be exercised end to end.

pub mod error;
pub mod github;
pub mod signature;

pub use error::{Error, Result};
pub use github::GitHubClient;
