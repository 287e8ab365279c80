use std::path::PathBuf;
use std::time::Instant;

use crate::types::CloneUrl;

/// An on-disk clone keyed by `(canonical clone URL, ref)` (§3). Owned
/// exclusively by the Repo Manager; pipelines only ever borrow a handle.
#[derive(Debug, Clone)]
pub struct Repo {
    pub clone_url: CloneUrl,
    pub r#ref: String,
    pub local_path: PathBuf,
    pub last_used: Instant,
}

impl Repo {
    pub fn touch(&mut self) {
        self.last_used = Instant::now();
    }

    pub fn is_idle_past(&self, ttl: std::time::Duration) -> bool {
        self.last_used.elapsed() > ttl
    }

    pub fn key(&self) -> (CloneUrl, String) {
        (self.clone_url.clone(), self.r#ref.clone())
    }
}
