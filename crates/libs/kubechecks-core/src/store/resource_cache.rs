//! Resource Cache (§4.9): a single background ticker that sweeps the Repo
//! Manager's on-disk directories for TTL expiry. Stat/read access is safe
//! for concurrent callers; modification stays serialized per entry by the
//! Repo Manager's own per-key mutex.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::store::repo_manager::RepoManager;

/// Runs `manager.sweep_idle(ttl)` on a fixed interval until `shutdown` is
/// cancelled. TTL deletion is best-effort and never fatal (§4.1): any sweep
/// error is swallowed inside `sweep_idle` itself and only logged.
pub async fn run_ttl_sweeper(manager: Arc<RepoManager>, ttl: Duration, interval: Duration, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("resource cache sweeper shutting down");
                return;
            }
            _ = ticker.tick() => {
                manager.sweep_idle(ttl).await;
            }
        }
    }
}
