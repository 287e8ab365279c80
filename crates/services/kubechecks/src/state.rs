//! Shared state for the HTTP surface (§6). Bundles the Check Pipeline, the
//! live Application Index, the Git hosting adapter (needed directly by the
//! webhook handler for signature verification and the replan-overflow
//! comment), the per-repo queue, and the bits of [`RuntimeContext`] the
//! handlers read (in-flight counter, shutdown token).

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusHandle;

use kubechecks_common::config::AppConfig;
use kubechecks_common::context::RuntimeContext;
use kubechecks_core::index::ApplicationIndex;
use kubechecks_core::pipeline::{GitHostingClient, Pipeline, RepoQueueManager};

#[derive(Clone)]
pub struct ServiceState {
    pub pipeline: Arc<Pipeline>,
    pub vcs: Arc<dyn GitHostingClient>,
    pub index: Arc<ApplicationIndex>,
    pub repo_queues: Arc<RepoQueueManager>,
    pub runtime: RuntimeContext,
    pub config: Arc<AppConfig>,
    pub metrics_handle: PrometheusHandle,
    pub start_time: Instant,
    pub in_flight: Arc<AtomicUsize>,
}

impl ServiceState {
    pub fn begin_run(&self) -> InFlightGuard {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        InFlightGuard { counter: self.in_flight.clone() }
    }
}

/// Decrements the in-flight counter on drop, so a run that errors out still
/// releases its slot (§6: "An `in-flight` counter is exposed for
/// readiness").
pub struct InFlightGuard {
    counter: Arc<AtomicUsize>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}
