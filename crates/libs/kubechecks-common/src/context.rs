//! Explicit runtime context, threaded through call sites instead of living as
//! module-level globals (hostname, process-wide cancellation).

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Process-wide state that would otherwise be a handful of `static`s: the
/// host this instance runs on, a per-process instance id for log
/// correlation, and the cancellation token that propagates shutdown into
/// every long-running task instead of relying on task aborts.
#[derive(Clone, Debug)]
pub struct RuntimeContext {
    hostname: String,
    instance_id: Uuid,
    shutdown: CancellationToken,
}

impl RuntimeContext {
    /// Builds a context for a freshly started process. `hostname` is
    /// resolved once at startup; passing it in keeps this constructor
    /// infallible and testable.
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            instance_id: Uuid::new_v4(),
            shutdown: CancellationToken::new(),
        }
    }

    /// A context suitable for unit/integration tests where the identity of
    /// the host doesn't matter.
    pub fn for_test() -> Self {
        Self::new("test-host")
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// Token that every long-running task (repo workers, the webhook
    /// intake loop, the periodic refresh sweep) should select on alongside
    /// its own work, so a single call to [`RuntimeContext::shutdown`]
    /// drains the whole process.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Begins graceful shutdown. Idempotent.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}
