//! Queueing (§5): one bounded FIFO per repository so concurrent PRs on the
//! same repo are processed serially (their working copies alias the same
//! clone), plus the within-PR fan-out channel that spreads affected
//! applications across a bounded worker pool.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::model::Application;
use crate::types::CloneUrl;

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
type Job = Box<dyn FnOnce() -> BoxFuture + Send>;

/// One repo's FIFO. Holding the sender keeps the worker alive; dropping the
/// last clone lets the worker loop drain and exit.
struct RepoQueue {
    sender: mpsc::Sender<Job>,
}

/// Registry of per-repo queues, created lazily on first submission (§5:
/// "a bounded queue per repository").
#[derive(Default)]
pub struct RepoQueueManager {
    queues: Mutex<HashMap<CloneUrl, Arc<RepoQueue>>>,
    max_queue_size: usize,
}

impl RepoQueueManager {
    pub fn new(max_queue_size: usize) -> Self {
        Self { queues: Mutex::new(HashMap::new()), max_queue_size }
    }

    fn queue_for(&self, repo_url: &CloneUrl) -> Arc<RepoQueue> {
        let mut queues = self.queues.lock().unwrap_or_else(|p| p.into_inner());
        queues
            .entry(repo_url.clone())
            .or_insert_with(|| {
                let (sender, receiver) = mpsc::channel::<Job>(self.max_queue_size);
                tokio::spawn(worker_loop(receiver));
                Arc::new(RepoQueue { sender })
            })
            .clone()
    }

    /// Enqueues one PR run for `repo_url`. Fails with
    /// [`Error::RepoQueueFull`] when the bounded queue has no room, which
    /// the caller turns into the overflow-comment behaviour from §5.
    pub async fn submit<F>(&self, repo_url: &CloneUrl, job: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let queue = self.queue_for(repo_url);
        let boxed: Job = Box::new(move || Box::pin(job) as BoxFuture);
        queue.sender.try_send(boxed).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => Error::RepoQueueFull { repo_url: repo_url.as_str().to_string() },
            mpsc::error::TrySendError::Closed(_) => Error::RepoQueueFull { repo_url: repo_url.as_str().to_string() },
        })
    }
}

async fn worker_loop(mut receiver: mpsc::Receiver<Job>) {
    while let Some(job) = receiver.recv().await {
        job().await;
    }
}

/// Dedups applications discovered during Fanout by structural equality
/// (§4.5 step 5: "an app re-queued with an unchanged definition is dropped
/// silently; one whose definition changed replaces the queued entry").
#[derive(Default)]
pub struct SeenApps {
    seen: Mutex<HashMap<String, Application>>,
}

impl SeenApps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `app` is newly seen or has changed since it was
    /// last seen, meaning the caller should queue it.
    pub fn observe(&self, app: &Application) -> bool {
        let mut seen = self.seen.lock().unwrap_or_else(|p| p.into_inner());
        match seen.get(&app.name) {
            Some(existing) if existing.structurally_equal(app) => false,
            _ => {
                seen.insert(app.name.clone(), app.clone());
                true
            }
        }
    }

    pub fn forget(&self, name: &str) {
        self.seen.lock().unwrap_or_else(|p| p.into_inner()).remove(name);
    }
}

/// Sizes the within-PR worker pool per §5: `min(maxConcurrentChecks,
/// |affectedApps|) + 1`, the `+1` so a slow app doesn't stall a
/// just-discovered app-of-apps child from starting.
pub fn worker_pool_size(max_concurrent_checks: usize, affected_app_count: usize) -> usize {
    max_concurrent_checks.min(affected_app_count.max(1)) + 1
}

/// The within-PR app channel: buffered to `2 * |affectedApps|` so a burst of
/// app-of-apps discoveries never blocks a Runner task trying to queue a
/// child app (§5).
pub fn app_channel(affected_app_count: usize) -> (mpsc::Sender<Application>, mpsc::Receiver<Application>) {
    let capacity = (affected_app_count * 2).max(2);
    mpsc::channel(capacity)
}
