pub mod aggregator;
pub mod pipeline;
pub mod ports;
pub mod queue;
pub mod runner;
pub mod state;

pub use aggregator::Aggregator;
pub use pipeline::{Pipeline, RunOutcome, apply_label_filter};
pub use ports::{CommentHandle, CommitState, DeliveryControllerClient, GitHostingClient, HookOutcome};
pub use queue::{RepoQueueManager, SeenApps};
pub use runner::{Check, CheckRequest, CheckSpec, QueueAppFn, RemoveAppFn};
pub use state::{AppState, PrState};
