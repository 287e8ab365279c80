//! Message Aggregator (§4.7): a concurrency-safe front for [`Message`],
//! since multiple per-app check tasks append to it at once during Fanout.

use std::sync::Mutex;

use crate::model::{CheckResult, Message, State};

/// Shared handle every Runner task and the pipeline driver hold onto.
/// `std::sync::Mutex` rather than `tokio::sync::Mutex` — every critical
/// section here is a short, non-blocking `Vec`/`String` mutation, so an
/// async mutex would only add overhead without adding safety (teacher's
/// `lib-core` makes the same call for its in-memory caches).
#[derive(Default)]
pub struct Aggregator {
    message: Mutex<Message>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self { message: Mutex::new(Message::new()) }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Message> {
        self.message.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_new_app(&self, name: &str) {
        self.lock().add_new_app(name);
    }

    pub fn add_to_app_message(&self, name: &str, result: CheckResult) {
        self.lock().add_to_app_message(name, result);
    }

    pub fn remove_app(&self, name: &str) {
        self.lock().remove_app(name);
    }

    pub fn worst_state(&self) -> State {
        self.lock().worst_state()
    }

    pub fn build_comment(&self) -> String {
        self.lock().build_comment()
    }

    pub fn comment_id(&self) -> Option<String> {
        self.lock().comment_id.clone()
    }

    pub fn set_comment_id(&self, id: String) {
        self.lock().comment_id = Some(id);
    }
}
