pub mod application;
pub mod application_set;
pub mod check_result;
pub mod message;
pub mod pull_request;
pub mod repo;

pub use application::{Application, ApplicationSource};
pub use application_set::{ApplicationSet, ApplicationTemplate, Generator};
pub use check_result::{CheckResult, State, worst_state};
pub use message::{AppSection, Message};
pub use pull_request::PullRequest;
pub use repo::Repo;

use serde::{Deserialize, Serialize};

/// `(applications, appsets)` union, deduplicated by name (§3, §4.4).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AffectedItems {
    pub applications: Vec<Application>,
    pub appsets: Vec<ApplicationSet>,
}

impl AffectedItems {
    pub fn is_empty(&self) -> bool {
        self.applications.is_empty() && self.appsets.is_empty()
    }

    /// Unions `other` into `self`, deduping applications by name. Per §4.4,
    /// when both sides carry an entry for the same name the existing
    /// (index-sourced) entry wins, since it carries richer source info.
    pub fn union_prefer_existing(mut self, other: AffectedItems) -> Self {
        for app in other.applications {
            if !self.applications.iter().any(|a| a.name == app.name) {
                self.applications.push(app);
            }
        }
        for appset in other.appsets {
            if !self.appsets.iter().any(|a| a.name == appset.name) {
                self.appsets.push(appset);
            }
        }
        self
    }
}
