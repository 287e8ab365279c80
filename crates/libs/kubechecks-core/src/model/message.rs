use serde::{Deserialize, Serialize};

use crate::model::check_result::{CheckResult, State, worst_state};

/// One application's slice of the aggregated PR comment (§3): its rollup
/// state plus the ordered list of check results as they complete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSection {
    pub app_name: String,
    pub results: Vec<CheckResult>,
}

impl AppSection {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            results: Vec::new(),
        }
    }

    pub fn state(&self) -> State {
        worst_state(&self.results)
    }
}

/// The single PR comment this service maintains per PR (§3, §4.7).
///
/// Invariants upheld by construction: at most one section per app name
/// (enforced by [`Message::add_new_app`]/[`Message::add_to_app_message`]);
/// sections stay in first-enqueued order; within a section, results stay in
/// completion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Message {
    sections: Vec<AppSection>,
    /// Remote comment id once the first post has gone out; `None` before
    /// the first post or after a provider-forced re-post (§4.7).
    pub comment_id: Option<String>,
}

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent: adding an app already present is a no-op (§4.7).
    pub fn add_new_app(&mut self, name: &str) {
        if !self.sections.iter().any(|s| s.app_name == name) {
            self.sections.push(AppSection::new(name));
        }
    }

    pub fn add_to_app_message(&mut self, name: &str, result: CheckResult) {
        self.add_new_app(name);
        let section = self
            .sections
            .iter_mut()
            .find(|s| s.app_name == name)
            .expect("add_new_app above guarantees the section exists");
        section.results.push(result);
    }

    pub fn remove_app(&mut self, name: &str) {
        self.sections.retain(|s| s.app_name != name);
    }

    pub fn sections(&self) -> &[AppSection] {
        &self.sections
    }

    /// Worst state over every recorded result, computable in O(sections)
    /// per §3's invariant.
    pub fn worst_state(&self) -> State {
        self.sections
            .iter()
            .map(|s| s.state())
            .max()
            .unwrap_or(State::Success)
    }

    /// Deterministic Markdown rendering of the current state (§4.7:
    /// `BuildComment` must be deterministic and, per §8 invariant 3, two
    /// runs with identical inputs produce identical bodies).
    pub fn build_comment(&self) -> String {
        if self.sections.is_empty() {
            return "## Kubechecks\n\nNo changes affecting any application.".to_string();
        }

        let mut out = String::from("## Kubechecks\n\n");
        out.push_str(&format!("**Overall: {}**\n\n", self.worst_state()));
        for section in &self.sections {
            out.push_str(&format!("### {} — {}\n\n", section.app_name, section.state()));
            for result in &section.results {
                out.push_str(&format!("- `{}`: {} — {}\n", result.check_name, result.display_state, result.summary));
            }
            out.push('\n');
        }
        out
    }
}
