use serde::{Deserialize, Serialize};

/// Ordered outcome of a single check, or the rollup over many (§3).
/// Ordering is significant: `WorstState` and clamp logic both rely on
/// `State`'s `Ord` impl, derived directly from declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    Success,
    Warning,
    Failure,
    Error,
    Panic,
}

impl State {
    pub fn is_passing(self) -> bool {
        matches!(self, State::Success)
    }

    /// Clamps `self` down to `ceiling` for messaging purposes, per the
    /// Runner's `worstAllowedState` contract (§4.6). The true state is kept
    /// alongside for rollup by the caller — clamping only affects what this
    /// function returns, not what gets recorded.
    pub fn clamp_to(self, ceiling: State) -> State {
        self.min(ceiling)
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            State::Success => "success",
            State::Warning => "warning",
            State::Failure => "failure",
            State::Error => "error",
            State::Panic => "panic",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for State {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "success" => Ok(State::Success),
            "warning" => Ok(State::Warning),
            "failure" => Ok(State::Failure),
            "error" => Ok(State::Error),
            "panic" => Ok(State::Panic),
            other => Err(format!("unknown check state: {other}")),
        }
    }
}

/// Outcome of one check run against one application.
///
/// `state` is the true severity the check produced and is what rollup
/// (`WorstState`, commit status) is computed from. `display_state` is what
/// gets rendered in the comment text; the Runner sets the two apart when a
/// `worstAllowedState` clamp applies (§4.6) — the comment shows the
/// clamped, "best-effort" severity while the real one still counts toward
/// the run's overall result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub check_name: String,
    pub state: State,
    pub display_state: State,
    pub summary: String,
    pub details: String,
}

impl CheckResult {
    pub fn new(check_name: impl Into<String>, state: State, summary: impl Into<String>) -> Self {
        Self {
            check_name: check_name.into(),
            state,
            display_state: state,
            summary: summary.into(),
            details: String::new(),
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }

    /// Clamps `display_state` to `ceiling` without changing `state`, the
    /// field rollup/commit-status computation reads (§4.6).
    pub fn clamped_for_display(mut self, ceiling: State) -> Self {
        self.display_state = self.display_state.clamp_to(ceiling);
        self
    }

    pub fn success(check_name: impl Into<String>, summary: impl Into<String>) -> Self {
        Self::new(check_name, State::Success, summary)
    }

    pub fn error(check_name: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::new(check_name, State::Error, "check returned an error").with_details(err.to_string())
    }

    pub fn panicked(check_name: impl Into<String>, stack: impl Into<String>) -> Self {
        Self::new(check_name, State::Panic, "check panicked").with_details(stack.into())
    }
}

/// Worst-state rollup over a collection of results, per the `max` semantics
/// in §8 invariant 2. Returns `Success` for an empty slice, matching the
/// "no results recorded yet" case rather than an absent state.
pub fn worst_state<'a>(results: impl IntoIterator<Item = &'a CheckResult>) -> State {
    results
        .into_iter()
        .map(|r| r.state)
        .max()
        .unwrap_or(State::Success)
}
