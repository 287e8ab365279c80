//! Black-box scenario tests exercising §8's end-to-end scenarios against
//! an in-process server with faked collaborators (SPEC_FULL §0.1).
//!
//! Everything here drives either the real HTTP router (`kubechecks::build_router`)
//! via `tower::ServiceExt::oneshot`, or the real core components (Application
//! Index, Affected-Apps Matcher, Repo Manager's local git operations, the
//! Runner/queue primitives) directly — never a real network call, so the
//! suite runs hermetically.

pub mod fixtures;

pub use fixtures::{FakeDeliveryController, FakeGitHosting, github_pr_payload, sign_body, test_service_state};
