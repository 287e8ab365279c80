pub mod application_index;
pub mod matcher;

pub use application_index::{ApplicationIndex, DebugSnapshot};
pub use matcher::affected_apps;
