pub mod generator;
pub mod template;

pub use generator::{Cluster, ClusterView, generate};
