//! Concrete [`Check`](kubechecks_core::pipeline::Check) implementations.
//! Only a check's interface and composition contract are specified (§1);
//! these four exist so the Runner can be exercised end to end: live-cluster
//! diff, schema validation (kubeconform), policy (conftest), and
//! pre-upgrade API deprecation (kubepug).

pub mod diff;
pub mod error;
pub mod manifests;
pub mod policy;
pub mod preupgrade;
pub mod schema;

pub use diff::DiffCheck;
pub use error::{Error, Result};
pub use policy::ConftestCheck;
pub use preupgrade::KubepugCheck;
pub use schema::KubeconformCheck;
