pub mod kustomize;
pub mod repo_manager;
pub mod resource_cache;

pub use kustomize::KustomizeGraph;
pub use repo_manager::RepoManager;
