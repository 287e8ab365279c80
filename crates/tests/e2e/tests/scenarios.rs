//! §8 end-to-end scenarios, each driven against the real core component
//! responsible for it rather than a full webhook round-trip, so the suite
//! stays hermetic while still exercising production code paths.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use kubechecks_core::index::ApplicationIndex;
use kubechecks_core::model::{Application, ApplicationSource, CheckResult, State};
use kubechecks_core::pipeline::runner::run_all;
use kubechecks_core::pipeline::{Check, CheckRequest, CheckSpec, SeenApps};
use kubechecks_core::store::repo_manager::RepoManager;
use kubechecks_core::types::CloneUrl;

fn app(name: &str, path: &str) -> Application {
    Application {
        name: name.to_string(),
        project: "default".to_string(),
        destination_cluster: "in-cluster".to_string(),
        primary_source: ApplicationSource {
            repo_url: CloneUrl::parse("https://github.com/acme/gitops").unwrap(),
            path: path.to_string(),
            target_revision: "main".to_string(),
            helm_value_files: vec!["values.yaml".to_string()],
            helm_file_parameters: Vec::new(),
        },
        additional_sources: Vec::new(),
    }
}

/// Scenario 1 (§8): a Helm value file change affects exactly the one app
/// whose source tree owns it.
#[test]
fn scenario_1_helm_value_change_affects_one_app() {
    let tmp = tempfile::TempDir::new().unwrap();
    std::fs::create_dir_all(tmp.path().join("charts/web")).unwrap();
    std::fs::write(tmp.path().join("charts/web/values.yaml"), "replicas: 3\n").unwrap();

    let index = ApplicationIndex::new();
    index.add_app(app("web", "charts/web"), tmp.path()).unwrap();
    index.add_app(app("api", "charts/api"), tmp.path()).unwrap();

    let repo_url = CloneUrl::parse("https://github.com/acme/gitops").unwrap();
    let affected =
        index.find_apps_affected_by(&repo_url, &[PathBuf::from("charts/web/values.yaml")]);

    assert_eq!(affected.applications.len(), 1);
    assert_eq!(affected.applications[0].name, "web");
}

/// Scenario 2 (§8): a change to a shared kustomize base affects every
/// overlay that transitively references it.
#[test]
fn scenario_2_kustomize_base_change_affects_both_overlays() {
    let tmp = tempfile::TempDir::new().unwrap();
    let root = tmp.path();

    std::fs::create_dir_all(root.join("base")).unwrap();
    std::fs::write(root.join("base/kustomization.yaml"), "resources:\n  - deploy.yaml\n").unwrap();
    std::fs::write(root.join("base/deploy.yaml"), "kind: Deployment\n").unwrap();

    for overlay in ["overlays/a", "overlays/b"] {
        std::fs::create_dir_all(root.join(overlay)).unwrap();
        std::fs::write(
            root.join(overlay).join("kustomization.yaml"),
            "resources:\n  - ../../base\n",
        )
        .unwrap();
    }

    let index = ApplicationIndex::new();
    index.add_app(app("a", "overlays/a"), root).unwrap();
    index.add_app(app("b", "overlays/b"), root).unwrap();

    let repo_url = CloneUrl::parse("https://github.com/acme/gitops").unwrap();
    let affected = index.find_apps_affected_by(&repo_url, &[PathBuf::from("base/deploy.yaml")]);

    let mut names: Vec<&str> = affected.applications.iter().map(|a| a.name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["a", "b"]);
}

/// Scenario 3 (§8): merging the PR's base branch into the head produces a
/// real, recoverable conflict rather than a fatal pipeline error.
#[tokio::test]
async fn scenario_3_merge_conflict_is_recoverable() {
    let tmp = tempfile::TempDir::new().unwrap();
    let repo = git2::Repository::init(tmp.path()).unwrap();

    let sig = git2::Signature::now("tester", "tester@localhost").unwrap();
    std::fs::write(tmp.path().join("values.yaml"), "replicas: 1\n").unwrap();
    let base_oid = {
        let mut index = repo.index().unwrap();
        index.add_path(std::path::Path::new("values.yaml")).unwrap();
        let tree_oid = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_oid).unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "base", &tree, &[]).unwrap()
    };

    // base branch diverges: bumps replicas to 2.
    std::fs::write(tmp.path().join("values.yaml"), "replicas: 2\n").unwrap();
    let base_commit = repo.find_commit(base_oid).unwrap();
    let base_branch_oid = {
        let mut index = repo.index().unwrap();
        index.add_path(std::path::Path::new("values.yaml")).unwrap();
        let tree_oid = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_oid).unwrap();
        repo.commit(None, &sig, &sig, "base bumps replicas", &tree, &[&base_commit]).unwrap()
    };

    // head branch (currently checked out) diverges the other way: bumps to 9.
    repo.reset(&repo.find_object(base_oid, None).unwrap(), git2::ResetType::Hard, None).unwrap();
    std::fs::write(tmp.path().join("values.yaml"), "replicas: 9\n").unwrap();
    {
        let mut index = repo.index().unwrap();
        index.add_path(std::path::Path::new("values.yaml")).unwrap();
        let tree_oid = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_oid).unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "head bumps replicas", &tree, &[&base_commit]).unwrap();
    }

    let repo_manager = RepoManager::new(tmp.path().join("unused"));
    let clone_url = CloneUrl::parse("https://github.com/acme/gitops").unwrap();
    let handle = kubechecks_core::model::Repo {
        clone_url,
        r#ref: "feature".to_string(),
        local_path: tmp.path().to_path_buf(),
        last_used: std::time::Instant::now(),
    };

    let result = repo_manager.merge_into(&handle, "main", &base_branch_oid.to_string()).await;
    let err = result.expect_err("diverging edits to the same line must conflict");
    assert!(err.is_recoverable(), "a merge conflict should be treated as recoverable: {err}");
}

struct QueuesChild {
    queue_app: Arc<dyn Fn() + Send + Sync>,
}

#[async_trait]
impl Check for QueuesChild {
    fn name(&self) -> &str {
        "app-of-apps"
    }

    async fn run(&self, request: &CheckRequest) -> anyhow::Result<CheckResult> {
        (request.queue_app)(app("child", "charts/child"));
        (self.queue_app)();
        Ok(CheckResult::success("app-of-apps", "discovered 1 child app"))
    }
}

/// Scenario 4 (§8): an app-of-apps parent discovers a child application
/// during its own check run; the child is queued once even if the same
/// definition is observed again on a later pass.
#[tokio::test]
async fn scenario_4_app_of_apps_child_is_queued_once() {
    let discoveries = Arc::new(AtomicUsize::new(0));
    let seen = SeenApps::new();

    let discoveries_for_check = discoveries.clone();
    let checks = vec![CheckSpec {
        check: Arc::new(QueuesChild { queue_app: Arc::new(move || { discoveries_for_check.fetch_add(1, Ordering::SeqCst); }) }),
        worst_allowed_state: State::Panic,
    }];

    let queued = Arc::new(std::sync::Mutex::new(Vec::new()));
    let queued_for_request = queued.clone();
    let request = Arc::new(CheckRequest {
        app: app("parent", "charts/parent"),
        manifests_json: serde_json::Value::Null,
        kubernetes_version: "1.28.0".to_string(),
        repo_path: PathBuf::from("/tmp"),
        queue_app: Arc::new(move |child: Application| {
            if seen.observe(&child) {
                queued_for_request.lock().unwrap().push(child);
            }
        }),
        remove_app: Arc::new(|_| {}),
    });

    // Run the parent's checks twice, simulating two passes over the same
    // discovered app-of-apps child.
    let _ = run_all(&checks, request.clone()).await;
    let _ = run_all(&checks, request).await;

    assert_eq!(discoveries.load(Ordering::SeqCst), 2, "the check itself runs every pass");
    assert_eq!(queued.lock().unwrap().len(), 1, "an unchanged child app is only queued once");
}
