//! Application Index (§4.2): an in-memory, per-repo mapping from indexed
//! paths to the applications/appsets that depend on them.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::Result;
use crate::model::{AffectedItems, Application, ApplicationSet};
use crate::store::kustomize;
use crate::types::CloneUrl;

/// Reverse index over one entity kind (applications, or appsets): which
/// directory/file paths point back to which entity names (§4.2, and the
/// shape `GET /debug` dumps per §6).
#[derive(Debug, Default, Clone)]
pub struct EntityDir {
    dirs_by_path: HashMap<PathBuf, HashSet<String>>,
    files_by_path: HashMap<PathBuf, HashSet<String>>,
    names_by_path: HashMap<String, PathBuf>,
}

impl EntityDir {
    fn index_dir(&mut self, path: &Path, name: &str) {
        self.dirs_by_path
            .entry(normalize(path))
            .or_default()
            .insert(name.to_string());
    }

    fn index_file(&mut self, path: &Path, name: &str) {
        self.files_by_path
            .entry(normalize(path))
            .or_default()
            .insert(name.to_string());
    }

    fn remove_name(&mut self, name: &str) {
        for names in self.dirs_by_path.values_mut() {
            names.remove(name);
        }
        for names in self.files_by_path.values_mut() {
            names.remove(name);
        }
        self.dirs_by_path.retain(|_, v| !v.is_empty());
        self.files_by_path.retain(|_, v| !v.is_empty());
    }

    /// Names affected by any of `changed_files`, per the affected-by rule
    /// in §4.2: a directory match is a path-prefix match on path
    /// boundaries; a file match is exact equality.
    fn affected_by(&self, changed_files: &[PathBuf]) -> BTreeSet<String> {
        let mut affected = BTreeSet::new();
        for file in changed_files {
            if let Some(names) = self.files_by_path.get(file) {
                affected.extend(names.iter().cloned());
            }
            for (dir, names) in &self.dirs_by_path {
                if is_prefix(dir, file) {
                    affected.extend(names.iter().cloned());
                }
            }
        }
        affected
    }

    pub fn dirs_by_name(&self) -> &HashMap<PathBuf, HashSet<String>> {
        &self.dirs_by_path
    }

    pub fn files_by_name(&self) -> &HashMap<PathBuf, HashSet<String>> {
        &self.files_by_path
    }
}

fn normalize(path: &Path) -> PathBuf {
    path.components().collect()
}

/// Path-boundary prefix match: `dir` matches `file` iff `file` starts with
/// every component of `dir` (so `base` matches `base/deploy.yaml` but not
/// `base-other/deploy.yaml`).
fn is_prefix(dir: &Path, file: &Path) -> bool {
    let mut dir_components = dir.components();
    let mut file_components = file.components();
    loop {
        match dir_components.next() {
            None => return true,
            Some(d) => match file_components.next() {
                Some(f) if f == d => continue,
                _ => return false,
            },
        }
    }
}

#[derive(Debug, Default)]
struct RepoEntry {
    apps: HashMap<String, Application>,
    appsets: HashMap<String, ApplicationSet>,
    app_dir: EntityDir,
    appset_dir: EntityDir,
}

/// Per-repo-URL index of applications and appsets (§3, §4.2). Populated at
/// startup by listing from the delivery controller and updated
/// incrementally by watcher add/update/delete events; pipelines only read.
#[derive(Default)]
pub struct ApplicationIndex {
    repos: RwLock<HashMap<CloneUrl, RepoEntry>>,
}

impl ApplicationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_app(&self, app: Application, source_root: &Path) -> Result<()> {
        self.upsert_app(app, source_root)
    }

    pub fn update_app(&self, app: Application, source_root: &Path) -> Result<()> {
        self.remove_app(&app.primary_source.repo_url, &app.name);
        self.upsert_app(app, source_root)
    }

    fn upsert_app(&self, app: Application, source_root: &Path) -> Result<()> {
        let repo_url = app.primary_source.repo_url.clone();
        let mut repos = self.repos.write().expect("application index lock poisoned");
        let entry = repos.entry(repo_url).or_default();

        for source in app.sources() {
            entry.app_dir.index_dir(Path::new(&source.path), &app.name);
            for value_file in &source.helm_value_files {
                entry.app_dir.index_file(&join(&source.path, value_file), &app.name);
            }
            for param_file in &source.helm_file_parameters {
                entry.app_dir.index_file(&join(&source.path, param_file), &app.name);
            }

            let kustomization_marker = source_root.join(&source.path).join("kustomization.yaml");
            let kustomization_marker_yml = source_root.join(&source.path).join("kustomization.yml");
            if kustomization_marker.exists() || kustomization_marker_yml.exists() {
                let graph = kustomize::walk(source_root, Path::new(&source.path))?;
                for dir in &graph.dirs {
                    entry.app_dir.index_dir(dir, &app.name);
                }
                for file in &graph.files {
                    entry.app_dir.index_file(file, &app.name);
                }
            }
        }

        entry.apps.insert(app.name.clone(), app);
        Ok(())
    }

    pub fn remove_app(&self, repo_url: &CloneUrl, name: &str) {
        let mut repos = self.repos.write().expect("application index lock poisoned");
        if let Some(entry) = repos.get_mut(repo_url) {
            entry.apps.remove(name);
            entry.app_dir.remove_name(name);
        }
    }

    pub fn add_appset(&self, appset: ApplicationSet) {
        let mut repos = self.repos.write().expect("application index lock poisoned");
        let entry = repos.entry(appset.source_repo_url.clone()).or_default();
        entry.appset_dir.index_dir(Path::new(&appset.template.path_pattern), &appset.name);
        entry.appsets.insert(appset.name.clone(), appset);
    }

    pub fn update_appset(&self, appset: ApplicationSet) {
        self.remove_appset(&appset.source_repo_url, &appset.name);
        self.add_appset(appset);
    }

    pub fn remove_appset(&self, repo_url: &CloneUrl, name: &str) {
        let mut repos = self.repos.write().expect("application index lock poisoned");
        if let Some(entry) = repos.get_mut(repo_url) {
            entry.appsets.remove(name);
            entry.appset_dir.remove_name(name);
        }
    }

    /// `FindAppsAffectedBy(repoURL, changedFiles, ...) -> AffectedItems`
    /// (§4.2 contract). `branch`/`repo` are accepted for interface parity
    /// with the spec but this index is branch-agnostic: it reflects the
    /// live cluster state, not any particular ref.
    pub fn find_apps_affected_by(&self, repo_url: &CloneUrl, changed_files: &[PathBuf]) -> AffectedItems {
        let repos = self.repos.read().expect("application index lock poisoned");
        let Some(entry) = repos.get(repo_url) else {
            return AffectedItems::default();
        };

        let affected_app_names = entry.app_dir.affected_by(changed_files);
        let affected_appset_names = entry.appset_dir.affected_by(changed_files);

        AffectedItems {
            applications: affected_app_names
                .into_iter()
                .filter_map(|name| entry.apps.get(&name).cloned())
                .collect(),
            appsets: affected_appset_names
                .into_iter()
                .filter_map(|name| entry.appsets.get(&name).cloned())
                .collect(),
        }
    }

    /// `AppsInRepo(repoURL) -> AppDir` — used by `GET /debug` (§6).
    pub fn apps_in_repo(&self, repo_url: &CloneUrl) -> Vec<Application> {
        let repos = self.repos.read().expect("application index lock poisoned");
        repos
            .get(repo_url)
            .map(|e| e.apps.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Snapshot suitable for `GET /debug`'s JSON body.
    pub fn debug_snapshot(&self) -> DebugSnapshot {
        let repos = self.repos.read().expect("application index lock poisoned");
        let mut snapshot = DebugSnapshot::default();
        for (repo_url, entry) in repos.iter() {
            snapshot.repo_urls.push(repo_url.to_string());
            for (path, names) in entry.app_dir.files_by_name() {
                snapshot.files_by_app.insert(path.display().to_string(), names.iter().cloned().collect());
            }
            for (path, names) in entry.app_dir.dirs_by_name() {
                snapshot.dirs_by_app.insert(path.display().to_string(), names.iter().cloned().collect());
            }
            for (path, names) in entry.appset_dir.files_by_name() {
                snapshot.files_by_appset.insert(path.display().to_string(), names.iter().cloned().collect());
            }
            for (path, names) in entry.appset_dir.dirs_by_name() {
                snapshot.dirs_by_appset.insert(path.display().to_string(), names.iter().cloned().collect());
            }
        }
        snapshot
    }
}

#[derive(Debug, Default, serde::Serialize)]
pub struct DebugSnapshot {
    pub repo_urls: Vec<String>,
    pub files_by_app: HashMap<String, Vec<String>>,
    pub dirs_by_app: HashMap<String, Vec<String>>,
    pub files_by_appset: HashMap<String, Vec<String>>,
    pub dirs_by_appset: HashMap<String, Vec<String>>,
}

fn join(base: &str, rel: &str) -> PathBuf {
    if let Some(stripped) = rel.strip_prefix('/') {
        PathBuf::from(stripped)
    } else {
        Path::new(base).join(rel)
    }
}
