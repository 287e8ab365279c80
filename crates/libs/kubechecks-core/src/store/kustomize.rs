//! Kustomize graph walker (§4.2): given a source path containing a
//! `kustomization.yaml`, transitively collects every file and directory it
//! references so the Application Index can match changed files against it.

use serde_yaml::Value;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Everything a kustomization (transitively) depends on, expressed as
/// repo-root-relative paths. `files` feed the Application Index's file
/// entries; `dirs` feed its directory entries (§4.2).
#[derive(Debug, Default, Clone)]
pub struct KustomizeGraph {
    pub files: BTreeSet<PathBuf>,
    pub dirs: BTreeSet<PathBuf>,
}

/// Walks the kustomize graph rooted at `start_dir` (repo-root-relative).
/// `repo_root` is the checked-out repository's working directory on disk.
///
/// Cycle guard: each directory is visited at most once, keyed by its
/// repo-root-relative normalized path (§9 design note).
pub fn walk(repo_root: &Path, start_dir: &Path) -> Result<KustomizeGraph> {
    let mut graph = KustomizeGraph::default();
    let mut visited = HashSet::new();
    walk_dir(repo_root, start_dir, &mut graph, &mut visited)?;
    Ok(graph)
}

fn walk_dir(
    repo_root: &Path,
    dir_rel: &Path,
    graph: &mut KustomizeGraph,
    visited: &mut HashSet<PathBuf>,
) -> Result<()> {
    let normalized = normalize(dir_rel);
    if !visited.insert(normalized.clone()) {
        tracing::debug!(dir = %normalized.display(), "kustomize cycle detected, pruning");
        return Ok(());
    }
    graph.dirs.insert(normalized.clone());

    let abs_dir = repo_root.join(&normalized);
    let kustomization_path = ["kustomization.yaml", "kustomization.yml"]
        .iter()
        .map(|name| abs_dir.join(name))
        .find(|p| p.exists());

    let Some(kustomization_path) = kustomization_path else {
        // A directory without kustomization.yaml is a directory-only
        // dependency — already recorded above.
        return Ok(());
    };

    let content = std::fs::read_to_string(&kustomization_path)?;
    let doc: Value = serde_yaml::from_str(&content)?;

    for key in ["resources", "bases", "components", "transformers", "configurations", "crds"] {
        for entry in string_list(&doc, key) {
            resolve_and_record(repo_root, &normalized, &entry, graph, visited)?;
        }
    }

    for entry in patch_path_entries(&doc, "patches") {
        record_file(repo_root, &normalized, &entry, graph);
    }
    for entry in patch_path_entries(&doc, "patchesJson6902") {
        record_file(repo_root, &normalized, &entry, graph);
    }
    for entry in patch_path_entries(&doc, "patchesStrategicMerge") {
        // Bare strings here are file paths; inline multi-line YAML literals
        // parse as strings too but never resolve to an on-disk file, so a
        // missing file is silently skipped rather than erroring (§4.2).
        record_file(repo_root, &normalized, &entry, graph);
    }

    for generator_key in ["configMapGenerator", "secretGenerator"] {
        if let Some(Value::Sequence(generators)) = doc.get(generator_key) {
            for generator in generators {
                for field in ["files", "envs"] {
                    for entry in string_list(generator, field) {
                        record_file(repo_root, &normalized, &entry, graph);
                    }
                }
            }
        }
    }

    if let Some(Value::Sequence(charts)) = doc.get("helmCharts") {
        for chart in charts {
            if let Some(Value::String(values_file)) = chart.get("valuesFile") {
                record_file(repo_root, &normalized, values_file, graph);
            }
        }
    }

    Ok(())
}

fn resolve_and_record(
    repo_root: &Path,
    current_dir: &Path,
    entry: &str,
    graph: &mut KustomizeGraph,
    visited: &mut HashSet<PathBuf>,
) -> Result<()> {
    if is_remote_ref(entry) {
        return Ok(());
    }
    let resolved = resolve(current_dir, entry);
    let abs = repo_root.join(&resolved);
    if abs.is_dir() {
        walk_dir(repo_root, &resolved, graph, visited)?;
    } else {
        graph.files.insert(resolved);
    }
    Ok(())
}

fn record_file(repo_root: &Path, current_dir: &Path, entry: &str, graph: &mut KustomizeGraph) {
    if is_remote_ref(entry) {
        return;
    }
    let resolved = resolve(current_dir, entry);
    // Inline strategic-merge blocks are multi-line YAML, never a real path
    // on disk; only record entries that actually resolve to a file.
    if repo_root.join(&resolved).is_file() {
        graph.files.insert(resolved);
    }
}

/// Paths beginning with `/` are repository-relative; otherwise relative to
/// the current kustomization directory (§4.2).
fn resolve(current_dir: &Path, entry: &str) -> PathBuf {
    if let Some(repo_relative) = entry.strip_prefix('/') {
        normalize(Path::new(repo_relative))
    } else {
        normalize(&current_dir.join(entry))
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            std::path::Component::ParentDir => {
                out.pop();
            }
            std::path::Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Remote references use a URL scheme, the `git@` scp form, a shorthand
/// host (`github.com/org/repo`), or a `//`-prefixed path — all ignored
/// rather than walked (§4.2).
fn is_remote_ref(entry: &str) -> bool {
    if entry.starts_with("//") || entry.starts_with("git@") {
        return true;
    }
    if let Some(scheme_end) = entry.find("://") {
        let scheme = &entry[..scheme_end];
        if scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-') {
            return true;
        }
    }
    // Shorthand host form: first path segment contains a dot and the whole
    // reference isn't a relative (`./`, `../`) or absolute (`/`) path.
    if !entry.starts_with('.') && !entry.starts_with('/') {
        if let Some(first_segment) = entry.split('/').next() {
            if first_segment.contains('.') {
                return true;
            }
        }
    }
    false
}

fn string_list(doc: &Value, key: &str) -> Vec<String> {
    match doc.get(key) {
        Some(Value::Sequence(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

/// Extracts path-bearing entries from `patches`/`patchesJson6902`/
/// `patchesStrategicMerge`, which accept either a bare string path or a map
/// with a `path` key (and, for `patches`/`patchesJson6902`, a `target`
/// selector we don't need here).
fn patch_path_entries(doc: &Value, key: &str) -> Vec<String> {
    match doc.get(key) {
        Some(Value::Sequence(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Mapping(_) => item.get("path").and_then(Value::as_str).map(str::to_string),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}
