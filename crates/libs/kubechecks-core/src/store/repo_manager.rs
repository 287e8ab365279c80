//! Repo Manager (§4.1): clone/fetch/merge of Git repositories, deduplicated
//! by `(canonical clone URL, ref)`, backed by a TTL-swept directory cache.

use git2::{AnnotatedCommit, FetchOptions, RemoteCallbacks, Repository};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::model::Repo;
use crate::types::{CloneUrl, is_default_ref};

/// One cache slot: the on-disk location plus a per-key mutex so concurrent
/// requests for the same `(url, ref)` serialize on fetch/checkout/merge
/// instead of duplicate-cloning (§4.1, §5).
struct Entry {
    local_path: PathBuf,
    last_used: Instant,
}

/// Clones, fetches, and speculatively merges repositories on behalf of the
/// pipeline. Every on-disk directory under `base_dir` is owned exclusively
/// by this type; callers only ever see a [`Repo`] handle.
pub struct RepoManager {
    base_dir: PathBuf,
    entries: Mutex<HashMap<(CloneUrl, String), Arc<Mutex<Entry>>>>,
}

impl RepoManager {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// `Clone(cloneURL, ref) -> Repo` (§4.1). An empty `ref`/`"HEAD"` is
    /// resolved against the remote default branch and cached under both the
    /// literal and the resolved key, so concurrent requests for `""` and
    /// `"main"` converge on one clone.
    pub async fn clone_or_fetch(&self, clone_url: &CloneUrl, r#ref: &str) -> Result<Repo> {
        let resolved_ref = if is_default_ref(r#ref) {
            self.resolve_default_branch(clone_url).await?
        } else {
            r#ref.to_string()
        };

        let entry_lock = self.entry_for(clone_url, &resolved_ref).await;
        let mut entry = entry_lock.lock().await;

        if entry.local_path.join(".git").exists() {
            self.fetch_and_checkout(&entry.local_path, &resolved_ref).await?;
        } else {
            debug!(url = %clone_url, r#ref = %resolved_ref, "cache miss, cloning");
            self.shallow_clone(clone_url, &resolved_ref, &entry.local_path).await?;
        }

        entry.last_used = Instant::now();

        if r#ref != resolved_ref {
            // Alias the literal key (e.g. "" or "HEAD") to the same directory.
            let alias_lock = self.entry_for(clone_url, r#ref).await;
            let mut alias = alias_lock.lock().await;
            alias.local_path = entry.local_path.clone();
            alias.last_used = entry.last_used;
        }

        Ok(Repo {
            clone_url: clone_url.clone(),
            r#ref: resolved_ref,
            local_path: entry.local_path.clone(),
            last_used: entry.last_used,
        })
    }

    /// Creates a merge commit of `target_ref@target_sha` into the currently
    /// checked-out branch of `repo`, locally, without pushing. The base
    /// clone is shallow and single-branch, so `target_sha`'s commit object
    /// is not yet present locally; this first fetches `target_ref` from
    /// `origin` before merging. Conflicts are returned as
    /// [`Error::MergeConflict`], which the pipeline treats as a per-PR
    /// Warning result rather than a fatal error (§4.1, §7).
    pub async fn merge_into(&self, repo: &Repo, target_ref: &str, target_sha: &str) -> Result<()> {
        let repo_path = repo.local_path.clone();
        let target_ref = target_ref.to_string();
        let target_sha = target_sha.to_string();

        tokio::task::spawn_blocking(move || {
            fetch_ref_blocking(&repo_path, &target_ref)?;
            merge_into_blocking(&repo_path, &target_ref, &target_sha)
        })
        .await
        .map_err(|e| Error::Other(anyhow::anyhow!("merge task panicked: {e}")))?
    }

    async fn entry_for(&self, clone_url: &CloneUrl, r#ref: &str) -> Arc<Mutex<Entry>> {
        let key = (clone_url.clone(), r#ref.to_string());
        let mut entries = self.entries.lock().await;
        entries
            .entry(key)
            .or_insert_with(|| {
                let dir_name = directory_name_for(clone_url, r#ref);
                Arc::new(Mutex::new(Entry {
                    local_path: self.base_dir.join(dir_name),
                    last_used: Instant::now(),
                }))
            })
            .clone()
    }

    async fn resolve_default_branch(&self, clone_url: &CloneUrl) -> Result<String> {
        let url = clone_url.as_str().to_string();
        tokio::task::spawn_blocking(move || resolve_default_branch_blocking(&url))
            .await
            .map_err(|e| Error::Other(anyhow::anyhow!("default-branch probe panicked: {e}")))?
    }

    async fn shallow_clone(&self, clone_url: &CloneUrl, r#ref: &str, dest: &std::path::Path) -> Result<()> {
        let url = format!("https://{}", clone_url.as_str());
        let r#ref = r#ref.to_string();
        let dest = dest.to_path_buf();
        tokio::task::spawn_blocking(move || shallow_clone_blocking(&url, &r#ref, &dest))
            .await
            .map_err(|e| Error::Other(anyhow::anyhow!("clone task panicked: {e}")))?
    }

    async fn fetch_and_checkout(&self, path: &std::path::Path, r#ref: &str) -> Result<()> {
        let path = path.to_path_buf();
        let r#ref = r#ref.to_string();
        match tokio::task::spawn_blocking(move || fetch_and_checkout_blocking(&path, &r#ref))
            .await
            .map_err(|e| Error::Other(anyhow::anyhow!("fetch task panicked: {e}")))?
        {
            Ok(()) => Ok(()),
            // The TTL sweep may have reclaimed this directory between our
            // existence check and now; transparently re-clone (§4.1).
            Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("directory reclaimed since last use, re-cloning");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Removes directories whose entry has been idle longer than `ttl` and
    /// whose per-key mutex is currently uncontended. Called by the Resource
    /// Cache's background ticker (§4.9); never fatal.
    pub async fn sweep_idle(&self, ttl: std::time::Duration) {
        let snapshot: Vec<((CloneUrl, String), Arc<Mutex<Entry>>)> = {
            let entries = self.entries.lock().await;
            entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        };

        for (key, entry_lock) in snapshot {
            let Ok(entry) = entry_lock.try_lock() else {
                continue; // held by an in-flight pipeline; skip this sweep
            };
            if entry.last_used.elapsed() <= ttl {
                continue;
            }
            let path = entry.local_path.clone();
            drop(entry);

            if let Err(e) = tokio::fs::remove_dir_all(&path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "TTL sweep: failed to remove directory");
                }
            } else {
                info!(path = %path.display(), r#ref = %key.1, "TTL sweep: reclaimed idle clone");
            }
        }
    }
}

fn directory_name_for(clone_url: &CloneUrl, r#ref: &str) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    clone_url.hash(&mut hasher);
    r#ref.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

fn shallow_clone_blocking(url: &str, r#ref: &str, dest: &std::path::Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut builder = git2::build::RepoBuilder::new();
    let mut fetch_opts = FetchOptions::new();
    fetch_opts.depth(1);
    builder.fetch_options(fetch_opts);
    builder.branch(r#ref);
    builder.clone(url, dest)?;
    Ok(())
}

fn fetch_and_checkout_blocking(path: &std::path::Path, r#ref: &str) -> Result<()> {
    if !path.join(".git").exists() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "repo directory missing",
        )));
    }
    let repo = Repository::open(path)?;
    let mut remote = repo.find_remote("origin")?;
    remote.fetch(&[r#ref], None, None)?;

    let fetch_head = repo.find_reference("FETCH_HEAD")?;
    let commit = repo.reference_to_annotated_commit(&fetch_head)?;
    checkout_annotated(&repo, &commit)?;
    Ok(())
}

fn checkout_annotated(repo: &Repository, commit: &AnnotatedCommit<'_>) -> Result<()> {
    let object = repo.find_object(commit.id(), None)?;
    repo.checkout_tree(&object, None)?;
    repo.set_head_detached(commit.id())?;
    Ok(())
}

fn resolve_default_branch_blocking(url: &str) -> Result<String> {
    let mut remote = git2::Remote::create_detached(url)?;
    let callbacks = RemoteCallbacks::new();
    remote.connect_auth(git2::Direction::Fetch, Some(callbacks), None)?;
    let default = remote
        .default_branch()?
        .as_str()
        .map(|s| s.trim_start_matches("refs/heads/").to_string())
        .ok_or_else(|| Error::UnresolvableRef {
            clone_url: url.to_string(),
            r#ref: "HEAD".to_string(),
        })?;
    remote.disconnect()?;
    Ok(default)
}

/// Fetches `target_ref` into `repo_path`'s object database (into
/// `FETCH_HEAD`, without touching the checked-out branch) so a subsequent
/// merge can resolve `target_sha` locally.
fn fetch_ref_blocking(repo_path: &std::path::Path, target_ref: &str) -> Result<()> {
    let repo = Repository::open(repo_path)?;
    let mut remote = repo.find_remote("origin")?;
    remote.fetch(&[target_ref], None, None)?;
    Ok(())
}

fn merge_into_blocking(repo_path: &std::path::Path, target_ref: &str, target_sha: &str) -> Result<()> {
    let repo = Repository::open(repo_path)?;
    let target_oid = git2::Oid::from_str(target_sha)?;
    let target_commit = repo.find_annotated_commit(target_oid)?;

    let analysis = repo.merge_analysis(&[&target_commit])?;
    if analysis.0.is_up_to_date() {
        return Ok(());
    }

    repo.merge(&[&target_commit], None, None)?;

    let mut index = repo.index()?;
    if index.has_conflicts() {
        repo.cleanup_state()?;
        return Err(Error::merge_conflict(target_ref, "HEAD"));
    }

    let tree_oid = index.write_tree()?;
    let tree = repo.find_tree(tree_oid)?;
    let sig = git2::Signature::now("kubechecks", "kubechecks@localhost")?;
    let head_commit = repo.head()?.peel_to_commit()?;
    let target_commit_obj = repo.find_commit(target_oid)?;

    repo.commit(
        Some("HEAD"),
        &sig,
        &sig,
        "speculative merge for check pipeline",
        &tree,
        &[&head_commit, &target_commit_obj],
    )?;
    repo.cleanup_state()?;
    Ok(())
}
