//! Affected-Apps Matcher (§4.4): a composite of the live Application Index
//! and the repo's optional `.kubechecks.yaml` project config, unioned by
//! application name.

use std::path::{Path, PathBuf};

use crate::appset::{ClusterView, generate};
use crate::config_file::ProjectConfig;
use crate::error::Result;
use crate::index::application_index::ApplicationIndex;
use crate::model::{AffectedItems, Application, ApplicationSet, ApplicationSource};
use crate::types::CloneUrl;

/// `AffectedApps(changedFiles, targetBranch, repo) -> AffectedItems`
/// (§4.4 contract).
///
/// Runs the Index matcher and, if the repo carries a project config file,
/// the Config matcher, then unions the two by application name. Per §4.4,
/// when both sides produce an entry for the same name the index entry
/// wins, since it carries richer source information.
pub fn affected_apps(
    index: &ApplicationIndex,
    repo_url: &CloneUrl,
    changed_files: &[PathBuf],
    repo_root: &Path,
) -> Result<AffectedItems> {
    let from_index = index.find_apps_affected_by(repo_url, changed_files);

    let from_config = match ProjectConfig::load(repo_root)? {
        Some(config) => affected_from_config(&config, repo_url, changed_files)?,
        None => AffectedItems::default(),
    };

    Ok(from_index.union_prefer_existing(from_config))
}

fn affected_from_config(config: &ProjectConfig, repo_url: &CloneUrl, changed_files: &[PathBuf]) -> Result<AffectedItems> {
    let mut applications = Vec::new();
    for app in &config.applications {
        let mut paths = vec![app.path.clone()];
        paths.extend(app.additional_paths.clone());
        if paths.iter().any(|p| path_matches(p, changed_files)) {
            applications.push(Application {
                name: app.name.clone(),
                project: "default".to_string(),
                destination_cluster: app.cluster.clone(),
                primary_source: ApplicationSource {
                    repo_url: repo_url.clone(),
                    path: app.path.clone(),
                    target_revision: "HEAD".to_string(),
                    helm_value_files: Vec::new(),
                    helm_file_parameters: Vec::new(),
                },
                additional_sources: Vec::new(),
            });
        }
    }

    let mut appsets = Vec::new();
    let mut expanded_applications = Vec::new();
    for config_appset in &config.application_sets {
        if !config_appset.paths.iter().any(|p| path_matches(p, changed_files)) {
            continue;
        }
        // The config file only declares that this appset exists and which
        // paths it owns; expanding it into concrete applications still
        // goes through the AppSet Generator (§4.4).
        if let Some(appset) = placeholder_appset(config_appset, repo_url) {
            let (apps, _warnings) = generate(&appset, &ClusterView::default())?;
            expanded_applications.extend(apps);
            appsets.push(appset);
        }
    }
    applications.extend(expanded_applications);

    Ok(AffectedItems { applications, appsets })
}

/// The project config only names an appset and its paths, not its
/// generators or template — those live in the delivery controller. A
/// caller wiring this into the full pipeline passes the controller's
/// loaded `ApplicationSet` in through the Application Index instead; this
/// fallback only fires when the index has no matching entry, so it builds
/// a trivial single-cluster generator good enough to surface the appset by
/// name and let the report note it changed.
fn placeholder_appset(config_appset: &crate::config_file::ConfigApplicationSet, repo_url: &CloneUrl) -> Option<ApplicationSet> {
    use crate::model::{ApplicationTemplate, Generator};
    use std::collections::BTreeMap;

    Some(ApplicationSet {
        name: config_appset.name.clone(),
        project: "default".to_string(),
        source_repo_url: repo_url.clone(),
        template: ApplicationTemplate {
            name_pattern: config_appset.name.clone(),
            path_pattern: config_appset.paths.first().cloned().unwrap_or_default(),
            target_revision_pattern: "HEAD".to_string(),
            destination_cluster_pattern: "in-cluster".to_string(),
        },
        generators: vec![Generator::List { elements: vec![BTreeMap::new()] }],
        go_template_mode: false,
    })
}

fn path_matches(declared: &str, changed_files: &[PathBuf]) -> bool {
    let declared = declared.trim_end_matches("/*").trim_end_matches('/');
    changed_files.iter().any(|f| {
        let f = f.to_string_lossy();
        f == declared || f.starts_with(&format!("{declared}/"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_matching_respects_directory_boundaries() {
        assert!(path_matches("services/checkout", &[PathBuf::from("services/checkout/deploy.yaml")]));
        assert!(!path_matches("services/checkout", &[PathBuf::from("services/checkout-other/deploy.yaml")]));
    }

    #[test]
    fn glob_suffix_is_treated_as_directory_prefix() {
        assert!(path_matches("services/*", &[PathBuf::from("services/checkout/deploy.yaml")]));
    }
}
