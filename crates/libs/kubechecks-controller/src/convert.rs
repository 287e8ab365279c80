//! Converts the delivery controller's CRD representation of Application and
//! ApplicationSet into the pipeline's neutral model types (§3).

use kube::ResourceExt;

use kubechecks_core::model::application::ApplicationSource;
use kubechecks_core::model::application_set::{ApplicationTemplate, Generator};
use kubechecks_core::model::{Application, ApplicationSet};
use kubechecks_core::types::CloneUrl;

use crate::crd;
use crate::error::{Error, Result};

pub fn application_from_crd(crd: &crd::Application) -> Result<Application> {
    let name = crd.name_any();
    let spec = &crd.spec;

    let primary_source = spec
        .source
        .as_ref()
        .or_else(|| spec.sources.first())
        .ok_or_else(|| Error::NoSource(name.clone()))?;

    let additional_sources = if spec.source.is_some() {
        spec.sources.iter().map(source_from_crd).collect::<Result<Vec<_>>>()?
    } else {
        spec.sources.iter().skip(1).map(source_from_crd).collect::<Result<Vec<_>>>()?
    };

    Ok(Application {
        name,
        project: spec.project.clone(),
        destination_cluster: spec
            .destination
            .name
            .clone()
            .or_else(|| spec.destination.server.clone())
            .unwrap_or_default(),
        primary_source: source_from_crd(primary_source)?,
        additional_sources,
    })
}

fn source_from_crd(source: &crd::ApplicationSourceCrd) -> Result<ApplicationSource> {
    Ok(ApplicationSource {
        repo_url: CloneUrl::parse(&source.repo_url).map_err(|e| Error::Other(e.into()))?,
        path: source.path.clone().unwrap_or_else(|| ".".to_string()),
        target_revision: source.target_revision.clone(),
        helm_value_files: source.helm.as_ref().map(|h| h.value_files.clone()).unwrap_or_default(),
        helm_file_parameters: source
            .helm
            .as_ref()
            .map(|h| h.file_parameters.iter().map(|p| p.path.clone()).collect())
            .unwrap_or_default(),
    })
}

pub fn application_set_from_crd(crd: &crd::ApplicationSet) -> Result<ApplicationSet> {
    let name = crd.name_any();
    let spec = &crd.spec;
    let template_spec = &spec.template.spec;

    let primary_source = template_spec
        .source
        .as_ref()
        .or_else(|| template_spec.sources.first())
        .ok_or_else(|| Error::NoSource(name.clone()))?;

    Ok(ApplicationSet {
        name,
        project: template_spec.project.clone(),
        source_repo_url: CloneUrl::parse(&primary_source.repo_url).map_err(|e| Error::Other(e.into()))?,
        template: ApplicationTemplate {
            name_pattern: spec.template.metadata.name.clone(),
            path_pattern: primary_source.path.clone().unwrap_or_else(|| ".".to_string()),
            target_revision_pattern: primary_source.target_revision.clone(),
            destination_cluster_pattern: template_spec
                .destination
                .name
                .clone()
                .or_else(|| template_spec.destination.server.clone())
                .unwrap_or_default(),
        },
        generators: spec.generators.iter().map(generator_from_json).collect(),
        go_template_mode: spec.go_template,
    })
}

/// Recognizes `list`/`clusters`/`matrix`/`merge` generator shapes; anything
/// else (git, pull-request, SCM-provider generators) maps to
/// [`Generator::Unsupported`] per §4.3.
fn generator_from_json(value: &serde_json::Value) -> Generator {
    if let Some(list) = value.get("list").and_then(|v| v.get("elements")) {
        if let Some(elements) = list.as_array() {
            return Generator::List {
                elements: elements
                    .iter()
                    .filter_map(|e| e.as_object())
                    .map(|o| {
                        o.iter()
                            .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                            .collect()
                    })
                    .collect(),
            };
        }
    }
    if let Some(clusters) = value.get("clusters") {
        let selector = clusters
            .get("selector")
            .and_then(|s| s.get("matchLabels"))
            .and_then(|m| m.as_object())
            .map(|o| {
                o.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default();
        return Generator::Clusters { selector };
    }
    if let Some(matrix) = value.get("matrix").and_then(|v| v.get("generators")).and_then(|v| v.as_array()) {
        return Generator::Matrix {
            generators: matrix.iter().map(generator_from_json).collect(),
        };
    }
    if let Some(merge) = value.get("merge").and_then(|v| v.get("generators")).and_then(|v| v.as_array()) {
        return Generator::Merge {
            generators: merge.iter().map(generator_from_json).collect(),
        };
    }
    let kind = value
        .as_object()
        .and_then(|o| o.keys().next())
        .cloned()
        .unwrap_or_else(|| "unknown".to_string());
    Generator::Unsupported { kind }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_crd() -> crd::Application {
        let spec = crd::ApplicationCrdSpec {
            project: "default".to_string(),
            source: Some(crd::ApplicationSourceCrd {
                repo_url: "https://github.com/acme/widgets.git".to_string(),
                path: Some("charts/widgets".to_string()),
                target_revision: "main".to_string(),
                helm: None,
            }),
            sources: Vec::new(),
            destination: crd::ApplicationDestinationCrd {
                server: None,
                name: Some("prod".to_string()),
            },
        };
        crd::Application::new("widgets", spec)
    }

    #[test]
    fn converts_single_source_application() {
        let app = application_from_crd(&sample_crd()).unwrap();
        assert_eq!(app.name, "widgets");
        assert_eq!(app.destination_cluster, "prod");
        assert_eq!(app.primary_source.path, "charts/widgets");
        assert!(app.additional_sources.is_empty());
    }

    #[test]
    fn missing_source_is_rejected() {
        let mut crd = sample_crd();
        crd.spec.source = None;
        assert!(application_from_crd(&crd).is_err());
    }

    #[test]
    fn unsupported_generator_kind_is_recognized() {
        let value = serde_json::json!({"git": {"repoURL": "https://github.com/acme/widgets.git"}});
        assert!(matches!(generator_from_json(&value), Generator::Unsupported { kind } if kind == "git"));
    }

    #[test]
    fn list_generator_elements_convert_to_string_maps() {
        let value = serde_json::json!({"list": {"elements": [{"cluster": "prod", "region": "us"}]}});
        match generator_from_json(&value) {
            Generator::List { elements } => {
                assert_eq!(elements.len(), 1);
                assert_eq!(elements[0].get("cluster").map(String::as_str), Some("prod"));
            }
            other => panic!("expected List, got {other:?}"),
        }
    }
}
