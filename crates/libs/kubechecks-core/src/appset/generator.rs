//! AppSet Generator (§4.3): expands an appset's generators into concrete
//! parameter sets, then renders each into an [`Application`] via
//! [`crate::appset::template`].

use std::collections::BTreeMap;

use crate::appset::template::render_application;
use crate::error::{Error, Result};
use crate::model::{Application, ApplicationSet, Generator};

/// Read-only view of the live clusters the Clusters generator filters
/// over. Supplied by the delivery-controller client; this crate only
/// consumes it.
#[derive(Debug, Clone, Default)]
pub struct ClusterView {
    pub clusters: Vec<Cluster>,
}

#[derive(Debug, Clone)]
pub struct Cluster {
    pub name: String,
    pub labels: BTreeMap<String, String>,
}

/// `Generate(appset, clusterView) -> [Application]` (§4.3 contract).
/// Deterministic for a given `(appset, clusterView)`: generator evaluation
/// order follows `appset.generators`'s declaration order and every
/// intermediate collection is a `BTreeMap`/stable `Vec`.
///
/// Returns the applications plus any non-fatal warnings (unsupported
/// generator kinds encountered).
pub fn generate(appset: &ApplicationSet, clusters: &ClusterView) -> Result<(Vec<Application>, Vec<String>)> {
    validate_nesting(appset)?;

    let mut warnings = Vec::new();
    let mut param_sets: Vec<BTreeMap<String, String>> = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for generator in &appset.generators {
        let (sets, mut gen_warnings) = eval_generator(generator, clusters);
        warnings.append(&mut gen_warnings);
        for set in sets {
            let key = canonical_key(&set);
            if seen.insert(key) {
                param_sets.push(set);
            }
        }
    }

    let applications = param_sets
        .iter()
        .map(|params| render_application(appset, params))
        .collect::<Result<Vec<_>>>()?;

    Ok((applications, warnings))
}

/// Matrix/Merge compose at most two base generators, nested one level
/// (§3 invariant). This rejects an appset whose Matrix/Merge generator
/// contains another Matrix/Merge.
fn validate_nesting(appset: &ApplicationSet) -> Result<()> {
    for generator in &appset.generators {
        if let Generator::Matrix { generators } | Generator::Merge { generators } = generator {
            if generators.len() > 2 {
                return Err(Error::GeneratorNestingTooDeep { name: appset.name.clone() });
            }
            for inner in generators {
                if matches!(inner, Generator::Matrix { .. } | Generator::Merge { .. }) {
                    return Err(Error::GeneratorNestingTooDeep { name: appset.name.clone() });
                }
            }
        }
    }
    Ok(())
}

fn eval_generator(generator: &Generator, clusters: &ClusterView) -> (Vec<BTreeMap<String, String>>, Vec<String>) {
    match generator {
        Generator::List { elements } => (elements.clone(), Vec::new()),
        Generator::Clusters { selector } => {
            let sets = clusters
                .clusters
                .iter()
                .filter(|c| selector.iter().all(|(k, v)| c.labels.get(k) == Some(v)))
                .map(|c| {
                    let mut params = c.labels.clone();
                    params.insert("name".to_string(), c.name.clone());
                    params
                })
                .collect();
            (sets, Vec::new())
        }
        Generator::Matrix { generators } => {
            let mut warnings = Vec::new();
            let parts: Vec<Vec<BTreeMap<String, String>>> = generators
                .iter()
                .map(|g| {
                    let (sets, mut w) = eval_generator(g, clusters);
                    warnings.append(&mut w);
                    sets
                })
                .collect();
            let Some((first, rest)) = parts.split_first() else {
                return (Vec::new(), warnings);
            };
            let mut combined = first.clone();
            for other in rest {
                let mut next = Vec::new();
                for a in &combined {
                    for b in other {
                        let mut merged = a.clone();
                        merged.extend(b.clone());
                        next.push(merged);
                    }
                }
                combined = next;
            }
            (combined, warnings)
        }
        Generator::Merge { generators } => {
            let mut warnings = Vec::new();
            let parts: Vec<Vec<BTreeMap<String, String>>> = generators
                .iter()
                .map(|g| {
                    let (sets, mut w) = eval_generator(g, clusters);
                    warnings.append(&mut w);
                    sets
                })
                .collect();
            let mut merged_by_name: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
            let mut order = Vec::new();
            for part in parts {
                for set in part {
                    let key = set.get("name").cloned().unwrap_or_else(|| canonical_key(&set));
                    if !merged_by_name.contains_key(&key) {
                        order.push(key.clone());
                    }
                    merged_by_name.entry(key).or_default().extend(set);
                }
            }
            let combined = order.into_iter().filter_map(|k| merged_by_name.get(&k).cloned()).collect();
            (combined, warnings)
        }
        Generator::Unsupported { kind } => {
            (Vec::new(), vec![format!("appset generator kind '{kind}' is unsupported; producing zero applications")])
        }
    }
}

fn canonical_key(params: &BTreeMap<String, String>) -> String {
    params.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ApplicationSet, ApplicationTemplate};
    use crate::types::CloneUrl;

    fn base_appset(generators: Vec<Generator>) -> ApplicationSet {
        ApplicationSet {
            name: "services".into(),
            project: "default".into(),
            source_repo_url: CloneUrl::parse("https://github.com/acme/gitops").unwrap(),
            template: ApplicationTemplate {
                name_pattern: "{{name}}".into(),
                path_pattern: "services/{{name}}".into(),
                target_revision_pattern: "main".into(),
                destination_cluster_pattern: "{{name}}".into(),
            },
            generators,
            go_template_mode: false,
        }
    }

    fn elements(names: &[&str]) -> Generator {
        Generator::List {
            elements: names
                .iter()
                .map(|n| BTreeMap::from([("name".to_string(), n.to_string())]))
                .collect(),
        }
    }

    #[test]
    fn list_generator_produces_one_app_per_element() {
        let appset = base_appset(vec![elements(&["checkout", "cart"])]);
        let (apps, warnings) = generate(&appset, &ClusterView::default()).unwrap();
        assert_eq!(apps.len(), 2);
        assert!(warnings.is_empty());
    }

    #[test]
    fn clusters_generator_filters_by_selector() {
        let clusters = ClusterView {
            clusters: vec![
                Cluster { name: "prod".into(), labels: BTreeMap::from([("env".to_string(), "prod".to_string())]) },
                Cluster { name: "dev".into(), labels: BTreeMap::from([("env".to_string(), "dev".to_string())]) },
            ],
        };
        let appset = base_appset(vec![Generator::Clusters {
            selector: BTreeMap::from([("env".to_string(), "prod".to_string())]),
        }]);
        let (apps, _) = generate(&appset, &clusters).unwrap();
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].name, "prod");
    }

    #[test]
    fn matrix_generator_cross_products_two_bases() {
        let appset = base_appset(vec![Generator::Matrix {
            generators: vec![elements(&["a", "b"]), elements(&["x"])],
        }]);
        let (apps, _) = generate(&appset, &ClusterView::default()).unwrap();
        assert_eq!(apps.len(), 2);
    }

    #[test]
    fn unsupported_generator_yields_zero_apps_and_a_warning() {
        let appset = base_appset(vec![Generator::Unsupported { kind: "PullRequest".into() }]);
        let (apps, warnings) = generate(&appset, &ClusterView::default()).unwrap();
        assert!(apps.is_empty());
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn nesting_beyond_one_level_is_rejected() {
        let appset = base_appset(vec![Generator::Matrix {
            generators: vec![
                Generator::Matrix { generators: vec![elements(&["a"])] },
                elements(&["b"]),
            ],
        }]);
        assert!(generate(&appset, &ClusterView::default()).is_err());
    }

    #[test]
    fn is_deterministic_across_repeated_calls() {
        let appset = base_appset(vec![elements(&["checkout", "cart"])]);
        let (first, _) = generate(&appset, &ClusterView::default()).unwrap();
        let (second, _) = generate(&appset, &ClusterView::default()).unwrap();
        assert_eq!(first, second);
    }
}
