//! Template rendering for AppSet Generator output (§4.3).
//!
//! Parameters are applied to the appset's application template using
//! whichever of two substitution flavors the appset carries:
//! - plain `{{key}}` substitution (the common, provider-native form)
//! - Go-template-style `{{ .key }}` dotted-field substitution
//!
//! Both are implemented on top of `minijinja`, since its `{{ expr }}`
//! syntax is a superset of plain substitution and a thin context wrapper
//! lets `.key` resolve the same map entries Go-template would.

use minijinja::Environment;
use minijinja::value::Value;
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::model::{Application, ApplicationSet, ApplicationSource};

/// Renders one application from an appset's template, given one generated
/// parameter set. After rendering, the resulting application's project is
/// pinned back to the appset's project regardless of what the template
/// produced — defense against a malicious `templatePatch` trying to
/// escalate into a different project (§4.3).
pub fn render_application(appset: &ApplicationSet, params: &BTreeMap<String, String>) -> Result<Application> {
    let env = Environment::new();

    let name = render_one(&env, &appset.template.name_pattern, params, appset.go_template_mode)?;
    let path = render_one(&env, &appset.template.path_pattern, params, appset.go_template_mode)?;
    let target_revision = render_one(
        &env,
        &appset.template.target_revision_pattern,
        params,
        appset.go_template_mode,
    )?;
    let destination_cluster = render_one(
        &env,
        &appset.template.destination_cluster_pattern,
        params,
        appset.go_template_mode,
    )?;

    Ok(Application {
        name,
        // Pinned, not rendered from the template (§4.3).
        project: appset.project.clone(),
        destination_cluster,
        primary_source: ApplicationSource {
            repo_url: appset.source_repo_url.clone(),
            path,
            target_revision,
            helm_value_files: Vec::new(),
            helm_file_parameters: Vec::new(),
        },
        additional_sources: Vec::new(),
    })
}

fn render_one(
    env: &Environment<'_>,
    pattern: &str,
    params: &BTreeMap<String, String>,
    go_template_mode: bool,
) -> Result<String> {
    let normalized = if go_template_mode {
        normalize_go_template_fields(pattern)
    } else {
        pattern.to_string()
    };

    // Expose every parameter both as a bare top-level variable (plain
    // `{{key}}` substitution) and under a `params` object (the form
    // go-template-style `{{ .key }}` patterns normalize into below).
    let mut vars: BTreeMap<String, Value> = params.iter().map(|(k, v)| (k.clone(), Value::from(v.clone()))).collect();
    vars.insert("params".to_string(), Value::from_serialize(params));

    env.render_str(&normalized, vars)
        .map_err(|e| Error::Other(anyhow::anyhow!("appset template render failed: {e}")))
}

/// Rewrites Go-template-style `{{ .key }}` placeholders into the
/// `{{ params.key }}` form minijinja expects, so both templating flavors
/// resolve against the same parameter map.
fn normalize_go_template_fields(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.char_indices().peekable();
    while let Some((_, c)) = chars.next() {
        out.push(c);
        if c == '{' && chars.peek().map(|(_, n)| *n) == Some('{') {
            if let Some((_, next)) = chars.next() {
                out.push(next);
            }
            // Skip whitespace, then a leading `.` becomes `params.`.
            let mut lookahead = String::new();
            while let Some(&(_, n)) = chars.peek() {
                if n.is_whitespace() {
                    lookahead.push(n);
                    chars.next();
                } else {
                    break;
                }
            }
            out.push_str(&lookahead);
            if chars.peek().map(|(_, n)| *n) == Some('.') {
                chars.next();
                out.push_str("params.");
            }
        }
    }
    out
}
