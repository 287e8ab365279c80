//! Shared manifest-format conversion used by every tool-backed check:
//! rendered manifests arrive as a JSON array (§4.5 step 2/3: "Convert
//! manifests to YAML for consumers that prefer YAML; keep JSON for
//! differ"), but kubeconform/conftest/kubepug all read multi-document YAML.

use crate::error::Result;

/// Renders `manifests_json` (a JSON array of Kubernetes objects, or a
/// single object) as a `---`-separated YAML document stream.
pub fn to_yaml_stream(manifests_json: &serde_json::Value) -> Result<String> {
    let objects: Vec<&serde_json::Value> = match manifests_json {
        serde_json::Value::Array(items) => items.iter().collect(),
        serde_json::Value::Null => Vec::new(),
        other => vec![other],
    };

    let mut out = String::new();
    for object in objects {
        let yaml_value: serde_yaml::Value = serde_yaml::to_value(object)?;
        out.push_str("---\n");
        out.push_str(&serde_yaml::to_string(&yaml_value)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_becomes_multi_document_stream() {
        let manifests = serde_json::json!([
            {"kind": "ConfigMap", "metadata": {"name": "a"}},
            {"kind": "Secret", "metadata": {"name": "b"}},
        ]);
        let yaml = to_yaml_stream(&manifests).unwrap();
        assert_eq!(yaml.matches("---").count(), 2);
        assert!(yaml.contains("kind: ConfigMap"));
        assert!(yaml.contains("kind: Secret"));
    }

    #[test]
    fn null_manifests_is_empty_stream() {
        assert_eq!(to_yaml_stream(&serde_json::Value::Null).unwrap(), "");
    }
}
