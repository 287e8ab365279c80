//! Custom resource shapes for the delivery controller's Application and
//! ApplicationSet CRDs (§3, §6). Only the fields this crate reads are
//! modeled; the controller owns the rest of the schema.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "argoproj.io",
    version = "v1alpha1",
    kind = "Application",
    namespaced,
    status = "ApplicationStatus"
)]
pub struct ApplicationCrdSpec {
    pub project: String,
    pub source: Option<ApplicationSourceCrd>,
    #[serde(default)]
    pub sources: Vec<ApplicationSourceCrd>,
    pub destination: ApplicationDestinationCrd,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default)]
pub struct ApplicationSourceCrd {
    #[serde(rename = "repoURL")]
    pub repo_url: String,
    pub path: Option<String>,
    #[serde(rename = "targetRevision", default)]
    pub target_revision: String,
    pub helm: Option<HelmSourceCrd>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default)]
pub struct HelmSourceCrd {
    #[serde(rename = "valueFiles", default)]
    pub value_files: Vec<String>,
    #[serde(rename = "fileParameters", default)]
    pub file_parameters: Vec<HelmFileParameterCrd>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema)]
pub struct HelmFileParameterCrd {
    pub name: String,
    pub path: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema)]
pub struct ApplicationDestinationCrd {
    pub server: Option<String>,
    pub name: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default)]
pub struct ApplicationStatus {
    #[serde(default)]
    pub health: Option<String>,
}

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[kube(group = "argoproj.io", version = "v1alpha1", kind = "ApplicationSet", namespaced)]
pub struct ApplicationSetCrdSpec {
    pub generators: Vec<serde_json::Value>,
    pub template: ApplicationSetTemplateCrd,
    #[serde(rename = "goTemplate", default)]
    pub go_template: bool,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema)]
pub struct ApplicationSetTemplateCrd {
    pub metadata: ApplicationSetTemplateMetaCrd,
    pub spec: ApplicationCrdSpec,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema)]
pub struct ApplicationSetTemplateMetaCrd {
    pub name: String,
}

pub type ParamsMap = BTreeMap<String, String>;
