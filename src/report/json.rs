use serde::Serialize;

use super::ProjectReport;
use crate::engine::AnnotatedTree;
use crate::models::{LicenseStatus, ProjectType};
use crate::tree::NodeId;

/// One project in the JSON output.
#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub project_type: ProjectType,
    pub total_packages: usize,
    pub unknown_licenses: Vec<String>,
    pub tree: JsonNode<'a>,
}

#[derive(Debug, Serialize)]
pub struct JsonNode<'a> {
    pub name: &'a str,
    pub version: &'a str,
    pub license: Option<&'a str>,
    pub status: LicenseStatus,
    pub dependencies: Vec<JsonNode<'a>>,
}

impl<'a> JsonReport<'a> {
    pub fn new(report: &'a ProjectReport, full: bool) -> Self {
        Self {
            project_type: report.project_type,
            total_packages: report.total_packages(),
            unknown_licenses: report.unknown.iter().map(ToString::to_string).collect(),
            tree: json_node(report.displayed(full), report.displayed(full).root()),
        }
    }
}

fn json_node(tree: &AnnotatedTree, id: NodeId) -> JsonNode<'_> {
    let node = tree.node(id);
    JsonNode {
        name: &node.name,
        version: &node.version,
        license: node.data.license.as_deref(),
        status: node.data.status,
        dependencies: node
            .children()
            .iter()
            .map(|child| json_node(tree, *child))
            .collect(),
    }
}

/// Serialize all reports as a pretty-printed JSON array.
pub fn render(reports: &[ProjectReport], full: bool) -> serde_json::Result<String> {
    let documents: Vec<JsonReport<'_>> = reports.iter().map(|r| JsonReport::new(r, full)).collect();
    serde_json::to_string_pretty(&documents)
}
