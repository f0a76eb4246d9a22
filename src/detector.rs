use std::path::Path;

use crate::models::ProjectType;
use crate::runner::python::PYTHON_MANIFESTS;

/// Auto-detect project types by scanning for known manifest files.
///
/// A Node project is reported once: Yarn when `yarn.lock` exists, npm otherwise.
pub fn detect_project_types(path: &Path) -> Vec<ProjectType> {
    let mut types = Vec::new();

    if path.join("yarn.lock").exists() {
        types.push(ProjectType::Yarn);
    } else if path.join("package.json").exists() {
        types.push(ProjectType::Npm);
    }

    if PYTHON_MANIFESTS.iter().any(|m| path.join(m).exists()) {
        types.push(ProjectType::Python);
    }

    if path.join("pom.xml").exists() {
        types.push(ProjectType::Maven);
    }

    types
}
