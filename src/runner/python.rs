use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;

use super::{Resolution, Runner, RunnerOptions};
use crate::engine::LicenseMap;
use crate::error::ResolutionError;
use crate::models::ProjectType;
use crate::tree::{NodeId, RawTree};

/// Manifests that mark a directory as a Python project.
pub const PYTHON_MANIFESTS: &[&str] = &["pyproject.toml", "requirements.txt", "Pipfile", "setup.py"];

/// Packages of the tooling itself, hidden from the tree.
const TOOLING_PACKAGES: &str = "pip,pipdeptree,setuptools,wheel";

/// Runner for Python projects.
///
/// Inspects the project's installed environment: `pipdeptree` provides the
/// dependency forest and `pip show` the license metadata. The project's
/// `.venv` interpreter is used when present.
pub struct PythonRunner {
    path: PathBuf,
    options: RunnerOptions,
}

impl PythonRunner {
    pub fn new(path: PathBuf, options: RunnerOptions) -> Self {
        Self { path, options }
    }

    fn interpreter(&self) -> String {
        let candidates = [
            self.path.join(".venv").join("bin").join("python"),
            self.path.join("venv").join("bin").join("python"),
            self.path.join(".venv").join("Scripts").join("python.exe"),
        ];
        candidates
            .iter()
            .find(|p| p.exists())
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "python3".to_string())
    }
}

#[async_trait]
impl Runner for PythonRunner {
    fn project_type(&self) -> ProjectType {
        ProjectType::Python
    }

    async fn check(&self) -> Result<Resolution, ResolutionError> {
        if !PYTHON_MANIFESTS.iter().any(|m| self.path.join(m).exists()) {
            return Err(ResolutionError::ManifestNotFound {
                manifest: "pyproject.toml",
                dir: self.path.clone(),
                hint: "expected pyproject.toml, requirements.txt, Pipfile or setup.py",
            });
        }

        let python = self.interpreter();
        tracing::debug!(python = %python, "using python interpreter");

        let forest_json = super::run_command(
            &python,
            &["-m", "pipdeptree", "--json-tree", "--exclude", TOOLING_PACKAGES],
            &self.path,
            self.options,
            true,
        )
        .await?;
        let forest = parse_pipdeptree(&forest_json)?;

        let (name, version) = project_identity(&self.path);
        let tree = build_tree(name, version, &forest);

        let mut licenses = LicenseMap::with_key_fn(normalize_name);
        let packages: Vec<String> = tree.flatten().into_iter().map(|(name, _)| name).collect();
        if !packages.is_empty() {
            let mut args = vec!["-m", "pip", "show", "--verbose"];
            args.extend(packages.iter().map(String::as_str));
            let show = super::run_command(&python, &args, &self.path, self.options, true).await?;
            for (name, license) in parse_pip_show(&show) {
                licenses.insert_name(&name, license);
            }
        }

        Ok(Resolution { tree, licenses })
    }
}

/// PEP 503 name normalization: case-insensitive, `-`, `_` and `.` equivalent.
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase().replace(['_', '.'], "-")
}

/// One node of `pipdeptree --json-tree` output.
#[derive(Debug, Deserialize)]
struct PipNode {
    package_name: String,
    installed_version: String,
    #[serde(default)]
    dependencies: Vec<PipNode>,
}

fn parse_pipdeptree(output: &str) -> Result<Vec<PipNode>, ResolutionError> {
    serde_json::from_str(output).map_err(|e| ResolutionError::invalid("pipdeptree output", e))
}

fn build_tree(name: String, version: String, forest: &[PipNode]) -> RawTree {
    let mut tree = RawTree::with_root(name, version);
    let root = tree.root();
    let mut ancestors = Vec::new();
    add_nodes(&mut tree, root, forest, &mut ancestors);
    tree
}

fn add_nodes(tree: &mut RawTree, parent: NodeId, nodes: &[PipNode], ancestors: &mut Vec<String>) {
    for pip in nodes {
        let key = normalize_name(&pip.package_name);
        if ancestors.contains(&key) {
            continue;
        }
        let node = tree.push(parent, &pip.package_name, &pip.installed_version);
        ancestors.push(key);
        add_nodes(tree, node, &pip.dependencies, ancestors);
        ancestors.pop();
    }
}

/// Fields whose value names the license.
const LICENSE_FIELDS: [&str; 2] = ["License-Expression", "License"];

/// Parse `pip show --verbose` output into `(name, license)` pairs.
///
/// `License-Expression` wins over `License`; when both are missing the last
/// `License ::` trove classifier is used. `UNKNOWN` counts as missing, and so
/// does a value spanning several lines: that is license text, not a name.
fn parse_pip_show(output: &str) -> Vec<(String, Option<String>)> {
    let mut result = Vec::new();

    for block in output.split("\n---") {
        let mut fields: HashMap<&str, &str> = HashMap::new();
        let mut license_text: Vec<&str> = Vec::new();
        let mut classifier_license = None;
        let mut last_key: Option<&str> = None;

        for line in block.lines() {
            let continuation = line.starts_with(char::is_whitespace) || field_name(line).is_none();
            if continuation {
                let text = line.trim();
                match last_key {
                    Some("Classifiers") => {
                        if let Some(rest) = text.strip_prefix("License ::") {
                            if let Some(last) = rest.rsplit("::").next() {
                                classifier_license = Some(last.trim().to_string());
                            }
                        }
                    }
                    Some(key) if LICENSE_FIELDS.contains(&key) && !text.is_empty() => {
                        license_text.push(key);
                    }
                    _ => {}
                }
                continue;
            }

            if let Some((key, value)) = line.split_once(':') {
                let key = key.trim();
                last_key = Some(key);
                if key != "Classifiers" {
                    fields.entry(key).or_insert(value.trim());
                }
            }
        }

        let Some(name) = fields.get("Name").filter(|n| !n.is_empty()) else {
            continue;
        };

        let license = LICENSE_FIELDS
            .iter()
            .filter(|k| !license_text.contains(*k))
            .filter_map(|k| fields.get(k))
            .map(|v| v.trim())
            .find(|v| !v.is_empty() && !v.eq_ignore_ascii_case("UNKNOWN"))
            .map(str::to_string)
            .or(classifier_license);

        result.push((name.to_string(), license));
    }

    result
}

/// `Key` of a `Key: value` metadata line.
fn field_name(line: &str) -> Option<&str> {
    let (key, _) = line.split_once(':')?;
    let valid = !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    valid.then_some(key)
}

#[derive(Debug, Deserialize)]
struct Pyproject {
    project: Option<PyprojectProject>,
    tool: Option<PyprojectTool>,
}

#[derive(Debug, Deserialize)]
struct PyprojectProject {
    name: Option<String>,
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PyprojectTool {
    poetry: Option<PyprojectProject>,
}

/// Project name and version from `pyproject.toml` (`[project]` or
/// `[tool.poetry]`), falling back to the directory name.
fn project_identity(dir: &Path) -> (String, String) {
    let parsed = std::fs::read_to_string(dir.join("pyproject.toml"))
        .ok()
        .and_then(|content| toml::from_str::<Pyproject>(&content).ok());

    let project = parsed.and_then(|p| p.project.or(p.tool.and_then(|t| t.poetry)));
    let name = project
        .as_ref()
        .and_then(|p| p.name.clone())
        .unwrap_or_else(|| super::dir_name(dir));
    let version = project.and_then(|p| p.version).unwrap_or_default();
    (name, version)
}
