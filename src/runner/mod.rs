//! Per-ecosystem dependency resolution.
//!
//! Every runner turns a project directory into a [`RawTree`] plus a
//! [`LicenseMap`]. The engine is agnostic of where they came from.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde_json::Value;

use crate::engine::LicenseMap;
use crate::error::ResolutionError;
use crate::models::ProjectType;
use crate::tree::RawTree;

pub mod maven;
pub mod npm;
pub mod python;
pub mod yarn;

/// Caller-supplied flags shared by all runners.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunnerOptions {
    /// Discard the output of package-manager subprocesses.
    pub silent: bool,
    /// Log every command that is run.
    pub debug: bool,
}

/// Output of a successful [`Runner::check`].
#[derive(Debug, Clone)]
pub struct Resolution {
    pub tree: RawTree,
    pub licenses: LicenseMap,
}

#[async_trait]
pub trait Runner: Send + Sync {
    fn project_type(&self) -> ProjectType;

    /// Resolve the dependency tree and the licenses of its packages.
    async fn check(&self) -> Result<Resolution, ResolutionError>;
}

/// Pick the runner for `project_type`.
pub fn runner_for(project_type: ProjectType, path: &Path, options: RunnerOptions) -> Box<dyn Runner> {
    let path = path.to_path_buf();
    match project_type {
        ProjectType::Npm => Box::new(npm::NpmRunner::new(path, options)),
        ProjectType::Yarn => Box::new(yarn::YarnRunner::new(path)),
        ProjectType::Python => Box::new(python::PythonRunner::new(path, options)),
        ProjectType::Maven => Box::new(maven::MavenRunner::new(path, options)),
    }
}

/// Run an external command in `cwd` and return its stdout.
///
/// When `capture` is false, stdout is discarded in silent mode and inherited
/// otherwise. Stderr is captured in silent mode so it can be reported on
/// failure.
pub(crate) async fn run_command(
    program: &str,
    args: &[&str],
    cwd: &Path,
    options: RunnerOptions,
    capture: bool,
) -> Result<String, ResolutionError> {
    let command_line = format!("{} {}", program, args.join(" "));
    if options.debug {
        tracing::debug!(cwd = %cwd.display(), "running `{}`", command_line);
    }

    let stdout = if capture {
        Stdio::piped()
    } else if options.silent {
        Stdio::null()
    } else {
        Stdio::inherit()
    };
    let stderr = if options.silent {
        Stdio::piped()
    } else {
        Stdio::inherit()
    };

    let output = tokio::process::Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(stderr)
        .output()
        .await
        .map_err(|source| ResolutionError::ProcessSpawn {
            command: command_line.clone(),
            source,
        })?;

    if !output.status.success() {
        return Err(ResolutionError::ProcessFailed {
            command: command_line,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

pub(crate) fn read_json(path: &Path) -> Result<Value, ResolutionError> {
    let content = std::fs::read_to_string(path).map_err(|e| ResolutionError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| ResolutionError::invalid(display_name(path), e))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub(crate) fn require_file(
    dir: &Path,
    manifest: &'static str,
    hint: &'static str,
) -> Result<PathBuf, ResolutionError> {
    let path = dir.join(manifest);
    if path.exists() {
        Ok(path)
    } else {
        Err(ResolutionError::ManifestNotFound {
            manifest,
            dir: dir.to_path_buf(),
            hint,
        })
    }
}

/// License declared in a `package.json` document.
///
/// Accepts `"license": "MIT"`, `"license": { "type": "MIT" }` and the legacy
/// `"licenses": [...]` array, whose entries are joined with ` OR `.
pub(crate) fn license_from_package_json(json: &Value) -> Option<String> {
    fn entry(v: &Value) -> Option<String> {
        match v {
            Value::String(s) => Some(s.clone()),
            Value::Object(o) => o.get("type").and_then(|t| t.as_str()).map(str::to_string),
            _ => None,
        }
    }

    if let Some(license) = json.get("license").and_then(entry) {
        return Some(license);
    }

    let licenses: Vec<String> = json
        .get("licenses")
        .and_then(|v| v.as_array())
        .map(|items| items.iter().filter_map(entry).collect())
        .unwrap_or_default();

    if licenses.is_empty() {
        None
    } else {
        Some(licenses.join(" OR "))
    }
}

/// Read the license of an installed Node package from its own `package.json`.
///
/// Returns the declared version alongside so callers can check it matches.
pub(crate) fn installed_node_package(dir: &Path) -> Option<(String, Option<String>)> {
    let content = std::fs::read_to_string(dir.join("package.json")).ok()?;
    let json: Value = serde_json::from_str(&content).ok()?;
    let version = json.get("version").and_then(|v| v.as_str())?.to_string();
    Some((version, license_from_package_json(&json)))
}

/// Root name and version from a project's `package.json`.
pub(crate) fn node_project_identity(package_json: &Value, dir: &Path) -> (String, String) {
    let name = package_json
        .get("name")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| dir_name(dir));
    let version = package_json
        .get("version")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    (name, version)
}

/// Production dependencies declared in a `package.json` (`dependencies` and
/// `optionalDependencies`), as `(name, range)` pairs.
pub(crate) fn node_root_dependencies(package_json: &Value) -> Vec<(String, String)> {
    let mut deps: Vec<(String, String)> = Vec::new();
    for section in &["dependencies", "optionalDependencies"] {
        if let Some(pkgs) = package_json.get(section).and_then(|v| v.as_object()) {
            for (name, range) in pkgs {
                if deps.iter().any(|(n, _)| n == name) {
                    continue;
                }
                deps.push((name.clone(), range.as_str().unwrap_or("*").to_string()));
            }
        }
    }
    deps
}

pub(crate) fn dir_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "project".to_string())
}
