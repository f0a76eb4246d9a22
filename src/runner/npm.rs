use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use super::{Resolution, Runner, RunnerOptions};
use crate::engine::LicenseMap;
use crate::error::ResolutionError;
use crate::models::ProjectType;
use crate::tree::{NodeId, RawTree};

/// Runner for npm projects.
///
/// Reads `package.json` and `package-lock.json` (lockfile v1, v2 and v3).
/// When the lockfile is missing it is generated with
/// `npm install --package-lock-only`.
pub struct NpmRunner {
    path: PathBuf,
    options: RunnerOptions,
}

impl NpmRunner {
    pub fn new(path: PathBuf, options: RunnerOptions) -> Self {
        Self { path, options }
    }
}

#[async_trait]
impl Runner for NpmRunner {
    fn project_type(&self) -> ProjectType {
        ProjectType::Npm
    }

    async fn check(&self) -> Result<Resolution, ResolutionError> {
        let manifest = super::require_file(
            &self.path,
            "package.json",
            "run the check from the root of an npm project",
        )?;

        let lock = self.path.join("package-lock.json");
        if !lock.exists() {
            tracing::info!("package-lock.json not found, generating it with npm");
            super::run_command(
                "npm",
                &["install", "--package-lock-only", "--ignore-scripts"],
                &self.path,
                self.options,
                false,
            )
            .await?;
        }

        let package_json = super::read_json(&manifest)?;
        let lock_json = super::read_json(&lock)?;

        let packages = lock_packages(&lock_json)?;
        let tree = build_tree(&package_json, &packages, &self.path);
        let licenses = collect_licenses(&packages, &self.path);

        tracing::debug!(
            packages = packages.len(),
            nodes = tree.len(),
            "resolved npm dependency tree"
        );
        Ok(Resolution { tree, licenses })
    }
}

/// One installed package, keyed by its `node_modules` path in the lockfile.
#[derive(Debug, Clone, PartialEq)]
struct LockPackage {
    name: String,
    version: String,
    license: Option<String>,
    dependencies: Vec<String>,
}

/// Normalize both lockfile layouts into a `path → package` map.
fn lock_packages(lock: &Value) -> Result<BTreeMap<String, LockPackage>, ResolutionError> {
    if let Some(packages) = lock.get("packages").and_then(|v| v.as_object()) {
        return Ok(parse_packages_section(packages));
    }
    if let Some(deps) = lock.get("dependencies").and_then(|v| v.as_object()) {
        let mut out = BTreeMap::new();
        flatten_v1(deps, "", &mut out);
        return Ok(out);
    }
    if lock.get("lockfileVersion").is_some() {
        // A lockfile without dependencies.
        return Ok(BTreeMap::new());
    }
    Err(ResolutionError::invalid(
        "package-lock.json",
        "neither `packages` nor `dependencies` found",
    ))
}

/// Lockfile v2/v3: flat `packages` map keyed by install path.
fn parse_packages_section(packages: &serde_json::Map<String, Value>) -> BTreeMap<String, LockPackage> {
    let mut out = BTreeMap::new();

    for (pkg_path, info) in packages {
        // Skip the root entry (empty string key)
        if pkg_path.is_empty() {
            continue;
        }

        // Workspace links point at the real package entry
        let info = if info.get("link").and_then(|v| v.as_bool()) == Some(true) {
            info.get("resolved")
                .and_then(|r| r.as_str())
                .and_then(|r| packages.get(r))
                .unwrap_or(info)
        } else {
            info
        };

        let name = info
            .get("name")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| package_name_from_path(pkg_path));

        let version = info
            .get("version")
            .and_then(|v| v.as_str())
            .unwrap_or("*")
            .to_string();

        out.insert(
            pkg_path.clone(),
            LockPackage {
                name,
                version,
                license: super::license_from_package_json(info),
                dependencies: dependency_names(info, &["dependencies", "optionalDependencies"]),
            },
        );
    }

    out
}

/// Lockfile v1: nested `dependencies` objects with `requires` maps.
fn flatten_v1(
    deps: &serde_json::Map<String, Value>,
    prefix: &str,
    out: &mut BTreeMap<String, LockPackage>,
) {
    for (name, info) in deps {
        let pkg_path = if prefix.is_empty() {
            format!("node_modules/{}", name)
        } else {
            format!("{}/node_modules/{}", prefix, name)
        };

        let version = info
            .get("version")
            .and_then(|v| v.as_str())
            .unwrap_or("*")
            .to_string();

        out.insert(
            pkg_path.clone(),
            LockPackage {
                name: name.clone(),
                version,
                license: None,
                dependencies: dependency_names(info, &["requires"]),
            },
        );

        if let Some(nested) = info.get("dependencies").and_then(|v| v.as_object()) {
            flatten_v1(nested, &pkg_path, out);
        }
    }
}

fn dependency_names(info: &Value, sections: &[&str]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for section in sections {
        if let Some(deps) = info.get(*section).and_then(|v| v.as_object()) {
            for name in deps.keys() {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }
    }
    names
}

/// Derive package name from path: "node_modules/foo" → "foo",
/// "node_modules/a/node_modules/@scope/foo" → "@scope/foo".
fn package_name_from_path(pkg_path: &str) -> String {
    match pkg_path.rfind("node_modules/") {
        Some(idx) => pkg_path[idx + "node_modules/".len()..].to_string(),
        None => pkg_path.to_string(),
    }
}

/// Find the install path `name` resolves to when required from `from`,
/// following node's lookup: nearest `node_modules` first, then each parent.
fn resolve(packages: &BTreeMap<String, LockPackage>, from: &str, name: &str) -> Option<String> {
    let mut base = from.to_string();
    loop {
        let candidate = if base.is_empty() {
            format!("node_modules/{}", name)
        } else {
            format!("{}/node_modules/{}", base, name)
        };
        if packages.contains_key(&candidate) {
            return Some(candidate);
        }
        if base.is_empty() {
            return None;
        }
        base = match base.rfind("/node_modules/") {
            Some(idx) => base[..idx].to_string(),
            None => String::new(),
        };
    }
}

fn build_tree(
    package_json: &Value,
    packages: &BTreeMap<String, LockPackage>,
    project_dir: &Path,
) -> RawTree {
    let (name, version) = super::node_project_identity(package_json, project_dir);
    let mut tree = RawTree::with_root(name, version);
    let root = tree.root();

    let root_deps: Vec<String> = super::node_root_dependencies(package_json)
        .into_iter()
        .map(|(name, _)| name)
        .collect();

    let mut ancestors = Vec::new();
    add_dependencies(&mut tree, root, "", &root_deps, packages, &mut ancestors);
    tree
}

fn add_dependencies(
    tree: &mut RawTree,
    parent: NodeId,
    from: &str,
    deps: &[String],
    packages: &BTreeMap<String, LockPackage>,
    ancestors: &mut Vec<String>,
) {
    for dep in deps {
        let Some(pkg_path) = resolve(packages, from, dep) else {
            tracing::debug!(package = %dep, from = %from, "dependency not installed, skipping");
            continue;
        };
        // Cycles: a package already on the current path is not expanded again.
        if ancestors.contains(&pkg_path) {
            continue;
        }
        let pkg = &packages[&pkg_path];
        let node = tree.push(parent, &pkg.name, &pkg.version);

        ancestors.push(pkg_path.clone());
        add_dependencies(tree, node, &pkg_path, &pkg.dependencies, packages, ancestors);
        ancestors.pop();
    }
}

/// Licenses from the lockfile, falling back to the installed `package.json`.
fn collect_licenses(packages: &BTreeMap<String, LockPackage>, project_dir: &Path) -> LicenseMap {
    let mut licenses = LicenseMap::new();
    for (pkg_path, pkg) in packages {
        let license = pkg.license.clone().or_else(|| {
            super::installed_node_package(&project_dir.join(pkg_path)).and_then(|(_, l)| l)
        });
        if license.is_some() || !licenses.contains(&pkg.name, &pkg.version) {
            licenses.insert_versioned(&pkg.name, &pkg.version, license);
        }
    }
    licenses
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn render(tree: &RawTree) -> Vec<String> {
        tree.iter()
            .map(|(id, n)| format!("{}{}@{}", "  ".repeat(tree.depth(id)), n.name, n.version))
            .collect()
    }

    #[test]
    fn test_lockfile_v3_tree() {
        let package_json = json!({
            "name": "my-app",
            "version": "1.0.0",
            "dependencies": { "express": "^4.18.2" },
            "devDependencies": { "jest": "^29.0.0" }
        });
        let lock = json!({
            "name": "my-app",
            "lockfileVersion": 3,
            "packages": {
                "": { "name": "my-app", "version": "1.0.0" },
                "node_modules/express": {
                    "version": "4.18.2",
                    "license": "MIT",
                    "dependencies": { "debug": "2.6.9", "qs": "6.11.0" }
                },
                "node_modules/debug": {
                    "version": "2.6.9",
                    "license": "MIT",
                    "dependencies": { "ms": "2.0.0" }
                },
                "node_modules/ms": { "version": "2.1.3", "license": "MIT" },
                "node_modules/debug/node_modules/ms": { "version": "2.0.0", "license": "MIT" },
                "node_modules/qs": { "version": "6.11.0", "license": "BSD-3-Clause" },
                "node_modules/jest": { "version": "29.0.0", "license": "MIT", "dev": true }
            }
        });

        let packages = lock_packages(&lock).unwrap();
        let tree = build_tree(&package_json, &packages, Path::new("/tmp/my-app"));
        assert_eq!(
            render(&tree),
            vec![
                "my-app@1.0.0",
                "  express@4.18.2",
                "    debug@2.6.9",
                "      ms@2.0.0",
                "    qs@6.11.0",
            ]
        );

        let licenses = collect_licenses(&packages, Path::new("/nonexistent"));
        assert_eq!(licenses.get("qs", "6.11.0"), Some("BSD-3-Clause"));
        assert_eq!(licenses.get("ms", "2.1.3"), Some("MIT"));
    }

    #[test]
    fn test_lockfile_v1_tree() {
        let package_json = json!({
            "name": "legacy",
            "version": "0.1.0",
            "dependencies": { "a": "^1.0.0" }
        });
        let lock = json!({
            "lockfileVersion": 1,
            "dependencies": {
                "a": { "version": "1.0.0", "requires": { "b": "^2.0.0" } },
                "b": {
                    "version": "2.0.0",
                    "requires": { "c": "^1.0.0" },
                    "dependencies": { "c": { "version": "1.5.0" } }
                },
                "c": { "version": "3.0.0" }
            }
        });

        let packages = lock_packages(&lock).unwrap();
        let tree = build_tree(&package_json, &packages, Path::new("/tmp/legacy"));
        assert_eq!(
            render(&tree),
            vec!["legacy@0.1.0", "  a@1.0.0", "    b@2.0.0", "      c@1.5.0"]
        );
    }

    #[test]
    fn test_cycles_are_cut() {
        let package_json = json!({ "name": "cyc", "dependencies": { "a": "1" } });
        let lock = json!({
            "lockfileVersion": 3,
            "packages": {
                "node_modules/a": { "version": "1.0.0", "dependencies": { "b": "1" } },
                "node_modules/b": { "version": "1.0.0", "dependencies": { "a": "1" } }
            }
        });
        let packages = lock_packages(&lock).unwrap();
        let tree = build_tree(&package_json, &packages, Path::new("/tmp/cyc"));
        assert_eq!(render(&tree), vec!["cyc@", "  a@1.0.0", "    b@1.0.0"]);
    }

    #[test]
    fn test_scoped_and_nested_names() {
        assert_eq!(package_name_from_path("node_modules/foo"), "foo");
        assert_eq!(
            package_name_from_path("node_modules/a/node_modules/@scope/foo"),
            "@scope/foo"
        );
    }

    #[test]
    fn test_resolve_walks_up() {
        let mut packages = BTreeMap::new();
        for path in ["node_modules/a", "node_modules/a/node_modules/b", "node_modules/c"] {
            packages.insert(
                path.to_string(),
                LockPackage {
                    name: package_name_from_path(path),
                    version: "1".into(),
                    license: None,
                    dependencies: vec![],
                },
            );
        }
        assert_eq!(
            resolve(&packages, "node_modules/a", "b").as_deref(),
            Some("node_modules/a/node_modules/b")
        );
        assert_eq!(
            resolve(&packages, "node_modules/a/node_modules/b", "c").as_deref(),
            Some("node_modules/c")
        );
        assert_eq!(resolve(&packages, "node_modules/a", "zzz"), None);
    }

    #[test]
    fn test_invalid_lockfile() {
        let err = lock_packages(&json!({ "name": "x" })).unwrap_err();
        assert!(matches!(err, ResolutionError::InvalidOutput { .. }));
    }

    #[test]
    fn test_license_read_from_node_modules() {
        let dir = TempDir::new().unwrap();
        let installed = dir.path().join("node_modules").join("left-pad");
        std::fs::create_dir_all(&installed).unwrap();
        std::fs::write(
            installed.join("package.json"),
            r#"{ "name": "left-pad", "version": "1.3.0", "license": "WTFPL" }"#,
        )
        .unwrap();

        let lock = json!({
            "lockfileVersion": 2,
            "packages": { "node_modules/left-pad": { "version": "1.3.0" } }
        });
        let packages = lock_packages(&lock).unwrap();
        let licenses = collect_licenses(&packages, dir.path());
        assert_eq!(licenses.get("left-pad", "1.3.0"), Some("WTFPL"));
    }

    #[tokio::test]
    async fn test_check_without_manifest() {
        let dir = TempDir::new().unwrap();
        let runner = NpmRunner::new(dir.path().to_path_buf(), RunnerOptions::default());
        let err = runner.check().await.unwrap_err();
        assert!(matches!(
            err,
            ResolutionError::ManifestNotFound { manifest: "package.json", .. }
        ));
    }

    #[tokio::test]
    async fn test_check_reads_project() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("package.json"),
            r#"{ "name": "app", "version": "2.0.0", "dependencies": { "lodash": "^4.17.21" } }"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("package-lock.json"),
            r#"{
  "lockfileVersion": 3,
  "packages": {
    "": { "name": "app", "version": "2.0.0" },
    "node_modules/lodash": { "version": "4.17.21", "license": "MIT" }
  }
}"#,
        )
        .unwrap();

        let runner = NpmRunner::new(dir.path().to_path_buf(), RunnerOptions::default());
        let resolution = runner.check().await.unwrap();
        assert_eq!(render(&resolution.tree), vec!["app@2.0.0", "  lodash@4.17.21"]);
        assert_eq!(resolution.licenses.get("lodash", "4.17.21"), Some("MIT"));
    }
}
