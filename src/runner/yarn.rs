use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use regex::Regex;

use super::{Resolution, Runner};
use crate::engine::LicenseMap;
use crate::error::ResolutionError;
use crate::models::ProjectType;
use crate::tree::{NodeId, RawTree};

/// Runner for yarn projects (classic `yarn.lock` v1 and berry lockfiles).
///
/// Works from the lockfile alone and never invokes yarn.
pub struct YarnRunner {
    path: PathBuf,
}

impl YarnRunner {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl Runner for YarnRunner {
    fn project_type(&self) -> ProjectType {
        ProjectType::Yarn
    }

    async fn check(&self) -> Result<Resolution, ResolutionError> {
        let manifest = super::require_file(
            &self.path,
            "package.json",
            "run the check from the root of a yarn project",
        )?;
        let lock = super::require_file(&self.path, "yarn.lock", "run `yarn install` first")?;

        let package_json = super::read_json(&manifest)?;
        let content = std::fs::read_to_string(&lock).map_err(|e| ResolutionError::io(&lock, e))?;
        let entries = parse_yarn_lock(&content)?;

        let tree = build_tree(&package_json, &entries, &self.path);
        let licenses = collect_licenses(&entries, &self.path);

        tracing::debug!(
            entries = entries.len(),
            nodes = tree.len(),
            "resolved yarn dependency tree"
        );
        Ok(Resolution { tree, licenses })
    }
}

/// One resolved lockfile entry. Several `name@range` specs may share it.
#[derive(Debug, Clone, PartialEq)]
struct YarnEntry {
    name: String,
    version: String,
    dependencies: Vec<(String, String)>,
}

/// Lockfile entries keyed by every `name@range` spec of their header.
type YarnLock = HashMap<String, YarnEntry>;

#[derive(PartialEq)]
enum Section {
    None,
    Dependencies,
}

/// Parse `yarn.lock`, a custom line-based format shared (loosely) by classic and berry.
fn parse_yarn_lock(content: &str) -> Result<YarnLock, ResolutionError> {
    // "foo@^1.0.0", "@scope/foo@npm:^1.0.0"
    let spec_re = Regex::new(r#"^(@?[^@]+)@(.+)$"#)
        .map_err(|e| ResolutionError::invalid("yarn.lock", e))?;

    let mut entries = YarnLock::new();
    let mut specs: Vec<String> = Vec::new();
    let mut current: Option<YarnEntry> = None;
    let mut section = Section::None;

    let mut flush = |specs: &mut Vec<String>, current: &mut Option<YarnEntry>| {
        if let Some(entry) = current.take() {
            if !entry.version.is_empty() {
                for spec in specs.drain(..) {
                    entries.insert(spec, entry.clone());
                }
            }
        }
        specs.clear();
    };

    for line in content.lines() {
        // Skip comments and empty lines
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            continue;
        }

        let indent = line.len() - line.trim_start().len();

        // Package header (not indented, ends with ":")
        if indent == 0 {
            flush(&mut specs, &mut current);
            section = Section::None;

            let header = line.trim_end().trim_end_matches(':');
            let mut name = None;
            for raw in header.split(',') {
                let raw = raw.trim().trim_matches('"');
                if let Some(caps) = spec_re.captures(raw) {
                    let pkg = caps[1].to_string();
                    let range = strip_protocol(&caps[2]);
                    specs.push(format!("{}@{}", pkg, range));
                    name.get_or_insert(pkg);
                }
            }
            current = name
                .filter(|n| n != "__metadata")
                .map(|name| YarnEntry {
                    name,
                    version: String::new(),
                    dependencies: Vec::new(),
                });
            continue;
        }

        let Some(entry) = current.as_mut() else {
            continue;
        };
        let Some((key, value)) = split_field(line) else {
            continue;
        };

        if indent <= 2 {
            section = match key.as_str() {
                "dependencies" | "optionalDependencies" if value.is_empty() => {
                    Section::Dependencies
                }
                _ => Section::None,
            };
            if key == "version" {
                entry.version = value;
            }
        } else if section == Section::Dependencies {
            entry.dependencies.push((key, strip_protocol(&value)));
        }
    }
    flush(&mut specs, &mut current);

    Ok(entries)
}

/// Split `key "value"`, `key: value` or `"key" value` into its parts.
fn split_field(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    let (key, rest) = if let Some(stripped) = line.strip_prefix('"') {
        let end = stripped.find('"')?;
        (&stripped[..end], &stripped[end + 1..])
    } else {
        let end = line
            .find(|c: char| c == ':' || c.is_whitespace())
            .unwrap_or(line.len());
        (&line[..end], &line[end..])
    };
    let value = rest.trim_start().trim_start_matches(':').trim().trim_matches('"');
    Some((key.to_string(), value.to_string()))
}

/// Berry prefixes ranges with their protocol (`npm:^1.0.0`).
fn strip_protocol(range: &str) -> String {
    range.strip_prefix("npm:").unwrap_or(range).to_string()
}

fn build_tree(package_json: &serde_json::Value, entries: &YarnLock, project_dir: &Path) -> RawTree {
    let (name, version) = super::node_project_identity(package_json, project_dir);
    let mut tree = RawTree::with_root(name, version);
    let root = tree.root();

    let root_deps = super::node_root_dependencies(package_json);
    let mut ancestors = Vec::new();
    add_dependencies(&mut tree, root, &root_deps, entries, &mut ancestors);
    tree
}

fn add_dependencies(
    tree: &mut RawTree,
    parent: NodeId,
    deps: &[(String, String)],
    entries: &YarnLock,
    ancestors: &mut Vec<String>,
) {
    for (name, range) in deps {
        let spec = format!("{}@{}", name, strip_protocol(range));
        let Some(entry) = entries.get(&spec) else {
            tracing::debug!(spec = %spec, "no yarn.lock entry, skipping");
            continue;
        };
        let key = format!("{}@{}", entry.name, entry.version);
        if ancestors.contains(&key) {
            continue;
        }
        let node = tree.push(parent, &entry.name, &entry.version);

        ancestors.push(key);
        add_dependencies(tree, node, &entry.dependencies, entries, ancestors);
        ancestors.pop();
    }
}

/// Licenses of the packages installed under `node_modules`, hoisted or
/// nested, when their version matches the lockfile entry.
fn collect_licenses(entries: &YarnLock, project_dir: &Path) -> LicenseMap {
    let mut installed = HashMap::new();
    installed_packages(&project_dir.join("node_modules"), &mut installed);

    let mut licenses = LicenseMap::new();
    for entry in entries.values() {
        if licenses.contains(&entry.name, &entry.version) {
            continue;
        }
        let license = installed
            .get(&(entry.name.clone(), entry.version.clone()))
            .cloned()
            .flatten();
        licenses.insert_versioned(&entry.name, &entry.version, license);
    }

    licenses
}

type Installed = HashMap<(String, String), Option<String>>;

/// Record every package found in `node_modules`, then walk its own
/// `node_modules` for nested installs.
fn installed_packages(node_modules: &Path, out: &mut Installed) {
    let Ok(dir) = std::fs::read_dir(node_modules) else {
        return;
    };
    for entry in dir.flatten() {
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if file_name.starts_with('.') {
            continue;
        }
        if file_name.starts_with('@') {
            let Ok(scoped) = std::fs::read_dir(entry.path()) else {
                continue;
            };
            for inner in scoped.flatten() {
                let name = format!("{}/{}", file_name, inner.file_name().to_string_lossy());
                record_package(&inner, name, out);
            }
        } else {
            record_package(&entry, file_name, out);
        }
    }
}

fn record_package(entry: &std::fs::DirEntry, name: String, out: &mut Installed) {
    let dir = entry.path();
    if let Some((version, license)) = super::installed_node_package(&dir) {
        out.entry((name, version)).or_insert(license);
    }
    // Workspace links can point back up the tree.
    let is_link = entry.file_type().map(|t| t.is_symlink()).unwrap_or(false);
    if !is_link {
        installed_packages(&dir.join("node_modules"), out);
    }
}
