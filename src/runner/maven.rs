use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;

use super::{Resolution, Runner, RunnerOptions};
use crate::engine::LicenseMap;
use crate::error::ResolutionError;
use crate::models::ProjectType;
use crate::tree::{NodeId, RawTree};

/// How many `<parent>` POMs are followed when looking for a license.
const MAX_PARENT_DEPTH: usize = 5;

/// Runner for Maven projects.
///
/// Resolves the tree with `mvn dependency:tree` in Trivial Graph Format and
/// reads licenses from the POMs cached in the local repository.
pub struct MavenRunner {
    path: PathBuf,
    options: RunnerOptions,
    local_repository: Option<PathBuf>,
}

impl MavenRunner {
    pub fn new(path: PathBuf, options: RunnerOptions) -> Self {
        let local_repository = dirs::home_dir().map(|h| h.join(".m2").join("repository"));
        Self {
            path,
            options,
            local_repository,
        }
    }
}

#[async_trait]
impl Runner for MavenRunner {
    fn project_type(&self) -> ProjectType {
        ProjectType::Maven
    }

    async fn check(&self) -> Result<Resolution, ResolutionError> {
        super::require_file(&self.path, "pom.xml", "run the check from the Maven project root")?;

        let output = tempfile::Builder::new()
            .prefix("license-tree-")
            .suffix(".tgf")
            .tempfile()
            .map_err(|e| ResolutionError::io(std::env::temp_dir(), e))?;
        let output_arg = format!("-DoutputFile={}", output.path().display());

        let mut args = vec!["dependency:tree", "-DoutputType=tgf", output_arg.as_str()];
        if self.options.silent {
            args.push("--batch-mode");
            args.push("--quiet");
        }
        super::run_command("mvn", &args, &self.path, self.options, false).await?;

        let content = std::fs::read_to_string(output.path())
            .map_err(|e| ResolutionError::io(output.path(), e))?;
        let tree = parse_tgf(&content)?;

        let licenses = match &self.local_repository {
            Some(repo) => collect_licenses(&tree, repo),
            None => LicenseMap::new(),
        };
        Ok(Resolution { tree, licenses })
    }
}

/// Parse `mvn dependency:tree -DoutputType=tgf` output.
///
/// ```text
/// 1 com.example:app:jar:1.0.0
/// 2 org.slf4j:slf4j-api:jar:2.0.7:compile
/// #
/// 1 2 compile
/// ```
///
/// The first node is the project itself.
fn parse_tgf(content: &str) -> Result<RawTree, ResolutionError> {
    let mut nodes: Vec<(String, String, String)> = Vec::new();
    let mut edges: HashMap<String, Vec<String>> = HashMap::new();
    let mut in_edges = false;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "#" {
            in_edges = true;
            continue;
        }
        let mut parts = line.split_whitespace();
        let (Some(first), Some(second)) = (parts.next(), parts.next()) else {
            return Err(ResolutionError::invalid(
                "dependency:tree output",
                format!("unexpected line `{}`", line),
            ));
        };

        if in_edges {
            edges
                .entry(first.to_string())
                .or_default()
                .push(second.to_string());
        } else {
            let is_root = nodes.is_empty();
            let (name, version) = parse_coordinates(second, !is_root).ok_or_else(|| {
                ResolutionError::invalid(
                    "dependency:tree output",
                    format!("malformed coordinates `{}`", second),
                )
            })?;
            nodes.push((first.to_string(), name, version));
        }
    }

    let Some((root_id, root_name, root_version)) = nodes.first() else {
        return Err(ResolutionError::invalid("dependency:tree output", "no nodes"));
    };

    let by_id: HashMap<&str, (&str, &str)> = nodes
        .iter()
        .map(|(id, name, version)| (id.as_str(), (name.as_str(), version.as_str())))
        .collect();

    let mut tree = RawTree::with_root(root_name, root_version);
    let root = tree.root();
    let mut ancestors = vec![root_id.clone()];
    add_edges(&mut tree, root, root_id, &edges, &by_id, &mut ancestors);
    Ok(tree)
}

fn add_edges(
    tree: &mut RawTree,
    parent: NodeId,
    from: &str,
    edges: &HashMap<String, Vec<String>>,
    by_id: &HashMap<&str, (&str, &str)>,
    ancestors: &mut Vec<String>,
) {
    let Some(targets) = edges.get(from) else {
        return;
    };
    for target in targets {
        if ancestors.contains(target) {
            continue;
        }
        let Some((name, version)) = by_id.get(target.as_str()) else {
            continue;
        };
        let node = tree.push(parent, *name, *version);
        ancestors.push(target.clone());
        add_edges(tree, node, target, edges, by_id, ancestors);
        ancestors.pop();
    }
}

/// Split `group:artifact:type[:classifier]:version[:scope]` into
/// (`group:artifact`, `version`). Dependencies carry a scope, the root does not.
fn parse_coordinates(coords: &str, has_scope: bool) -> Option<(String, String)> {
    let mut parts: Vec<&str> = coords.split(':').collect();
    if has_scope {
        parts.pop();
    }
    let version = match parts.len() {
        4 => parts[3],
        5 => parts[4],
        _ => return None,
    };
    Some((format!("{}:{}", parts[0], parts[1]), version.to_string()))
}

/// License name and parent coordinates extracted from a POM.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct PomInfo {
    pub license: Option<String>,
    pub parent: Option<(String, String, String)>,
}

/// Extract the first `<license><name>` and the `<parent>` coordinates from a POM.
pub(crate) fn parse_pom(xml: &str) -> PomInfo {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut path: Vec<String> = Vec::new();
    let mut info = PomInfo::default();
    let (mut group, mut artifact, mut version) = (String::new(), String::new(), String::new());

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let tag = String::from_utf8_lossy(e.name().local_name().as_ref()).into_owned();
                path.push(tag);
            }
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().unwrap_or_default().to_string();
                let tags: Vec<&str> = path.iter().map(String::as_str).collect();
                match tags.as_slice() {
                    ["project", "licenses", "license", "name"] if info.license.is_none() => {
                        info.license = Some(text);
                    }
                    ["project", "parent", "groupId"] => group = text,
                    ["project", "parent", "artifactId"] => artifact = text,
                    ["project", "parent", "version"] => version = text,
                    _ => {}
                }
            }
            Ok(Event::End(_)) => {
                path.pop();
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    if !group.is_empty() && !artifact.is_empty() && !version.is_empty() {
        info.parent = Some((group, artifact, version));
    }
    info
}

fn pom_path(repo: &Path, group: &str, artifact: &str, version: &str) -> PathBuf {
    let mut path = repo.to_path_buf();
    for segment in group.split('.') {
        path.push(segment);
    }
    path.join(artifact)
        .join(version)
        .join(format!("{}-{}.pom", artifact, version))
}

/// License of an artifact from the local repository, following parent POMs.
fn local_license(repo: &Path, name: &str, version: &str) -> Option<String> {
    let (group, artifact) = name.split_once(':')?;
    let mut coords = (group.to_string(), artifact.to_string(), version.to_string());

    for _ in 0..MAX_PARENT_DEPTH {
        let xml = std::fs::read_to_string(pom_path(repo, &coords.0, &coords.1, &coords.2)).ok()?;
        let info = parse_pom(&xml);
        if info.license.is_some() {
            return info.license;
        }
        coords = info.parent?;
    }
    None
}

fn collect_licenses(tree: &RawTree, repo: &Path) -> LicenseMap {
    let mut licenses = LicenseMap::new();
    for (name, version) in tree.flatten() {
        let license = local_license(repo, &name, &version);
        licenses.insert_versioned(&name, &version, license);
    }
    licenses
}
