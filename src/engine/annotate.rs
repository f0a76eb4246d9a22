use std::collections::BTreeSet;

use crate::engine::license_map::LicenseMap;
use crate::models::LicenseStatus;
use crate::tree::{DependencyTree, NodeId, RawTree};
use crate::whitelist::{is_compliant, Whitelist};

/// License information attached to each node by [`annotate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub license: Option<String>,
    pub status: LicenseStatus,
    /// Some strict descendant is not [`LicenseStatus::Ok`].
    pub subtree_problem: bool,
}

impl Annotation {
    /// The node itself or something below it needs attention.
    pub fn has_problem(&self) -> bool {
        !self.status.is_ok() || self.subtree_problem
    }
}

pub type AnnotatedTree = DependencyTree<Annotation>;

/// A license that was seen during annotation but is not whitelisted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UnknownLicense {
    /// A license string absent from the whitelist.
    License(String),
    /// At least one package had no resolvable license.
    Missing,
}

impl std::fmt::Display for UnknownLicense {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnknownLicense::License(license) => write!(f, "{}", license),
            UnknownLicense::Missing => write!(f, "UNKNOWN"),
        }
    }
}

pub type UnknownLicenses = BTreeSet<UnknownLicense>;

/// Attach a license and a compliance status to every node of `raw`.
///
/// The root is always `Ok` and never contributes to the returned set. The
/// input tree is left untouched so it can be re-annotated after the
/// whitelist changes.
pub fn annotate(
    raw: &RawTree,
    licenses: &LicenseMap,
    whitelist: &Whitelist,
) -> (AnnotatedTree, UnknownLicenses) {
    let mut unknown = UnknownLicenses::new();

    let mut tree = raw.map(|id, node| {
        let license = licenses.get(&node.name, &node.version).map(str::to_string);

        let status = if raw.is_root(id) {
            LicenseStatus::Ok
        } else if is_compliant(license.as_deref(), whitelist) {
            LicenseStatus::Ok
        } else if let Some(license) = &license {
            unknown.insert(UnknownLicense::License(license.clone()));
            LicenseStatus::Violation
        } else {
            unknown.insert(UnknownLicense::Missing);
            LicenseStatus::Unknown
        };

        Annotation {
            license,
            status,
            subtree_problem: false,
        }
    });

    mark_problem_paths(&mut tree);

    (tree, unknown)
}

/// Set `subtree_problem` on every ancestor of a non-`Ok` node.
fn mark_problem_paths(tree: &mut AnnotatedTree) {
    let order: Vec<NodeId> = tree.iter().map(|(id, _)| id).collect();

    // Reverse pre-order visits every child before its parent.
    for id in order.into_iter().rev() {
        let node = tree.node(id);
        if let Some(parent) = node.parent() {
            if node.data.has_problem() {
                tree.node_mut(parent).data.subtree_problem = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::tests::sample_tree;

    fn sample_licenses() -> LicenseMap {
        let mut map = LicenseMap::new();
        for (name, version, license) in [
            ("Name", "", "MIT"),
            ("@company/package1", "1.1.1", "MIT"),
            ("package2", "2.2.2", "MIT"),
            ("package3", "3.3.3", "MIT"),
            ("package4", "4.4.4", "MIT"),
            ("package5", "5.5.5", "MIT"),
            ("package6", "6.6.6", "GPL"),
            ("package7", "7.7.7", "MIT"),
            ("package7", "7.7.6", "GPL"),
        ] {
            map.insert_versioned(name, version, Some(license.to_string()));
        }
        map
    }

    fn find(tree: &AnnotatedTree, name: &str, version: &str) -> Vec<Annotation> {
        tree.iter()
            .filter(|(_, n)| n.name == name && n.version == version)
            .map(|(_, n)| n.data.clone())
            .collect()
    }

    #[test]
    fn test_bad_licenses_identified() {
        let whitelist = Whitelist::new(["MIT", "Apache-2.0"]);
        let (_, unknown) = annotate(&sample_tree(), &sample_licenses(), &whitelist);
        let expected: UnknownLicenses = [UnknownLicense::License("GPL".into())].into();
        assert_eq!(unknown, expected);
    }

    #[test]
    fn test_annotation_marks_problem_paths() {
        let whitelist = Whitelist::new(["MIT", "Apache-2.0"]);
        let (tree, _) = annotate(&sample_tree(), &sample_licenses(), &whitelist);

        let root = &tree.node(tree.root()).data;
        assert_eq!(root.status, LicenseStatus::Ok);
        assert!(root.subtree_problem);

        let package1 = &find(&tree, "@company/package1", "1.1.1")[0];
        assert!(package1.subtree_problem);

        let package2 = &find(&tree, "package2", "2.2.2")[0];
        assert!(!package2.subtree_problem);
        assert_eq!(package2.status, LicenseStatus::Ok);

        let package7_old = &find(&tree, "package7", "7.7.6")[0];
        assert_eq!(package7_old.status, LicenseStatus::Violation);
        assert_eq!(package7_old.license.as_deref(), Some("GPL"));
        assert!(!package7_old.subtree_problem);

        // Same package at two positions: only one of them leads to GPL.
        let package4: Vec<bool> = find(&tree, "package4", "4.4.4")
            .iter()
            .map(|a| a.subtree_problem)
            .collect();
        assert_eq!(package4, vec![false, true]);
    }

    #[test]
    fn test_annotation_preserves_shape() {
        let raw = sample_tree();
        let whitelist = Whitelist::new(["MIT"]);
        let (tree, _) = annotate(&raw, &sample_licenses(), &whitelist);

        assert_eq!(tree.len(), raw.len());
        let before: Vec<_> = raw
            .iter()
            .map(|(id, n)| (id, n.name.clone(), n.parent(), n.children().to_vec()))
            .collect();
        let after: Vec<_> = tree
            .iter()
            .map(|(id, n)| (id, n.name.clone(), n.parent(), n.children().to_vec()))
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_status_matches_policy_for_every_non_root_node() {
        let whitelist = Whitelist::new(["mit"]);
        let licenses = sample_licenses();
        let (tree, _) = annotate(&sample_tree(), &licenses, &whitelist);

        for (id, node) in tree.iter().filter(|(id, _)| !tree.is_root(*id)) {
            let compliant = is_compliant(node.data.license.as_deref(), &whitelist);
            assert_eq!(node.data.status.is_ok(), compliant, "node {:?}", id);
        }
    }

    #[test]
    fn test_root_is_ok_regardless_of_its_license() {
        let mut tree = RawTree::with_root("app", "1.0.0");
        let root = tree.root();
        tree.push(root, "dep", "1.0.0");

        let mut licenses = LicenseMap::new();
        licenses.insert_versioned("app", "1.0.0", Some("Proprietary".into()));
        licenses.insert_versioned("dep", "1.0.0", Some("MIT".into()));

        let (annotated, unknown) = annotate(&tree, &licenses, &Whitelist::new(["MIT"]));
        let root = &annotated.node(annotated.root()).data;
        assert_eq!(root.status, LicenseStatus::Ok);
        assert_eq!(root.license.as_deref(), Some("Proprietary"));
        assert!(unknown.is_empty());
    }

    #[test]
    fn test_missing_license_is_unknown() {
        let mut tree = RawTree::with_root("app", "1.0.0");
        let root = tree.root();
        tree.push(root, "mystery", "0.1.0");

        let (annotated, unknown) = annotate(&tree, &LicenseMap::new(), &Whitelist::new(["MIT"]));
        let child = annotated.node(root).children()[0];
        assert_eq!(annotated.node(child).data.status, LicenseStatus::Unknown);
        assert_eq!(annotated.node(child).data.license, None);
        assert!(unknown.contains(&UnknownLicense::Missing));
        assert_eq!(unknown.len(), 1);
    }

    #[test]
    fn test_raw_tree_can_be_reannotated() {
        let raw = sample_tree();
        let licenses = sample_licenses();
        let (strict, strict_unknown) = annotate(&raw, &licenses, &Whitelist::new(["MIT"]));
        let (relaxed, relaxed_unknown) =
            annotate(&raw, &licenses, &Whitelist::new(["MIT", "GPL"]));

        assert!(!strict_unknown.is_empty());
        assert!(relaxed_unknown.is_empty());
        assert!(strict.node(strict.root()).data.subtree_problem);
        assert!(!relaxed.node(relaxed.root()).data.subtree_problem);
    }
}
