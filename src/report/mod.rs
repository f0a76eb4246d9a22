//! Report renderers for license check results.
//!
//! - [`terminal`]: colored dependency tree, a table of non-whitelisted
//!   licenses and a summary line; respects `--quiet`.
//! - [`json`]: one nested document per project type.

pub mod json;
pub mod terminal;

use std::collections::{BTreeMap, BTreeSet};

use crate::engine::{annotate, filter, AnnotatedTree, LicenseMap, UnknownLicense, UnknownLicenses};
use crate::models::ProjectType;
use crate::tree::RawTree;
use crate::whitelist::Whitelist;

/// Everything the reporters need about one checked project.
#[derive(Debug, Clone)]
pub struct ProjectReport {
    pub project_type: ProjectType,
    pub annotated: AnnotatedTree,
    pub filtered: AnnotatedTree,
    pub unknown: UnknownLicenses,
}

impl ProjectReport {
    pub fn build(
        project_type: ProjectType,
        raw: &RawTree,
        licenses: &LicenseMap,
        whitelist: &Whitelist,
    ) -> Self {
        let (annotated, unknown) = annotate(raw, licenses, whitelist);
        let filtered = filter(&annotated);
        Self {
            project_type,
            annotated,
            filtered,
            unknown,
        }
    }

    /// Tree to render: the full annotated tree with `--tree`, else the filtered one.
    pub fn displayed(&self, full: bool) -> &AnnotatedTree {
        if full {
            &self.annotated
        } else {
            &self.filtered
        }
    }

    /// Some dependency is not whitelisted or has no license.
    pub fn has_issues(&self) -> bool {
        self.filtered.height() > 0
    }

    /// Dependency positions in the tree, the project itself excluded.
    pub fn total_packages(&self) -> usize {
        self.annotated.len().saturating_sub(1)
    }

    /// Positions whose own status is not `Ok`.
    pub fn problem_count(&self) -> usize {
        self.annotated
            .iter()
            .filter(|(_, node)| !node.data.status.is_ok())
            .count()
    }

    /// Non-whitelisted licenses with the distinct `name@version` packages using them.
    pub fn packages_by_license(&self) -> BTreeMap<UnknownLicense, BTreeSet<String>> {
        let mut grouped: BTreeMap<UnknownLicense, BTreeSet<String>> = BTreeMap::new();
        for (id, node) in self.annotated.iter() {
            if self.annotated.is_root(id) || node.data.status.is_ok() {
                continue;
            }
            let key = match &node.data.license {
                Some(license) => UnknownLicense::License(license.clone()),
                None => UnknownLicense::Missing,
            };
            grouped
                .entry(key)
                .or_default()
                .insert(package_label(&node.name, &node.version));
        }
        grouped
    }
}

pub(crate) fn package_label(name: &str, version: &str) -> String {
    if version.is_empty() {
        name.to_string()
    } else {
        format!("{}@{}", name, version)
    }
}

/// Licenses that can be offered for whitelisting, across all reports.
pub fn whitelist_candidates(reports: &[ProjectReport]) -> Vec<String> {
    let licenses: BTreeSet<&str> = reports
        .iter()
        .flat_map(|r| r.unknown.iter())
        .filter_map(|u| match u {
            UnknownLicense::License(license) => Some(license.as_str()),
            UnknownLicense::Missing => None,
        })
        .collect();
    licenses.into_iter().map(str::to_string).collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// ```text
    /// app@1.0.0
    /// ├── express@4.18.2 (MIT)
    /// │   └── gpl-lib@1.0.0 (GPL-3.0)
    /// ├── lodash@4.17.21 (MIT)
    /// └── mystery@0.1.0 (no license)
    /// ```
    /// checked against `{MIT}`.
    pub(crate) fn sample_report() -> ProjectReport {
        let mut raw = RawTree::with_root("app", "1.0.0");
        let root = raw.root();
        let express = raw.push(root, "express", "4.18.2");
        raw.push(express, "gpl-lib", "1.0.0");
        raw.push(root, "lodash", "4.17.21");
        raw.push(root, "mystery", "0.1.0");

        let mut licenses = LicenseMap::new();
        licenses.insert_versioned("express", "4.18.2", Some("MIT".into()));
        licenses.insert_versioned("gpl-lib", "1.0.0", Some("GPL-3.0".into()));
        licenses.insert_versioned("lodash", "4.17.21", Some("MIT".into()));

        ProjectReport::build(ProjectType::Npm, &raw, &licenses, &Whitelist::new(["MIT"]))
    }

    #[test]
    fn test_report_counts() {
        let report = sample_report();
        assert!(report.has_issues());
        assert_eq!(report.total_packages(), 4);
        assert_eq!(report.problem_count(), 2);
        assert_eq!(report.displayed(true).len(), 5);
        assert_eq!(report.displayed(false).len(), 4);
    }

    #[test]
    fn test_packages_by_license() {
        let grouped = sample_report().packages_by_license();
        let gpl = grouped.get(&UnknownLicense::License("GPL-3.0".into())).unwrap();
        assert_eq!(gpl.iter().collect::<Vec<_>>(), vec!["gpl-lib@1.0.0"]);
        let missing = grouped.get(&UnknownLicense::Missing).unwrap();
        assert_eq!(missing.iter().collect::<Vec<_>>(), vec!["mystery@0.1.0"]);
        assert_eq!(grouped.len(), 2);
    }

    #[test]
    fn test_clean_report() {
        let mut raw = RawTree::with_root("app", "1.0.0");
        let root = raw.root();
        raw.push(root, "left-pad", "1.3.0");
        let mut licenses = LicenseMap::new();
        licenses.insert_name("left-pad", Some("MIT".into()));

        let report = ProjectReport::build(ProjectType::Npm, &raw, &licenses, &Whitelist::new(["mit"]));
        assert!(!report.has_issues());
        assert_eq!(report.problem_count(), 0);
        assert!(report.packages_by_license().is_empty());
        assert!(whitelist_candidates(&[report]).is_empty());
    }

    #[test]
    fn test_candidates_skip_missing() {
        assert_eq!(whitelist_candidates(&[sample_report()]), vec!["GPL-3.0".to_string()]);
    }

    #[test]
    fn test_package_label() {
        assert_eq!(package_label("app", ""), "app");
        assert_eq!(package_label("app", "1.0.0"), "app@1.0.0");
    }
}
