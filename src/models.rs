use serde::{Deserialize, Serialize};

/// Compliance verdict attached to every node of an annotated tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseStatus {
    /// License is on the whitelist.
    Ok,
    /// No license could be determined for the package.
    Unknown,
    /// License is known but not whitelisted.
    Violation,
}

impl LicenseStatus {
    pub fn is_ok(self) -> bool {
        self == LicenseStatus::Ok
    }
}

impl std::fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LicenseStatus::Ok => write!(f, "ok"),
            LicenseStatus::Unknown => write!(f, "unknown"),
            LicenseStatus::Violation => write!(f, "violation"),
        }
    }
}

/// Package ecosystem a runner resolves dependencies for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectType {
    Npm,
    Yarn,
    Python,
    Maven,
}

impl std::fmt::Display for ProjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectType::Npm => write!(f, "npm"),
            ProjectType::Yarn => write!(f, "yarn"),
            ProjectType::Python => write!(f, "python"),
            ProjectType::Maven => write!(f, "maven"),
        }
    }
}
