use std::collections::BTreeSet;

/// Set of pre-approved license strings.
///
/// Entries are compared after trimming surrounding whitespace and ignoring
/// case. The original spelling of each entry is kept for display and for
/// writing back to the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Whitelist {
    entries: BTreeSet<String>,
    normalized: BTreeSet<String>,
}

impl Whitelist {
    pub fn new<I, S>(licenses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut whitelist = Self::default();
        for license in licenses {
            whitelist.insert(license.into());
        }
        whitelist
    }

    fn insert(&mut self, license: String) {
        let key = normalize(&license);
        if key.is_empty() || self.normalized.contains(&key) {
            return;
        }
        self.normalized.insert(key);
        self.entries.insert(license.trim().to_string());
    }

    /// Return a new whitelist holding these entries plus `licenses`.
    pub fn extended<I, S>(&self, licenses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut next = self.clone();
        for license in licenses {
            next.insert(license.into());
        }
        next
    }

    /// Union of two whitelists (e.g. configured entries plus the commercial list).
    pub fn merge(&self, other: &Whitelist) -> Self {
        self.extended(other.entries.iter().cloned())
    }

    pub fn contains(&self, license: &str) -> bool {
        self.normalized.contains(&normalize(license))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Decide whether a single license is compliant with `whitelist`.
///
/// An absent license is never compliant.
pub fn is_compliant(license: Option<&str>, whitelist: &Whitelist) -> bool {
    match license {
        Some(license) => whitelist.contains(license),
        None => false,
    }
}

/// Canonical comparison key: surrounding whitespace trimmed, lowercased.
pub fn normalize(license: &str) -> String {
    license.trim().to_lowercase()
}
