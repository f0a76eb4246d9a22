use std::collections::HashMap;

/// Package → license lookup produced by a runner.
///
/// Some ecosystems know the exact version a license belongs to, others only
/// the package name. A versioned entry takes precedence over a name-only one.
/// Keys can be normalized with a runner-supplied function (Python package
/// names, for instance, are matched case-insensitively).
#[derive(Debug, Clone, Default)]
pub struct LicenseMap {
    by_version: HashMap<(String, String), Option<String>>,
    by_name: HashMap<String, Option<String>>,
    key_fn: Option<fn(&str) -> String>,
}

impl LicenseMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map whose package names are passed through `key_fn` on insert and lookup.
    pub fn with_key_fn(key_fn: fn(&str) -> String) -> Self {
        Self {
            key_fn: Some(key_fn),
            ..Self::default()
        }
    }

    fn key(&self, name: &str) -> String {
        match self.key_fn {
            Some(f) => f(name),
            None => name.to_string(),
        }
    }

    pub fn insert_versioned(&mut self, name: &str, version: &str, license: Option<String>) {
        let key = (self.key(name), version.to_string());
        self.by_version.insert(key, clean(license));
    }

    pub fn insert_name(&mut self, name: &str, license: Option<String>) {
        let key = self.key(name);
        self.by_name.insert(key, clean(license));
    }

    /// License recorded for the package, or `None` when unknown.
    pub fn get(&self, name: &str, version: &str) -> Option<&str> {
        let key = self.key(name);
        if let Some(entry) = self.by_version.get(&(key.clone(), version.to_string())) {
            if entry.is_some() {
                return entry.as_deref();
            }
        }
        self.by_name.get(&key).and_then(|l| l.as_deref())
    }

    /// Whether any entry exists for the package, even one without a license.
    pub fn contains(&self, name: &str, version: &str) -> bool {
        let key = self.key(name);
        self.by_version.contains_key(&(key.clone(), version.to_string()))
            || self.by_name.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.by_version.len() + self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Blank or whitespace-only license strings count as missing.
fn clean(license: Option<String>) -> Option<String> {
    license.and_then(|l| {
        let trimmed = l.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_versioned_entry_wins() {
        let mut map = LicenseMap::new();
        map.insert_name("left-pad", Some("WTFPL".into()));
        map.insert_versioned("left-pad", "1.3.0", Some("MIT".into()));
        assert_eq!(map.get("left-pad", "1.3.0"), Some("MIT"));
        assert_eq!(map.get("left-pad", "1.0.0"), Some("WTFPL"));
    }

    #[test]
    fn test_versioned_none_falls_back_to_name() {
        let mut map = LicenseMap::new();
        map.insert_versioned("a", "1", None);
        map.insert_name("a", Some("ISC".into()));
        assert_eq!(map.get("a", "1"), Some("ISC"));
    }

    #[test]
    fn test_blank_license_is_absent() {
        let mut map = LicenseMap::new();
        map.insert_versioned("a", "1", Some("   ".into()));
        assert_eq!(map.get("a", "1"), None);
        assert!(map.contains("a", "1"));
        assert!(!map.contains("b", "1"));
    }

    #[test]
    fn test_key_fn_normalizes_names() {
        let mut map = LicenseMap::with_key_fn(|n| n.to_lowercase().replace('_', "-"));
        map.insert_name("Typing_Extensions", Some("PSF-2.0".into()));
        assert_eq!(map.get("typing-extensions", "4.0.0"), Some("PSF-2.0"));
    }
}
