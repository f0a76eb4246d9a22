use std::path::{Path, PathBuf};

use serde::Deserialize;
use toml_edit::{Array, DocumentMut, Item, Value};

use crate::error::ConfigError;
use crate::whitelist::{normalize, Whitelist};

/// Directory holding the per-project config, relative to the project root.
const PROJECT_CONFIG_DIR: &str = ".license-tree";
const CONFIG_FILE: &str = "config.toml";

/// Root configuration structure, deserialized from `.license-tree/config.toml`.
///
/// ```toml
/// whitelist = ["MIT", "Apache-2.0", "ISC"]
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Licenses considered pre-approved. Matching ignores case and surrounding whitespace.
    #[serde(default)]
    pub whitelist: Vec<String>,

    /// File this config was loaded from; `None` for the built-in default.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Config {
    pub fn whitelist(&self) -> Whitelist {
        Whitelist::new(self.whitelist.iter().cloned())
    }

    /// File that whitelist additions are written to: the loaded file, or the
    /// project config when running on the built-in default.
    pub fn write_target(&self, project_path: &Path) -> PathBuf {
        self.source
            .clone()
            .unwrap_or_else(|| project_config_path(project_path))
    }
}

pub fn project_config_path(project_path: &Path) -> PathBuf {
    project_path.join(PROJECT_CONFIG_DIR).join(CONFIG_FILE)
}

/// Load the configuration, searching in order:
///
/// 1. `config_override`: path passed via `--config`
/// 2. `<project_path>/.license-tree/config.toml`
/// 3. `~/.config/license-tree/config.toml`
/// 4. Built-in [`Config::default`] (empty whitelist)
pub fn load_config(project_path: &Path, config_override: Option<&Path>) -> Result<Config, ConfigError> {
    if let Some(path) = config_override {
        return read_config(path);
    }

    let project_config = project_config_path(project_path);
    if project_config.exists() {
        return read_config(&project_config);
    }

    if let Some(home) = dirs::home_dir() {
        let home_config = home.join(".config").join("license-tree").join(CONFIG_FILE);
        if home_config.exists() {
            return read_config(&home_config);
        }
    }

    tracing::debug!("no config file found, using an empty whitelist");
    Ok(Config::default())
}

fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        details: e.to_string(),
    })?;
    config.source = Some(path.to_path_buf());
    tracing::debug!(
        path = %path.display(),
        entries = config.whitelist.len(),
        "loaded config"
    );
    Ok(config)
}

/// Append `licenses` to the `whitelist` array of the config file at `path`.
///
/// The file and its parent directory are created when missing. Existing
/// formatting and comments are preserved, and licenses already present
/// (compared case-insensitively) are skipped. Returns the licenses that
/// were actually added.
pub fn add_to_whitelist(path: &Path, licenses: &[String]) -> Result<Vec<String>, ConfigError> {
    let existing = if path.exists() {
        std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?
    } else {
        String::new()
    };

    let mut doc = existing.parse::<DocumentMut>().map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        details: e.to_string(),
    })?;

    if !doc.contains_key("whitelist") {
        doc["whitelist"] = Item::Value(Value::Array(Array::new()));
    }
    let array = doc["whitelist"]
        .as_array_mut()
        .ok_or_else(|| ConfigError::Parse {
            path: path.to_path_buf(),
            details: "`whitelist` must be an array of strings".to_string(),
        })?;

    let mut present: Vec<String> = array
        .iter()
        .filter_map(|v| v.as_str())
        .map(normalize)
        .collect();

    let mut added = Vec::new();
    for license in licenses {
        let key = normalize(license);
        if key.is_empty() || present.contains(&key) {
            continue;
        }
        array.push(license.trim());
        present.push(key);
        added.push(license.trim().to_string());
    }

    if added.is_empty() && path.exists() {
        return Ok(added);
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, doc.to_string()).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::info!(path = %path.display(), added = ?added, "whitelist updated");
    Ok(added)
}
