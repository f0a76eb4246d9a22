use std::path::PathBuf;

use thiserror::Error;

/// Failure of a runner to produce a dependency tree.
///
/// Fatal for the project being checked: the engine never annotates a
/// partial tree.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("{manifest} not found in {}\nHint: {hint}", .dir.display())]
    ManifestNotFound {
        manifest: &'static str,
        dir: PathBuf,
        hint: &'static str,
    },

    #[error("failed to start `{command}`: {source}")]
    ProcessSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}{}", stderr_suffix(.stderr))]
    ProcessFailed {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("could not parse {what}: {details}")]
    InvalidOutput { what: String, details: String },

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("\n{}", trimmed)
    }
}

impl ResolutionError {
    pub fn invalid(what: impl Into<String>, details: impl std::fmt::Display) -> Self {
        ResolutionError::InvalidOutput {
            what: what.into(),
            details: details.to_string(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ResolutionError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Malformed or unwritable configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {details}", .path.display())]
    Parse { path: PathBuf, details: String },

    #[error("failed to write config {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_not_found_message() {
        let err = ResolutionError::ManifestNotFound {
            manifest: "pom.xml",
            dir: PathBuf::from("/work/app"),
            hint: "run from the Maven project root",
        };
        let msg = err.to_string();
        assert!(msg.contains("pom.xml not found in /work/app"));
        assert!(msg.contains("Hint: run from the Maven project root"));
    }

    #[test]
    fn test_invalid_output_message() {
        let err = ResolutionError::invalid("package-lock.json", "expected value at line 1");
        assert_eq!(
            err.to_string(),
            "could not parse package-lock.json: expected value at line 1"
        );
    }

    #[test]
    fn test_stderr_suffix() {
        assert_eq!(stderr_suffix("  \n"), "");
        assert_eq!(stderr_suffix("boom\n"), "\nboom");
    }
}
