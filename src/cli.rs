use std::path::PathBuf;

use clap::Parser;

use crate::models::ProjectType;

#[derive(Parser, Debug)]
#[command(
    name = "license-tree",
    about = "Check the licenses of a project's dependency tree against a whitelist",
    version
)]
pub struct Cli {
    /// Project path to check
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Whitelist config file [default: ./.license-tree/config.toml, fallback ~/.config/license-tree/config.toml]
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Report format
    #[arg(long, default_value = "terminal", value_name = "FORMAT")]
    pub report: ReportFormat,

    /// Show the full dependency tree instead of only the paths to problems
    #[arg(long)]
    pub tree: bool,

    /// Only check the given project type (repeatable) [default: auto-detect]
    #[arg(short = 't', long = "type", value_name = "TYPE")]
    pub project_types: Vec<ProjectTypeArg>,

    /// Look up missing licenses in the package registries
    #[arg(long)]
    pub online: bool,

    /// Offer to whitelist every non-whitelisted license found
    #[arg(short, long)]
    pub interactive: bool,

    /// Log package-manager commands and show their output
    #[arg(long)]
    pub debug: bool,

    /// Only print summary line
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    Terminal,
    Json,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum ProjectTypeArg {
    Npm,
    Yarn,
    Python,
    Maven,
}

impl From<ProjectTypeArg> for ProjectType {
    fn from(arg: ProjectTypeArg) -> Self {
        match arg {
            ProjectTypeArg::Npm => ProjectType::Npm,
            ProjectTypeArg::Yarn => ProjectType::Yarn,
            ProjectTypeArg::Python => ProjectType::Python,
            ProjectTypeArg::Maven => ProjectType::Maven,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["license-tree"]).unwrap();
        assert_eq!(cli.path, PathBuf::from("."));
        assert_eq!(cli.report, ReportFormat::Terminal);
        assert!(!cli.tree && !cli.online && !cli.interactive && !cli.quiet);
        assert!(cli.project_types.is_empty());
    }

    #[test]
    fn test_repeated_types() {
        let cli = Cli::try_parse_from(["license-tree", "-t", "npm", "--type", "maven", "app"]).unwrap();
        let types: Vec<ProjectType> = cli.project_types.into_iter().map(Into::into).collect();
        assert_eq!(types, vec![ProjectType::Npm, ProjectType::Maven]);
        assert_eq!(cli.path, PathBuf::from("app"));
    }

    #[test]
    fn test_rejects_unknown_report() {
        assert!(Cli::try_parse_from(["license-tree", "--report", "pdf"]).is_err());
    }
}
