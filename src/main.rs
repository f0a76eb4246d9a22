//! `license-tree`: resolve a project's dependency tree and check every
//! package's license against a whitelist.
//!
//! # Flow
//! 1. Parse CLI arguments ([`cli`]).
//! 2. Load the whitelist config ([`config::load_config`]) and merge the
//!    compiled-in commercial list ([`commercial`]).
//! 3. Detect project types ([`detector::detect_project_types`]) or take them from `--type`.
//! 4. Resolve each project's tree and licenses ([`runner`]).
//! 5. Optionally fill missing licenses from package registries (`--online`, [`registry`]).
//! 6. Annotate and filter the trees ([`engine`]), render the report ([`report`]).
//! 7. With `--interactive`, offer to whitelist what was found and report again ([`prompt`]).
//! 8. Exit `0` when every reported tree is clean, `1` otherwise.

mod cli;
mod commercial;
mod config;
mod detector;
mod engine;
mod error;
mod models;
mod prompt;
mod registry;
mod report;
mod runner;
mod tree;
mod whitelist;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use cli::{Cli, ReportFormat};
use config::{add_to_whitelist, load_config};
use detector::detect_project_types;
use models::ProjectType;
use report::ProjectReport;
use runner::{runner_for, Resolution, RunnerOptions};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    // Resolve project path
    let path = cli
        .path
        .canonicalize()
        .unwrap_or_else(|_| cli.path.clone());

    let config = load_config(&path, cli.config.as_deref())?;
    let mut whitelist = config.whitelist().merge(&commercial::licenses());
    tracing::debug!(
        entries = whitelist.len(),
        source = ?config.source,
        licenses = ?whitelist.iter().collect::<Vec<_>>(),
        "whitelist loaded"
    );
    if whitelist.is_empty() {
        tracing::warn!("the whitelist is empty, every dependency will be reported");
    }

    let project_types: Vec<ProjectType> = if cli.project_types.is_empty() {
        detect_project_types(&path)
    } else {
        let mut types: Vec<ProjectType> = Vec::new();
        for t in cli.project_types.iter().copied().map(ProjectType::from) {
            if !types.contains(&t) {
                types.push(t);
            }
        }
        types
    };

    if project_types.is_empty() {
        eprintln!(
            "No supported project manifests found in {}",
            path.display()
        );
        std::process::exit(1);
    }

    let options = RunnerOptions {
        silent: !cli.debug,
        debug: cli.debug,
    };

    let mut resolutions: Vec<(ProjectType, Resolution)> = Vec::new();
    for project_type in project_types {
        if !cli.quiet {
            eprintln!("  {} resolving {} dependencies", "→".cyan(), project_type);
        }

        let runner = runner_for(project_type, &path, options);
        let mut resolution = runner
            .check()
            .await
            .with_context(|| format!("failed to resolve {} dependencies", runner.project_type()))?;

        tracing::debug!(
            %project_type,
            nodes = resolution.tree.len(),
            licenses = resolution.licenses.len(),
            "dependencies resolved"
        );
        if resolution.licenses.is_empty() && resolution.tree.len() > 1 && !cli.online {
            tracing::warn!(%project_type, "no license information found, try --online");
        }

        if cli.online {
            let filled = registry::fill_missing(
                project_type,
                &resolution.tree,
                &mut resolution.licenses,
                cli.quiet,
            )
            .await?;
            tracing::debug!(%project_type, filled, "licenses filled from registry");
        }

        resolutions.push((project_type, resolution));
    }

    let mut reports = build_reports(&resolutions, &whitelist);

    // JSON output holds a single document, written once the whitelist is final
    let mut rendered = false;
    if !(cli.interactive && cli.report == ReportFormat::Json) {
        render(&reports, &cli, &path)?;
        rendered = true;
    }

    if cli.interactive {
        let candidates = report::whitelist_candidates(&reports);
        if !candidates.is_empty() {
            let stdin = std::io::stdin();
            let accepted =
                prompt::ask_whitelist_additions(stdin.lock(), std::io::stderr(), &candidates)?;

            if !accepted.is_empty() {
                let target = config.write_target(&path);
                let added = add_to_whitelist(&target, &accepted)?;
                eprintln!(
                    "  {} added {} license(s) to {}",
                    "✓".green(),
                    added.len(),
                    target.display()
                );

                whitelist = whitelist.extended(accepted);
                reports = build_reports(&resolutions, &whitelist);
                rendered = false;
            }
        }
    }

    if !rendered {
        render(&reports, &cli, &path)?;
    }

    // Exit code: 1 if any filtered tree still has a problem below its root
    if reports.iter().any(ProjectReport::has_issues) {
        std::process::exit(1);
    }

    Ok(())
}

/// Logs go to stderr. `--debug` raises the default level; `RUST_LOG` wins over both.
fn init_tracing(debug: bool) {
    let default = if debug { "license_tree=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn build_reports(
    resolutions: &[(ProjectType, Resolution)],
    whitelist: &whitelist::Whitelist,
) -> Vec<ProjectReport> {
    resolutions
        .iter()
        .map(|(project_type, resolution)| {
            ProjectReport::build(*project_type, &resolution.tree, &resolution.licenses, whitelist)
        })
        .collect()
}

fn render(reports: &[ProjectReport], cli: &Cli, path: &std::path::Path) -> Result<()> {
    match cli.report {
        ReportFormat::Terminal => report::terminal::render(reports, path, cli.tree, cli.quiet),
        ReportFormat::Json => println!("{}", report::json::render(reports, cli.tree)?),
    }
    Ok(())
}
