use std::path::Path;

use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};

use super::{package_label, ProjectReport};
use crate::engine::{AnnotatedTree, UnknownLicense};
use crate::models::LicenseStatus;
use crate::tree::NodeId;

/// Render a colored terminal report for every checked project.
///
/// `full` shows the whole dependency tree instead of the paths to problems.
pub fn render(reports: &[ProjectReport], path: &Path, full: bool, quiet: bool) {
    if quiet {
        for report in reports {
            println!("{}", summary_line(report));
        }
        return;
    }

    println!("\n {} v{}", "license-tree".bold(), env!("CARGO_PKG_VERSION"));
    println!(" Checking: {}\n", path.display());

    for report in reports {
        println!(" {} {}\n", "→".cyan(), report.project_type.to_string().bold());
        print!("{}", render_tree(report.displayed(full)));
        println!();

        let grouped = report.packages_by_license();
        if !grouped.is_empty() {
            println!(" {} Licenses not on the whitelist:\n", "[WARN]".yellow().bold());
            println!("{}", license_table(report));
            println!();
        }

        println!(" {}\n", summary_line(report));
    }
}

/// Box-drawing rendering of `tree`, one node per line.
pub fn render_tree(tree: &AnnotatedTree) -> String {
    let mut out = String::new();
    for (id, _) in tree.iter() {
        if tree.is_root(id) {
            out.push_str(&format!(" {}\n", node_label(tree, id)));
            continue;
        }

        // One guide column per ancestor below the root, outermost first.
        let mut guides: Vec<&str> = Vec::with_capacity(tree.depth(id));
        for (ancestor, _) in tree.ancestors(id) {
            if tree.is_root(ancestor) {
                break;
            }
            guides.push(if is_last_child(tree, ancestor) { "    " } else { "│   " });
        }
        guides.reverse();

        let connector = if is_last_child(tree, id) { "└── " } else { "├── " };
        out.push_str(&format!(
            " {}{}{}\n",
            guides.concat(),
            connector,
            node_label(tree, id)
        ));
    }
    out
}

fn is_last_child(tree: &AnnotatedTree, id: NodeId) -> bool {
    match tree.node(id).parent() {
        Some(parent) => tree.node(parent).children().last() == Some(&id),
        None => true,
    }
}

fn node_label(tree: &AnnotatedTree, id: NodeId) -> String {
    let node = tree.node(id);
    let label = package_label(&node.name, &node.version);
    if tree.is_root(id) {
        return label.bold().to_string();
    }

    let license = node.data.license.as_deref().unwrap_or("UNKNOWN");
    match node.data.status {
        LicenseStatus::Ok if node.data.subtree_problem => {
            format!("{} {}", label.dimmed(), license.dimmed())
        }
        LicenseStatus::Ok => format!("{} {} {}", label, license.green(), "✓".green()),
        LicenseStatus::Violation => {
            format!("{} {} {}", label.red(), license.red().bold(), "✗".red())
        }
        LicenseStatus::Unknown => {
            format!("{} {} {}", label.yellow(), license.yellow(), "?".yellow())
        }
    }
}

fn license_table(report: &ProjectReport) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("License").add_attribute(Attribute::Bold),
            Cell::new("Status").add_attribute(Attribute::Bold),
            Cell::new("Packages").add_attribute(Attribute::Bold),
        ]);

    for (license, packages) in report.packages_by_license() {
        let (status, color) = match license {
            UnknownLicense::License(_) => (LicenseStatus::Violation, Color::Red),
            UnknownLicense::Missing => (LicenseStatus::Unknown, Color::Yellow),
        };
        let packages: Vec<String> = packages.into_iter().collect();
        table.add_row(vec![
            Cell::new(license.to_string()).fg(color),
            Cell::new(status.to_string()).fg(color),
            Cell::new(packages.join("\n")),
        ]);
    }

    table
}

fn summary_line(report: &ProjectReport) -> String {
    let problems = report.problem_count();
    let problems = if problems == 0 {
        problems.to_string().green()
    } else {
        problems.to_string().red()
    };
    format!(
        "{}: Total: {}  Problems: {}  Not whitelisted: {}",
        report.project_type,
        report.total_packages(),
        problems,
        report.unknown.len()
    )
}
