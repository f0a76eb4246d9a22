//! Async HTTP clients for fetching license data from upstream package registries.
//!
//! Each module exposes a single `fetch_license(client, name, version)` function
//! that returns `Ok(Some(license_string))` on success, `Ok(None)` when the
//! package is not found or has no license field, and `Err` on network failures.

pub mod maven;
pub mod npm;
pub mod pypi;

use std::time::Duration;

use anyhow::Result;
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;

use crate::engine::LicenseMap;
use crate::models::ProjectType;
use crate::tree::RawTree;

const BATCH_SIZE: usize = 75;

pub(crate) const USER_AGENT: &str = concat!("license-tree/", env!("CARGO_PKG_VERSION"));

/// Look up every package of `tree` that has no license in `licenses` and
/// record what the registry returns. Failed lookups are logged and skipped.
///
/// Returns the number of licenses that were filled in.
pub async fn fill_missing(
    project_type: ProjectType,
    tree: &RawTree,
    licenses: &mut LicenseMap,
    quiet: bool,
) -> Result<usize> {
    let missing: Vec<(String, String)> = tree
        .flatten()
        .into_iter()
        .filter(|(name, version)| licenses.get(name, version).is_none())
        .collect();

    if missing.is_empty() {
        return Ok(0);
    }

    let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

    let pb = if !quiet {
        let pb = ProgressBar::new(missing.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )?
                .progress_chars("#>-"),
        );
        pb.set_message(format!("{} registry", project_type));
        Some(pb)
    } else {
        None
    };

    let mut filled = 0;
    for batch in missing.chunks(BATCH_SIZE) {
        let futures: Vec<_> = batch
            .iter()
            .map(|(name, version)| fetch_license(&client, project_type, name, version))
            .collect();

        let results = join_all(futures).await;

        for ((name, version), result) in batch.iter().zip(results) {
            match result {
                Ok(Some(license)) => {
                    licenses.insert_versioned(name, version, Some(license));
                    filled += 1;
                }
                Ok(None) => {
                    tracing::debug!(package = %name, version = %version, "no license in registry");
                }
                Err(e) => {
                    tracing::warn!(package = %name, version = %version, "registry lookup failed: {:#}", e);
                }
            }
            if let Some(pb) = &pb {
                pb.inc(1);
            }
        }
    }

    if let Some(pb) = pb {
        pb.finish_with_message("Done");
    }

    Ok(filled)
}

async fn fetch_license(
    client: &Client,
    project_type: ProjectType,
    name: &str,
    version: &str,
) -> Result<Option<String>> {
    match project_type {
        ProjectType::Npm | ProjectType::Yarn => npm::fetch_license(client, name, version).await,
        ProjectType::Python => pypi::fetch_license(client, name, version).await,
        ProjectType::Maven => maven::fetch_license(client, name, version).await,
    }
}
