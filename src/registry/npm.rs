use anyhow::Result;
use reqwest::Client;
use serde_json::Value;

use super::USER_AGENT;
use crate::runner::license_from_package_json;

/// Fetch the license for an npm package from the npm registry.
pub async fn fetch_license(client: &Client, name: &str, version: &str) -> Result<Option<String>> {
    let url = package_url(name, version);

    let response = client
        .get(&url)
        .header("User-Agent", USER_AGENT)
        .header("Accept", "application/json")
        .send()
        .await?;

    if !response.status().is_success() {
        return Ok(None);
    }

    let data: Value = response.json().await?;
    Ok(license_from_document(&data, version))
}

/// Scoped packages need URL encoding: `@scope/pkg` becomes `%40scope%2Fpkg`.
fn package_url(name: &str, version: &str) -> String {
    let encoded_name = name.replace('@', "%40").replace('/', "%2F");
    if version.is_empty() || version == "*" {
        format!("https://registry.npmjs.org/{}", encoded_name)
    } else {
        format!("https://registry.npmjs.org/{}/{}", encoded_name, version)
    }
}

/// The versioned endpoint returns the manifest itself; the bare one returns
/// the packument, whose `latest` dist-tag points into `versions`.
fn license_from_document(data: &Value, version: &str) -> Option<String> {
    if data.get("versions").is_some() {
        let latest = data
            .get("dist-tags")
            .and_then(|d| d.get("latest"))
            .and_then(|v| v.as_str())?;
        let wanted = if version.is_empty() || version == "*" {
            latest
        } else {
            version
        };
        data.get("versions")
            .and_then(|vs| vs.get(wanted))
            .and_then(license_from_package_json)
    } else {
        license_from_package_json(data)
    }
}
