use anyhow::Result;
use reqwest::Client;
use serde_json::Value;

use super::USER_AGENT;

/// Fetch the license for a Python package from PyPI.
pub async fn fetch_license(client: &Client, name: &str, version: &str) -> Result<Option<String>> {
    let url = if version.is_empty() || version == "*" {
        format!("https://pypi.org/pypi/{}/json", name)
    } else {
        format!("https://pypi.org/pypi/{}/{}/json", name, version)
    };

    let response = client
        .get(&url)
        .header("User-Agent", USER_AGENT)
        .send()
        .await?;

    if !response.status().is_success() {
        return Ok(None);
    }

    let data: Value = response.json().await?;
    Ok(license_from_info(&data))
}

/// `license_expression` wins over `license`, then the last `License ::`
/// classifier. `UNKNOWN` and blank values are ignored.
fn license_from_info(data: &Value) -> Option<String> {
    let info = data.get("info")?;

    let declared = ["license_expression", "license"]
        .iter()
        .filter_map(|key| info.get(key).and_then(|l| l.as_str()))
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.eq_ignore_ascii_case("UNKNOWN"));
    if let Some(license) = declared {
        return Some(license.to_string());
    }

    info.get("classifiers")
        .and_then(|c| c.as_array())?
        .iter()
        .filter_map(|c| c.as_str())
        .filter_map(|c| c.strip_prefix("License ::"))
        .filter_map(|rest| rest.rsplit("::").next())
        .map(str::trim)
        .last()
        .map(str::to_string)
}
