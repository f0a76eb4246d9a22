use anyhow::Result;
use reqwest::Client;

use super::USER_AGENT;
use crate::runner::maven::parse_pom;

const MAVEN_CENTRAL: &str = "https://repo1.maven.org/maven2";

/// How many `<parent>` POMs are fetched when the artifact declares no license.
const MAX_PARENT_DEPTH: usize = 3;

/// Fetch the license for a Maven artifact from Maven Central.
///
/// The `name` is expected in `groupId:artifactId` format, as the Maven runner
/// stores it.
pub async fn fetch_license(client: &Client, name: &str, version: &str) -> Result<Option<String>> {
    let Some((group_id, artifact_id)) = name.split_once(':') else {
        return Ok(None);
    };
    let mut coords = (group_id.to_string(), artifact_id.to_string(), version.to_string());

    for _ in 0..MAX_PARENT_DEPTH {
        let response = client
            .get(pom_url(&coords.0, &coords.1, &coords.2))
            .header("User-Agent", USER_AGENT)
            .send()
            .await?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let info = parse_pom(&response.text().await?);
        if info.license.is_some() {
            return Ok(info.license);
        }
        match info.parent {
            Some(parent) => coords = parent,
            None => return Ok(None),
        }
    }

    Ok(None)
}

fn pom_url(group_id: &str, artifact_id: &str, version: &str) -> String {
    format!(
        "{}/{}/{}/{}/{}-{}.pom",
        MAVEN_CENTRAL,
        group_id.replace('.', "/"),
        artifact_id,
        version,
        artifact_id,
        version
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pom_url() {
        assert_eq!(
            pom_url("org.slf4j", "slf4j-api", "2.0.7"),
            "https://repo1.maven.org/maven2/org/slf4j/slf4j-api/2.0.7/slf4j-api-2.0.7.pom"
        );
    }
}
