use serde::Deserialize;
use tracing::{debug, info};

use crate::core::error::{LauncherError, LauncherResult};

pub const VERSION_MANIFEST_URL: &str =
    "https://piston-meta.mojang.com/mc/game/version_manifest_v2.json";

/// Mojang's list of every published game version (manifest v2).
#[derive(Debug, Deserialize)]
pub struct VersionManifest {
    #[serde(default)]
    pub latest: Option<LatestVersions>,
    pub versions: Vec<VersionEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LatestVersions {
    pub release: String,
    pub snapshot: String,
}

/// Where to fetch one version's JSON.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub channel: String,
    pub url: String,
    #[serde(default)]
    pub release_time: Option<String>,
    #[serde(default)]
    pub sha1: Option<String>,
}

impl VersionManifest {
    pub async fn fetch(client: &reqwest::Client) -> LauncherResult<Self> {
        Self::fetch_from(client, VERSION_MANIFEST_URL).await
    }

    pub async fn fetch_from(client: &reqwest::Client, url: &str) -> LauncherResult<Self> {
        debug!("GET {}", url);
        let response = client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let manifest: VersionManifest = response.json().await?;
        info!("Version manifest lists {} versions", manifest.versions.len());
        Ok(manifest)
    }

    pub fn find_version(&self, id: &str) -> Option<&VersionEntry> {
        self.versions.iter().find(|v| v.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_keep_channel_and_url() {
        let manifest: VersionManifest = serde_json::from_value(serde_json::json!({
            "latest": {"release": "1.21", "snapshot": "24w14a"},
            "versions": [
                {"id": "1.21", "type": "release", "releaseTime": "2024-06-13T08:24:03+00:00",
                 "url": "https://piston-meta.mojang.com/v1/packages/aa/1.21.json", "sha1": "aa"},
                {"id": "24w14a", "type": "snapshot", "url": "https://piston-meta.mojang.com/v1/packages/bb/24w14a.json"}
            ]
        }))
        .unwrap();

        assert_eq!(manifest.latest.as_ref().unwrap().snapshot, "24w14a");
        let release = manifest.find_version("1.21").unwrap();
        assert_eq!(release.channel, "release");
        assert_eq!(release.sha1.as_deref(), Some("aa"));
        assert!(manifest.find_version("24w14a").unwrap().release_time.is_none());
        assert!(manifest.find_version("1.7.10").is_none());
    }
}
