// ─── Loader Catalogs ───
// Remote lists of loader builds per game version, plus the install step
// that registers a loader version inside a target's game directory.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::core::downloader::Downloader;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::progress::ProgressSinks;

use super::meta::MetaCatalog;
use super::forge::ForgeCatalog;
use super::kind::LoaderKind;
use super::liteloader::LiteLoaderCatalog;
use super::neoforge::NeoForgeCatalog;

/// One loader build offered for a game version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildDescriptor {
    /// Loader's own version string (`47.2.0`, `0.15.11`...).
    pub name: String,
    pub game_version: String,
    #[serde(default)]
    pub recommended: bool,
    #[serde(default)]
    pub latest: bool,
}

impl BuildDescriptor {
    pub fn new(name: impl Into<String>, game_version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            game_version: game_version.into(),
            recommended: false,
            latest: false,
        }
    }
}

/// Where and with what a catalog installs one build.
pub struct InstallOptions<'a> {
    pub game_version: &'a str,
    pub game_dir: &'a Path,
    /// Build-time java for loaders that run an installer jar.
    pub java: Option<&'a Path>,
    pub sinks: &'a ProgressSinks,
    pub cancel: &'a CancellationToken,
}

#[async_trait]
pub trait LoaderCatalog: Send + Sync {
    async fn get_builds(&self, game_version: &str) -> LauncherResult<Vec<BuildDescriptor>>;

    /// Register `build` in `options.game_dir` and return its version id.
    async fn install(
        &self,
        build: &BuildDescriptor,
        options: &InstallOptions<'_>,
    ) -> LauncherResult<String>;

    /// Version id a build is registered under once installed.
    fn version_id(&self, game_version: &str, build: &str) -> String;
}

/// Explicit match, else recommended, else latest, else the first entry.
pub fn select_build<'a>(
    builds: &'a [BuildDescriptor],
    explicit: Option<&str>,
) -> Option<&'a BuildDescriptor> {
    if let Some(wanted) = explicit {
        if let Some(found) = builds.iter().find(|b| b.name == wanted) {
            return Some(found);
        }
    }
    builds
        .iter()
        .find(|b| b.recommended)
        .or_else(|| builds.iter().find(|b| b.latest))
        .or_else(|| builds.first())
}

/// One catalog per loader kind that needs one.
#[derive(Clone)]
pub struct CatalogSet {
    pub forge: Arc<dyn LoaderCatalog>,
    pub neoforge: Arc<dyn LoaderCatalog>,
    pub fabric: Arc<dyn LoaderCatalog>,
    pub quilt: Arc<dyn LoaderCatalog>,
    pub liteloader: Arc<dyn LoaderCatalog>,
}

impl CatalogSet {
    /// The public HTTP catalogs.
    pub fn http(downloader: Downloader) -> Self {
        Self {
            forge: Arc::new(ForgeCatalog::new(downloader.clone())),
            neoforge: Arc::new(NeoForgeCatalog::new(downloader.clone())),
            fabric: Arc::new(MetaCatalog::fabric(downloader.client().clone())),
            quilt: Arc::new(MetaCatalog::quilt(downloader.client().clone())),
            liteloader: Arc::new(LiteLoaderCatalog::new(downloader.client().clone())),
        }
    }

    /// Every catalog replaced by the same instance.
    pub fn uniform(catalog: Arc<dyn LoaderCatalog>) -> Self {
        Self {
            forge: catalog.clone(),
            neoforge: catalog.clone(),
            fabric: catalog.clone(),
            quilt: catalog.clone(),
            liteloader: catalog,
        }
    }

    pub fn get(&self, kind: LoaderKind) -> Option<&Arc<dyn LoaderCatalog>> {
        match kind {
            LoaderKind::Vanilla => None,
            LoaderKind::Forge => Some(&self.forge),
            LoaderKind::NeoForge => Some(&self.neoforge),
            LoaderKind::Fabric => Some(&self.fabric),
            LoaderKind::Quilt => Some(&self.quilt),
            LoaderKind::LiteLoader => Some(&self.liteloader),
        }
    }
}

// ─── Shared catalog helpers ───

#[derive(Debug, Deserialize)]
pub(super) struct MavenMetadata {
    pub versioning: MavenVersioning,
}

#[derive(Debug, Deserialize)]
pub(super) struct MavenVersioning {
    pub versions: MavenVersions,
}

#[derive(Debug, Deserialize)]
pub(super) struct MavenVersions {
    #[serde(rename = "version", default)]
    pub version: Vec<String>,
}

/// All versions listed in a repository's `maven-metadata.xml`.
pub(super) async fn fetch_maven_versions(
    client: &reqwest::Client,
    url: &str,
) -> LauncherResult<Vec<String>> {
    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(LauncherError::LoaderApi(format!(
            "{url} returned {}",
            response.status()
        )));
    }
    let xml = response.text().await?;
    let metadata: MavenMetadata = quick_xml::de::from_str(&xml)?;
    Ok(metadata.versioning.versions.version)
}

/// Numeric sort key (`47.2.10` sorts after `47.2.9`).
pub(super) fn version_sort_key(version: &str) -> Vec<u64> {
    version
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<u64>().unwrap_or(0))
        .collect()
}

/// Newest first; the newest entry is flagged `latest` unless one already is.
pub(super) fn sort_newest_first(builds: &mut Vec<BuildDescriptor>) {
    builds.sort_by(|a, b| {
        version_sort_key(&b.name)
            .cmp(&version_sort_key(&a.name))
            .then_with(|| b.name.cmp(&a.name))
    });
    builds.dedup_by(|a, b| a.name == b.name);
    if !builds.iter().any(|b| b.latest) {
        if let Some(first) = builds.first_mut() {
            first.latest = true;
        }
    }
}

/// Write `versions/<id>/<id>.json` under `game_dir`.
pub(super) async fn register_version(
    game_dir: &Path,
    id: &str,
    json: &serde_json::Value,
) -> LauncherResult<()> {
    let dir = game_dir.join("versions").join(id);
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| LauncherError::io(&dir, e))?;
    let path = dir.join(format!("{id}.json"));
    tokio::fs::write(&path, serde_json::to_string_pretty(json)?)
        .await
        .map_err(|e| LauncherError::io(&path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(name: &str, recommended: bool, latest: bool) -> BuildDescriptor {
        BuildDescriptor {
            name: name.to_string(),
            game_version: "1.20.1".to_string(),
            recommended,
            latest,
        }
    }

    #[test]
    fn recommended_wins_without_explicit_build() {
        let builds = vec![
            build("B1", false, false),
            build("B2", true, false),
            build("B3", false, true),
        ];
        assert_eq!(select_build(&builds, None).unwrap().name, "B2");
    }

    #[test]
    fn explicit_build_beats_recommended() {
        let builds = vec![
            build("B1", false, false),
            build("B2", true, false),
            build("B3", false, true),
        ];
        assert_eq!(select_build(&builds, Some("B3")).unwrap().name, "B3");
        // Unknown explicit build falls back to the normal precedence.
        assert_eq!(select_build(&builds, Some("B9")).unwrap().name, "B2");
    }

    #[test]
    fn latest_then_first_entry() {
        let builds = vec![build("B1", false, false), build("B3", false, true)];
        assert_eq!(select_build(&builds, None).unwrap().name, "B3");

        let builds = vec![build("B1", false, false), build("B0", false, false)];
        assert_eq!(select_build(&builds, None).unwrap().name, "B1");

        assert!(select_build(&[], None).is_none());
    }

    #[test]
    fn newest_first_marks_latest() {
        let mut builds = vec![
            build("47.2.9", false, false),
            build("47.2.10", false, false),
            build("47.2.9", false, false),
        ];
        sort_newest_first(&mut builds);
        let names: Vec<_> = builds.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["47.2.10", "47.2.9"]);
        assert!(builds[0].latest);
        assert!(!builds[1].latest);
    }

    #[tokio::test]
    async fn register_version_writes_versions_layout() {
        let dir = tempfile::tempdir().unwrap();
        register_version(dir.path(), "x-1", &serde_json::json!({"id": "x-1"}))
            .await
            .unwrap();
        assert!(dir.path().join("versions/x-1/x-1.json").exists());
    }
}
