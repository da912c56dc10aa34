use async_trait::async_trait;
use tracing::info;

use crate::core::downloader::Downloader;
use crate::core::error::LauncherResult;
use crate::core::maven::{MavenArtifact, NEOFORGE_MAVEN};

use super::catalog::{
    fetch_maven_versions, sort_newest_first, BuildDescriptor, InstallOptions, LoaderCatalog,
};
use super::forge::run_installer_artifact;

/// The only game version NeoForge shipped under the old `forge` artifact.
const LEGACY_GAME_VERSION: &str = "1.20.1";

pub struct NeoForgeCatalog {
    downloader: Downloader,
}

impl NeoForgeCatalog {
    pub fn new(downloader: Downloader) -> Self {
        Self { downloader }
    }
}

/// NeoForge builds drop the leading `1.`: game `1.20.4` → `20.4.x`.
fn build_prefix(game_version: &str) -> String {
    let mut parts = game_version.trim_start_matches("1.").split('.');
    let minor = parts.next().unwrap_or_default();
    let patch = parts.next().unwrap_or("0");
    format!("{minor}.{patch}.")
}

fn is_legacy(build: &str) -> bool {
    build.starts_with(&format!("{LEGACY_GAME_VERSION}-"))
}

fn coordinate(build: &str) -> String {
    if is_legacy(build) {
        format!("net.neoforged:forge:{build}")
    } else {
        format!("net.neoforged:neoforge:{build}")
    }
}

#[async_trait]
impl LoaderCatalog for NeoForgeCatalog {
    async fn get_builds(&self, game_version: &str) -> LauncherResult<Vec<BuildDescriptor>> {
        let client = self.downloader.client();
        let url = format!("{NEOFORGE_MAVEN}/net/neoforged/neoforge/maven-metadata.xml");
        let prefix = build_prefix(game_version);

        let mut names: Vec<String> = fetch_maven_versions(client, &url)
            .await?
            .into_iter()
            .filter(|v| v.starts_with(&prefix))
            .collect();

        if game_version == LEGACY_GAME_VERSION {
            let legacy_url = format!("{NEOFORGE_MAVEN}/net/neoforged/forge/maven-metadata.xml");
            names.extend(fetch_maven_versions(client, &legacy_url).await?);
        }

        // NeoForge publishes no promotions; betas never count as latest.
        let mut builds: Vec<BuildDescriptor> = names
            .into_iter()
            .map(|name| BuildDescriptor::new(name, game_version))
            .collect();
        sort_newest_first(&mut builds);
        if let Some(first) = builds.first_mut() {
            first.latest = false;
        }
        if let Some(stable) = builds.iter_mut().find(|b| !b.name.contains("beta")) {
            stable.latest = true;
        }

        info!("{} NeoForge builds for {}", builds.len(), game_version);
        Ok(builds)
    }

    async fn install(
        &self,
        build: &BuildDescriptor,
        options: &InstallOptions<'_>,
    ) -> LauncherResult<String> {
        let installer = MavenArtifact::parse(&coordinate(&build.name))?.with_classifier("installer");
        let fallback_id = self.version_id(options.game_version, &build.name);
        run_installer_artifact(
            &self.downloader,
            &installer,
            NEOFORGE_MAVEN,
            &fallback_id,
            options,
        )
        .await
    }

    fn version_id(&self, game_version: &str, build: &str) -> String {
        if is_legacy(build) {
            format!("{game_version}-forge-{}", build.trim_start_matches("1.20.1-"))
        } else {
            format!("neoforge-{build}")
        }
    }
}
