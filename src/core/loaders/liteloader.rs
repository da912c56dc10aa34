use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::info;

use crate::core::error::{LauncherError, LauncherResult};

use super::catalog::{register_version, BuildDescriptor, InstallOptions, LoaderCatalog};

const LITELOADER_VERSIONS_URL: &str = "https://dl.liteloader.com/versions/versions.json";
const LITELOADER_REPO: &str = "https://dl.liteloader.com/versions/";
const LITELOADER_ARTEFACT: &str = "com.mumfrey:liteloader";
const LAUNCHWRAPPER_MAIN: &str = "net.minecraft.launchwrapper.Launch";

#[derive(Debug, Deserialize)]
struct LiteLoaderIndex {
    #[serde(default)]
    versions: HashMap<String, GameEntry>,
}

#[derive(Debug, Deserialize)]
struct GameEntry {
    #[serde(default)]
    artefacts: HashMap<String, HashMap<String, Artefact>>,
    #[serde(default)]
    snapshots: HashMap<String, HashMap<String, Artefact>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Artefact {
    version: String,
    tweak_class: String,
    #[serde(default)]
    libraries: Vec<serde_json::Value>,
}

impl LiteLoaderIndex {
    /// Builds for `key`, matched as a game version or as a loader version.
    fn builds(&self, key: &str) -> Vec<(BuildDescriptor, Artefact)> {
        let mut out: Vec<(BuildDescriptor, Artefact)> = Vec::new();
        for (game_version, entry) in &self.versions {
            for (channel, recommended) in [(&entry.artefacts, true), (&entry.snapshots, false)] {
                let Some(artefacts) = channel.get(LITELOADER_ARTEFACT) else {
                    continue;
                };
                let latest = artefacts.get("latest").map(|a| a.version.as_str());
                for (name, artefact) in artefacts {
                    if name == "latest" {
                        continue;
                    }
                    if game_version != key && artefact.version != key {
                        continue;
                    }
                    let is_latest = latest == Some(artefact.version.as_str());
                    out.push((
                        BuildDescriptor {
                            name: artefact.version.clone(),
                            game_version: game_version.clone(),
                            recommended: recommended && is_latest,
                            latest: is_latest,
                        },
                        artefact.clone(),
                    ));
                }
            }
        }
        out.sort_by(|a, b| b.0.name.cmp(&a.0.name));
        out.dedup_by(|a, b| a.0.name == b.0.name && a.0.game_version == b.0.game_version);
        out
    }
}

pub struct LiteLoaderCatalog {
    client: reqwest::Client,
    index: OnceCell<LiteLoaderIndex>,
}

impl LiteLoaderCatalog {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            index: OnceCell::new(),
        }
    }

    async fn index(&self) -> LauncherResult<&LiteLoaderIndex> {
        self.index
            .get_or_try_init(|| async {
                let response = self.client.get(LITELOADER_VERSIONS_URL).send().await?;
                if !response.status().is_success() {
                    return Err(LauncherError::LoaderApi(format!(
                        "LiteLoader versions returned {}",
                        response.status()
                    )));
                }
                Ok(response.json::<LiteLoaderIndex>().await?)
            })
            .await
    }
}

fn version_json(id: &str, build: &BuildDescriptor, artefact: &Artefact) -> serde_json::Value {
    let mut libraries = vec![serde_json::json!({
        "name": format!("{LITELOADER_ARTEFACT}:{}", artefact.version),
        "url": LITELOADER_REPO,
    })];
    libraries.extend(artefact.libraries.iter().cloned());

    serde_json::json!({
        "id": id,
        "inheritsFrom": build.game_version,
        "mainClass": LAUNCHWRAPPER_MAIN,
        "libraries": libraries,
        "minecraftArguments": format!(
            "--username ${{auth_player_name}} --version ${{version_name}} --gameDir ${{game_directory}} \
             --assetsDir ${{assets_root}} --assetIndex ${{assets_index_name}} --uuid ${{auth_uuid}} \
             --accessToken ${{auth_access_token}} --userType ${{user_type}} --tweakClass {}",
            artefact.tweak_class
        ),
    })
}

#[async_trait]
impl LoaderCatalog for LiteLoaderCatalog {
    async fn get_builds(&self, game_version: &str) -> LauncherResult<Vec<BuildDescriptor>> {
        let builds: Vec<BuildDescriptor> = self
            .index()
            .await?
            .builds(game_version)
            .into_iter()
            .map(|(build, _)| build)
            .collect();
        info!("{} LiteLoader builds match {}", builds.len(), game_version);
        Ok(builds)
    }

    async fn install(
        &self,
        build: &BuildDescriptor,
        options: &InstallOptions<'_>,
    ) -> LauncherResult<String> {
        let (build, artefact) = self
            .index()
            .await?
            .builds(&build.name)
            .into_iter()
            .find(|(b, _)| b.game_version == build.game_version)
            .ok_or_else(|| LauncherError::VersionNotFound(format!("liteloader {}", build.name)))?;

        let id = self.version_id(&build.game_version, &build.name);
        register_version(options.game_dir, &id, &version_json(&id, &build, &artefact)).await?;
        options
            .sinks
            .installer_log(format!("LiteLoader {} registered as {}", build.name, id));
        Ok(id)
    }

    fn version_id(&self, game_version: &str, build: &str) -> String {
        format!("{game_version}-LiteLoader-{build}")
    }
}
