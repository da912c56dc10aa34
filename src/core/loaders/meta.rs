// Fabric and Quilt share the same meta API shape.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use crate::core::error::{LauncherError, LauncherResult};

use super::catalog::{register_version, BuildDescriptor, InstallOptions, LoaderCatalog};

#[derive(Debug, Clone, Copy)]
struct MetaFlavor {
    name: &'static str,
    meta_base: &'static str,
    id_prefix: &'static str,
}

const FABRIC: MetaFlavor = MetaFlavor {
    name: "Fabric",
    meta_base: "https://meta.fabricmc.net/v2",
    id_prefix: "fabric-loader",
};

const QUILT: MetaFlavor = MetaFlavor {
    name: "Quilt",
    meta_base: "https://meta.quiltmc.org/v3",
    id_prefix: "quilt-loader",
};

#[derive(Debug, Deserialize)]
struct LoaderEntry {
    loader: LoaderVersion,
}

#[derive(Debug, Deserialize)]
struct LoaderVersion {
    version: String,
    /// Quilt's meta omits stability.
    #[serde(default)]
    stable: Option<bool>,
}

impl LoaderVersion {
    fn is_stable(&self) -> bool {
        self.stable
            .unwrap_or_else(|| !self.version.contains("beta") && !self.version.contains("pre"))
    }
}

/// Loader catalog backed by a Fabric-style meta service.
pub struct MetaCatalog {
    client: reqwest::Client,
    flavor: MetaFlavor,
}

impl MetaCatalog {
    pub fn fabric(client: reqwest::Client) -> Self {
        Self {
            client,
            flavor: FABRIC,
        }
    }

    pub fn quilt(client: reqwest::Client) -> Self {
        Self {
            client,
            flavor: QUILT,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> LauncherResult<T> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(LauncherError::LoaderApi(format!(
                "{} meta returned {} for {}",
                self.flavor.name,
                response.status(),
                url
            )));
        }
        Ok(response.json::<T>().await?)
    }
}

/// Newest first as served; first stable entry is the recommended one.
fn to_builds(entries: Vec<LoaderEntry>, game_version: &str) -> Vec<BuildDescriptor> {
    let recommended = entries
        .iter()
        .position(|e| e.loader.is_stable())
        .unwrap_or(usize::MAX);
    entries
        .into_iter()
        .enumerate()
        .map(|(i, e)| BuildDescriptor {
            name: e.loader.version,
            game_version: game_version.to_string(),
            recommended: i == recommended,
            latest: i == 0,
        })
        .collect()
}

#[async_trait]
impl LoaderCatalog for MetaCatalog {
    async fn get_builds(&self, game_version: &str) -> LauncherResult<Vec<BuildDescriptor>> {
        let url = format!("{}/versions/loader/{}", self.flavor.meta_base, game_version);
        let entries: Vec<LoaderEntry> = self.get_json(&url).await?;
        info!(
            "{} {} loader builds for {}",
            entries.len(),
            self.flavor.name,
            game_version
        );
        Ok(to_builds(entries, game_version))
    }

    async fn install(
        &self,
        build: &BuildDescriptor,
        options: &InstallOptions<'_>,
    ) -> LauncherResult<String> {
        let url = format!(
            "{}/versions/loader/{}/{}/profile/json",
            self.flavor.meta_base, options.game_version, build.name
        );
        let profile: serde_json::Value = self.get_json(&url).await?;
        if profile.get("mainClass").and_then(|v| v.as_str()).is_none() {
            return Err(LauncherError::MissingKey {
                key: "mainClass".to_string(),
                context: url,
            });
        }

        let id = profile
            .get("id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| self.version_id(options.game_version, &build.name));
        register_version(options.game_dir, &id, &profile).await?;
        options
            .sinks
            .installer_log(format!("{} profile {} registered", self.flavor.name, id));
        Ok(id)
    }

    fn version_id(&self, game_version: &str, build: &str) -> String {
        format!("{}-{}-{}", self.flavor.id_prefix, build, game_version)
    }
}
