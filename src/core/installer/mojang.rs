use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::core::assets::download_assets;
use crate::core::downloader::{DownloadEntry, Downloader};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::platform::OsContext;
use crate::core::progress::{FileKind, FileProgress, ProgressSinks};
use crate::core::version::{VersionJson, VersionManifest};

use super::{LaunchPlan, PlatformInstaller, VersionDescriptor};

/// Parent chains longer than this are treated as cyclic.
const MAX_INHERITANCE_DEPTH: usize = 8;

/// Installs Mojang-format versions into `<root>/<platform>-<arch>/`.
pub struct MojangInstaller {
    os: OsContext,
    game_dir: PathBuf,
    downloader: Downloader,
    manifest: OnceCell<VersionManifest>,
}

impl MojangInstaller {
    pub fn new(os: OsContext, profile_root: &Path, downloader: Downloader) -> Self {
        let game_dir = profile_root.join(format!("{}-{}", os.platform, os.arch));
        Self {
            os,
            game_dir,
            downloader,
            manifest: OnceCell::new(),
        }
    }

    fn libraries_dir(&self) -> PathBuf {
        self.game_dir.join("libraries")
    }

    fn assets_dir(&self) -> PathBuf {
        self.game_dir.join("assets")
    }

    fn version_dir(&self, id: &str) -> PathBuf {
        self.game_dir.join("versions").join(id)
    }

    fn version_json_path(&self, id: &str) -> PathBuf {
        self.version_dir(id).join(format!("{id}.json"))
    }

    async fn manifest(&self) -> LauncherResult<&VersionManifest> {
        self.manifest
            .get_or_try_init(|| VersionManifest::fetch(self.downloader.client()))
            .await
    }

    /// Raw version JSON, registering it from the manifest when absent.
    async fn load_raw(&self, id: &str, cancel: &CancellationToken) -> LauncherResult<serde_json::Value> {
        let path = self.version_json_path(id);
        if !path.exists() {
            if cancel.is_cancelled() {
                return Err(LauncherError::Cancelled);
            }
            let entry = self
                .manifest()
                .await?
                .find_version(id)
                .cloned()
                .ok_or_else(|| LauncherError::VersionNotFound(id.to_string()))?;

            let response = self.downloader.client().get(&entry.url).send().await?;
            if !response.status().is_success() {
                return Err(LauncherError::DownloadFailed {
                    url: entry.url,
                    status: response.status().as_u16(),
                });
            }
            let body = response.text().await?;

            let dir = self.version_dir(id);
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| LauncherError::io(&dir, e))?;
            tokio::fs::write(&path, &body)
                .await
                .map_err(|e| LauncherError::io(&path, e))?;
            debug!("Registered version {} at {:?}", id, path);
        }

        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| LauncherError::io(&path, e))?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Version JSON with its whole `inheritsFrom` chain merged in.
    async fn resolve(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> LauncherResult<(VersionJson, Option<String>)> {
        let raw = self.load_raw(id, cancel).await?;
        let declared_parent = raw
            .get("inheritsFrom")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        let mut merged = raw;
        let mut depth = 0;
        while let Some(parent_id) = merged
            .get("inheritsFrom")
            .and_then(|v| v.as_str())
            .map(str::to_string)
        {
            depth += 1;
            if depth > MAX_INHERITANCE_DEPTH {
                return Err(LauncherError::Other(format!(
                    "inheritsFrom chain of {id} is too deep"
                )));
            }
            let parent = self.load_raw(&parent_id, cancel).await?;
            merged = VersionJson::merge_with_parent_json(&merged, &parent);
        }

        let context = self.version_json_path(id).to_string_lossy().to_string();
        Ok((VersionJson::from_value(merged, &context)?, declared_parent))
    }

    async fn fetch_batch(
        &self,
        entries: Vec<DownloadEntry>,
        kind: FileKind,
        sinks: &ProgressSinks,
        cancel: &CancellationToken,
    ) -> LauncherResult<()> {
        let pending: Vec<DownloadEntry> = entries.into_iter().filter(|e| !e.dest.exists()).collect();
        if pending.is_empty() {
            return Ok(());
        }
        let failures = self.downloader.download_batch(pending, kind, sinks, cancel).await?;
        match failures.into_iter().next() {
            Some((entry, err)) => {
                sinks.installer_log(format!("{kind} {} failed: {err}", entry.url));
                Err(err)
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PlatformInstaller for MojangInstaller {
    fn game_dir(&self) -> &Path {
        &self.game_dir
    }

    async fn get_version(
        &self,
        version_id: &str,
        cancel: &CancellationToken,
    ) -> LauncherResult<VersionDescriptor> {
        let (version, inherits_from) = self.resolve(version_id, cancel).await?;
        Ok(VersionDescriptor {
            id: version.id.clone(),
            inherits_from,
            java_major: version.required_java_major(),
            asset_index: version.asset_index.as_ref().map(|a| a.id.clone()),
            main_class: version.main_class,
        })
    }

    async fn has_local_version(&self, version_id: &str) -> bool {
        tokio::fs::try_exists(self.version_json_path(version_id))
            .await
            .unwrap_or(false)
    }

    #[instrument(skip(self, sinks, cancel), fields(platform = %self.os.platform, arch = %self.os.arch))]
    async fn install(
        &self,
        version_id: &str,
        sinks: &ProgressSinks,
        cancel: &CancellationToken,
    ) -> LauncherResult<()> {
        let (version, _) = self.resolve(version_id, cancel).await?;
        info!("Installing {} into {:?}", version.id, self.game_dir);

        if let Some(client) = version.client_entry(&self.version_dir(&version.id)) {
            if !client.dest.exists() {
                let name = client.dest.to_string_lossy().to_string();
                self.downloader
                    .download_file(&client.url, &client.dest, client.sha1.as_deref(), sinks, cancel)
                    .await?;
                sinks.file(FileProgress {
                    kind: FileKind::Version,
                    name,
                    processed: 1,
                    total: 1,
                });
            }
        }

        let (libraries, natives): (Vec<_>, Vec<_>) = version
            .library_entries(&self.os, &self.libraries_dir())?
            .into_iter()
            .partition(|(_, kind)| *kind == FileKind::Library);
        self.fetch_batch(
            libraries.into_iter().map(|(e, _)| e).collect(),
            FileKind::Library,
            sinks,
            cancel,
        )
        .await?;
        self.fetch_batch(
            natives.into_iter().map(|(e, _)| e).collect(),
            FileKind::Native,
            sinks,
            cancel,
        )
        .await?;

        if let Some(index) = &version.asset_index {
            download_assets(index, &self.assets_dir(), &self.downloader, sinks, cancel).await?;
        }

        sinks.installer_log(format!("{} installed", version.id));
        Ok(())
    }

    async fn launch_plan(
        &self,
        version_id: &str,
        java: Option<&Path>,
    ) -> LauncherResult<LaunchPlan> {
        if !self.has_local_version(version_id).await {
            return Err(LauncherError::VersionNotFound(version_id.to_string()));
        }
        let (version, _) = self.resolve(version_id, &CancellationToken::new()).await?;
        let classpath =
            version.classpath(&self.os, &self.libraries_dir(), &self.version_dir(&version.id))?;

        Ok(LaunchPlan {
            version_id: version.id.clone(),
            jvm_args: version.jvm_args(&self.os),
            game_args: version.game_args(&self.os),
            java_major: version.required_java_major(),
            java_path: java.map(Path::to_path_buf),
            main_class: version.main_class,
            classpath,
        })
    }
}
