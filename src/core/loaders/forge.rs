use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{info, instrument, warn};

use crate::core::downloader::Downloader;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::maven::{MavenArtifact, FORGE_MAVEN};
use crate::core::progress::{FileKind, FileProgress};

use super::catalog::{
    fetch_maven_versions, sort_newest_first, BuildDescriptor, InstallOptions, LoaderCatalog,
};

const FORGE_PROMOTIONS_URL: &str =
    "https://files.minecraftforge.net/net/minecraftforge/forge/promotions_slim.json";

#[derive(Debug, Deserialize)]
struct Promotions {
    #[serde(default)]
    promos: HashMap<String, String>,
}

pub struct ForgeCatalog {
    downloader: Downloader,
}

impl ForgeCatalog {
    pub fn new(downloader: Downloader) -> Self {
        Self { downloader }
    }

    /// Recommended/latest markers. Missing promotions only cost the flags.
    async fn promotions(&self) -> HashMap<String, String> {
        let fetched = async {
            let response = self
                .downloader
                .client()
                .get(FORGE_PROMOTIONS_URL)
                .send()
                .await?
                .error_for_status()?;
            response.json::<Promotions>().await
        }
        .await;

        match fetched {
            Ok(p) => p.promos,
            Err(e) => {
                warn!("Forge promotions unavailable: {}", e);
                HashMap::new()
            }
        }
    }
}

#[async_trait]
impl LoaderCatalog for ForgeCatalog {
    #[instrument(skip(self))]
    async fn get_builds(&self, game_version: &str) -> LauncherResult<Vec<BuildDescriptor>> {
        let url = format!("{FORGE_MAVEN}/net/minecraftforge/forge/maven-metadata.xml");
        let versions = fetch_maven_versions(self.downloader.client(), &url).await?;
        let promos = self.promotions().await;
        let recommended = promos.get(&format!("{game_version}-recommended"));
        let latest = promos.get(&format!("{game_version}-latest"));

        let prefix = format!("{game_version}-");
        let mut builds: Vec<BuildDescriptor> = versions
            .iter()
            .filter_map(|v| v.strip_prefix(&prefix))
            .map(|name| BuildDescriptor {
                name: name.to_string(),
                game_version: game_version.to_string(),
                recommended: recommended.map(String::as_str) == Some(name),
                latest: latest.map(String::as_str) == Some(name),
            })
            .collect();
        sort_newest_first(&mut builds);

        info!("{} Forge builds for {}", builds.len(), game_version);
        Ok(builds)
    }

    async fn install(
        &self,
        build: &BuildDescriptor,
        options: &InstallOptions<'_>,
    ) -> LauncherResult<String> {
        let coordinate = format!(
            "net.minecraftforge:forge:{}-{}",
            options.game_version, build.name
        );
        let installer = MavenArtifact::parse(&coordinate)?.with_classifier("installer");
        let fallback_id = self.version_id(options.game_version, &build.name);
        run_installer_artifact(&self.downloader, &installer, FORGE_MAVEN, &fallback_id, options)
            .await
    }

    fn version_id(&self, game_version: &str, build: &str) -> String {
        format!("{game_version}-forge-{build}")
    }
}

// ─── Installer jar runner (shared with NeoForge) ───

/// Download an installer jar, run it with `--installClient` against the
/// target's game directory and return the version id it registered.
pub(super) async fn run_installer_artifact(
    downloader: &Downloader,
    installer: &MavenArtifact,
    repository: &str,
    fallback_id: &str,
    options: &InstallOptions<'_>,
) -> LauncherResult<String> {
    let java = options.java.ok_or_else(|| {
        LauncherError::JavaExecution(format!("{installer} needs a build java"))
    })?;

    let jar = options
        .game_dir
        .join(".installers")
        .join(installer.filename());
    if !jar.exists() {
        downloader
            .download_file(
                &installer.url(repository),
                &jar,
                None,
                options.sinks,
                options.cancel,
            )
            .await?;
    }
    options.sinks.file(FileProgress {
        kind: FileKind::LoaderInstaller,
        name: installer.filename(),
        processed: 1,
        total: 1,
    });

    ensure_launcher_profiles(options.game_dir).await?;
    let id = registered_id(&jar).await?.unwrap_or_else(|| fallback_id.to_string());

    run_java_installer(java, &jar, options).await?;
    Ok(id)
}

/// Installers refuse to run without a launcher profile store.
async fn ensure_launcher_profiles(game_dir: &Path) -> LauncherResult<()> {
    tokio::fs::create_dir_all(game_dir)
        .await
        .map_err(|e| LauncherError::io(game_dir, e))?;
    let path = game_dir.join("launcher_profiles.json");
    if !path.exists() {
        tokio::fs::write(&path, br#"{"profiles":{},"selectedProfile":null}"#)
            .await
            .map_err(|e| LauncherError::io(&path, e))?;
    }
    Ok(())
}

/// Version id declared by the installer's embedded `version.json`.
async fn registered_id(jar: &Path) -> LauncherResult<Option<String>> {
    let jar: PathBuf = jar.to_path_buf();
    tokio::task::spawn_blocking(move || -> LauncherResult<Option<String>> {
        let file = std::fs::File::open(&jar).map_err(|e| LauncherError::io(&jar, e))?;
        let mut archive = zip::ZipArchive::new(file)?;
        let Ok(entry) = archive.by_name("version.json") else {
            return Ok(None);
        };
        let json: serde_json::Value = serde_json::from_reader(entry)?;
        Ok(json.get("id").and_then(|v| v.as_str()).map(str::to_string))
    })
    .await
    .map_err(|e| LauncherError::Other(format!("installer inspection task failed: {e}")))?
}

async fn run_java_installer(
    java: &Path,
    jar: &Path,
    options: &InstallOptions<'_>,
) -> LauncherResult<()> {
    let game_dir = options.game_dir;
    let sinks = options.sinks;
    info!("Running {:?} --installClient {:?}", jar, game_dir);
    let mut child = Command::new(java)
        .arg("-jar")
        .arg(jar)
        .arg("--installClient")
        .arg(game_dir)
        .current_dir(game_dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| LauncherError::JavaExecution(e.to_string()))?;

    let mut forwarders = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        let sinks = sinks.clone();
        forwarders.push(tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                sinks.installer_log(line);
            }
        }));
    }
    if let Some(stderr) = child.stderr.take() {
        let sinks = sinks.clone();
        forwarders.push(tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                sinks.installer_log(line);
            }
        }));
    }

    let status = tokio::select! {
        status = child.wait() => status.map_err(|e| LauncherError::JavaExecution(e.to_string()))?,
        _ = options.cancel.cancelled() => {
            let _ = child.kill().await;
            return Err(LauncherError::Cancelled);
        }
    };
    for forwarder in forwarders {
        let _ = forwarder.await;
    }

    if !status.success() {
        return Err(LauncherError::JavaExecution(format!(
            "{:?} exited with {:?}",
            jar.file_name().unwrap_or_default(),
            status.code()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[tokio::test]
    async fn registered_id_reads_embedded_version_json() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("forge-installer.jar");
        {
            let file = std::fs::File::create(&jar).unwrap();
            let mut zip = zip::ZipWriter::new(file);
            zip.start_file("version.json", zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(br#"{"id": "1.20.1-forge-47.2.0"}"#).unwrap();
            zip.finish().unwrap();
        }

        assert_eq!(
            registered_id(&jar).await.unwrap().as_deref(),
            Some("1.20.1-forge-47.2.0")
        );
    }

    #[tokio::test]
    async fn launcher_profiles_are_created_once() {
        let dir = tempfile::tempdir().unwrap();
        ensure_launcher_profiles(dir.path()).await.unwrap();
        let path = dir.path().join("launcher_profiles.json");
        std::fs::write(&path, b"{\"profiles\":{\"kept\":{}}}").unwrap();
        ensure_launcher_profiles(dir.path()).await.unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("kept"));
    }

    #[test]
    fn version_id_follows_forge_layout() {
        let catalog = ForgeCatalog::new(Downloader::new(reqwest::Client::new()));
        assert_eq!(catalog.version_id("1.20.1", "47.2.0"), "1.20.1-forge-47.2.0");
    }
}
