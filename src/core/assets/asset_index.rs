use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::core::downloader::{DownloadEntry, Downloader};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::progress::{FileKind, ProgressSinks};
use crate::core::version::AssetIndexInfo;

const RESOURCES_URL: &str = "https://resources.download.minecraft.net";

/// Asset index JSON (`assets/indexes/<id>.json`).
#[derive(Debug, Deserialize)]
pub struct AssetIndex {
    pub objects: HashMap<String, AssetObject>,
}

#[derive(Debug, Deserialize)]
pub struct AssetObject {
    pub hash: String,
    pub size: u64,
}

impl AssetObject {
    fn entry(&self, objects_dir: &Path) -> Option<DownloadEntry> {
        let prefix = self.hash.get(..2)?;
        Some(DownloadEntry {
            url: format!("{RESOURCES_URL}/{prefix}/{}", self.hash),
            dest: objects_dir.join(prefix).join(&self.hash),
            sha1: Some(self.hash.clone()),
            size: Some(self.size),
        })
    }
}

impl AssetIndex {
    /// Objects not yet present under `objects_dir`.
    pub fn missing_entries(&self, objects_dir: &Path) -> Vec<DownloadEntry> {
        let mut entries: Vec<DownloadEntry> = self
            .objects
            .values()
            .filter_map(|obj| obj.entry(objects_dir))
            .filter(|entry| !entry.dest.exists())
            .collect();
        // Several names can share one object.
        entries.sort_by(|a, b| a.dest.cmp(&b.dest));
        entries.dedup_by(|a, b| a.dest == b.dest);
        entries
    }
}

/// Fetch (or reuse) the asset index and download every missing object.
///
/// Individual object failures are logged and tolerated.
pub async fn download_assets(
    info: &AssetIndexInfo,
    assets_dir: &Path,
    downloader: &Downloader,
    sinks: &ProgressSinks,
    cancel: &CancellationToken,
) -> LauncherResult<()> {
    let index_path = assets_dir.join("indexes").join(format!("{}.json", info.id));

    if !index_path.exists() {
        downloader
            .download_file(&info.url, &index_path, info.sha1.as_deref(), sinks, cancel)
            .await?;
    }

    let raw = tokio::fs::read_to_string(&index_path)
        .await
        .map_err(|e| LauncherError::io(&index_path, e))?;
    let index: AssetIndex = serde_json::from_str(&raw)?;

    let objects_dir: PathBuf = assets_dir.join("objects");
    let entries = index.missing_entries(&objects_dir);
    info!(
        "Asset index {}: {} objects, {} missing",
        info.id,
        index.objects.len(),
        entries.len()
    );

    let failures = downloader
        .download_batch(entries, FileKind::Asset, sinks, cancel)
        .await?;
    if !failures.is_empty() {
        warn!("{} asset downloads failed for index {}", failures.len(), info.id);
        sinks.installer_log(format!("{} assets failed to download", failures.len()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_entries_skip_existing_and_dedupe() {
        let dir = tempfile::tempdir().unwrap();
        let objects = dir.path().join("objects");
        let present = objects.join("ab").join("ab01");
        std::fs::create_dir_all(present.parent().unwrap()).unwrap();
        std::fs::write(&present, b"x").unwrap();

        let index: AssetIndex = serde_json::from_value(serde_json::json!({
            "objects": {
                "minecraft/sounds/a.ogg": {"hash": "ab01", "size": 1},
                "minecraft/sounds/b.ogg": {"hash": "cd02", "size": 2},
                "minecraft/sounds/c.ogg": {"hash": "cd02", "size": 2}
            }
        }))
        .unwrap();

        let entries = index.missing_entries(&objects);
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].url,
            "https://resources.download.minecraft.net/cd/cd02"
        );
        assert_eq!(entries[0].dest, objects.join("cd").join("cd02"));
    }
}
