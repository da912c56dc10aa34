// ─── Build Java Provisioner ───
// Guarantees a JDK for loader installers that shell out to `java`.
// One provisioning per process; later calls return the cached path.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::core::downloader::ArtifactFetcher;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::mirror::{MirrorResolver, MirrorTable};
use crate::core::platform::{Arch, Platform};
use crate::core::progress::{FileKind, FileProgress, ProgressSinks};

use super::extract::extract_archive;

const RECORD_FILE: &str = "build_java.json";
const ARCHIVE_FILE: &str = "jdk-download";
const JDK_DIR: &str = "jdk";
/// A JDK archive plus its extracted tree stays well below this.
const MIN_FREE_DISK_BYTES: u64 = 1024 * 1024 * 1024;

/// On-disk record of a finished provisioning, reused by later processes.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BuildJavaRecord {
    java_path: PathBuf,
    source_url: String,
    installed_at: DateTime<Utc>,
}

pub struct BuildJavaProvisioner {
    work_dir: PathBuf,
    mirrors: MirrorTable,
    resolver: Arc<MirrorResolver>,
    fetcher: Arc<dyn ArtifactFetcher>,
    platform: Option<Platform>,
    arch: Option<Arch>,
    min_free_bytes: u64,
    cached: Mutex<Option<PathBuf>>,
}

impl BuildJavaProvisioner {
    pub fn new(
        work_dir: impl Into<PathBuf>,
        mirrors: MirrorTable,
        resolver: Arc<MirrorResolver>,
        fetcher: Arc<dyn ArtifactFetcher>,
    ) -> Self {
        Self {
            work_dir: work_dir.into(),
            mirrors,
            resolver,
            fetcher,
            platform: Platform::current(),
            arch: Arch::current(),
            min_free_bytes: MIN_FREE_DISK_BYTES,
            cached: Mutex::new(None),
        }
    }

    /// Provision for another OS family than the host's.
    pub fn with_platform(mut self, platform: Option<Platform>) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_arch(mut self, arch: Option<Arch>) -> Self {
        self.arch = arch;
        self
    }

    pub fn with_min_free_bytes(mut self, bytes: u64) -> Self {
        self.min_free_bytes = bytes;
        self
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Path of a usable `java` binary, provisioning it on first use.
    ///
    /// Concurrent callers wait on the same lock, so at most one download
    /// is ever in flight.
    #[instrument(skip_all)]
    pub async fn ensure(
        &self,
        sinks: &ProgressSinks,
        cancel: &CancellationToken,
    ) -> LauncherResult<PathBuf> {
        let mut cached = self.cached.lock().await;

        if let Some(path) = cached.as_ref() {
            if path.is_file() {
                debug!("Build java cached at {:?}", path);
                return Ok(path.clone());
            }
            warn!("Cached build java {:?} disappeared, provisioning again", path);
            *cached = None;
        }

        if let Some(path) = self.read_record().await {
            info!("Reusing build java from {}", RECORD_FILE);
            *cached = Some(path.clone());
            return Ok(path);
        }

        let path = self.provision(sinks, cancel).await.map_err(|e| match e {
            LauncherError::NoMirrorAvailable { .. } | LauncherError::Cancelled => e,
            LauncherError::JavaProvisioning(_) => e,
            other => LauncherError::JavaProvisioning(other.to_string()),
        })?;
        *cached = Some(path.clone());
        Ok(path)
    }

    async fn read_record(&self) -> Option<PathBuf> {
        let raw = tokio::fs::read_to_string(self.work_dir.join(RECORD_FILE))
            .await
            .ok()?;
        let record: BuildJavaRecord = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(e) => {
                warn!("Ignoring unreadable {}: {}", RECORD_FILE, e);
                return None;
            }
        };
        record.java_path.is_file().then_some(record.java_path)
    }

    async fn provision(
        &self,
        sinks: &ProgressSinks,
        cancel: &CancellationToken,
    ) -> LauncherResult<PathBuf> {
        tokio::fs::create_dir_all(&self.work_dir)
            .await
            .map_err(|e| LauncherError::io(&self.work_dir, e))?;
        ensure_min_disk_space(&self.work_dir, self.min_free_bytes)?;

        let url = self
            .resolver
            .resolve_for(self.platform, self.arch, &self.mirrors)
            .await?;
        if cancel.is_cancelled() {
            return Err(LauncherError::Cancelled);
        }

        let started = Instant::now();
        let archive = self.work_dir.join(ARCHIVE_FILE);
        sinks.installer_log(format!("Downloading build java from {url}"));
        self.fetcher.fetch(&url, &archive, sinks, cancel).await?;
        sinks.file(FileProgress {
            kind: FileKind::Runtime,
            name: url.clone(),
            processed: 1,
            total: 1,
        });
        info!("Build java downloaded in {:?}", started.elapsed());

        let jdk_dir = self.work_dir.join(JDK_DIR);
        {
            let archive = archive.clone();
            let jdk_dir = jdk_dir.clone();
            let cancel = cancel.clone();
            tokio::task::spawn_blocking(move || extract_archive(&archive, &jdk_dir, &cancel))
                .await
                .map_err(|e| LauncherError::JavaProvisioning(format!("extraction task failed: {e}")))??;
        }

        let java = locate_java_binary(&jdk_dir, self.platform).ok_or_else(|| {
            LauncherError::JavaProvisioning(format!("no java binary under {}", jdk_dir.display()))
        })?;
        if self.platform != Some(Platform::Windows) {
            mark_executable(&java)?;
        }

        let record = BuildJavaRecord {
            java_path: java.clone(),
            source_url: url,
            installed_at: Utc::now(),
        };
        let record_path = self.work_dir.join(RECORD_FILE);
        tokio::fs::write(&record_path, serde_json::to_vec_pretty(&record)?)
            .await
            .map_err(|e| LauncherError::io(&record_path, e))?;
        let _ = tokio::fs::remove_file(&archive).await;

        sinks.installer_log(format!("Build java ready at {}", java.display()));
        info!("Build java provisioned at {:?}", java);
        Ok(java)
    }
}

fn ensure_min_disk_space(path: &Path, minimum_bytes: u64) -> LauncherResult<()> {
    if minimum_bytes == 0 {
        return Ok(());
    }
    let disks = sysinfo::Disks::new_with_refreshed_list();
    let canonical = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let available = disks
        .list()
        .iter()
        .filter(|disk| canonical.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len())
        .map(|disk| disk.available_space());

    match available {
        Some(bytes) if bytes < minimum_bytes => Err(LauncherError::JavaProvisioning(format!(
            "not enough disk space in {}: {} bytes free, {} required",
            path.display(),
            bytes,
            minimum_bytes
        ))),
        _ => Ok(()),
    }
}

fn java_exe(platform: Option<Platform>) -> &'static str {
    if platform == Some(Platform::Windows) {
        "java.exe"
    } else {
        "java"
    }
}

fn locate_java_binary(jdk_dir: &Path, platform: Option<Platform>) -> Option<PathBuf> {
    let exe = java_exe(platform);
    let candidates = [
        jdk_dir.join("bin").join(exe),
        jdk_dir.join("Contents").join("Home").join("bin").join(exe),
    ];
    candidates
        .into_iter()
        .find(|p| p.is_file())
        .or_else(|| find_java_binary_recursive(jdk_dir, exe))
}

fn find_java_binary_recursive(root: &Path, exe: &str) -> Option<PathBuf> {
    let entries = std::fs::read_dir(root).ok()?;
    for entry in entries.filter_map(Result::ok) {
        let path = entry.path();
        let file_type = entry.file_type().ok()?;
        if file_type.is_file() {
            if path.file_name().and_then(|n| n.to_str()) == Some(exe) {
                return Some(path);
            }
        } else if file_type.is_dir() {
            if let Some(found) = find_java_binary_recursive(&path, exe) {
                return Some(found);
            }
        }
    }
    None
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> LauncherResult<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .map_err(|e| LauncherError::io(path, e))
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> LauncherResult<()> {
    Ok(())
}
