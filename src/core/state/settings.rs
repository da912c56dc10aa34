use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::mirror::{MirrorTable, DEFAULT_MEASUREMENT_TTL};
use crate::core::platform::{Arch, OsContext, Platform, TargetSet};
use crate::core::progress::DEFAULT_LOG_WINDOW;

const APP_DIR_NAME: &str = "packforge";
pub const SETTINGS_FILE: &str = "distribution_settings.json";

/// Runtime configuration, persisted as JSON. Missing keys take defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributionSettings {
    pub data_dir: PathBuf,
    pub log_window_ms: u64,
    pub probe_timeout_ms: u64,
    pub check_timeout_ms: u64,
    pub mirror_ttl_secs: u64,
    pub download_concurrency: usize,
    /// Candidate archives for the build JDK, per OS family.
    pub build_java_mirrors: MirrorTable,
    /// Targets every profile is installed for, in processing order.
    pub targets: Vec<OsContext>,
}

impl Default for DistributionSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_window_ms: DEFAULT_LOG_WINDOW.as_millis() as u64,
            probe_timeout_ms: 1500,
            check_timeout_ms: 5000,
            mirror_ttl_secs: DEFAULT_MEASUREMENT_TTL.as_secs(),
            download_concurrency: 8,
            build_java_mirrors: default_build_java_mirrors(),
            targets: TargetSet::cross_product(),
        }
    }
}

impl DistributionSettings {
    pub fn load_or_default(path: &Path) -> LauncherResult<Self> {
        if !path.exists() {
            debug!("No settings at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|e| LauncherError::io(path, e))?;
        let settings = serde_json::from_str(&raw)?;
        info!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> LauncherResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| LauncherError::io(path, e))
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join(SETTINGS_FILE)
    }

    pub fn profiles_dir(&self) -> PathBuf {
        self.data_dir.join("profiles")
    }

    pub fn build_java_dir(&self) -> PathBuf {
        self.data_dir.join("build-java")
    }

    pub fn log_window(&self) -> Duration {
        Duration::from_millis(self.log_window_ms.max(1))
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn check_timeout(&self) -> Duration {
        Duration::from_millis(self.check_timeout_ms)
    }

    pub fn mirror_ttl(&self) -> Duration {
        Duration::from_secs(self.mirror_ttl_secs)
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

// Temurin and Microsoft JDK 17; the Adoptium API redirects to the current GA archive.
fn default_build_java_mirrors() -> MirrorTable {
    MirrorTable::new()
        .with(
            Platform::Windows,
            &[
                "https://api.adoptium.net/v3/binary/latest/17/ga/windows/x64/jdk/hotspot/normal/eclipse",
                "https://aka.ms/download-jdk/microsoft-jdk-17-windows-x64.zip",
            ],
        )
        .with(
            Platform::Linux,
            &[
                "https://api.adoptium.net/v3/binary/latest/17/ga/linux/x64/jdk/hotspot/normal/eclipse",
                "https://aka.ms/download-jdk/microsoft-jdk-17-linux-x64.tar.gz",
            ],
        )
        .with(
            Platform::Osx,
            &[
                "https://api.adoptium.net/v3/binary/latest/17/ga/mac/x64/jdk/hotspot/normal/eclipse",
                "https://aka.ms/download-jdk/microsoft-jdk-17-macos-x64.tar.gz",
            ],
        )
        .with_arch(
            Platform::Windows,
            Arch::Arm64,
            &["https://aka.ms/download-jdk/microsoft-jdk-17-windows-aarch64.zip"],
        )
        .with_arch(
            Platform::Linux,
            Arch::Arm64,
            &[
                "https://api.adoptium.net/v3/binary/latest/17/ga/linux/aarch64/jdk/hotspot/normal/eclipse",
                "https://aka.ms/download-jdk/microsoft-jdk-17-linux-aarch64.tar.gz",
            ],
        )
        .with_arch(
            Platform::Osx,
            Arch::Arm64,
            &[
                "https://api.adoptium.net/v3/binary/latest/17/ga/mac/aarch64/jdk/hotspot/normal/eclipse",
                "https://aka.ms/download-jdk/microsoft-jdk-17-macos-aarch64.tar.gz",
            ],
        )
}
