// ─── Platform Installer ───
// Per-target installation capability. One instance is bound to each Target
// and evaluates every rule against that target's OS context.

mod mojang;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::core::error::LauncherResult;
use crate::core::progress::ProgressSinks;

pub use mojang::MojangInstaller;

/// Summary of a resolved version JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionDescriptor {
    pub id: String,
    pub inherits_from: Option<String>,
    pub main_class: String,
    pub java_major: u32,
    pub asset_index: Option<String>,
}

/// Everything a caller needs to spawn the game for one target.
#[derive(Debug, Clone, Serialize)]
pub struct LaunchPlan {
    pub version_id: String,
    pub main_class: String,
    pub java_path: Option<PathBuf>,
    pub jvm_args: Vec<String>,
    pub game_args: Vec<String>,
    pub classpath: Vec<PathBuf>,
    pub java_major: u32,
}

#[async_trait]
pub trait PlatformInstaller: Send + Sync {
    /// Root directory of this target's game files.
    fn game_dir(&self) -> &Path;

    /// Resolve a version descriptor, from disk or the remote manifest.
    async fn get_version(
        &self,
        version_id: &str,
        cancel: &CancellationToken,
    ) -> LauncherResult<VersionDescriptor>;

    /// Whether `versions/<id>/<id>.json` is already registered locally.
    async fn has_local_version(&self, version_id: &str) -> bool;

    /// Download every file `version_id` needs on this target.
    async fn install(
        &self,
        version_id: &str,
        sinks: &ProgressSinks,
        cancel: &CancellationToken,
    ) -> LauncherResult<()>;

    /// Launch arguments and classpath of an installed version.
    async fn launch_plan(&self, version_id: &str, java: Option<&Path>)
        -> LauncherResult<LaunchPlan>;
}
