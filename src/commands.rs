// ─── Public entry point ───
// One client per profile. Everything the orchestrator does is reachable
// from `download_game`. Every method takes `&self`, so a shared client can
// be cancelled or observed while a download runs.

use std::path::PathBuf;
use std::sync::{Arc, RwLock, RwLockReadGuard};

use tokio::sync::{broadcast, watch};
use tracing::info;

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::installer::LaunchPlan;
use crate::core::notify::{ChannelNotifier, Notification};
use crate::core::orchestrator::{DownloadOrchestrator, DownloadRequest};
use crate::core::platform::OsContext;
use crate::core::profile::Profile;
use crate::core::progress::{LogBatch, ProgressAggregator, StepProgress};
use crate::core::state::AppState;

pub struct DistributionClient {
    profile: RwLock<Profile>,
    orchestrator: DownloadOrchestrator,
    notifier: Arc<ChannelNotifier>,
    build_tool: Option<PathBuf>,
}

impl DistributionClient {
    /// Build the profile's target set and orchestrator.
    /// Must run inside a tokio runtime (the log window task is spawned here).
    pub fn new(state: &AppState, profile: Profile) -> LauncherResult<Self> {
        let targets = state.target_set(&profile)?;
        let notifier = Arc::new(ChannelNotifier::default());
        let orchestrator = DownloadOrchestrator::new(
            profile.name.clone(),
            targets,
            state.catalogs(),
            state.provisioner.clone(),
            ProgressAggregator::spawn(state.settings.log_window()),
            notifier.clone(),
        );
        Ok(Self::from_parts(profile, orchestrator, notifier))
    }

    /// Same as [`DistributionClient::new`] over the settings file in the
    /// default data directory.
    pub fn with_default_settings(profile: Profile) -> LauncherResult<Self> {
        let state = AppState::from_default_settings()?;
        Self::new(&state, profile)
    }

    pub fn from_parts(
        profile: Profile,
        orchestrator: DownloadOrchestrator,
        notifier: Arc<ChannelNotifier>,
    ) -> Self {
        Self {
            profile: RwLock::new(profile),
            orchestrator,
            notifier,
            build_tool: None,
        }
    }

    /// Use an existing java for loader installers instead of provisioning one.
    pub fn with_build_tool(mut self, java_path: impl Into<PathBuf>) -> Self {
        self.build_tool = Some(java_path.into());
        self
    }

    fn read_profile(&self) -> RwLockReadGuard<'_, Profile> {
        self.profile.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of the profile, including the last installed version.
    pub fn profile(&self) -> Profile {
        self.read_profile().clone()
    }

    pub fn installed_version(&self) -> Option<String> {
        self.read_profile().installed_version.clone()
    }

    /// Download `loader` for `game_version` on every target of the profile.
    pub async fn download_game(
        &self,
        loader: &str,
        game_version: &str,
        explicit_build: Option<&str>,
    ) -> LauncherResult<String> {
        let mut request = DownloadRequest::parse(loader, game_version, explicit_build)?;
        if let Some(java) = &self.build_tool {
            request = request.with_build_tool(java.clone());
        }

        let id = self.orchestrator.download(request).await?;
        let mut profile = self
            .profile
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        profile.installed_version = Some(id.clone());
        info!("Profile {} installed as {}", profile.name, id);
        Ok(id)
    }

    /// Download what the profile itself describes.
    pub async fn download_profile(&self) -> LauncherResult<String> {
        let (loader, game_version, build) = {
            let profile = self.read_profile();
            (
                profile.loader.to_string(),
                profile.game_version.clone(),
                profile.loader_version.clone(),
            )
        };
        self.download_game(&loader, &game_version, build.as_deref())
            .await
    }

    pub fn cancel(&self) {
        self.orchestrator.cancel();
    }

    pub fn is_loading(&self) -> bool {
        self.orchestrator.is_loading()
    }

    pub fn subscribe_bytes(&self) -> watch::Receiver<f64> {
        self.orchestrator.progress().subscribe_bytes()
    }

    pub fn subscribe_steps(&self) -> broadcast::Receiver<StepProgress> {
        self.orchestrator.progress().subscribe_steps()
    }

    pub fn subscribe_log(&self) -> broadcast::Receiver<LogBatch> {
        self.orchestrator.progress().subscribe_log()
    }

    pub fn subscribe_notifications(&self) -> broadcast::Receiver<Notification> {
        self.notifier.subscribe()
    }

    /// Launch arguments of the installed version on one target.
    pub async fn launch_plan(
        &self,
        os: OsContext,
        java: Option<PathBuf>,
    ) -> LauncherResult<LaunchPlan> {
        let (installed, name, loader) = {
            let profile = self.read_profile();
            (
                profile.installed_version.clone(),
                profile.name.clone(),
                profile.loader,
            )
        };
        let version_id = installed.ok_or(LauncherError::VersionNotFound(name))?;
        let target = self
            .orchestrator
            .targets()
            .iter()
            .find(|t| *t.os() == os)
            .ok_or_else(|| LauncherError::UnsupportedTarget {
                loader: loader.to_string(),
                target: format!("{}-{}", os.platform, os.arch),
            })?;
        target
            .installer()
            .launch_plan(&version_id, java.as_deref())
            .await
    }
}
