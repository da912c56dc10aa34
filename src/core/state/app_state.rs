use std::path::PathBuf;
use std::sync::Arc;

use reqwest::Client;
use tracing::info;

use crate::core::downloader::Downloader;
use crate::core::error::LauncherResult;
use crate::core::http::build_http_client;
use crate::core::installer::{MojangInstaller, PlatformInstaller};
use crate::core::java::BuildJavaProvisioner;
use crate::core::loaders::CatalogSet;
use crate::core::mirror::{MirrorResolver, NetworkProbe};
use crate::core::platform::TargetSet;
use crate::core::profile::Profile;

use super::settings::DistributionSettings;

/// Process-wide collaborators shared by every profile.
pub struct AppState {
    pub settings: DistributionSettings,
    pub http_client: Client,
    pub downloader: Downloader,
    pub resolver: Arc<MirrorResolver>,
    pub provisioner: Arc<BuildJavaProvisioner>,
}

impl AppState {
    pub fn new(settings: DistributionSettings) -> LauncherResult<Self> {
        let http_client = build_http_client()?;
        let downloader =
            Downloader::new(http_client.clone()).with_concurrency(settings.download_concurrency);

        let probe = NetworkProbe::new(
            http_client.clone(),
            settings.probe_timeout(),
            settings.check_timeout(),
        );
        let resolver = Arc::new(MirrorResolver::with_ttl(
            Arc::new(probe),
            settings.mirror_ttl(),
        ));
        let provisioner = Arc::new(BuildJavaProvisioner::new(
            settings.build_java_dir(),
            settings.build_java_mirrors.clone(),
            resolver.clone(),
            Arc::new(downloader.clone()),
        ));

        info!("Distribution state ready at {:?}", settings.data_dir);
        Ok(Self {
            settings,
            http_client,
            downloader,
            resolver,
            provisioner,
        })
    }

    /// Settings from `<default data dir>/distribution_settings.json`.
    pub fn from_default_settings() -> LauncherResult<Self> {
        let path = DistributionSettings::default().settings_path();
        Self::new(DistributionSettings::load_or_default(&path)?)
    }

    pub fn profiles_dir(&self) -> PathBuf {
        self.settings.profiles_dir()
    }

    pub fn catalogs(&self) -> CatalogSet {
        CatalogSet::http(self.downloader.clone())
    }

    /// One Mojang installer per configured target, rooted at the profile.
    pub fn target_set(&self, profile: &Profile) -> LauncherResult<TargetSet> {
        TargetSet::build(&self.settings.targets, |os| {
            Ok(Arc::new(MojangInstaller::new(os, &profile.root, self.downloader.clone()))
                as Arc<dyn PlatformInstaller>)
        })
    }
}
