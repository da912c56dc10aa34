use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::loaders::LoaderKind;
use crate::core::orchestrator::DownloadRequest;
use crate::core::platform::OsContext;

/// A named game version + loader pairing, installed once per target.
///
/// Each profile owns `profiles/<uuid>/` with one game directory per
/// target underneath (`linux-x64/`, `windows-arm64/`...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub game_version: String,
    pub loader: LoaderKind,
    pub loader_version: Option<String>,
    pub root: PathBuf,
    pub created_at: DateTime<Utc>,
    /// Version id returned by the last successful download.
    pub installed_version: Option<String>,
}

impl Profile {
    pub fn new(
        name: impl Into<String>,
        game_version: impl Into<String>,
        loader: LoaderKind,
        loader_version: Option<String>,
        profiles_dir: &Path,
    ) -> Self {
        let id = Uuid::new_v4().to_string();
        Self {
            root: profiles_dir.join(&id),
            id,
            name: name.into(),
            game_version: game_version.into(),
            loader,
            loader_version,
            created_at: Utc::now(),
            installed_version: None,
        }
    }

    /// Game directory of one target.
    pub fn target_dir(&self, os: &OsContext) -> PathBuf {
        self.root.join(format!("{}-{}", os.platform, os.arch))
    }

    /// The download this profile describes.
    pub fn request(&self) -> DownloadRequest {
        let request = DownloadRequest::new(self.loader, self.game_version.clone());
        match &self.loader_version {
            Some(build) => request.with_explicit_build(build.clone()),
            None => request,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::platform::{Arch, Platform};

    #[test]
    fn profile_lives_under_its_uuid() {
        let profile = Profile::new(
            "Skyblock",
            "1.20.1",
            LoaderKind::Fabric,
            Some("0.15.11".into()),
            Path::new("/data/profiles"),
        );
        assert!(Uuid::parse_str(&profile.id).is_ok());
        assert_eq!(profile.root, Path::new("/data/profiles").join(&profile.id));
        assert_eq!(
            profile.target_dir(&OsContext::new(Platform::Windows, Arch::Arm64)),
            profile.root.join("windows-arm64")
        );
    }

    #[test]
    fn request_carries_loader_version_as_explicit_build() {
        let profile = Profile::new("p", "1.20.1", LoaderKind::Forge, Some("47.2.0".into()), Path::new("/p"));
        let request = profile.request();
        assert_eq!(request.loader, LoaderKind::Forge);
        assert_eq!(request.game_version, "1.20.1");
        assert_eq!(request.explicit_build.as_deref(), Some("47.2.0"));
        assert!(request.build_tool.is_none());
    }
}
