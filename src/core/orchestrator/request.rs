use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::error::LauncherResult;
use crate::core::loaders::LoaderKind;

/// Caller-supplied build tool; replaces build java provisioning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildTool {
    pub java_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub loader: LoaderKind,
    pub game_version: String,
    pub explicit_build: Option<String>,
    pub build_tool: Option<BuildTool>,
}

impl DownloadRequest {
    pub fn new(loader: LoaderKind, game_version: impl Into<String>) -> Self {
        Self {
            loader,
            game_version: game_version.into(),
            explicit_build: None,
            build_tool: None,
        }
    }

    /// Parse the loader name first; an unknown one never reaches a target.
    pub fn parse(
        loader: &str,
        game_version: impl Into<String>,
        explicit_build: Option<&str>,
    ) -> LauncherResult<Self> {
        let mut request = Self::new(loader.parse()?, game_version);
        request.explicit_build = explicit_build
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(str::to_string);
        Ok(request)
    }

    pub fn with_explicit_build(mut self, build: impl Into<String>) -> Self {
        self.explicit_build = Some(build.into());
        self
    }

    pub fn with_build_tool(mut self, java_path: impl Into<PathBuf>) -> Self {
        self.build_tool = Some(BuildTool {
            java_path: java_path.into(),
        });
        self
    }
}

/// Step counters of one download: every target plus the java step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressStep {
    pub current: u32,
    pub total: u32,
}

impl ProgressStep {
    pub fn new(targets: usize) -> Self {
        Self {
            current: 0,
            total: targets as u32 + 1,
        }
    }

    pub fn advance(&mut self) {
        self.current = (self.current + 1).min(self.total);
    }

    pub fn is_complete(&self) -> bool {
        self.current == self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::LauncherError;

    #[test]
    fn parse_rejects_unknown_loader() {
        let err = DownloadRequest::parse("rift", "1.13.2", None).unwrap_err();
        assert!(matches!(err, LauncherError::UnknownLoader(_)));
        assert!(err.is_configuration());
    }

    #[test]
    fn blank_explicit_build_is_ignored() {
        let request = DownloadRequest::parse("Forge", "1.20.1", Some("  ")).unwrap();
        assert_eq!(request.loader, LoaderKind::Forge);
        assert_eq!(request.explicit_build, None);

        let request = DownloadRequest::parse("fabric", "1.20.1", Some("0.15.0")).unwrap();
        assert_eq!(request.explicit_build.as_deref(), Some("0.15.0"));
    }

    #[test]
    fn step_never_passes_total() {
        let mut step = ProgressStep::new(2);
        assert_eq!(step.total, 3);
        for _ in 0..5 {
            step.advance();
        }
        assert_eq!(step.current, 3);
        assert!(step.is_complete());
    }
}
