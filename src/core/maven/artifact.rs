use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::error::{LauncherError, LauncherResult};

/// A Maven coordinate as found in version JSON `name` fields.
///
/// Accepted shapes: `group:artifact:version`, an optional `:classifier`
/// and an optional `@extension` suffix.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MavenArtifact {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub classifier: Option<String>,
    pub extension: String,
}

impl MavenArtifact {
    pub fn parse(coord: &str) -> LauncherResult<Self> {
        let invalid = || LauncherError::InvalidMavenCoordinate(coord.to_string());

        let (body, extension) = match coord.rsplit_once('@') {
            Some((body, ext)) if !ext.is_empty() => (body, ext),
            Some(_) => return Err(invalid()),
            None => (coord, "jar"),
        };

        let mut parts = body.split(':');
        let group_id = parts.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
        let artifact_id = parts.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
        let version = parts.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
        let classifier = parts.next().map(str::to_string);
        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Self {
            group_id: group_id.to_string(),
            artifact_id: artifact_id.to_string(),
            version: version.to_string(),
            classifier,
            extension: extension.to_string(),
        })
    }

    /// Same coordinate with a different classifier, e.g. `installer`.
    pub fn with_classifier(&self, classifier: &str) -> Self {
        Self {
            classifier: Some(classifier.to_string()),
            ..self.clone()
        }
    }

    pub fn filename(&self) -> String {
        match &self.classifier {
            Some(c) => format!("{}-{}-{}.{}", self.artifact_id, self.version, c, self.extension),
            None => format!("{}-{}.{}", self.artifact_id, self.version, self.extension),
        }
    }

    fn segments(&self) -> Vec<String> {
        let mut segments: Vec<String> = self.group_id.split('.').map(str::to_string).collect();
        segments.push(self.artifact_id.clone());
        segments.push(self.version.clone());
        segments.push(self.filename());
        segments
    }

    /// `<repo>/<group path>/<artifact>/<version>/<file>`
    pub fn url(&self, repo_base: &str) -> String {
        format!(
            "{}/{}",
            repo_base.trim_end_matches('/'),
            self.segments().join("/")
        )
    }

    /// Path relative to a `libraries/` directory.
    pub fn local_path(&self) -> PathBuf {
        self.segments().iter().collect()
    }
}

impl fmt::Display for MavenArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.version)?;
        if let Some(c) = &self.classifier {
            write!(f, ":{c}")?;
        }
        if self.extension != "jar" {
            write!(f, "@{}", self.extension)?;
        }
        Ok(())
    }
}
