// ─── Version File ───
// Parses a Mojang-format version JSON (vanilla or loader-registered) and
// evaluates its rules against a target's OS context.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::core::downloader::DownloadEntry;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::maven::{MavenArtifact, MOJANG_LIBRARIES};
use crate::core::platform::{LibraryRule, OsContext};
use crate::core::progress::FileKind;

/// A fully parsed version JSON.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionJson {
    pub id: String,
    pub main_class: String,
    #[serde(default)]
    pub inherits_from: Option<String>,
    #[serde(default)]
    pub libraries: Vec<LibraryEntry>,
    #[serde(default)]
    pub downloads: Option<VersionDownloads>,
    #[serde(default)]
    pub asset_index: Option<AssetIndexInfo>,
    #[serde(default)]
    pub arguments: Option<Arguments>,
    /// Legacy `minecraftArguments` field (pre-1.13).
    #[serde(default)]
    pub minecraft_arguments: Option<String>,
    #[serde(default)]
    pub java_version: Option<JavaVersionInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JavaVersionInfo {
    pub major_version: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VersionDownloads {
    pub client: Option<DownloadArtifact>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadArtifact {
    pub sha1: String,
    pub size: u64,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetIndexInfo {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub total_size: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Arguments {
    #[serde(default)]
    pub game: Vec<serde_json::Value>,
    #[serde(default)]
    pub jvm: Vec<serde_json::Value>,
}

// ─── Library Entry with Rules ───

#[derive(Debug, Clone, Deserialize)]
pub struct LibraryEntry {
    pub name: String,
    /// Maven repository base for loader libraries without a downloads block.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub downloads: Option<LibraryDownloads>,
    #[serde(default)]
    pub rules: Option<Vec<LibraryRule>>,
    #[serde(default)]
    pub natives: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibraryDownloads {
    pub artifact: Option<LibDownloadArtifact>,
    #[serde(default)]
    pub classifiers: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibDownloadArtifact {
    pub path: String,
    pub sha1: String,
    pub size: u64,
    pub url: String,
}

impl LibraryEntry {
    /// Main artifact of this library, if any, as a download entry under `libs_dir`.
    fn artifact_entry(&self, libs_dir: &Path) -> LauncherResult<Option<DownloadEntry>> {
        if let Some(downloads) = &self.downloads {
            return Ok(downloads.artifact.as_ref().map(|artifact| DownloadEntry {
                url: artifact.url.clone(),
                dest: libs_dir.join(&artifact.path),
                sha1: Some(artifact.sha1.clone()),
                size: Some(artifact.size),
            }));
        }

        // Loader profiles list bare coordinates plus a repository.
        let artifact = MavenArtifact::parse(&self.name)?;
        let repo = self.url.as_deref().unwrap_or(MOJANG_LIBRARIES);
        Ok(Some(DownloadEntry {
            url: artifact.url(repo),
            dest: libs_dir.join(artifact.local_path()),
            sha1: None,
            size: None,
        }))
    }

    fn native_entry(&self, os: &OsContext, libs_dir: &Path) -> Option<DownloadEntry> {
        let classifier = os.native_classifier(self.natives.as_ref())?;
        let native = self
            .downloads
            .as_ref()?
            .classifiers
            .as_ref()?
            .get(&classifier)?;

        let url = native.get("url")?.as_str()?;
        let path = native.get("path")?.as_str()?;
        Some(DownloadEntry {
            url: url.to_string(),
            dest: libs_dir.join(path),
            sha1: native.get("sha1").and_then(|v| v.as_str()).map(str::to_string),
            size: native.get("size").and_then(|v| v.as_u64()),
        })
    }
}

impl VersionJson {
    /// Parse a raw version JSON, reporting absent required keys distinctly.
    pub fn parse(raw: &str, context: &str) -> LauncherResult<Self> {
        let value: serde_json::Value = serde_json::from_str(raw)?;
        Self::from_value(value, context)
    }

    pub fn from_value(value: serde_json::Value, context: &str) -> LauncherResult<Self> {
        for key in ["id", "mainClass"] {
            if value.get(key).is_none() {
                return Err(LauncherError::MissingKey {
                    key: key.to_string(),
                    context: context.to_string(),
                });
            }
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Merge a child version JSON over its parent (`inheritsFrom`).
    ///
    /// Scalars in the child override the parent; libraries are concatenated
    /// child first, argument lists parent first.
    pub fn merge_with_parent_json(
        current_json: &serde_json::Value,
        parent_json: &serde_json::Value,
    ) -> serde_json::Value {
        let mut merged = parent_json.clone();

        let Some(obj) = current_json.as_object() else {
            return merged;
        };

        for (k, v) in obj {
            match k.as_str() {
                "libraries" => {
                    let mut libs = v.as_array().cloned().unwrap_or_default();
                    if let Some(parent_libs) = parent_json.get("libraries").and_then(|l| l.as_array()) {
                        libs.extend(parent_libs.iter().cloned());
                    }
                    merged[k] = serde_json::Value::Array(libs);
                }
                "arguments" => {
                    let mut args = parent_json
                        .get("arguments")
                        .cloned()
                        .unwrap_or_else(|| serde_json::json!({}));
                    for side in ["game", "jvm"] {
                        let mut combined = args
                            .get(side)
                            .and_then(|a| a.as_array())
                            .cloned()
                            .unwrap_or_default();
                        if let Some(extra) = v.get(side).and_then(|a| a.as_array()) {
                            combined.extend(extra.iter().cloned());
                        }
                        args[side] = serde_json::Value::Array(combined);
                    }
                    merged[k] = args;
                }
                // The parent's own link (if any) is the next one to follow.
                "inheritsFrom" => {}
                _ => merged[k] = v.clone(),
            }
        }
        merged
    }

    /// Client jar download, placed at `versions/<id>/<id>.jar`.
    pub fn client_entry(&self, version_dir: &Path) -> Option<DownloadEntry> {
        let client = self.downloads.as_ref()?.client.as_ref()?;
        Some(DownloadEntry {
            url: client.url.clone(),
            dest: version_dir.join(format!("{}.jar", self.id)),
            sha1: Some(client.sha1.clone()),
            size: Some(client.size),
        })
    }

    /// Libraries and natives allowed for `os`, as download entries.
    pub fn library_entries(
        &self,
        os: &OsContext,
        libs_dir: &Path,
    ) -> LauncherResult<Vec<(DownloadEntry, FileKind)>> {
        let mut entries = Vec::new();

        for lib in &self.libraries {
            if !os.allows(lib.rules.as_deref()) {
                continue;
            }
            if let Some(entry) = lib.artifact_entry(libs_dir)? {
                entries.push((entry, FileKind::Library));
            }
            if let Some(native) = lib.native_entry(os, libs_dir) {
                entries.push((native, FileKind::Native));
            }
        }

        // Duplicate coordinates appear when loader and parent share a library.
        entries.sort_by(|a, b| a.0.dest.cmp(&b.0.dest));
        entries.dedup_by(|a, b| a.0.dest == b.0.dest);
        Ok(entries)
    }

    /// Classpath for `os`: allowed library artifacts, then the client jar.
    pub fn classpath(
        &self,
        os: &OsContext,
        libs_dir: &Path,
        version_dir: &Path,
    ) -> LauncherResult<Vec<PathBuf>> {
        let mut classpath = Vec::new();
        for lib in &self.libraries {
            if !os.allows(lib.rules.as_deref()) {
                continue;
            }
            if let Some(entry) = lib.artifact_entry(libs_dir)? {
                if !classpath.contains(&entry.dest) {
                    classpath.push(entry.dest);
                }
            }
        }
        classpath.push(version_dir.join(format!("{}.jar", self.id)));
        Ok(classpath)
    }

    /// Get the required Java major version from the version JSON.
    pub fn required_java_major(&self) -> u32 {
        self.java_version
            .as_ref()
            .map(|j| j.major_version)
            .unwrap_or(8)
    }

    /// Game arguments allowed for `os`.
    pub fn game_args(&self, os: &OsContext) -> Vec<String> {
        match &self.arguments {
            Some(args) if !args.game.is_empty() => args
                .game
                .iter()
                .flat_map(|value| extract_argument_values(value, os))
                .collect(),
            _ => match &self.minecraft_arguments {
                Some(s) => s.split_whitespace().map(|s| s.to_string()).collect(),
                None => vec![],
            },
        }
    }

    /// JVM arguments allowed for `os`.
    pub fn jvm_args(&self, os: &OsContext) -> Vec<String> {
        match &self.arguments {
            Some(args) => args
                .jvm
                .iter()
                .flat_map(|value| extract_argument_values(value, os))
                .collect(),
            None => vec![],
        }
    }
}

fn extract_argument_values(value: &serde_json::Value, os: &OsContext) -> Vec<String> {
    if let Some(arg) = value.as_str() {
        return vec![arg.to_string()];
    }

    let Some(obj) = value.as_object() else {
        return vec![];
    };

    if let Some(rules) = obj.get("rules").and_then(|r| r.as_array()) {
        if !os.allows_json(rules) {
            return vec![];
        }
    }

    match obj.get("value") {
        Some(serde_json::Value::String(s)) => vec![s.clone()],
        Some(serde_json::Value::Array(arr)) => arr
            .iter()
            .filter_map(|v| v.as_str().map(ToString::to_string))
            .collect(),
        _ => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::platform::{Arch, Platform};

    fn sample() -> VersionJson {
        VersionJson::from_value(
            serde_json::json!({
                "id": "1.12.2",
                "mainClass": "net.minecraft.client.main.Main",
                "downloads": {"client": {"sha1": "aa", "size": 10, "url": "https://x/client.jar"}},
                "libraries": [
                    {
                        "name": "org.lwjgl.lwjgl:lwjgl-platform:2.9.4",
                        "natives": {"linux": "natives-linux", "windows": "natives-windows-${arch}"},
                        "downloads": {
                            "artifact": {"path": "org/lwjgl/lwjgl-platform.jar", "sha1": "bb", "size": 5, "url": "https://x/p.jar"},
                            "classifiers": {
                                "natives-linux": {"path": "org/lwjgl/natives-linux.jar", "sha1": "cc", "size": 7, "url": "https://x/nl.jar"},
                                "natives-windows-32": {"path": "org/lwjgl/natives-windows-32.jar", "sha1": "dd", "size": 7, "url": "https://x/nw32.jar"}
                            }
                        }
                    },
                    {
                        "name": "ca.weblite:java-objc-bridge:1.0.0",
                        "rules": [{"action": "allow", "os": {"name": "osx"}}],
                        "downloads": {"artifact": {"path": "ca/weblite/bridge.jar", "sha1": "ee", "size": 3, "url": "https://x/b.jar"}}
                    },
                    {
                        "name": "net.fabricmc:intermediary:1.12.2",
                        "url": "https://maven.fabricmc.net/"
                    }
                ],
                "arguments": {
                    "game": [
                        "--username", "${auth_player_name}",
                        {"rules": [{"action": "allow", "os": {"name": "osx"}}], "value": ["-XstartOnFirstThread"]}
                    ]
                }
            }),
            "test",
        )
        .unwrap()
    }

    #[test]
    fn missing_main_class_is_reported_as_missing_key() {
        let err = VersionJson::parse(r#"{"id": "broken"}"#, "broken.json").unwrap_err();
        match err {
            LauncherError::MissingKey { key, context } => {
                assert_eq!(key, "mainClass");
                assert_eq!(context, "broken.json");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn library_entries_follow_target_rules() {
        let version = sample();
        let libs = Path::new("/libs");

        let linux = OsContext::new(Platform::Linux, Arch::X64);
        let entries = version.library_entries(&linux, libs).unwrap();
        let names: Vec<_> = entries
            .iter()
            .map(|(e, _)| e.dest.to_string_lossy().to_string())
            .collect();
        assert!(names.iter().any(|n| n.ends_with("natives-linux.jar")));
        assert!(!names.iter().any(|n| n.ends_with("bridge.jar")));
        assert!(names
            .iter()
            .any(|n| n.ends_with("intermediary-1.12.2.jar")));

        let osx = OsContext::new(Platform::Osx, Arch::Arm64);
        let entries = version.library_entries(&osx, libs).unwrap();
        assert!(entries
            .iter()
            .any(|(e, _)| e.dest.ends_with("ca/weblite/bridge.jar")));
        assert!(!entries.iter().any(|(_, kind)| *kind == FileKind::Native));

        let win32 = OsContext::new(Platform::Windows, Arch::X86);
        let entries = version.library_entries(&win32, libs).unwrap();
        assert!(entries
            .iter()
            .any(|(e, kind)| *kind == FileKind::Native && e.url.ends_with("nw32.jar")));
    }

    #[test]
    fn loader_library_resolves_against_its_repository() {
        let version = sample();
        let linux = OsContext::new(Platform::Linux, Arch::X64);
        let entries = version.library_entries(&linux, Path::new("/libs")).unwrap();
        let intermediary = entries
            .iter()
            .find(|(e, _)| e.url.contains("intermediary"))
            .unwrap();
        assert_eq!(
            intermediary.0.url,
            "https://maven.fabricmc.net/net/fabricmc/intermediary/1.12.2/intermediary-1.12.2.jar"
        );
    }

    #[test]
    fn argument_rules_apply_to_target() {
        let version = sample();
        let osx = OsContext::new(Platform::Osx, Arch::X64);
        let linux = OsContext::new(Platform::Linux, Arch::X64);

        assert!(version
            .game_args(&osx)
            .contains(&"-XstartOnFirstThread".to_string()));
        assert!(!version
            .game_args(&linux)
            .contains(&"-XstartOnFirstThread".to_string()));
        assert!(version.game_args(&linux).contains(&"--username".to_string()));
    }

    #[test]
    fn classpath_ends_with_client_jar() {
        let version = sample();
        let linux = OsContext::new(Platform::Linux, Arch::X64);
        let classpath = version
            .classpath(&linux, Path::new("/libs"), Path::new("/versions/1.12.2"))
            .unwrap();
        assert_eq!(
            classpath.last().unwrap(),
            &PathBuf::from("/versions/1.12.2/1.12.2.jar")
        );
    }

    #[test]
    fn merge_with_parent_concatenates_libraries() {
        let parent = serde_json::json!({
            "id": "1.20.1",
            "mainClass": "parent.Main",
            "libraries": [{"name": "a:b:1.0"}],
            "arguments": { "game": ["--parent"] }
        });
        let current = serde_json::json!({
            "id": "fabric-loader-0.15.0-1.20.1",
            "inheritsFrom": "1.20.1",
            "mainClass": "child.Main",
            "libraries": [{"name": "c:d:2.0"}],
            "arguments": { "game": ["--child"] }
        });

        let merged = VersionJson::merge_with_parent_json(&current, &parent);

        assert_eq!(merged["id"], "fabric-loader-0.15.0-1.20.1");
        assert_eq!(merged["mainClass"], "child.Main");
        assert_eq!(merged["libraries"][0]["name"], "c:d:2.0");
        assert_eq!(merged["libraries"][1]["name"], "a:b:1.0");
        assert_eq!(merged["arguments"]["game"][0], "--parent");
        assert_eq!(merged["arguments"]["game"][1], "--child");
        assert!(merged.get("inheritsFrom").is_none());
    }
}
