//! In-crate fakes for the trait seams. Test builds only.

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::core::downloader::ArtifactFetcher;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::installer::{LaunchPlan, PlatformInstaller, VersionDescriptor};
use crate::core::loaders::{BuildDescriptor, InstallOptions, LoaderCatalog};
use crate::core::mirror::MirrorProbe;
use crate::core::notify::{Notification, Notifier, Severity};
use crate::core::progress::ProgressSinks;

// ── Platform installer ──────────────────────────────────

#[derive(Default)]
pub struct FakeInstaller {
    registered: Mutex<HashSet<String>>,
    installed: Mutex<Vec<String>>,
    failure: Option<fn(&str) -> LauncherError>,
    install_delay: Option<Duration>,
    game_dir: PathBuf,
    pub get_version_calls: AtomicUsize,
    pub launch_plans: AtomicUsize,
    pub install_started: Notify,
}

impl FakeInstaller {
    /// Every `get_version` fails with `make(version_id)`.
    pub fn failing(make: fn(&str) -> LauncherError) -> Self {
        Self {
            failure: Some(make),
            ..Self::default()
        }
    }

    /// `install` takes `delay` unless cancelled first.
    pub fn slow(delay: Duration) -> Self {
        Self {
            install_delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn register(&self, id: &str) {
        self.registered.lock().unwrap().insert(id.to_string());
    }

    pub fn installed(&self) -> Vec<String> {
        self.installed.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlatformInstaller for FakeInstaller {
    fn game_dir(&self) -> &Path {
        &self.game_dir
    }

    async fn get_version(
        &self,
        version_id: &str,
        _cancel: &CancellationToken,
    ) -> LauncherResult<VersionDescriptor> {
        self.get_version_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(make) = self.failure {
            return Err(make(version_id));
        }
        Ok(VersionDescriptor {
            id: version_id.to_string(),
            inherits_from: None,
            main_class: "net.minecraft.client.main.Main".into(),
            java_major: 17,
            asset_index: None,
        })
    }

    async fn has_local_version(&self, version_id: &str) -> bool {
        self.registered.lock().unwrap().contains(version_id)
    }

    async fn install(
        &self,
        version_id: &str,
        _sinks: &ProgressSinks,
        cancel: &CancellationToken,
    ) -> LauncherResult<()> {
        self.install_started.notify_one();
        if let Some(delay) = self.install_delay {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => return Err(LauncherError::Cancelled),
            }
        }
        self.register(version_id);
        self.installed.lock().unwrap().push(version_id.to_string());
        Ok(())
    }

    async fn launch_plan(
        &self,
        version_id: &str,
        java: Option<&Path>,
    ) -> LauncherResult<LaunchPlan> {
        self.launch_plans.fetch_add(1, Ordering::SeqCst);
        Ok(LaunchPlan {
            version_id: version_id.to_string(),
            main_class: "net.minecraft.client.main.Main".into(),
            java_path: java.map(Path::to_path_buf),
            jvm_args: Vec::new(),
            game_args: Vec::new(),
            classpath: Vec::new(),
            java_major: 17,
        })
    }
}

// ── Loader catalog ──────────────────────────────────────

pub struct FakeCatalog {
    builds: Vec<BuildDescriptor>,
    pub get_builds_calls: AtomicUsize,
    pub install_calls: AtomicUsize,
}

impl FakeCatalog {
    pub fn with_builds(builds: Vec<BuildDescriptor>) -> Self {
        Self {
            builds,
            get_builds_calls: AtomicUsize::new(0),
            install_calls: AtomicUsize::new(0),
        }
    }

    /// B1 unflagged, B2 recommended, B3 latest.
    pub fn forge_like() -> Self {
        let flagged = |name: &str, recommended: bool, latest: bool| BuildDescriptor {
            recommended,
            latest,
            ..BuildDescriptor::new(name, "1.20.1")
        };
        Self::with_builds(vec![
            flagged("B1", false, false),
            flagged("B2", true, false),
            flagged("B3", false, true),
        ])
    }
}

#[async_trait]
impl LoaderCatalog for FakeCatalog {
    async fn get_builds(&self, game_version: &str) -> LauncherResult<Vec<BuildDescriptor>> {
        self.get_builds_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .builds
            .iter()
            .cloned()
            .map(|b| BuildDescriptor {
                game_version: game_version.to_string(),
                ..b
            })
            .collect())
    }

    async fn install(
        &self,
        build: &BuildDescriptor,
        options: &InstallOptions<'_>,
    ) -> LauncherResult<String> {
        self.install_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.version_id(options.game_version, &build.name))
    }

    fn version_id(&self, game_version: &str, build: &str) -> String {
        format!("{game_version}-fake-{build}")
    }
}

// ── Mirror probe ────────────────────────────────────────

#[derive(Default)]
pub struct FakeProbe {
    mirrors: HashMap<String, (Duration, bool)>,
    checks: Mutex<Vec<String>>,
    pub latency_calls: AtomicUsize,
}

impl FakeProbe {
    /// Answers probes after `rtt_ms`; existence check returns `exists`.
    /// Unlisted URLs are unreachable.
    pub fn reachable(mut self, url: &str, rtt_ms: u64, exists: bool) -> Self {
        self.mirrors
            .insert(url.to_string(), (Duration::from_millis(rtt_ms), exists));
        self
    }

    pub fn existence_checks(&self) -> Vec<String> {
        self.checks.lock().unwrap().clone()
    }
}

#[async_trait]
impl MirrorProbe for FakeProbe {
    async fn latency(&self, url: &str) -> LauncherResult<Duration> {
        self.latency_calls.fetch_add(1, Ordering::SeqCst);
        self.mirrors
            .get(url)
            .map(|(rtt, _)| *rtt)
            .ok_or_else(|| LauncherError::Other(format!("{url} unreachable")))
    }

    async fn exists(&self, url: &str) -> LauncherResult<bool> {
        self.checks.lock().unwrap().push(url.to_string());
        Ok(self.mirrors.get(url).map(|(_, exists)| *exists).unwrap_or(false))
    }
}

// ── Artifact fetcher ────────────────────────────────────

/// Serves a zipped JDK with a single `jdk-17/bin/java` entry.
#[derive(Default)]
pub struct FakeFetcher {
    garbage: AtomicBool,
    pub fetches: AtomicUsize,
}

impl FakeFetcher {
    pub fn serve_garbage(&self) {
        self.garbage.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ArtifactFetcher for FakeFetcher {
    async fn fetch(
        &self,
        _url: &str,
        dest: &Path,
        _sinks: &ProgressSinks,
        cancel: &CancellationToken,
    ) -> LauncherResult<()> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if cancel.is_cancelled() {
            return Err(LauncherError::Cancelled);
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if self.garbage.load(Ordering::SeqCst) {
            std::fs::write(dest, b"<html>mirror maintenance</html>")?;
            return Ok(());
        }

        let file = std::fs::File::create(dest)?;
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file("jdk-17/bin/java", options)?;
        zip.write_all(b"#!/bin/sh\nexit 0\n")?;
        zip.finish()?;
        Ok(())
    }
}

// ── Stalled HTTP host ───────────────────────────────────

/// Local server that answers every request with `Content-Length: declared`,
/// writes `sent` body bytes and then holds the socket open forever.
/// `None` accepts connections but never answers at all.
pub async fn stalled_http_server(body: Option<(usize, usize)>) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut request = [0_u8; 4096];
                let _ = socket.read(&mut request).await;
                if let Some((sent, declared)) = body {
                    let head = format!(
                        "HTTP/1.1 200 OK\r\nContent-Length: {declared}\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    );
                    let _ = socket.write_all(head.as_bytes()).await;
                    let _ = socket.write_all(&vec![0_u8; sent]).await;
                    let _ = socket.flush().await;
                }
                std::future::pending::<()>().await;
            });
        }
    });
    format!("http://{addr}/jdk-17.tar.gz")
}

/// HTTP client that never routes loopback traffic through a proxy.
pub fn direct_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Cancel `token` after `delay`.
pub fn cancel_after(token: &CancellationToken, delay: Duration) {
    let token = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        token.cancel();
    });
}

// ── Notifier ────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn with_severity(&self, severity: Severity) -> Vec<Notification> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.severity == severity)
            .cloned()
            .collect()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.with_severity(severity).len()
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, notification: Notification) {
        self.sent.lock().unwrap().push(notification);
    }
}
