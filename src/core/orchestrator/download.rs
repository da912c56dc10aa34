// ─── Download Orchestrator ───
// Runs one loader strategy over every target of a profile, in order,
// absorbing per-target failures and publishing step progress.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::core::error::{FailureClass, LauncherError, LauncherResult};
use crate::core::java::BuildJavaProvisioner;
use crate::core::loaders::{CatalogSet, LoaderKind, LoaderStrategy, RequestCache, StrategyContext};
use crate::core::notify::{Notification, Notifier, Severity};
use crate::core::platform::{Target, TargetSet};
use crate::core::progress::{ProgressAggregator, ProgressSinks};

use super::guard::{LoadPhase, LoadState};
use super::request::{DownloadRequest, ProgressStep};

pub struct DownloadOrchestrator {
    profile_name: String,
    targets: TargetSet,
    catalogs: CatalogSet,
    provisioner: Arc<BuildJavaProvisioner>,
    progress: Arc<ProgressAggregator>,
    notifier: Arc<dyn Notifier>,
    state: LoadState,
    cancel: Mutex<CancellationToken>,
}

impl DownloadOrchestrator {
    pub fn new(
        profile_name: impl Into<String>,
        targets: TargetSet,
        catalogs: CatalogSet,
        provisioner: Arc<BuildJavaProvisioner>,
        progress: Arc<ProgressAggregator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            profile_name: profile_name.into(),
            targets,
            catalogs,
            provisioner,
            progress,
            notifier,
            state: LoadState::default(),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn profile_name(&self) -> &str {
        &self.profile_name
    }

    pub fn targets(&self) -> &TargetSet {
        &self.targets
    }

    pub fn progress(&self) -> &Arc<ProgressAggregator> {
        &self.progress
    }

    pub fn is_loading(&self) -> bool {
        self.state.phase() == LoadPhase::Loading
    }

    /// Cancel the download in flight, if any.
    pub fn cancel(&self) {
        self.token().cancel();
    }

    fn token(&self) -> MutexGuard<'_, CancellationToken> {
        self.cancel.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }


    /// Install `request` on every target and return the last version id
    /// any target produced.
    #[instrument(skip(self, request), fields(profile = %self.profile_name, loader = %request.loader))]
    pub async fn download(&self, request: DownloadRequest) -> LauncherResult<String> {
        let _loading = self.state.enter(&self.profile_name)?;
        // A cancel issued before this call got going still applies to it.
        let cancel = self.token().clone();
        let _rearm = TokenRearm(&self.cancel);
        if cancel.is_cancelled() {
            warn!("Download of {} cancelled before it started", self.profile_name);
            return Err(LauncherError::Cancelled);
        }
        let sinks = self.progress.sinks();

        let mut step = ProgressStep::new(self.targets.len());
        self.progress.publish_step(step.current, step.total);
        info!(
            "Downloading {} {} for {} targets",
            request.loader,
            request.game_version,
            self.targets.len()
        );

        let java = self.build_java(&request, &sinks, &cancel).await?;
        step.advance();
        self.progress.publish_step(step.current, step.total);

        let strategy = LoaderStrategy::for_kind(request.loader, &self.catalogs);
        let cache = RequestCache::default();
        let mut last_id: Option<String> = None;

        for target in &self.targets {
            if cancel.is_cancelled() {
                warn!("Download cancelled before {}", target.name());
                return Err(LauncherError::Cancelled);
            }

            let target_sinks = sinks.for_target(&target.name());
            info!("Starting target {}", target.name());
            target_sinks.installer_log(format!("Starting target {}", target.name()));

            let ctx = StrategyContext {
                game_version: &request.game_version,
                explicit_build: request.explicit_build.as_deref(),
                java: Some(java.as_path()),
                sinks: &target_sinks,
                cancel: &cancel,
                cache: &cache,
            };
            let outcome = strategy.run(target, &ctx).await;
            let settled = self.settle(request.loader, target, &target_sinks, outcome);

            step.advance();
            self.progress.publish_step(step.current, step.total);

            if let Some(id) = settled? {
                last_id = Some(id);
            }
        }

        match last_id {
            Some(id) => {
                info!("Download of {} finished: {}", self.profile_name, id);
                Ok(id)
            }
            None => {
                self.notify(
                    "Download produced nothing",
                    format!(
                        "Profile {}: no target produced an installable {} {}",
                        self.profile_name, request.loader, request.game_version
                    ),
                    Severity::Error,
                );
                Err(LauncherError::NoTargetSucceeded(self.profile_name.clone()))
            }
        }
    }

    /// Step 0: a caller-supplied build tool, else the provisioned build java.
    async fn build_java(
        &self,
        request: &DownloadRequest,
        sinks: &ProgressSinks,
        cancel: &CancellationToken,
    ) -> LauncherResult<PathBuf> {
        if let Some(tool) = &request.build_tool {
            info!("Using supplied build java {:?}", tool.java_path);
            return Ok(tool.java_path.clone());
        }
        self.provisioner.ensure(sinks, cancel).await.map_err(|e| {
            if e.failure_class() != FailureClass::Cancelled {
                error!("Build java unavailable for {}: {}", self.profile_name, e);
                self.notify(
                    "Build java unavailable",
                    format!("Profile {}: {}", self.profile_name, e),
                    Severity::Error,
                );
            }
            e
        })
    }

    /// The one skip/continue policy shared by every loader.
    ///
    /// `Ok(None)` means the target was absorbed; `Err` stops the run.
    fn settle(
        &self,
        loader: LoaderKind,
        target: &Target,
        sinks: &ProgressSinks,
        outcome: LauncherResult<String>,
    ) -> LauncherResult<Option<String>> {
        let err = match outcome {
            Ok(id) if id.is_empty() => {
                warn!("{} produced no version id on {}", loader, target.name());
                return Ok(None);
            }
            Ok(id) => {
                sinks.installer_log(format!("Target finished: {id}"));
                return Ok(Some(id));
            }
            Err(err) => err,
        };

        let details = format!(
            "Profile {}: {} on {} ({}): {}",
            self.profile_name,
            loader,
            target.platform(),
            target.arch(),
            err
        );
        match err.failure_class() {
            FailureClass::Skippable => {
                warn!("Skipping {}: {}", target.name(), err);
                sinks.installer_log(format!("Skipped: {err}"));
                self.notify("Target skipped", details, Severity::Warning);
                Ok(None)
            }
            FailureClass::Unexpected => {
                error!("Target {} failed: {}", target.name(), err);
                sinks.installer_log(format!("Failed: {err}"));
                self.notify("Target failed", details, Severity::Error);
                Ok(None)
            }
            FailureClass::Fatal => {
                error!("Aborting {}: {}", self.profile_name, err);
                sinks.installer_log(format!("Aborted: {err}"));
                self.notify("Download aborted", details, Severity::Error);
                Err(err)
            }
            FailureClass::Cancelled => {
                sinks.installer_log("Cancelled");
                Err(err)
            }
        }
    }

    fn notify(&self, title: &str, details: String, severity: Severity) {
        self.notifier.send(Notification::new(title, details, severity));
    }
}

/// Arms a fresh token once a call ends, before the load flag is released.
struct TokenRearm<'a>(&'a Mutex<CancellationToken>);

impl Drop for TokenRearm<'_> {
    fn drop(&mut self) {
        let mut token = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *token = CancellationToken::new();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use super::*;
    use crate::core::installer::PlatformInstaller;
    use crate::core::mirror::{MirrorResolver, MirrorTable};
    use crate::core::platform::{Arch, OsContext, Platform};
    use crate::core::progress::{StepProgress, DEFAULT_LOG_WINDOW};
    use crate::core::test_support::{
        FakeCatalog, FakeFetcher, FakeInstaller, FakeProbe, RecordingNotifier,
    };

    const MIRROR: &str = "https://jdk.example/jdk";

    struct Harness {
        _dir: tempfile::TempDir,
        orchestrator: Arc<DownloadOrchestrator>,
        fakes: Vec<Arc<FakeInstaller>>,
        catalog: Arc<FakeCatalog>,
        fetcher: Arc<FakeFetcher>,
        notifier: Arc<RecordingNotifier>,
    }

    fn harness<F>(contexts: &[OsContext], probe: FakeProbe, make: F) -> Harness
    where
        F: FnMut(OsContext) -> FakeInstaller,
    {
        harness_with_catalog(contexts, probe, FakeCatalog::forge_like(), make)
    }

    fn harness_with_catalog<F>(
        contexts: &[OsContext],
        probe: FakeProbe,
        catalog: FakeCatalog,
        mut make: F,
    ) -> Harness
    where
        F: FnMut(OsContext) -> FakeInstaller,
    {
        let dir = tempfile::tempdir().unwrap();
        let mut fakes = Vec::new();
        let targets = TargetSet::build(contexts, |os| {
            let fake = Arc::new(make(os));
            fakes.push(fake.clone());
            Ok(fake as Arc<dyn PlatformInstaller>)
        })
        .unwrap();

        let fetcher = Arc::new(FakeFetcher::default());
        let provisioner = BuildJavaProvisioner::new(
            dir.path().join("build-java"),
            MirrorTable::new().with(Platform::Linux, &[MIRROR]),
            Arc::new(MirrorResolver::new(Arc::new(probe))),
            fetcher.clone(),
        )
        .with_platform(Some(Platform::Linux))
        .with_min_free_bytes(0);

        let catalog = Arc::new(catalog);
        let notifier = Arc::new(RecordingNotifier::default());
        let orchestrator = DownloadOrchestrator::new(
            "demo",
            targets,
            CatalogSet::uniform(catalog.clone()),
            Arc::new(provisioner),
            ProgressAggregator::spawn(DEFAULT_LOG_WINDOW),
            notifier.clone(),
        );
        Harness {
            _dir: dir,
            orchestrator: Arc::new(orchestrator),
            fakes,
            catalog,
            fetcher,
            notifier,
        }
    }

    fn reachable() -> FakeProbe {
        FakeProbe::default().reachable(MIRROR, 25, true)
    }

    fn drain(rx: &mut tokio::sync::broadcast::Receiver<StepProgress>) -> Vec<StepProgress> {
        let mut steps = Vec::new();
        while let Ok(step) = rx.try_recv() {
            steps.push(step);
        }
        steps
    }

    #[tokio::test]
    async fn steps_reach_total_despite_failures() {
        let h = harness(&TargetSet::cross_product(), reachable(), |os| {
            match (os.platform, os.arch) {
                (Platform::Windows, Arch::X86) => {
                    FakeInstaller::failing(|id| LauncherError::VersionNotFound(id.to_string()))
                }
                (Platform::Osx, Arch::X64) => FakeInstaller::failing(|id| {
                    LauncherError::DownloadFailed {
                        url: format!("https://example.com/{id}.jar"),
                        status: 500,
                    }
                }),
                _ => FakeInstaller::default(),
            }
        });
        let mut steps = h.orchestrator.progress().subscribe_steps();

        let id = h
            .orchestrator
            .download(DownloadRequest::new(LoaderKind::Vanilla, "1.20.1"))
            .await
            .unwrap();

        assert_eq!(id, "1.20.1");
        let steps = drain(&mut steps);
        let currents: Vec<u32> = steps.iter().map(|s| s.current).collect();
        assert_eq!(currents, (0..=10).collect::<Vec<_>>());
        assert!(steps.iter().all(|s| s.total == 10));
        assert_eq!(steps.last().unwrap().percent, 100.0);

        assert_eq!(h.notifier.count(Severity::Warning), 1);
        assert_eq!(h.notifier.count(Severity::Error), 1);
        assert!(!h.orchestrator.is_loading());
    }

    #[tokio::test]
    async fn skippable_target_does_not_stop_the_run() {
        let h = harness(&TargetSet::cross_product(), reachable(), |os| {
            if os == OsContext::new(Platform::Linux, Arch::X86) {
                FakeInstaller::failing(|id| LauncherError::MissingKey {
                    key: "downloads".into(),
                    context: format!("{id}.json"),
                })
            } else {
                FakeInstaller::default()
            }
        });

        h.orchestrator
            .download(DownloadRequest::new(LoaderKind::Vanilla, "1.20.1"))
            .await
            .unwrap();

        for fake in &h.fakes {
            assert_eq!(fake.get_version_calls.load(Ordering::SeqCst), 1);
        }
        let warnings = h.notifier.with_severity(Severity::Warning);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].details.contains("Profile demo"));
        assert!(warnings[0].details.contains("linux (x86)"));
    }

    #[tokio::test]
    async fn no_mirror_fails_before_any_target() {
        let h = harness(&TargetSet::cross_product(), FakeProbe::default(), |_| {
            FakeInstaller::default()
        });

        let err = h
            .orchestrator
            .download(DownloadRequest::new(LoaderKind::Forge, "1.20.1"))
            .await
            .unwrap_err();

        assert!(matches!(err, LauncherError::NoMirrorAvailable { .. }));
        assert_eq!(err.failure_class(), FailureClass::Fatal);
        assert!(h
            .fakes
            .iter()
            .all(|f| f.get_version_calls.load(Ordering::SeqCst) == 0));
        assert_eq!(h.catalog.get_builds_calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.notifier.count(Severity::Error), 1);
        assert!(!h.orchestrator.is_loading());
    }

    #[tokio::test]
    async fn build_java_is_provisioned_once_across_downloads() {
        let h = harness(
            &[OsContext::new(Platform::Linux, Arch::X64)],
            reachable(),
            |_| FakeInstaller::default(),
        );

        for _ in 0..2 {
            h.orchestrator
                .download(DownloadRequest::new(LoaderKind::Forge, "1.20.1"))
                .await
                .unwrap();
        }
        assert_eq!(h.fetcher.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn supplied_build_tool_skips_provisioning() {
        let h = harness(
            &[OsContext::new(Platform::Linux, Arch::X64)],
            FakeProbe::default(),
            |_| FakeInstaller::default(),
        );

        let id = h
            .orchestrator
            .download(
                DownloadRequest::new(LoaderKind::Forge, "1.20.1")
                    .with_build_tool("/opt/jdk/bin/java"),
            )
            .await
            .unwrap();

        assert_eq!(id, "1.20.1-fake-B2");
        assert_eq!(h.fetcher.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn zero_successes_is_an_error() {
        let h = harness(&TargetSet::cross_product(), reachable(), |_| {
            FakeInstaller::failing(|id| LauncherError::VersionNotFound(id.to_string()))
        });
        let mut steps = h.orchestrator.progress().subscribe_steps();

        let err = h
            .orchestrator
            .download(DownloadRequest::new(LoaderKind::Vanilla, "0.0.1"))
            .await
            .unwrap_err();

        assert!(matches!(err, LauncherError::NoTargetSucceeded(ref p) if p == "demo"));
        assert_eq!(drain(&mut steps).last().unwrap().percent, 100.0);
    }

    #[tokio::test]
    async fn missing_loader_build_aborts_the_run() {
        let h = harness_with_catalog(
            &TargetSet::cross_product(),
            reachable(),
            FakeCatalog::with_builds(Vec::new()),
            |_| FakeInstaller::default(),
        );

        let err = h
            .orchestrator
            .download(DownloadRequest::new(LoaderKind::Forge, "1.20.1"))
            .await
            .unwrap_err();

        assert!(matches!(err, LauncherError::NoLoaderBuild { .. }));
        // Only the first target reached the catalog.
        assert_eq!(h.catalog.get_builds_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.fakes[1].get_version_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn liteloader_skips_osx_with_a_warning() {
        let h = harness(&TargetSet::cross_product(), reachable(), |_| {
            FakeInstaller::default()
        });

        let id = h
            .orchestrator
            .download(DownloadRequest::new(LoaderKind::LiteLoader, "1.20.1"))
            .await
            .unwrap();

        assert_eq!(id, "1.20.1-fake-B2");
        assert_eq!(h.notifier.count(Severity::Warning), 3);
        assert_eq!(h.notifier.count(Severity::Error), 0);
        for (target, fake) in h.orchestrator.targets().iter().zip(&h.fakes) {
            let installed = !fake.installed().is_empty();
            assert_eq!(installed, target.platform() != Platform::Osx, "{}", target.name());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_further_targets() {
        let h = harness(&TargetSet::cross_product(), reachable(), |_| {
            FakeInstaller::slow(Duration::from_secs(30))
        });
        let orchestrator = h.orchestrator.clone();
        let run = tokio::spawn(async move {
            orchestrator
                .download(DownloadRequest::new(LoaderKind::Vanilla, "1.20.1"))
                .await
        });

        // Target index 2 has started installing.
        h.fakes[2].install_started.notified().await;
        h.orchestrator.cancel();

        let err = run.await.unwrap().unwrap_err();
        assert!(matches!(err, LauncherError::Cancelled));
        for fake in &h.fakes[3..] {
            assert_eq!(fake.get_version_calls.load(Ordering::SeqCst), 0);
        }
        assert_eq!(h.fakes[0].installed(), vec!["1.20.1"]);
        assert!(!h.orchestrator.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_download_is_rejected() {
        let h = harness(
            &[OsContext::new(Platform::Linux, Arch::X64)],
            reachable(),
            |_| FakeInstaller::slow(Duration::from_secs(30)),
        );
        let orchestrator = h.orchestrator.clone();
        let first = tokio::spawn(async move {
            orchestrator
                .download(DownloadRequest::new(LoaderKind::Vanilla, "1.20.1"))
                .await
        });
        h.fakes[0].install_started.notified().await;

        let err = h
            .orchestrator
            .download(DownloadRequest::new(LoaderKind::Vanilla, "1.20.1"))
            .await
            .unwrap_err();
        assert!(matches!(err, LauncherError::AlreadyRunning(_)));

        assert_eq!(first.await.unwrap().unwrap(), "1.20.1");
    }

    #[tokio::test]
    async fn cancel_before_the_call_starts_is_not_lost() {
        let h = harness(
            &[OsContext::new(Platform::Linux, Arch::X64)],
            reachable(),
            |_| FakeInstaller::default(),
        );

        h.orchestrator.cancel();
        let err = h
            .orchestrator
            .download(DownloadRequest::new(LoaderKind::Vanilla, "1.20.1"))
            .await
            .unwrap_err();
        assert!(matches!(err, LauncherError::Cancelled));
        assert_eq!(h.fakes[0].get_version_calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.fetcher.fetches.load(Ordering::SeqCst), 0);
        assert!(!h.orchestrator.is_loading());

        // The cancelled call does not leak into the next one.
        let id = h
            .orchestrator
            .download(DownloadRequest::new(LoaderKind::Vanilla, "1.20.1"))
            .await
            .unwrap();
        assert_eq!(id, "1.20.1");
    }
}
