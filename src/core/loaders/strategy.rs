// ─── Loader Strategies ───
// Closed dispatch from loader kind to the per-target download routine.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::platform::{Platform, Target};
use crate::core::progress::ProgressSinks;

use super::catalog::{select_build, BuildDescriptor, CatalogSet, InstallOptions, LoaderCatalog};
use super::kind::LoaderKind;

/// Build selection shared by every target of one request.
///
/// The catalog is queried until one call succeeds; every later target
/// reuses that selection.
#[derive(Debug, Default)]
pub struct RequestCache {
    selected: OnceCell<BuildDescriptor>,
}

impl RequestCache {
    pub fn selected(&self) -> Option<&BuildDescriptor> {
        self.selected.get()
    }

    async fn select<F>(
        &self,
        kind: LoaderKind,
        catalog: &dyn LoaderCatalog,
        game_version: &str,
        pick: F,
    ) -> LauncherResult<BuildDescriptor>
    where
        F: FnOnce(&[BuildDescriptor]) -> Option<BuildDescriptor>,
    {
        self.selected
            .get_or_try_init(|| async move {
                let builds = catalog.get_builds(game_version).await?;
                let chosen = pick(&builds).ok_or_else(|| LauncherError::NoLoaderBuild {
                    loader: kind.to_string(),
                    game_version: game_version.to_string(),
                })?;
                info!("Selected {} build {} for {}", kind, chosen.name, game_version);
                Ok(chosen)
            })
            .await
            .cloned()
    }
}

/// Per-request inputs handed to a strategy for each target.
pub struct StrategyContext<'a> {
    pub game_version: &'a str,
    pub explicit_build: Option<&'a str>,
    pub java: Option<&'a Path>,
    pub sinks: &'a ProgressSinks,
    pub cancel: &'a CancellationToken,
    pub cache: &'a RequestCache,
}

pub enum LoaderStrategy {
    Vanilla,
    Forge(Arc<dyn LoaderCatalog>),
    NeoForge(Arc<dyn LoaderCatalog>),
    Fabric(Arc<dyn LoaderCatalog>),
    Quilt(Arc<dyn LoaderCatalog>),
    LiteLoader(Arc<dyn LoaderCatalog>),
}

impl LoaderStrategy {
    pub fn for_kind(kind: LoaderKind, catalogs: &CatalogSet) -> Self {
        match kind {
            LoaderKind::Vanilla => LoaderStrategy::Vanilla,
            LoaderKind::Forge => LoaderStrategy::Forge(catalogs.forge.clone()),
            LoaderKind::NeoForge => LoaderStrategy::NeoForge(catalogs.neoforge.clone()),
            LoaderKind::Fabric => LoaderStrategy::Fabric(catalogs.fabric.clone()),
            LoaderKind::Quilt => LoaderStrategy::Quilt(catalogs.quilt.clone()),
            LoaderKind::LiteLoader => LoaderStrategy::LiteLoader(catalogs.liteloader.clone()),
        }
    }

    pub fn kind(&self) -> LoaderKind {
        match self {
            LoaderStrategy::Vanilla => LoaderKind::Vanilla,
            LoaderStrategy::Forge(_) => LoaderKind::Forge,
            LoaderStrategy::NeoForge(_) => LoaderKind::NeoForge,
            LoaderStrategy::Fabric(_) => LoaderKind::Fabric,
            LoaderStrategy::Quilt(_) => LoaderKind::Quilt,
            LoaderStrategy::LiteLoader(_) => LoaderKind::LiteLoader,
        }
    }

    /// Install the requested loader on one target and return its version id.
    pub async fn run(&self, target: &Target, ctx: &StrategyContext<'_>) -> LauncherResult<String> {
        let kind = self.kind();
        match self {
            LoaderStrategy::Vanilla => run_vanilla(target, ctx).await,
            LoaderStrategy::Forge(catalog) | LoaderStrategy::NeoForge(catalog) => {
                run_installer_loader(kind, catalog.as_ref(), target, ctx).await
            }
            LoaderStrategy::Fabric(catalog) | LoaderStrategy::Quilt(catalog) => {
                run_profile_loader(kind, catalog.as_ref(), target, ctx).await
            }
            LoaderStrategy::LiteLoader(catalog) => run_liteloader(catalog.as_ref(), target, ctx).await,
        }
    }
}

fn install_options<'a>(target: &'a Target, ctx: &'a StrategyContext<'_>) -> InstallOptions<'a> {
    InstallOptions {
        game_version: ctx.game_version,
        game_dir: target.installer().game_dir(),
        java: ctx.java,
        sinks: ctx.sinks,
        cancel: ctx.cancel,
    }
}

async fn run_vanilla(target: &Target, ctx: &StrategyContext<'_>) -> LauncherResult<String> {
    let installer = target.installer();
    let descriptor = installer.get_version(ctx.game_version, ctx.cancel).await?;
    installer.install(&descriptor.id, ctx.sinks, ctx.cancel).await?;
    Ok(descriptor.id)
}

/// Forge and NeoForge: vanilla first, then the loader's own installer jar.
async fn run_installer_loader(
    kind: LoaderKind,
    catalog: &dyn LoaderCatalog,
    target: &Target,
    ctx: &StrategyContext<'_>,
) -> LauncherResult<String> {
    let build = ctx
        .cache
        .select(kind, catalog, ctx.game_version, |builds| {
            select_build(builds, ctx.explicit_build).cloned()
        })
        .await?;

    let installer = target.installer();
    let vanilla = installer.get_version(ctx.game_version, ctx.cancel).await?;
    installer.install(&vanilla.id, ctx.sinks, ctx.cancel).await?;

    let expected_id = catalog.version_id(ctx.game_version, &build.name);
    let id = if installer.has_local_version(&expected_id).await {
        debug!("{} already registered on {}", expected_id, target.name());
        expected_id
    } else {
        catalog.install(&build, &install_options(target, ctx)).await?
    };

    installer.install(&id, ctx.sinks, ctx.cancel).await?;
    Ok(id)
}

/// Fabric and Quilt: a registered profile skips the catalog entirely.
async fn run_profile_loader(
    kind: LoaderKind,
    catalog: &dyn LoaderCatalog,
    target: &Target,
    ctx: &StrategyContext<'_>,
) -> LauncherResult<String> {
    let installer = target.installer();

    let known_build = ctx
        .explicit_build
        .map(str::to_string)
        .or_else(|| ctx.cache.selected().map(|b| b.name.clone()));
    if let Some(build) = known_build {
        let id = catalog.version_id(ctx.game_version, &build);
        if installer.has_local_version(&id).await {
            debug!("{} already registered on {}, skipping catalog", id, target.name());
            installer.install(&id, ctx.sinks, ctx.cancel).await?;
            installer.launch_plan(&id, ctx.java).await?;
            return Ok(id);
        }
    }

    let build = ctx
        .cache
        .select(kind, catalog, ctx.game_version, |builds| {
            select_build(builds, ctx.explicit_build).cloned()
        })
        .await?;
    let id = catalog.install(&build, &install_options(target, ctx)).await?;
    installer.install(&id, ctx.sinks, ctx.cancel).await?;
    installer.launch_plan(&id, ctx.java).await?;
    Ok(id)
}

async fn run_liteloader(
    catalog: &dyn LoaderCatalog,
    target: &Target,
    ctx: &StrategyContext<'_>,
) -> LauncherResult<String> {
    if target.platform() == Platform::Osx {
        return Err(LauncherError::UnsupportedTarget {
            loader: LoaderKind::LiteLoader.to_string(),
            target: target.name(),
        });
    }

    let lookup = ctx.explicit_build.unwrap_or(ctx.game_version);
    let game_version = ctx.game_version;
    let build = ctx
        .cache
        .select(LoaderKind::LiteLoader, catalog, lookup, |builds| {
            builds
                .iter()
                .filter(|b| Some(b.name.as_str()) == ctx.explicit_build || b.game_version == game_version)
                .max_by_key(|b| (b.recommended, b.latest))
                .cloned()
        })
        .await?;

    let installer = target.installer();
    let id = catalog.install(&build, &install_options(target, ctx)).await?;
    installer.install(&id, ctx.sinks, ctx.cancel).await?;
    Ok(id)
}
