use std::fmt;
use std::sync::Arc;

use crate::core::error::LauncherResult;
use crate::core::installer::PlatformInstaller;

use super::os::{Arch, OsContext, Platform};

/// One platform/architecture pair bound to its own installer.
#[derive(Clone)]
pub struct Target {
    os: OsContext,
    installer: Arc<dyn PlatformInstaller>,
}

impl Target {
    pub fn new(os: OsContext, installer: Arc<dyn PlatformInstaller>) -> Self {
        Self { os, installer }
    }

    pub fn platform(&self) -> Platform {
        self.os.platform
    }

    pub fn arch(&self) -> Arch {
        self.os.arch
    }

    pub fn os(&self) -> &OsContext {
        &self.os
    }

    pub fn installer(&self) -> &dyn PlatformInstaller {
        self.installer.as_ref()
    }

    /// `linux-x64`, used for directory names and log prefixes.
    pub fn name(&self) -> String {
        format!("{}-{}", self.os.platform, self.os.arch)
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("platform", &self.os.platform)
            .field("arch", &self.os.arch)
            .finish()
    }
}

/// Immutable, ordered set of targets built once per profile.
#[derive(Debug, Clone, Default)]
pub struct TargetSet {
    targets: Vec<Target>,
}

impl TargetSet {
    /// Every supported platform × architecture, platform-major order.
    pub fn cross_product() -> Vec<OsContext> {
        Platform::ALL
            .iter()
            .flat_map(|platform| Arch::ALL.iter().map(|arch| OsContext::new(*platform, *arch)))
            .collect()
    }

    /// Bind one installer per context. Duplicate contexts are kept once.
    pub fn build<F>(contexts: &[OsContext], mut factory: F) -> LauncherResult<Self>
    where
        F: FnMut(OsContext) -> LauncherResult<Arc<dyn PlatformInstaller>>,
    {
        let mut targets: Vec<Target> = Vec::with_capacity(contexts.len());
        for os in contexts {
            if targets.iter().any(|t| t.os == *os) {
                continue;
            }
            targets.push(Target::new(*os, factory(*os)?));
        }
        Ok(Self { targets })
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Target> {
        self.targets.iter()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl<'a> IntoIterator for &'a TargetSet {
    type Item = &'a Target;
    type IntoIter = std::slice::Iter<'a, Target>;

    fn into_iter(self) -> Self::IntoIter {
        self.targets.iter()
    }
}
