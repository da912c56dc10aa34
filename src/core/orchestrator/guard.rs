use std::sync::atomic::{AtomicU8, Ordering};

use crate::core::error::{LauncherError, LauncherResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LoadPhase {
    Idle = 0,
    Loading = 1,
}

/// Per-orchestrator "is loading" flag. At most one download in flight.
#[derive(Debug, Default)]
pub struct LoadState(AtomicU8);

impl LoadState {
    pub fn phase(&self) -> LoadPhase {
        match self.0.load(Ordering::SeqCst) {
            0 => LoadPhase::Idle,
            _ => LoadPhase::Loading,
        }
    }

    /// Idle → Loading, or `AlreadyRunning` when another call holds the flag.
    pub fn enter(&self, profile: &str) -> LauncherResult<LoadGuard<'_>> {
        self.0
            .compare_exchange(
                LoadPhase::Idle as u8,
                LoadPhase::Loading as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .map_err(|_| LauncherError::AlreadyRunning(profile.to_string()))?;
        Ok(LoadGuard { state: self })
    }
}

/// Scope guard that puts the state back to idle on every exit path.
pub struct LoadGuard<'a> {
    state: &'a LoadState,
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        self.state.0.store(LoadPhase::Idle as u8, Ordering::SeqCst);
    }
}
