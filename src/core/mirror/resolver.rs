// ─── Mirror Resolver ───
// Cheap latency probe over every candidate, then one confirming request in
// ascending round-trip order.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::platform::{Arch, Platform};

use super::probe::MirrorProbe;

pub const DEFAULT_MEASUREMENT_TTL: Duration = Duration::from_secs(10 * 60);

/// Candidate URLs per OS family, in configured order.
///
/// Keys are a family name (`linux`) or a family plus architecture
/// (`linux-arm64`); the architecture-specific list wins when present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MirrorTable(HashMap<String, Vec<String>>);

impl MirrorTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, platform: Platform, urls: &[&str]) -> Self {
        self.0.insert(platform.to_string(), to_owned(urls));
        self
    }

    pub fn with_arch(mut self, platform: Platform, arch: Arch, urls: &[&str]) -> Self {
        self.0.insert(arch_key(platform, arch), to_owned(urls));
        self
    }

    pub fn candidates(&self, platform: Platform, arch: Option<Arch>) -> Option<&[String]> {
        arch.and_then(|arch| self.0.get(&arch_key(platform, arch)))
            .or_else(|| self.0.get(platform.as_str()))
            .map(Vec::as_slice)
    }
}

fn arch_key(platform: Platform, arch: Arch) -> String {
    format!("{platform}-{arch}")
}

fn to_owned(urls: &[&str]) -> Vec<String> {
    urls.iter().map(|u| u.to_string()).collect()
}

/// A candidate with its measured round-trip time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorCandidate {
    pub url: String,
    pub rtt: Option<Duration>,
}

#[derive(Debug, Clone, Copy)]
struct Measurement {
    rtt: Option<Duration>,
    measured_at: Instant,
}

pub struct MirrorResolver {
    probe: Arc<dyn MirrorProbe>,
    ttl: Duration,
    measurements: RwLock<HashMap<String, Measurement>>,
}

impl MirrorResolver {
    pub fn new(probe: Arc<dyn MirrorProbe>) -> Self {
        Self::with_ttl(probe, DEFAULT_MEASUREMENT_TTL)
    }

    pub fn with_ttl(probe: Arc<dyn MirrorProbe>, ttl: Duration) -> Self {
        Self {
            probe,
            ttl,
            measurements: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve for the host's OS family and architecture.
    pub async fn resolve(&self, table: &MirrorTable) -> LauncherResult<String> {
        self.resolve_for(Platform::current(), Arch::current(), table)
            .await
    }

    #[instrument(skip(self, table))]
    pub async fn resolve_for(
        &self,
        platform: Option<Platform>,
        arch: Option<Arch>,
        table: &MirrorTable,
    ) -> LauncherResult<String> {
        let family = platform
            .map(|p| p.to_string())
            .unwrap_or_else(|| std::env::consts::OS.to_string());
        let no_mirror = || LauncherError::NoMirrorAvailable {
            family: family.clone(),
        };

        let urls = platform
            .and_then(|p| table.candidates(p, arch))
            .ok_or_else(no_mirror)?;

        let mut reachable: Vec<MirrorCandidate> = self
            .measure(urls)
            .await
            .into_iter()
            .filter(|c| c.rtt.is_some())
            .collect();
        reachable.sort_by_key(|c| c.rtt);

        for candidate in &reachable {
            match self.probe.exists(&candidate.url).await {
                Ok(true) => {
                    info!("Mirror {} selected ({:?})", candidate.url, candidate.rtt);
                    return Ok(candidate.url.clone());
                }
                Ok(false) => debug!("Mirror {} reachable but artifact missing", candidate.url),
                Err(e) => debug!("Mirror {} existence check failed: {}", candidate.url, e),
            }
        }

        warn!(
            "No mirror available for {} ({} candidates, {} reachable)",
            family,
            urls.len(),
            reachable.len()
        );
        Err(no_mirror())
    }

    /// Round-trip times for `urls`, probing only stale or unknown entries.
    async fn measure(&self, urls: &[String]) -> Vec<MirrorCandidate> {
        let now = Instant::now();
        let cached: HashMap<String, Measurement> = {
            let measurements = self.measurements.read().await;
            let fresh = urls
                .iter()
                .filter_map(|url| {
                    let m = measurements.get(url)?;
                    (now.duration_since(m.measured_at) < self.ttl).then(|| (url.clone(), *m))
                })
                .collect();
            fresh
        };

        let stale: Vec<&String> = urls.iter().filter(|u| !cached.contains_key(*u)).collect();
        let probed = join_all(stale.iter().map(|url| async move {
            let rtt = match self.probe.latency(url).await {
                Ok(rtt) => Some(rtt),
                Err(e) => {
                    debug!("Mirror {} dropped: {}", url, e);
                    None
                }
            };
            ((*url).clone(), rtt)
        }))
        .await;

        if !probed.is_empty() {
            let measured_at = Instant::now();
            let mut measurements = self.measurements.write().await;
            for (url, rtt) in &probed {
                measurements.insert(url.clone(), Measurement { rtt: *rtt, measured_at });
            }
        }

        let probed: HashMap<String, Option<Duration>> = probed.into_iter().collect();
        urls.iter()
            .map(|url| MirrorCandidate {
                url: url.clone(),
                rtt: cached
                    .get(url)
                    .map(|m| m.rtt)
                    .or_else(|| probed.get(url).copied())
                    .flatten(),
            })
            .collect()
    }
}
