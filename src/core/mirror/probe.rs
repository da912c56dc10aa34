use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use tokio::net::TcpStream;
use tokio::time::{timeout, Instant};
use tracing::debug;

use crate::core::error::{LauncherError, LauncherResult};

/// Reachability and existence checks against one candidate URL.
#[async_trait]
pub trait MirrorProbe: Send + Sync {
    /// Round-trip estimate for the candidate's host.
    async fn latency(&self, url: &str) -> LauncherResult<Duration>;

    /// Header-only request; `true` on a success status.
    async fn exists(&self, url: &str) -> LauncherResult<bool>;
}

/// Measures latency as TCP connect time and checks existence with `HEAD`.
pub struct NetworkProbe {
    client: Client,
    probe_timeout: Duration,
    check_timeout: Duration,
}

impl NetworkProbe {
    pub fn new(client: Client, probe_timeout: Duration, check_timeout: Duration) -> Self {
        Self {
            client,
            probe_timeout,
            check_timeout,
        }
    }
}

#[async_trait]
impl MirrorProbe for NetworkProbe {
    async fn latency(&self, url: &str) -> LauncherResult<Duration> {
        let parsed =
            Url::parse(url).map_err(|e| LauncherError::Other(format!("bad mirror url {url}: {e}")))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| LauncherError::Other(format!("mirror url {url} has no host")))?
            .to_string();
        let port = parsed.port_or_known_default().unwrap_or(443);

        let started = Instant::now();
        match timeout(self.probe_timeout, TcpStream::connect((host.as_str(), port))).await {
            Ok(Ok(_stream)) => {
                let rtt = started.elapsed();
                debug!("Probe {}:{} answered in {:?}", host, port, rtt);
                Ok(rtt)
            }
            Ok(Err(e)) => Err(LauncherError::io(host, e)),
            Err(_) => Err(LauncherError::Other(format!(
                "probe of {host} timed out after {:?}",
                self.probe_timeout
            ))),
        }
    }

    async fn exists(&self, url: &str) -> LauncherResult<bool> {
        let response = self
            .client
            .head(url)
            .timeout(self.check_timeout)
            .send()
            .await?;
        Ok(response.status().is_success())
    }
}
