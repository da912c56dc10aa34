use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use reqwest::Client;
use sha1::{Digest, Sha1};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::progress::{FileKind, FileProgress, ProgressSinks};

/// A single file to download with optional SHA-1 for validation.
#[derive(Debug, Clone)]
pub struct DownloadEntry {
    pub url: String,
    pub dest: PathBuf,
    pub sha1: Option<String>,
    pub size: Option<u64>,
}

/// Fetches one large artifact to disk while reporting byte progress.
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        sinks: &ProgressSinks,
        cancel: &CancellationToken,
    ) -> LauncherResult<()>;
}

/// Streaming, SHA-1 validated downloader.
#[derive(Clone)]
pub struct Downloader {
    client: Client,
    /// Maximum number of parallel downloads in a batch.
    concurrency: usize,
}

impl Downloader {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            concurrency: 8,
        }
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    // ── Single file download ────────────────────────────

    /// Download a single file to `dest`, reporting byte progress and
    /// optionally validating SHA-1.
    ///
    /// Data is streamed into `<dest>.part` and renamed once complete, so an
    /// interrupted transfer never leaves a truncated file at `dest`.
    pub async fn download_file(
        &self,
        url: &str,
        dest: &Path,
        sha1_expected: Option<&str>,
        sinks: &ProgressSinks,
        cancel: &CancellationToken,
    ) -> LauncherResult<u64> {
        self.transfer(url, dest, sha1_expected, Some(sinks), cancel)
            .await
    }

    async fn transfer(
        &self,
        url: &str,
        dest: &Path,
        sha1_expected: Option<&str>,
        sinks: Option<&ProgressSinks>,
        cancel: &CancellationToken,
    ) -> LauncherResult<u64> {
        if cancel.is_cancelled() {
            return Err(LauncherError::Cancelled);
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::io(parent, e))?;
        }

        if let Some(sinks) = sinks {
            sinks.download_log(format!("GET {url}"));
            sinks.bytes().reset();
        }

        let response = tokio::select! {
            response = self.client.get(url).send() => response?,
            _ = cancel.cancelled() => return Err(LauncherError::Cancelled),
        };
        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let total_bytes = response.content_length();
        let part_path = part_path(dest);
        let mut file = tokio::fs::File::create(&part_path)
            .await
            .map_err(|e| LauncherError::io(&part_path, e))?;

        let mut hasher = Sha1::new();
        let mut downloaded = 0_u64;
        let mut stream = response.bytes_stream();

        loop {
            // A stalled host never yields another chunk.
            let next = tokio::select! {
                next = stream.next() => next,
                _ = cancel.cancelled() => None,
            };
            if cancel.is_cancelled() {
                drop(file);
                let _ = tokio::fs::remove_file(&part_path).await;
                debug!("Cancelled {} after {} bytes", url, downloaded);
                return Err(LauncherError::Cancelled);
            }
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk?;
            hasher.update(&chunk);
            file.write_all(&chunk)
                .await
                .map_err(|e| LauncherError::io(&part_path, e))?;
            downloaded = downloaded.saturating_add(chunk.len() as u64);
            if let Some(sinks) = sinks {
                sinks.bytes().report(downloaded, total_bytes);
            }
        }

        file.flush()
            .await
            .map_err(|e| LauncherError::io(&part_path, e))?;
        // Drop the handle before renaming (Windows keeps the file locked otherwise).
        drop(file);

        if let Some(expected) = sha1_expected {
            let actual = hex::encode(hasher.finalize());
            if !actual.eq_ignore_ascii_case(expected) {
                let _ = tokio::fs::remove_file(&part_path).await;
                return Err(LauncherError::Sha1Mismatch {
                    path: dest.to_path_buf(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        tokio::fs::rename(&part_path, dest)
            .await
            .map_err(|e| LauncherError::io(dest, e))?;

        if let Some(sinks) = sinks {
            sinks.bytes().complete();
            sinks.download_log(format!("{url} -> {} bytes", downloaded));
        }

        debug!("Downloaded: {} -> {:?}", url, dest);
        Ok(downloaded)
    }

    // ── Batch concurrent downloads ──────────────────────

    /// Download many files concurrently using `buffer_unordered`.
    ///
    /// Byte progress reports the share of the batch already on disk; one file
    /// progress event is emitted per finished entry. Returns the entries that
    /// failed, or `Cancelled` if the token fired.
    pub async fn download_batch(
        &self,
        entries: Vec<DownloadEntry>,
        kind: FileKind,
        sinks: &ProgressSinks,
        cancel: &CancellationToken,
    ) -> LauncherResult<Vec<(DownloadEntry, LauncherError)>> {
        let total_files = entries.len();
        let total_size: u64 = entries.iter().filter_map(|e| e.size).sum();
        info!(
            "Starting batch download: {} {} files, concurrency={}",
            total_files, kind, self.concurrency
        );
        sinks.bytes().reset();

        let finished_files = AtomicUsize::new(0);
        let finished_bytes = AtomicU64::new(0);

        let results: Vec<_> = stream::iter(entries)
            .map(|entry| {
                let finished_files = &finished_files;
                let finished_bytes = &finished_bytes;
                async move {
                    let result = self
                        .transfer(&entry.url, &entry.dest, entry.sha1.as_deref(), None, cancel)
                        .await;

                    if let Ok(written) = result {
                        let done = finished_files.fetch_add(1, Ordering::SeqCst) + 1;
                        let bytes = finished_bytes
                            .fetch_add(entry.size.unwrap_or(written), Ordering::SeqCst)
                            + entry.size.unwrap_or(written);
                        if total_size > 0 {
                            sinks.bytes().report(bytes, Some(total_size));
                        } else {
                            sinks.bytes().report(done as u64, Some(total_files as u64));
                        }
                        sinks.file(FileProgress {
                            kind,
                            name: file_name(&entry.dest),
                            processed: done,
                            total: total_files,
                        });
                    }
                    (entry, result)
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        if cancel.is_cancelled() {
            return Err(LauncherError::Cancelled);
        }

        Ok(results
            .into_iter()
            .filter_map(|(entry, result)| match result {
                Ok(_) => None,
                Err(e) => Some((entry, e)),
            })
            .collect())
    }

    /// Validate an existing file's SHA-1.
    pub async fn validate_sha1(path: &Path, expected: &str) -> LauncherResult<bool> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| LauncherError::io(path, e))?;
        let mut hasher = Sha1::new();
        hasher.update(&bytes);
        let actual = hex::encode(hasher.finalize());
        Ok(actual.eq_ignore_ascii_case(expected))
    }
}

#[async_trait]
impl ArtifactFetcher for Downloader {
    async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        sinks: &ProgressSinks,
        cancel: &CancellationToken,
    ) -> LauncherResult<()> {
        self.download_file(url, dest, None, sinks, cancel).await?;
        Ok(())
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}
