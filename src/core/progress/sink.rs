use serde::Serialize;
use tokio::sync::{mpsc, watch};

/// Which producer a log line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogSource {
    /// Per-target installer events (file progress, lifecycle lines).
    Installer,
    /// Low-level HTTP transfer log written by the downloader.
    Download,
}

#[derive(Debug, Clone)]
pub struct LogLine {
    pub source: LogSource,
    pub text: String,
}

/// Kind of file an installer is currently processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Version,
    Library,
    Native,
    Asset,
    Runtime,
    LoaderInstaller,
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            FileKind::Version => "version",
            FileKind::Library => "library",
            FileKind::Native => "native",
            FileKind::Asset => "asset",
            FileKind::Runtime => "runtime",
            FileKind::LoaderInstaller => "loader installer",
        };
        f.write_str(label)
    }
}

/// File-level progress event raised by installers.
#[derive(Debug, Clone, Serialize)]
pub struct FileProgress {
    pub kind: FileKind,
    pub name: String,
    pub processed: usize,
    pub total: usize,
}

/// Byte-level transfer ratio for the single active download.
#[derive(Clone)]
pub struct ByteProgressSink {
    tx: watch::Sender<f64>,
}

impl ByteProgressSink {
    pub(crate) fn new(tx: watch::Sender<f64>) -> Self {
        Self { tx }
    }

    /// Publish `downloaded / total` as a 0–100 percentage.
    /// Unknown totals are reported as 0 until the transfer completes.
    pub fn report(&self, downloaded: u64, total: Option<u64>) {
        let percent = match total {
            Some(total) if total > 0 => (downloaded as f64 / total as f64 * 100.0).min(100.0),
            _ => 0.0,
        };
        self.tx.send_replace(percent);
    }

    pub fn complete(&self) {
        self.tx.send_replace(100.0);
    }

    pub fn reset(&self) {
        self.tx.send_replace(0.0);
    }
}

/// Everything an installer or strategy needs to report progress.
///
/// Cheap to clone; every clone feeds the same aggregator.
#[derive(Clone)]
pub struct ProgressSinks {
    bytes: ByteProgressSink,
    lines: mpsc::UnboundedSender<LogLine>,
    label: Option<String>,
}

impl ProgressSinks {
    pub(crate) fn new(bytes: ByteProgressSink, lines: mpsc::UnboundedSender<LogLine>) -> Self {
        Self {
            bytes,
            lines,
            label: None,
        }
    }

    /// Same sinks, with every line prefixed by the target name.
    pub fn for_target(&self, label: &str) -> Self {
        Self {
            bytes: self.bytes.clone(),
            lines: self.lines.clone(),
            label: Some(label.to_string()),
        }
    }

    pub fn bytes(&self) -> &ByteProgressSink {
        &self.bytes
    }

    pub fn file(&self, event: FileProgress) {
        self.installer_log(format!(
            "{} {} ({}/{})",
            event.kind, event.name, event.processed, event.total
        ));
    }

    pub fn installer_log(&self, text: impl Into<String>) {
        self.push(LogSource::Installer, text.into());
    }

    pub fn download_log(&self, text: impl Into<String>) {
        self.push(LogSource::Download, text.into());
    }

    fn push(&self, source: LogSource, text: String) {
        let text = match &self.label {
            Some(label) => format!("[{label}] {text}"),
            None => text,
        };
        // The window task is gone only when the aggregator shut down.
        let _ = self.lines.send(LogLine { source, text });
    }
}
