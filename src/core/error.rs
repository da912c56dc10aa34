use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the entire distribution backend.
/// Every module returns `Result<T, LauncherError>`.
#[derive(Debug, Error)]
pub enum LauncherError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    #[error("No mirror available for {family}")]
    NoMirrorAvailable { family: String },

    // ── Integrity ───────────────────────────────────────
    #[error("SHA-1 mismatch for {path:?}: expected {expected}, got {actual}")]
    Sha1Mismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    // ── Maven ───────────────────────────────────────────
    #[error("Invalid Maven coordinate: {0}")]
    InvalidMavenCoordinate(String),

    // ── XML ─────────────────────────────────────────────
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::DeError),

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Versions ────────────────────────────────────────
    #[error("Version not found: {0}")]
    VersionNotFound(String),

    #[error("Missing key '{key}' in {context}")]
    MissingKey { key: String, context: String },

    // ── Java ────────────────────────────────────────────
    #[error("Build java provisioning failed: {0}")]
    JavaProvisioning(String),

    #[error("Java execution failed: {0}")]
    JavaExecution(String),

    // ── Loader ──────────────────────────────────────────
    #[error("Unknown loader kind: {0}")]
    UnknownLoader(String),

    #[error("No {loader} build available for {game_version}")]
    NoLoaderBuild {
        loader: String,
        game_version: String,
    },

    #[error("Loader API unreachable: {0}")]
    LoaderApi(String),

    #[error("{loader} does not support target {target}")]
    UnsupportedTarget { loader: String, target: String },

    // ── Archive ─────────────────────────────────────────
    #[error("Zip extraction error: {0}")]
    Zip(#[from] zip::result::ZipError),

    // ── Orchestration ───────────────────────────────────
    #[error("A download is already running for profile {0}")]
    AlreadyRunning(String),

    #[error("Download cancelled")]
    Cancelled,

    #[error("No target produced an installable version for {0}")]
    NoTargetSucceeded(String),

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type LauncherResult<T> = Result<T, LauncherError>;

/// How the orchestrator reacts to an error raised while processing a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Aborts the whole download and propagates to the caller.
    Fatal,
    /// Expected for some platform/arch combinations: warn and continue.
    Skippable,
    /// Anything else: report as an error and continue.
    Unexpected,
    /// The call's cancellation token fired.
    Cancelled,
}

impl LauncherError {
    pub fn failure_class(&self) -> FailureClass {
        match self {
            LauncherError::UnknownLoader(_)
            | LauncherError::NoLoaderBuild { .. }
            | LauncherError::NoMirrorAvailable { .. }
            | LauncherError::JavaProvisioning(_)
            | LauncherError::AlreadyRunning(_) => FailureClass::Fatal,
            LauncherError::VersionNotFound(_)
            | LauncherError::Zip(_)
            | LauncherError::MissingKey { .. }
            | LauncherError::UnsupportedTarget { .. } => FailureClass::Skippable,
            LauncherError::Cancelled => FailureClass::Cancelled,
            _ => FailureClass::Unexpected,
        }
    }

    /// Caller bugs or catalog gaps. Retrying never helps.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            LauncherError::UnknownLoader(_) | LauncherError::NoLoaderBuild { .. }
        )
    }

    pub fn is_skippable(&self) -> bool {
        self.failure_class() == FailureClass::Skippable
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LauncherError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<std::io::Error> for LauncherError {
    fn from(source: std::io::Error) -> Self {
        LauncherError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

// Front-ends forward errors as plain strings.
impl serde::Serialize for LauncherError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
