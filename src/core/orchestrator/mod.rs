mod download;
mod guard;
mod request;

pub use download::DownloadOrchestrator;
pub use guard::{LoadGuard, LoadPhase, LoadState};
pub use request::{BuildTool, DownloadRequest, ProgressStep};
