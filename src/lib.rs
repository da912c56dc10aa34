pub mod commands;
pub mod core;

use tracing_subscriber::EnvFilter;

pub use commands::DistributionClient;

/// Install the global `tracing` subscriber. Later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,packforge=debug")),
        )
        .try_init();
}
