// ─── packforge Core ───
// Multi-target distribution backend for a modded game client.
//
// Architecture:
//   core/
//     orchestrator/: Download across every target, failure policy, load guard
//     loaders/     : Loader kinds, catalogs, per-target strategies
//     platform/    : OS rule context, targets, target set
//     installer/   : Per-target installer capability + Mojang implementation
//     version/     : Mojang manifest + version JSON
//     maven/       : Artifact coordinates
//     downloader/  : Streaming downloads with SHA-1 validation
//     assets/      : Asset index + object downloads
//     mirror/      : Mirror probing and selection
//     java/        : Build java provisioning + archive extraction
//     progress/    : Byte/step progress and windowed logs
//     profile/     : Profile model
//     state/       : Settings and shared application state

pub mod assets;
pub mod downloader;
pub mod error;
pub mod http;
pub mod installer;
pub mod java;
pub mod loaders;
pub mod maven;
pub mod mirror;
pub mod notify;
pub mod orchestrator;
pub mod platform;
pub mod profile;
pub mod progress;
pub mod state;
pub mod version;

#[cfg(test)]
pub(crate) mod test_support;
