mod catalog;
mod forge;
mod kind;
mod liteloader;
mod meta;
mod neoforge;
mod strategy;

pub use catalog::{select_build, BuildDescriptor, CatalogSet, InstallOptions, LoaderCatalog};
pub use forge::ForgeCatalog;
pub use kind::LoaderKind;
pub use liteloader::LiteLoaderCatalog;
pub use meta::MetaCatalog;
pub use neoforge::NeoForgeCatalog;
pub use strategy::{LoaderStrategy, RequestCache, StrategyContext};
