mod extract;
mod provisioner;

pub use extract::{extract_archive, ArchiveFormat};
pub use provisioner::BuildJavaProvisioner;
