mod probe;
mod resolver;

pub use probe::{MirrorProbe, NetworkProbe};
pub use resolver::{MirrorCandidate, MirrorResolver, MirrorTable, DEFAULT_MEASUREMENT_TTL};
