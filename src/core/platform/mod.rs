mod os;
mod target;

pub use os::{Arch, LibraryRule, OsContext, OsRule, Platform, RuleAction};
pub use target::{Target, TargetSet};
