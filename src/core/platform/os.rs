// ─── OS Rule Context ───
// Evaluates Mojang-style allow/disallow rules against a target platform
// instead of the host the code runs on.

use serde::{Deserialize, Serialize};

/// Supported operating-system families, using Mojang rule names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Windows,
    Linux,
    Osx,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Windows, Platform::Linux, Platform::Osx];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Windows => "windows",
            Platform::Linux => "linux",
            Platform::Osx => "osx",
        }
    }

    /// Family of the host running this process, if supported.
    pub fn current() -> Option<Self> {
        match std::env::consts::OS {
            "windows" => Some(Platform::Windows),
            "linux" => Some(Platform::Linux),
            "macos" => Some(Platform::Osx),
            _ => None,
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "windows" => Some(Platform::Windows),
            "linux" => Some(Platform::Linux),
            "osx" | "macos" | "mac" => Some(Platform::Osx),
            _ => None,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    X86,
    X64,
    Arm64,
}

impl Arch {
    pub const ALL: [Arch; 3] = [Arch::X86, Arch::X64, Arch::Arm64];

    /// Architecture of the host running this process, if supported.
    pub fn current() -> Option<Self> {
        match std::env::consts::ARCH {
            "x86" => Some(Arch::X86),
            "x86_64" => Some(Arch::X64),
            "aarch64" => Some(Arch::Arm64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::X86 => "x86",
            Arch::X64 => "x64",
            Arch::Arm64 => "arm64",
        }
    }

    /// Value substituted for `${arch}` in native classifiers.
    pub fn bitness(&self) -> &'static str {
        match self {
            Arch::X86 => "32",
            Arch::X64 | Arch::Arm64 => "64",
        }
    }
}

impl std::fmt::Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Disallow,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct OsRule {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arch: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LibraryRule {
    pub action: RuleAction,
    #[serde(default)]
    pub os: Option<OsRule>,
}

/// The platform a target's rules are evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OsContext {
    pub platform: Platform,
    pub arch: Arch,
}

impl OsContext {
    pub fn new(platform: Platform, arch: Arch) -> Self {
        Self { platform, arch }
    }

    fn os_matches(&self, os: Option<&OsRule>) -> bool {
        let Some(os) = os else {
            return true;
        };
        let name_matches = match os.name.as_deref() {
            None => true,
            Some(name) => Platform::parse(name) == Some(self.platform),
        };
        let arch_matches = match os.arch.as_deref() {
            None => true,
            Some("x86") => self.arch == Arch::X86,
            Some("x86_64") | Some("x64") => self.arch == Arch::X64,
            Some("arm64") | Some("aarch64") => self.arch == Arch::Arm64,
            Some(_) => false,
        };
        name_matches && arch_matches
    }

    /// Mojang rule semantics:
    /// - no rules → allowed
    /// - start disallowed, last matching rule wins
    pub fn allows(&self, rules: Option<&[LibraryRule]>) -> bool {
        let Some(rules) = rules else {
            return true;
        };

        let mut allowed = false;
        for rule in rules {
            if self.os_matches(rule.os.as_ref()) {
                allowed = rule.action == RuleAction::Allow;
            }
        }
        allowed
    }

    /// Same evaluation for untyped rule arrays (argument objects).
    pub fn allows_json(&self, rules: &[serde_json::Value]) -> bool {
        let parsed: Vec<LibraryRule> = rules
            .iter()
            .filter_map(|rule| serde_json::from_value(rule.clone()).ok())
            .collect();
        // Feature rules (`features: {...}`) have no os block and are kept
        // only when they are plain allow rules.
        let has_feature_rule = rules.iter().any(|rule| rule.get("features").is_some());
        if has_feature_rule {
            return false;
        }
        self.allows(Some(&parsed))
    }

    /// Resolve a `natives` map entry (`"natives-${arch}"`) for this target.
    pub fn native_classifier(&self, natives: Option<&serde_json::Value>) -> Option<String> {
        let natives = natives?.as_object()?;
        natives
            .get(self.platform.as_str())?
            .as_str()
            .map(|classifier| classifier.replace("${arch}", self.arch.bitness()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(action: RuleAction, name: Option<&str>, arch: Option<&str>) -> LibraryRule {
        LibraryRule {
            action,
            os: if name.is_none() && arch.is_none() {
                None
            } else {
                Some(OsRule {
                    name: name.map(str::to_string),
                    arch: arch.map(str::to_string),
                })
            },
        }
    }

    #[test]
    fn no_rules_means_allowed() {
        let ctx = OsContext::new(Platform::Osx, Arch::Arm64);
        assert!(ctx.allows(None));
    }

    #[test]
    fn allow_only_matching_platform() {
        let rules = vec![rule(RuleAction::Allow, Some("osx"), None)];
        assert!(OsContext::new(Platform::Osx, Arch::X64).allows(Some(&rules)));
        assert!(!OsContext::new(Platform::Linux, Arch::X64).allows(Some(&rules)));
    }

    #[test]
    fn disallow_overrides_allow_all() {
        let rules = vec![
            rule(RuleAction::Allow, None, None),
            rule(RuleAction::Disallow, Some("windows"), None),
        ];
        assert!(!OsContext::new(Platform::Windows, Arch::X64).allows(Some(&rules)));
        assert!(OsContext::new(Platform::Linux, Arch::X64).allows(Some(&rules)));
    }

    #[test]
    fn arch_rule_targets_32_bit_only() {
        let rules = vec![
            rule(RuleAction::Allow, None, None),
            rule(RuleAction::Disallow, None, Some("x86")),
        ];
        assert!(!OsContext::new(Platform::Windows, Arch::X86).allows(Some(&rules)));
        assert!(OsContext::new(Platform::Windows, Arch::X64).allows(Some(&rules)));
    }

    #[test]
    fn native_classifier_substitutes_bitness() {
        let natives = serde_json::json!({
            "windows": "natives-windows-${arch}",
            "linux": "natives-linux"
        });
        let win32 = OsContext::new(Platform::Windows, Arch::X86);
        assert_eq!(
            win32.native_classifier(Some(&natives)).as_deref(),
            Some("natives-windows-32")
        );
        let osx = OsContext::new(Platform::Osx, Arch::X64);
        assert_eq!(osx.native_classifier(Some(&natives)), None);
    }

    #[test]
    fn feature_rules_are_dropped() {
        let rules = vec![serde_json::json!({
            "action": "allow",
            "features": {"is_demo_user": true}
        })];
        assert!(!OsContext::new(Platform::Linux, Arch::X64).allows_json(&rules));
    }
}
