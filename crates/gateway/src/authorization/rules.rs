//! Per-path permission rules.
//!
//! Rules attach a [`PermissionLevel`] to a subtree (or a single entry) of the
//! root. The most specific matching rule decides; paths no rule covers fall
//! back to the default level. Rules are matched lexically against the
//! physical paths the gateway hands to the authorizer, which are already
//! confined to the root.

use std::path::{Path, PathBuf};

use contracts::{AccessKind, AccessRequest, Authorize, GatewayError, Result};
use serde::{Deserialize, Serialize};

use crate::config::AuthorizationConfig;
use crate::resolver::Resolver;

/// Permission level for a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PermissionLevel {
    /// No access.
    #[default]
    None,
    /// Read-only access (list folders, download files, existence queries).
    Read,
    /// Read and write access (also upload files, create folders).
    ReadWrite,
    /// Full access (also delete and move away).
    Full,
}

impl PermissionLevel {
    /// Check if this level allows reading.
    pub fn can_read(&self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite | Self::Full)
    }

    /// Check if this level allows writing.
    pub fn can_write(&self) -> bool {
        matches!(self, Self::ReadWrite | Self::Full)
    }

    /// Check if this level allows deleting.
    pub fn can_delete(&self) -> bool {
        matches!(self, Self::Full)
    }

    /// Check if this level grants `kind`.
    pub fn allows(&self, kind: AccessKind) -> bool {
        if kind.is_read() {
            self.can_read()
        } else if kind.is_write() {
            self.can_write()
        } else {
            self.can_delete()
        }
    }
}

/// A single rule, already resolved to a physical path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRule {
    /// The physical path this rule applies to.
    pub path: PathBuf,
    /// The permission level.
    pub level: PermissionLevel,
    /// Whether this rule applies to everything below `path` as well.
    pub recursive: bool,
}

impl PathRule {
    /// Create a new rule.
    pub fn new(path: impl Into<PathBuf>, level: PermissionLevel, recursive: bool) -> Self {
        Self {
            path: path.into(),
            level,
            recursive,
        }
    }

    /// Create a recursive read-only rule.
    pub fn read_only(path: impl Into<PathBuf>) -> Self {
        Self::new(path, PermissionLevel::Read, true)
    }

    /// Create a recursive read-write rule.
    pub fn read_write(path: impl Into<PathBuf>) -> Self {
        Self::new(path, PermissionLevel::ReadWrite, true)
    }

    /// Create a recursive full access rule.
    pub fn full_access(path: impl Into<PathBuf>) -> Self {
        Self::new(path, PermissionLevel::Full, true)
    }

    fn matches(&self, path: &Path) -> bool {
        if self.recursive {
            path.starts_with(&self.path)
        } else {
            path == self.path.as_path()
        }
    }
}

/// Authorizer granting access according to per-path rules.
#[derive(Debug, Clone, Default)]
pub struct PathRules {
    rules: Vec<PathRule>,
    default_level: PermissionLevel,
}

impl PathRules {
    /// Create an empty rule set. Everything gets `default_level`.
    pub fn new(default_level: PermissionLevel) -> Self {
        Self {
            rules: Vec::new(),
            default_level,
        }
    }

    /// Build rules from configuration, resolving virtual rule paths.
    pub fn from_config(config: &AuthorizationConfig, resolver: &Resolver) -> Result<Self> {
        let mut rules = Self::new(config.default_level);
        for rule in &config.rules {
            let physical = resolver.resolve_folder(&rule.path).map_err(|_| {
                GatewayError::InvalidPath(format!("authorization rule path '{}'", rule.path))
            })?;
            rules.add_rule(PathRule::new(physical, rule.level, rule.recursive));
        }
        Ok(rules)
    }

    /// Add a rule.
    pub fn add_rule(&mut self, rule: PathRule) {
        self.rules.push(rule);
    }

    /// Add a rule, builder style.
    pub fn with_rule(mut self, rule: PathRule) -> Self {
        self.add_rule(rule);
        self
    }

    /// Set the default permission level.
    pub fn set_default_level(&mut self, level: PermissionLevel) {
        self.default_level = level;
    }

    /// The configured rules.
    pub fn rules(&self) -> &[PathRule] {
        &self.rules
    }

    /// Get the permission level for a specific path.
    ///
    /// Returns the level of the most specific matching rule.
    pub fn get_permission(&self, path: &Path) -> PermissionLevel {
        self.rules
            .iter()
            .filter(|rule| rule.matches(path))
            .max_by_key(|rule| rule.path.components().count())
            .map(|rule| rule.level)
            .unwrap_or(self.default_level)
    }
}

impl Authorize for PathRules {
    fn authorize(&self, request: &AccessRequest<'_>) -> anyhow::Result<bool> {
        Ok(self.get_permission(request.path).allows(request.kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleConfig;
    use crate::resolver::Root;
    use contracts::Caller;

    #[test]
    fn test_permission_level_checks() {
        assert!(!PermissionLevel::None.can_read());
        assert!(!PermissionLevel::None.can_write());
        assert!(!PermissionLevel::None.can_delete());

        assert!(PermissionLevel::Read.can_read());
        assert!(!PermissionLevel::Read.can_write());
        assert!(!PermissionLevel::Read.can_delete());

        assert!(PermissionLevel::ReadWrite.can_read());
        assert!(PermissionLevel::ReadWrite.can_write());
        assert!(!PermissionLevel::ReadWrite.can_delete());

        assert!(PermissionLevel::Full.can_read());
        assert!(PermissionLevel::Full.can_write());
        assert!(PermissionLevel::Full.can_delete());
    }

    #[test]
    fn test_permission_level_allows_kinds() {
        assert!(PermissionLevel::Read.allows(AccessKind::ReadFolder));
        assert!(!PermissionLevel::Read.allows(AccessKind::WriteFile));
        assert!(PermissionLevel::ReadWrite.allows(AccessKind::WriteFolder));
        assert!(!PermissionLevel::ReadWrite.allows(AccessKind::DeleteFile));
        assert!(PermissionLevel::Full.allows(AccessKind::DeleteFolder));
    }

    #[test]
    fn test_default_level_applies_without_rules() {
        let rules = PathRules::new(PermissionLevel::Read);
        assert_eq!(
            rules.get_permission(Path::new("/srv/files/a.txt")),
            PermissionLevel::Read
        );
        assert_eq!(PathRules::default().get_permission(Path::new("/x")), PermissionLevel::None);
    }

    #[test]
    fn test_recursive_rule() {
        let rules = PathRules::new(PermissionLevel::None)
            .with_rule(PathRule::read_write("/srv/files/uploads/"));

        assert_eq!(
            rules.get_permission(Path::new("/srv/files/uploads/deep/nested.txt")),
            PermissionLevel::ReadWrite
        );
        assert_eq!(
            rules.get_permission(Path::new("/srv/files/other.txt")),
            PermissionLevel::None
        );
        // Component-wise match, not a string prefix
        assert_eq!(
            rules.get_permission(Path::new("/srv/files/uploads-old/a.txt")),
            PermissionLevel::None
        );
    }

    #[test]
    fn test_non_recursive_rule() {
        let rules = PathRules::new(PermissionLevel::None).with_rule(PathRule::new(
            "/srv/files/inbox/",
            PermissionLevel::Read,
            false,
        ));

        // Folder form and bare form of the same path both match
        assert!(rules.get_permission(Path::new("/srv/files/inbox/")).can_read());
        assert!(rules.get_permission(Path::new("/srv/files/inbox")).can_read());
        assert!(!rules
            .get_permission(Path::new("/srv/files/inbox/mail.txt"))
            .can_read());
    }

    #[test]
    fn test_most_specific_wins() {
        let rules = PathRules::new(PermissionLevel::None)
            .with_rule(PathRule::full_access("/srv/files/"))
            .with_rule(PathRule::read_only("/srv/files/restricted/"));

        let normal = Path::new("/srv/files/normal.txt");
        assert!(rules.get_permission(normal).can_delete());

        let restricted = Path::new("/srv/files/restricted/secret.txt");
        assert!(rules.get_permission(restricted).can_read());
        assert!(!rules.get_permission(restricted).can_write());
    }

    #[test]
    fn test_authorize_uses_kind() {
        let rules = PathRules::new(PermissionLevel::None).with_rule(PathRule::read_only("/srv/files/"));
        let caller = Caller::anonymous();
        let path = Path::new("/srv/files/a.txt");

        let read = AccessRequest::new(path, &caller, AccessKind::ReadFile);
        let write = AccessRequest::new(path, &caller, AccessKind::WriteFile);
        assert!(rules.authorize(&read).unwrap());
        assert!(!rules.authorize(&write).unwrap());
    }

    #[test]
    fn test_from_config_resolves_virtual_paths() {
        let resolver = Resolver::new(Root::new("/srv/files").unwrap());
        let config = AuthorizationConfig {
            default_level: PermissionLevel::Read,
            rules: vec![RuleConfig {
                path: "/public".to_string(),
                level: PermissionLevel::Full,
                recursive: true,
            }],
            ..Default::default()
        };

        let rules = PathRules::from_config(&config, &resolver).unwrap();
        assert_eq!(rules.rules().len(), 1);
        assert_eq!(rules.rules()[0].path, PathBuf::from("/srv/files/public/"));
        assert!(rules
            .get_permission(Path::new("/srv/files/public/a.txt"))
            .can_delete());
        assert_eq!(
            rules.get_permission(Path::new("/srv/files/private/a.txt")),
            PermissionLevel::Read
        );
    }

    #[test]
    fn test_from_config_rejects_traversal() {
        let resolver = Resolver::new(Root::new("/srv/files").unwrap());
        let config = AuthorizationConfig {
            rules: vec![RuleConfig {
                path: "/../etc".to_string(),
                level: PermissionLevel::Full,
                recursive: true,
            }],
            ..Default::default()
        };

        assert!(matches!(
            PathRules::from_config(&config, &resolver),
            Err(GatewayError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_permission_level_serialization() {
        let json = serde_json::to_string(&PermissionLevel::ReadWrite).unwrap();
        assert_eq!(json, "\"read-write\"");

        let restored: PermissionLevel = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, PermissionLevel::ReadWrite);
    }
}
