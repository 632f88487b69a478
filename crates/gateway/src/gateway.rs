//! The assembled gateway.

use std::fs;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::authorization::AuthorizationGate;
use crate::config::Config;
use crate::files::{FileService, FolderService, MimeTable};
use crate::resolver::{Resolver, Root};
use crate::sandbox::Sandbox;

/// File and folder services sharing one root and one authorization gate.
#[derive(Debug, Clone)]
pub struct Gateway {
    sandbox: Arc<Sandbox>,
    files: FileService,
    folders: FolderService,
}

impl Gateway {
    /// Create a gateway over `root`.
    ///
    /// The root directory must exist before the first operation.
    pub fn new(root: Root, gate: AuthorizationGate) -> Self {
        Self::from_sandbox(Arc::new(Sandbox::new(Resolver::new(root), gate)))
    }

    fn from_sandbox(sandbox: Arc<Sandbox>) -> Self {
        Self {
            files: FileService::new(Arc::clone(&sandbox)),
            folders: FolderService::new(Arc::clone(&sandbox)),
            sandbox,
        }
    }

    /// Build a gateway from configuration.
    ///
    /// Expands `~` in the root folder and creates it when `create_root` is
    /// set.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let root_path = config.io.resolved_root()?;

        if config.io.create_root && !root_path.exists() {
            fs::create_dir_all(&root_path).with_context(|| {
                format!("Failed to create root folder: {}", root_path.display())
            })?;
            info!("Created root folder {:?}", root_path);
        }

        let resolver = Resolver::new(Root::new(&root_path)?);
        let gate = AuthorizationGate::from_config(&config.authorization, &resolver)
            .context("Invalid authorization configuration")?;

        Ok(Self::from_sandbox(Arc::new(Sandbox::new(resolver, gate)))
            .with_mime_table(MimeTable::from_overrides(&config.mime.overrides))
            .with_max_upload_size(config.io.max_upload_size))
    }

    /// Replace the MIME table used for downloads.
    pub fn with_mime_table(mut self, mime: MimeTable) -> Self {
        self.files = self.files.with_mime_table(mime);
        self
    }

    /// Set the upload limit in bytes.
    pub fn with_max_upload_size(mut self, max_upload_size: u64) -> Self {
        self.files = self.files.with_max_upload_size(max_upload_size);
        self
    }

    /// File operations.
    pub fn files(&self) -> &FileService {
        &self.files
    }

    /// Folder operations.
    pub fn folders(&self) -> &FolderService {
        &self.folders
    }

    /// The path resolver.
    pub fn resolver(&self) -> &Resolver {
        self.sandbox.resolver()
    }

    /// The root every path is confined to.
    pub fn root(&self) -> &Root {
        self.sandbox.resolver().root()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::PermissionLevel;
    use crate::config::{AuthorizationMode, RuleConfig};
    use contracts::{Caller, GatewayError};
    use tempfile::TempDir;

    fn config_for(root: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.io.root_folder = root.to_string_lossy().to_string();
        config
    }

    #[test]
    fn test_from_config_creates_root() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("nested").join("root");
        let gateway = Gateway::from_config(&config_for(&root)).unwrap();

        assert!(root.is_dir());
        assert!(gateway
            .folders()
            .list_files("/", &Caller::anonymous())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_from_config_without_create_root() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("absent");
        let mut config = config_for(&root);
        config.io.create_root = false;

        let gateway = Gateway::from_config(&config).unwrap();
        assert!(!root.exists());
        assert!(gateway.folders().list_files("/", &Caller::anonymous()).is_err());
    }

    #[test]
    fn test_from_config_applies_limits_and_mime() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = config_for(temp_dir.path());
        config.io.max_upload_size = 3;
        config
            .mime
            .overrides
            .insert("log".to_string(), "text/x-log".to_string());
        let gateway = Gateway::from_config(&config).unwrap();
        let caller = Caller::anonymous();

        assert_eq!(gateway.files().max_upload_size(), 3);
        gateway.files().upload(&b"abc"[..], "/", "app.log", &caller).unwrap();
        assert_eq!(
            gateway.files().download("/app.log", &caller).unwrap().content_type,
            "text/x-log"
        );
    }

    #[test]
    fn test_from_config_path_rules() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("public")).unwrap();
        let mut config = config_for(temp_dir.path());
        config.authorization.mode = AuthorizationMode::PathRules;
        config.authorization.rules.push(RuleConfig {
            path: "/public".to_string(),
            level: PermissionLevel::ReadWrite,
            recursive: true,
        });
        let gateway = Gateway::from_config(&config).unwrap();
        let caller = Caller::anonymous();

        gateway.files().upload(&b"hi"[..], "/public", "a.txt", &caller).unwrap();
        assert!(matches!(
            gateway.files().upload(&b"hi"[..], "/", "a.txt", &caller),
            Err(GatewayError::AccessDenied)
        ));
    }

    #[test]
    fn test_root_accessor() {
        let temp_dir = TempDir::new().unwrap();
        let gateway = Gateway::new(
            Root::new(temp_dir.path()).unwrap(),
            AuthorizationGate::allow_all(),
        );
        assert!(gateway.root().as_str().ends_with('/'));
        assert!(gateway.resolver().is_root(temp_dir.path()));
    }
}
