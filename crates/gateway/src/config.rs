//! Configuration management for the FsGate gateway.
//!
//! This module provides TOML-based configuration file loading and saving.
//! The default configuration path is `~/.config/fsgate/config.toml`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::authorization::PermissionLevel;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("root_folder must not be empty")]
    EmptyRoot,

    #[error("root_folder must be absolute or start with '~/', got {0}")]
    RelativeRoot(String),

    #[error("max_upload_size must be greater than 0, got {0}")]
    InvalidMaxUploadSize(u64),

    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),

    #[error("authorization mode 'roles' requires at least one role")]
    MissingRoles,

    #[error("rule path must not contain '..' segments, got {0}")]
    InvalidRulePath(String),

    #[error("mime override for '{extension}' is not a MIME type: {mime}")]
    InvalidMimeType { extension: String, mime: String },

    #[error("cannot expand '~': home directory is unknown")]
    UnknownHomeDirectory,
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Main configuration structure for the FsGate gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Root folder and transfer limits.
    pub io: IoConfig,

    /// Authorization policy.
    pub authorization: AuthorizationConfig,

    /// Logging settings.
    pub logging: LoggingConfig,

    /// Content type lookup settings.
    pub mime: MimeConfig,
}

/// Root folder and transfer configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IoConfig {
    /// Directory every virtual path is confined to. `~` expands to the
    /// home directory.
    pub root_folder: String,

    /// Maximum upload size in bytes (default: 100MB).
    pub max_upload_size: u64,

    /// Create the root folder at startup when it is missing.
    pub create_root: bool,
}

/// Which authorization strategy guards the gateway.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AuthorizationMode {
    /// Everything is allowed.
    #[default]
    AllowAll,
    /// Callers must hold one of `roles`.
    Roles,
    /// Callers must hold the `root` role.
    RootOnly,
    /// Nothing is allowed.
    DenyAll,
    /// Per-path levels from `rules`, falling back to `default_level`.
    PathRules,
}

/// Authorization configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AuthorizationConfig {
    /// Strategy to use.
    pub mode: AuthorizationMode,

    /// Allowed roles for `mode = "roles"`.
    pub roles: Vec<String>,

    /// Level for paths no rule covers, for `mode = "path-rules"`.
    pub default_level: PermissionLevel,

    /// Per-path rules for `mode = "path-rules"`.
    pub rules: Vec<RuleConfig>,
}

/// A per-path rule as written in the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleConfig {
    /// Virtual path the rule applies to.
    pub path: String,

    /// Permission level granted.
    pub level: PermissionLevel,

    /// Whether the rule covers everything below `path`.
    #[serde(default = "default_recursive")]
    pub recursive: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,
}

/// Content type configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct MimeConfig {
    /// Extension (without dot) to MIME type overrides, applied on top of the
    /// built-in table.
    pub overrides: BTreeMap<String, String>,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            root_folder: "~/fsgate".to_string(),
            max_upload_size: 100 * 1024 * 1024, // 100MB
            create_root: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

fn default_recursive() -> bool {
    true
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fsgate")
        .join("config.toml")
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> Result<PathBuf, ConfigError> {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => return Ok(PathBuf::from(path)),
    };

    let home = dirs::home_dir().ok_or(ConfigError::UnknownHomeDirectory)?;
    if rest.is_empty() {
        Ok(home)
    } else {
        Ok(home.join(rest))
    }
}

impl IoConfig {
    /// The root folder with `~` expanded.
    pub fn resolved_root(&self) -> Result<PathBuf, ConfigError> {
        expand_home(&self.root_folder)
    }
}

impl Config {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Supported variables:
    /// - FSGATE_ROOT_FOLDER: Override the root folder
    /// - FSGATE_LOG_LEVEL: Override log level (trace, debug, info, warn, error)
    pub fn apply_env_overrides(&mut self) {
        if let Ok(root) = std::env::var("FSGATE_ROOT_FOLDER") {
            if !root.is_empty() {
                tracing::info!("Overriding root_folder from environment: {}", root);
                self.io.root_folder = root;
            }
        }

        if let Ok(level) = std::env::var("FSGATE_LOG_LEVEL") {
            if !level.is_empty() {
                tracing::info!("Overriding log_level from environment: {}", level);
                self.logging.log_level = level;
            }
        }
    }

    /// Validate the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let root = &self.io.root_folder;
        if root.is_empty() {
            return Err(ConfigError::EmptyRoot);
        }
        let home_relative = root == "~" || root.starts_with("~/");
        if !home_relative && !Path::new(root).is_absolute() {
            return Err(ConfigError::RelativeRoot(root.clone()));
        }

        if self.io.max_upload_size == 0 {
            return Err(ConfigError::InvalidMaxUploadSize(self.io.max_upload_size));
        }

        let level = self.logging.log_level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.logging.log_level.clone()));
        }

        if self.authorization.mode == AuthorizationMode::Roles && self.authorization.roles.is_empty()
        {
            return Err(ConfigError::MissingRoles);
        }

        for rule in &self.authorization.rules {
            if rule.path.split(['/', '\\']).any(|segment| segment == "..") {
                return Err(ConfigError::InvalidRulePath(rule.path.clone()));
            }
        }

        for (extension, mime) in &self.mime.overrides {
            if !mime.contains('/') {
                return Err(ConfigError::InvalidMimeType {
                    extension: extension.clone(),
                    mime: mime.clone(),
                });
            }
        }

        Ok(())
    }

    /// Load configuration from a file.
    ///
    /// If the file does not exist, returns the default configuration.
    /// If the file exists but is invalid TOML, returns an error with
    /// a helpful message.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self> {
        Self::load(default_config_path())
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| anyhow::anyhow!("Invalid TOML configuration: {}", format_toml_error(&e)))
    }

    /// Save configuration to a file.
    ///
    /// Creates parent directories if they don't exist.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = self.to_toml()?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::debug!("Configuration saved to {:?}", path);
        Ok(())
    }

    /// Save configuration to the default path.
    pub fn save_default(&self) -> Result<()> {
        self.save(default_config_path())
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }
}

/// Format a TOML deserialization error for user-friendly display.
fn format_toml_error(error: &toml::de::Error) -> String {
    let mut msg = error.message().to_string();

    if let Some(span) = error.span() {
        msg.push_str(&format!(" (at position {}..{})", span.start, span.end));
    }

    msg
}
