//! Virtual path translation confined to a single root directory.
//!
//! Callers address everything through `/`-separated virtual paths that are
//! always interpreted relative to the [`Root`]. The [`Resolver`] turns them
//! into physical paths, refuses anything that would climb out of the root,
//! and maps physical paths back for output so physical locations never leave
//! the gateway.
//!
//! # Security
//!
//! Resolution is lexical: any `..` segment is rejected outright. Links are
//! handled separately by [`Resolver::confine`], which canonicalizes the
//! nearest existing ancestor and verifies it still lives under the root.

use std::fs;
use std::path::{is_separator, Path, PathBuf};

use contracts::{GatewayError, Result};

/// Separator appended to folder-form paths.
const SEPARATOR: char = '/';

/// The physical directory every virtual path is confined to.
///
/// Stored as an absolute path string that always ends with exactly one
/// separator, so concatenating a relative remainder never needs a join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Root {
    path: String,
}

impl Root {
    /// Create a root from an absolute directory path.
    ///
    /// The directory does not need to exist yet.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = path
            .to_str()
            .ok_or_else(|| GatewayError::InvalidPath("root is not valid UTF-8".to_string()))?;

        if raw.is_empty() || !path.is_absolute() {
            return Err(GatewayError::InvalidPath(format!(
                "root must be an absolute path, got '{}'",
                raw
            )));
        }

        let mut normalized = raw.trim_end_matches(is_separator).to_string();
        normalized.push(SEPARATOR);
        Ok(Self { path: normalized })
    }

    /// The root as a path, with its trailing separator.
    pub fn as_path(&self) -> &Path {
        Path::new(&self.path)
    }

    /// The root as a string, with its trailing separator.
    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// The root without its trailing separator (`/` stays `/`).
    fn trimmed(&self) -> &str {
        let trimmed = self.path.trim_end_matches(is_separator);
        if trimmed.is_empty() {
            &self.path
        } else {
            trimmed
        }
    }
}

/// Normalize a folder path to end with exactly one trailing separator.
///
/// Idempotent: `normalize_folder(&normalize_folder(p)) == normalize_folder(p)`.
pub fn normalize_folder(path: &str) -> String {
    let mut folder = path.trim_end_matches(SEPARATOR).to_string();
    folder.push(SEPARATOR);
    folder
}

/// Check a virtual path for segments that could climb out of the root.
fn validate_virtual(virtual_path: &str) -> Result<()> {
    if virtual_path.contains('\0') {
        return Err(GatewayError::InvalidPath(
            "path contains a NUL byte".to_string(),
        ));
    }

    // Backslash counts as a separator here even on Unix, so `..\` cannot
    // sneak through on a platform that honours it.
    if virtual_path.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(GatewayError::InvalidPath(virtual_path.to_string()));
    }

    Ok(())
}

/// Maps virtual paths onto a [`Root`] and back.
#[derive(Debug, Clone)]
pub struct Resolver {
    root: Root,
}

impl Resolver {
    /// Create a resolver for the given root.
    pub fn new(root: Root) -> Self {
        Self { root }
    }

    /// The configured root.
    pub fn root(&self) -> &Root {
        &self.root
    }

    /// Resolve a virtual path to a physical path under the root.
    ///
    /// A leading `/` is optional. In folder form the result always ends with
    /// a single separator. Fails with [`GatewayError::InvalidPath`] when the
    /// path contains a traversal segment.
    pub fn resolve(&self, virtual_path: &str, is_folder: bool) -> Result<PathBuf> {
        validate_virtual(virtual_path)?;

        let relative = virtual_path.trim_start_matches(SEPARATOR);
        let mut physical = String::with_capacity(self.root.path.len() + relative.len() + 1);
        physical.push_str(&self.root.path);
        physical.push_str(relative);

        if is_folder {
            physical = normalize_folder(&physical);
        }

        Ok(PathBuf::from(physical))
    }

    /// Resolve a virtual path naming a file.
    pub fn resolve_file(&self, virtual_path: &str) -> Result<PathBuf> {
        self.resolve(virtual_path, false)
    }

    /// Resolve a virtual path naming a folder.
    pub fn resolve_folder(&self, virtual_path: &str) -> Result<PathBuf> {
        self.resolve(virtual_path, true)
    }

    /// Map a physical path back to its virtual form (`/` + remainder).
    ///
    /// Fails with [`GatewayError::InvalidPath`] when the path is not under the
    /// root. The error message never repeats the physical path.
    pub fn relativize(&self, physical: &Path) -> Result<String> {
        let raw = physical
            .to_str()
            .ok_or_else(|| GatewayError::InvalidPath("path is not valid UTF-8".to_string()))?;

        if raw == self.root.trimmed() {
            return Ok(SEPARATOR.to_string());
        }

        let remainder = raw.strip_prefix(self.root.as_str()).ok_or_else(|| {
            GatewayError::InvalidPath("path is outside the root".to_string())
        })?;

        let remainder = if cfg!(windows) {
            remainder.replace('\\', "/")
        } else {
            remainder.to_string()
        };

        Ok(format!("{}{}", SEPARATOR, remainder))
    }

    /// Whether `physical` denotes the root itself.
    pub fn is_root(&self, physical: &Path) -> bool {
        physical
            .to_str()
            .map(|raw| {
                raw.trim_end_matches(is_separator) == self.root.path.trim_end_matches(is_separator)
            })
            .unwrap_or(false)
    }

    /// Verify that following links from `physical` does not leave the root.
    ///
    /// Walks up to the nearest existing ancestor (the path itself when it
    /// exists), canonicalizes it and checks it against the canonical root.
    pub fn confine(&self, physical: &Path) -> Result<()> {
        let canonical_root = fs::canonicalize(self.root.as_path())?;

        let mut ancestor = physical;
        loop {
            match fs::symlink_metadata(ancestor) {
                Ok(_) => break,
                // A file in the middle of the path reports NotADirectory
                Err(e)
                    if matches!(
                        e.kind(),
                        std::io::ErrorKind::NotFound | std::io::ErrorKind::NotADirectory
                    ) =>
                {
                    match ancestor.parent() {
                        Some(parent) => ancestor = parent,
                        None => return Ok(()),
                    }
                }
                Err(e) => return Err(GatewayError::Io(e)),
            }
        }

        let escaped = || {
            let shown = self
                .relativize(physical)
                .unwrap_or_else(|_| "path".to_string());
            GatewayError::InvalidPath(format!("{} escapes the root", shown))
        };

        // A dangling link cannot be canonicalized; refuse it rather than guess.
        let canonical = fs::canonicalize(ancestor).map_err(|_| escaped())?;
        if canonical.starts_with(&canonical_root) {
            Ok(())
        } else {
            Err(escaped())
        }
    }
}
