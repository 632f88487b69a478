//! Folder listing, creation, deletion and moves.
//!
//! Listings are non-recursive and only ever return virtual paths. Links are
//! left out of listings entirely, and so are the metadata files that desktop
//! platforms scatter around shared folders.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use contracts::{AccessKind, Caller, GatewayError, Result};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::transfer::is_temp_file;
use crate::sandbox::{io_error, Sandbox};

/// File names created by operating systems rather than users.
const INCIDENTAL_FILES: &[&str] = &[".DS_Store", "Thumbs.db", "desktop.ini"];

fn is_incidental(name: &str) -> bool {
    INCIDENTAL_FILES.contains(&name) || name.starts_with("._") || is_temp_file(name)
}

/// Strip the trailing separator of a folder-form path.
fn bare(path: &Path) -> PathBuf {
    path.components().collect()
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Listing {
    Folders,
    Files,
}

/// Folder operations confined to the sandbox root.
#[derive(Debug, Clone)]
pub struct FolderService {
    sandbox: Arc<Sandbox>,
}

impl FolderService {
    /// Create a folder service.
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self { sandbox }
    }

    /// Immediate subfolders of `path`, sorted case-insensitively.
    pub fn list_folders(&self, path: &str, caller: &Caller) -> Result<Vec<String>> {
        self.list(path, caller, Listing::Folders)
    }

    /// Immediate files of `path`, sorted case-insensitively.
    pub fn list_files(&self, path: &str, caller: &Caller) -> Result<Vec<String>> {
        self.list(path, caller, Listing::Files)
    }

    fn list(&self, path: &str, caller: &Caller, listing: Listing) -> Result<Vec<String>> {
        let physical = self.sandbox.folder(path)?;
        let shown = self.sandbox.display(&physical);
        self.sandbox.require(&physical, caller, AccessKind::ReadFolder)?;

        if !physical.is_dir() {
            return Err(GatewayError::NotFound(shown));
        }

        let entries = fs::read_dir(&physical).map_err(|e| io_error(e, &shown))?;
        let mut results = Vec::new();

        for entry in entries {
            // Skip entries we can't read
            let Ok(entry) = entry else { continue };
            let Ok(file_type) = entry.file_type() else { continue };

            let name = entry.file_name().to_string_lossy().to_string();
            let wanted = match listing {
                Listing::Folders => file_type.is_dir(),
                Listing::Files => file_type.is_file() && !is_incidental(&name),
            };
            if !wanted {
                continue;
            }

            match self.sandbox.resolver().relativize(&entry.path()) {
                Ok(virtual_path) => results.push(virtual_path),
                Err(e) => debug!(error = %e, "Skipping entry that does not map back to the root"),
            }
        }

        results.sort_by_key(|p| p.to_lowercase());
        Ok(results)
    }

    /// Create a single folder. The parent must exist.
    pub fn create_folder(&self, path: &str, caller: &Caller) -> Result<()> {
        let physical = self.sandbox.folder(path)?;
        let shown = self.sandbox.display(&physical);
        self.sandbox.require(&physical, caller, AccessKind::WriteFolder)?;

        let target = bare(&physical);
        if fs::symlink_metadata(&target).is_ok() {
            return Err(GatewayError::AlreadyExists(shown));
        }
        self.require_parent(&target)?;

        fs::create_dir(&target).map_err(|e| io_error(e, &shown))?;

        info!(path = %shown, identity = %caller.identity, "Folder created");
        Ok(())
    }

    /// Delete a folder and everything below it.
    pub fn delete_folder(&self, path: &str, caller: &Caller) -> Result<()> {
        let physical = self.sandbox.folder(path)?;
        let shown = self.sandbox.display(&physical);
        if self.sandbox.resolver().is_root(&physical) {
            return Err(GatewayError::InvalidPath("the root folder cannot be deleted".to_string()));
        }
        self.sandbox.require(&physical, caller, AccessKind::DeleteFolder)?;

        let target = bare(&physical);
        if !target.is_dir() {
            return Err(GatewayError::NotFound(shown));
        }

        fs::remove_dir_all(&target).map_err(|e| io_error(e, &shown))?;

        info!(path = %shown, identity = %caller.identity, "Folder deleted");
        Ok(())
    }

    /// Move a folder tree to a new location, which must not exist yet.
    pub fn move_folder(&self, src: &str, dst: &str, caller: &Caller) -> Result<()> {
        let source = self.sandbox.folder(src)?;
        let target = self.sandbox.folder(dst)?;
        let (src_shown, dst_shown) = (self.sandbox.display(&source), self.sandbox.display(&target));

        if self.sandbox.resolver().is_root(&source) {
            return Err(GatewayError::InvalidPath("the root folder cannot be moved".to_string()));
        }
        if target.starts_with(&source) {
            return Err(GatewayError::InvalidPath(format!(
                "cannot move {} into itself",
                src_shown
            )));
        }

        self.sandbox.require(&source, caller, AccessKind::ReadFolder)?;
        self.sandbox.require(&source, caller, AccessKind::DeleteFolder)?;
        if !source.is_dir() {
            return Err(GatewayError::NotFound(src_shown));
        }

        self.sandbox.require(&target, caller, AccessKind::WriteFolder)?;
        let (source, target) = (bare(&source), bare(&target));
        if fs::symlink_metadata(&target).is_ok() {
            return Err(GatewayError::AlreadyExists(dst_shown));
        }
        self.require_parent(&target)?;

        match fs::rename(&source, &target) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                debug!(from = %src_shown, to = %dst_shown, "Rename crosses devices, copying tree");
                if let Err(e) = copy_tree(&source, &target) {
                    if let Err(cleanup) = fs::remove_dir_all(&target) {
                        warn!(path = %dst_shown, error = %cleanup, "Failed to cleanup partial folder copy");
                    }
                    return Err(io_error(e, &src_shown));
                }
                fs::remove_dir_all(&source).map_err(|e| io_error(e, &src_shown))?;
            }
            Err(e) => return Err(io_error(e, &src_shown)),
        }

        info!(from = %src_shown, to = %dst_shown, identity = %caller.identity, "Folder moved");
        Ok(())
    }

    /// Whether `path` is an existing folder. Absence is not an error.
    pub fn folder_exists(&self, path: &str, caller: &Caller) -> Result<bool> {
        let physical = self.sandbox.folder(path)?;
        self.sandbox.require(&physical, caller, AccessKind::ReadFolder)?;
        Ok(physical.is_dir())
    }

    /// Whether `path` is an existing file. Absence is not an error.
    pub fn file_exists(&self, path: &str, caller: &Caller) -> Result<bool> {
        let physical = self.sandbox.file(path)?;
        self.sandbox.require(&physical, caller, AccessKind::ReadFile)?;
        Ok(physical.is_file())
    }

    fn require_parent(&self, target: &Path) -> Result<()> {
        match target.parent() {
            Some(parent) if parent.is_dir() => Ok(()),
            Some(parent) => Err(GatewayError::NotFound(format!(
                "directory {}",
                self.sandbox.display(parent)
            ))),
            None => Err(GatewayError::InvalidPath(self.sandbox.display(target))),
        }
    }
}

/// Recursively copy a folder tree. Links are recreated as links with the
/// same target.
fn copy_tree(source: &Path, target: &Path) -> io::Result<()> {
    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry?;
        let relative = entry.path().strip_prefix(source).map_err(io::Error::other)?;
        let destination = target.join(relative);

        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&destination)?;
        } else if file_type.is_file() {
            fs::copy(entry.path(), &destination)?;
        } else if file_type.is_symlink() {
            copy_link(entry.path(), &destination)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_link(source: &Path, destination: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(fs::read_link(source)?, destination)
}

#[cfg(not(unix))]
fn copy_link(source: &Path, _destination: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        format!("cannot copy link {}", source.display()),
    ))
}
