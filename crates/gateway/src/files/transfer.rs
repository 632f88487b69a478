//! File download, upload, delete, copy and move.
//!
//! Writes never land partially: content is streamed into a hidden temp file
//! next to the destination and renamed over it once complete. Temp files are
//! removed on every failure path.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::Path;
use std::sync::Arc;

use contracts::{AccessKind, Caller, GatewayError, Result};
use tracing::{debug, info, warn};

use super::mime::MimeTable;
use crate::resolver::normalize_folder;
use crate::sandbox::{io_error, Sandbox};

/// Default buffer size for streaming transfers (64KB).
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Default upload limit (100MB).
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 100 * 1024 * 1024;

const TEMP_PREFIX: &str = ".fsgate-";
const TEMP_SUFFIX: &str = ".tmp";

/// Whether `name` is one of the gateway's in-flight temp files.
pub(crate) fn is_temp_file(name: &str) -> bool {
    name.starts_with(TEMP_PREFIX) && name.ends_with(TEMP_SUFFIX)
}

fn temp_file_name() -> String {
    format!("{}{:016x}{}", TEMP_PREFIX, rand::random::<u64>(), TEMP_SUFFIX)
}

/// An open file ready to be streamed to the caller.
#[derive(Debug)]
pub struct Download {
    file: File,
    /// MIME type derived from the file name.
    pub content_type: String,
    /// Final path component.
    pub file_name: String,
    /// Size in bytes when the file was opened.
    pub size: u64,
    /// Virtual path of the file.
    pub path: String,
}

impl Download {
    /// Stream the whole file into `writer`.
    pub fn copy_to<W: Write + ?Sized>(&mut self, writer: &mut W) -> Result<u64> {
        let mut reader = BufReader::with_capacity(DEFAULT_CHUNK_SIZE, &mut self.file);
        Ok(io::copy(&mut reader, writer)?)
    }

    /// Read the remaining content into memory.
    pub fn into_bytes(mut self) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(self.size as usize);
        self.file.read_to_end(&mut buffer)?;
        Ok(buffer)
    }
}

impl Read for Download {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

/// File operations confined to the sandbox root.
#[derive(Debug, Clone)]
pub struct FileService {
    sandbox: Arc<Sandbox>,
    mime: MimeTable,
    max_upload_size: u64,
}

impl FileService {
    /// Create a file service with the default MIME table and upload limit.
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self {
            sandbox,
            mime: MimeTable::new(),
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
        }
    }

    /// Replace the MIME table.
    pub fn with_mime_table(mut self, mime: MimeTable) -> Self {
        self.mime = mime;
        self
    }

    /// Set the upload limit in bytes.
    pub fn with_max_upload_size(mut self, max_upload_size: u64) -> Self {
        self.max_upload_size = max_upload_size;
        self
    }

    /// The configured upload limit.
    pub fn max_upload_size(&self) -> u64 {
        self.max_upload_size
    }

    /// Open a file for reading.
    pub fn download(&self, path: &str, caller: &Caller) -> Result<Download> {
        let physical = self.sandbox.file(path)?;
        let shown = self.sandbox.display(&physical);
        self.sandbox.require(&physical, caller, AccessKind::ReadFile)?;

        let metadata = fs::metadata(&physical).map_err(|e| io_error(e, &shown))?;
        if !metadata.is_file() {
            return Err(GatewayError::NotFound(shown));
        }

        let file = File::open(&physical).map_err(|e| io_error(e, &shown))?;
        let file_name = physical
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        debug!(path = %shown, identity = %caller.identity, size = metadata.len(), "Download opened");

        Ok(Download {
            file,
            content_type: self.mime.content_type(&file_name),
            file_name,
            size: metadata.len(),
            path: shown,
        })
    }

    /// Store `content` as `file_name` inside `folder`, replacing an existing
    /// file. Returns the virtual path written.
    ///
    /// Empty content is rejected before the path is even looked at. The
    /// destination folder must already exist.
    pub fn upload<R: Read>(
        &self,
        content: R,
        folder: &str,
        file_name: &str,
        caller: &Caller,
    ) -> Result<String> {
        let mut reader = BufReader::with_capacity(DEFAULT_CHUNK_SIZE, content);
        if reader.fill_buf()?.is_empty() {
            return Err(GatewayError::EmptyPayload(file_name.to_string()));
        }

        validate_file_name(file_name)?;
        let virtual_path = format!("{}{}", normalize_folder(folder), file_name);
        let target = self.sandbox.file(&virtual_path)?;
        let shown = self.sandbox.display(&target);

        self.prepare_destination(&target, &shown, caller)?;

        let written = self.write_atomically(reader, &target, Some(self.max_upload_size))?;

        info!(path = %shown, identity = %caller.identity, bytes = written, "File uploaded");
        Ok(shown)
    }

    /// Remove a file.
    pub fn delete(&self, path: &str, caller: &Caller) -> Result<()> {
        let physical = self.sandbox.file(path)?;
        let shown = self.sandbox.display(&physical);
        self.sandbox.require(&physical, caller, AccessKind::DeleteFile)?;

        if !physical.is_file() {
            return Err(GatewayError::NotFound(shown));
        }

        fs::remove_file(&physical).map_err(|e| io_error(e, &shown))?;

        info!(path = %shown, identity = %caller.identity, "File deleted");
        Ok(())
    }

    /// Copy `src` to `dst`, replacing an existing destination file.
    pub fn copy(&self, src: &str, dst: &str, caller: &Caller) -> Result<()> {
        let source = self.sandbox.file(src)?;
        let target = self.sandbox.file(dst)?;
        let (src_shown, dst_shown) = (self.sandbox.display(&source), self.sandbox.display(&target));

        self.sandbox.require(&source, caller, AccessKind::ReadFile)?;
        if !source.is_file() {
            return Err(GatewayError::NotFound(src_shown));
        }
        self.prepare_destination(&target, &dst_shown, caller)?;

        let written = self.copy_contents(&source, &src_shown, &target)?;

        info!(
            from = %src_shown,
            to = %dst_shown,
            identity = %caller.identity,
            bytes = written,
            "File copied"
        );
        Ok(())
    }

    /// Move `src` to `dst`, replacing an existing destination file.
    ///
    /// Uses a rename; across filesystems it falls back to copy then delete.
    pub fn r#move(&self, src: &str, dst: &str, caller: &Caller) -> Result<()> {
        let source = self.sandbox.file(src)?;
        let target = self.sandbox.file(dst)?;
        let (src_shown, dst_shown) = (self.sandbox.display(&source), self.sandbox.display(&target));

        self.sandbox.require(&source, caller, AccessKind::ReadFile)?;
        self.sandbox.require(&source, caller, AccessKind::DeleteFile)?;
        if !source.is_file() {
            return Err(GatewayError::NotFound(src_shown));
        }
        self.prepare_destination(&target, &dst_shown, caller)?;

        match fs::rename(&source, &target) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                debug!(from = %src_shown, to = %dst_shown, "Rename crosses devices, copying");
                self.copy_contents(&source, &src_shown, &target)?;
                fs::remove_file(&source).map_err(|e| io_error(e, &src_shown))?;
            }
            Err(e) => return Err(io_error(e, &src_shown)),
        }

        info!(from = %src_shown, to = %dst_shown, identity = %caller.identity, "File moved");
        Ok(())
    }

    /// Authorize and check a file about to be written.
    ///
    /// Requires WriteFile on the target, an existing parent folder, and
    /// DeleteFile when a file is about to be replaced.
    fn prepare_destination(&self, target: &Path, shown: &str, caller: &Caller) -> Result<()> {
        self.sandbox.require(target, caller, AccessKind::WriteFile)?;

        let parent = target
            .parent()
            .ok_or_else(|| GatewayError::InvalidPath(shown.to_string()))?;
        if !parent.is_dir() {
            return Err(GatewayError::NotFound(format!(
                "directory {}",
                self.sandbox.display(parent)
            )));
        }

        match fs::symlink_metadata(target) {
            Ok(metadata) if metadata.is_dir() => {
                Err(GatewayError::AlreadyExists(format!("{} is a folder", shown)))
            }
            Ok(_) => self.sandbox.require(target, caller, AccessKind::DeleteFile),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(GatewayError::Io(e)),
        }
    }

    fn copy_contents(&self, source: &Path, src_shown: &str, target: &Path) -> Result<u64> {
        let reader = File::open(source).map_err(|e| io_error(e, src_shown))?;
        self.write_atomically(BufReader::with_capacity(DEFAULT_CHUNK_SIZE, reader), target, None)
    }

    /// Stream `source` into a temp file beside `target`, then rename it over
    /// `target`. Returns the bytes written.
    fn write_atomically<R: Read>(&self, source: R, target: &Path, limit: Option<u64>) -> Result<u64> {
        let dir = target
            .parent()
            .ok_or_else(|| GatewayError::InvalidPath("destination has no parent".to_string()))?;
        let temp_path = dir.join(temp_file_name());

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)?;

        let outcome = fill_temp_file(file, source, limit).and_then(|written| {
            fs::rename(&temp_path, target)?;
            Ok(written)
        });

        if outcome.is_err() {
            discard_temp_file(&temp_path);
        }
        outcome
    }
}

/// Copy `source` into `file`, enforcing `limit`, and flush to disk.
fn fill_temp_file<R: Read>(mut file: File, mut source: R, limit: Option<u64>) -> Result<u64> {
    let written = match limit {
        Some(limit) => {
            let mut bounded = (&mut source).take(limit.saturating_add(1));
            let written = io::copy(&mut bounded, &mut file)?;
            if written > limit {
                return Err(GatewayError::PayloadTooLarge {
                    size: written,
                    limit,
                });
            }
            written
        }
        None => io::copy(&mut source, &mut file)?,
    };

    file.sync_all()?;
    Ok(written)
}

fn discard_temp_file(temp_path: &Path) {
    if let Err(e) = fs::remove_file(temp_path) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!(path = ?temp_path, error = %e, "Failed to cleanup temp file");
        }
    }
}

/// Reject names that are not a single path component.
fn validate_file_name(file_name: &str) -> Result<()> {
    if file_name.is_empty()
        || file_name == "."
        || file_name == ".."
        || file_name.contains(['/', '\\', '\0'])
    {
        return Err(GatewayError::InvalidPath(format!(
            "invalid file name '{}'",
            file_name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::{AuthorizationGate, PathRule, PathRules, PermissionLevel};
    use crate::resolver::{Resolver, Root};
    use tempfile::TempDir;

    fn service(dir: &TempDir, gate: AuthorizationGate) -> FileService {
        let sandbox = Sandbox::new(Resolver::new(Root::new(dir.path()).unwrap()), gate);
        FileService::new(Arc::new(sandbox))
    }

    fn caller() -> Caller {
        Caller::new("alice", ["editor"])
    }

    fn read_file(dir: &TempDir, name: &str) -> Vec<u8> {
        fs::read(dir.path().join(name)).unwrap()
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_upload_then_download() {
        let temp_dir = TempDir::new().unwrap();
        let files = service(&temp_dir, AuthorizationGate::allow_all());

        let written = files.upload(&b"Hello, World!"[..], "/", "hello.txt", &caller()).unwrap();
        assert_eq!(written, "/hello.txt");

        let download = files.download("/hello.txt", &caller()).unwrap();
        assert_eq!(download.file_name, "hello.txt");
        assert_eq!(download.content_type, "text/plain");
        assert_eq!(download.size, 13);
        assert_eq!(download.path, "/hello.txt");
        assert_eq!(download.into_bytes().unwrap(), b"Hello, World!");
    }

    #[test]
    fn test_download_copy_to() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("script.hl"), "print 1").unwrap();
        let files = service(&temp_dir, AuthorizationGate::allow_all());

        let mut download = files.download("script.hl", &caller()).unwrap();
        assert_eq!(download.content_type, "text/plain");

        let mut out = Vec::new();
        assert_eq!(download.copy_to(&mut out).unwrap(), 7);
        assert_eq!(out, b"print 1");
    }

    #[test]
    fn test_download_missing_and_folder() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("docs")).unwrap();
        let files = service(&temp_dir, AuthorizationGate::allow_all());

        assert!(matches!(
            files.download("/missing.txt", &caller()),
            Err(GatewayError::NotFound(p)) if p == "/missing.txt"
        ));
        assert!(matches!(
            files.download("/docs", &caller()),
            Err(GatewayError::NotFound(_))
        ));
    }

    #[test]
    fn test_upload_empty_payload() {
        let temp_dir = TempDir::new().unwrap();
        let files = service(&temp_dir, AuthorizationGate::allow_all());

        // Rejected even though the path is bogus
        assert!(matches!(
            files.upload(io::empty(), "/../nowhere", "a.txt", &caller()),
            Err(GatewayError::EmptyPayload(_))
        ));
        assert!(entries(temp_dir.path()).is_empty());
    }

    #[test]
    fn test_upload_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let files = service(&temp_dir, AuthorizationGate::allow_all());

        files.upload(&b"first version"[..], "/", "a.txt", &caller()).unwrap();
        files.upload(&b"second"[..], "/", "a.txt", &caller()).unwrap();

        assert_eq!(read_file(&temp_dir, "a.txt"), b"second");
        assert_eq!(entries(temp_dir.path()), vec!["a.txt"]);
    }

    #[test]
    fn test_upload_into_missing_folder() {
        let temp_dir = TempDir::new().unwrap();
        let files = service(&temp_dir, AuthorizationGate::allow_all());

        let err = files.upload(&b"data"[..], "/nope", "a.txt", &caller()).unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(ref msg) if msg.contains("directory")));
        assert!(!temp_dir.path().join("nope").exists());
    }

    #[test]
    fn test_upload_onto_folder() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("taken")).unwrap();
        let files = service(&temp_dir, AuthorizationGate::allow_all());

        assert!(matches!(
            files.upload(&b"data"[..], "/", "taken", &caller()),
            Err(GatewayError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_upload_rejects_bad_file_names() {
        let temp_dir = TempDir::new().unwrap();
        let files = service(&temp_dir, AuthorizationGate::allow_all());

        for name in ["", ".", "..", "a/b.txt", "..\\evil", "a\0b"] {
            assert!(
                matches!(
                    files.upload(&b"data"[..], "/", name, &caller()),
                    Err(GatewayError::InvalidPath(_))
                ),
                "expected InvalidPath for {:?}",
                name
            );
        }
    }

    #[test]
    fn test_upload_too_large_leaves_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let files = service(&temp_dir, AuthorizationGate::allow_all()).with_max_upload_size(4);

        assert!(files.upload(&b"1234"[..], "/", "ok.bin", &caller()).is_ok());

        let err = files.upload(&b"12345"[..], "/", "big.bin", &caller()).unwrap_err();
        assert!(matches!(err, GatewayError::PayloadTooLarge { limit: 4, .. }));
        assert_eq!(entries(temp_dir.path()), vec!["ok.bin"]);
    }

    #[test]
    fn test_upload_overwrite_requires_delete() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.txt"), "original").unwrap();
        let rules = PathRules::new(PermissionLevel::ReadWrite);
        let files = service(&temp_dir, AuthorizationGate::new(rules));

        // New files are fine with read-write
        files.upload(&b"new"[..], "/", "b.txt", &caller()).unwrap();

        assert!(matches!(
            files.upload(&b"replacement"[..], "/", "a.txt", &caller()),
            Err(GatewayError::AccessDenied)
        ));
        assert_eq!(read_file(&temp_dir, "a.txt"), b"original");
    }

    #[test]
    fn test_delete() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.txt"), "x").unwrap();
        let files = service(&temp_dir, AuthorizationGate::allow_all());

        files.delete("/a.txt", &caller()).unwrap();
        assert!(!temp_dir.path().join("a.txt").exists());
        assert!(matches!(
            files.delete("/a.txt", &caller()),
            Err(GatewayError::NotFound(_))
        ));
    }

    #[test]
    fn test_copy_replaces_destination() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("backup")).unwrap();
        fs::write(temp_dir.path().join("a.txt"), "content").unwrap();
        fs::write(temp_dir.path().join("backup/a.txt"), "stale").unwrap();
        let files = service(&temp_dir, AuthorizationGate::allow_all());

        files.copy("/a.txt", "/backup/a.txt", &caller()).unwrap();

        assert_eq!(read_file(&temp_dir, "a.txt"), b"content");
        assert_eq!(read_file(&temp_dir, "backup/a.txt"), b"content");
        assert_eq!(entries(&temp_dir.path().join("backup")), vec!["a.txt"]);
    }

    #[test]
    fn test_copy_missing_source() {
        let temp_dir = TempDir::new().unwrap();
        let files = service(&temp_dir, AuthorizationGate::allow_all());

        assert!(matches!(
            files.copy("/nope.txt", "/b.txt", &caller()),
            Err(GatewayError::NotFound(p)) if p == "/nope.txt"
        ));
    }

    #[test]
    fn test_move() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("archive")).unwrap();
        fs::write(temp_dir.path().join("a.txt"), "content").unwrap();
        let files = service(&temp_dir, AuthorizationGate::allow_all());

        files.r#move("/a.txt", "/archive/a.txt", &caller()).unwrap();

        assert!(!temp_dir.path().join("a.txt").exists());
        assert_eq!(read_file(&temp_dir, "archive/a.txt"), b"content");
    }

    #[test]
    fn test_move_denied_without_delete_on_source() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("locked")).unwrap();
        fs::write(temp_dir.path().join("locked/a.txt"), "content").unwrap();

        let locked = temp_dir.path().join("locked");
        let rules = PathRules::new(PermissionLevel::Full).with_rule(PathRule::read_only(locked));
        let files = service(&temp_dir, AuthorizationGate::new(rules));

        assert!(matches!(
            files.r#move("/locked/a.txt", "/a.txt", &caller()),
            Err(GatewayError::AccessDenied)
        ));
        assert!(temp_dir.path().join("locked/a.txt").exists());
        assert!(!temp_dir.path().join("a.txt").exists());

        // Copying out only needs read
        files.copy("/locked/a.txt", "/a.txt", &caller()).unwrap();
    }

    #[test]
    fn test_temp_file_names() {
        let name = temp_file_name();
        assert!(is_temp_file(&name));
        assert!(name.starts_with('.'));
        assert!(!is_temp_file("report.tmp"));
        assert!(!is_temp_file(".fsgate-config"));
    }
}
