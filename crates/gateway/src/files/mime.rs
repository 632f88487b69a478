//! Content type lookup by file extension.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Fallback for names without a known extension.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Extension to MIME type table.
///
/// Overrides are consulted first (`.hl` scripts are always plain text), then
/// the `mime_guess` table.
#[derive(Debug, Clone)]
pub struct MimeTable {
    overrides: HashMap<String, String>,
}

impl Default for MimeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl MimeTable {
    /// A table with only the built-in overrides.
    pub fn new() -> Self {
        let mut overrides = HashMap::new();
        overrides.insert("hl".to_string(), "text/plain".to_string());
        Self { overrides }
    }

    /// Build a table from configured overrides, keeping the built-ins unless
    /// the configuration replaces them.
    pub fn from_overrides(overrides: &BTreeMap<String, String>) -> Self {
        overrides
            .iter()
            .fold(Self::new(), |table, (ext, mime)| table.with_override(ext, mime))
    }

    /// Map `extension` (with or without the leading dot) to `mime`.
    pub fn with_override(mut self, extension: &str, mime: &str) -> Self {
        let extension = extension.trim_start_matches('.').to_ascii_lowercase();
        self.overrides.insert(extension, mime.to_string());
        self
    }

    /// Content type for `file_name`.
    pub fn content_type(&self, file_name: &str) -> String {
        let path = Path::new(file_name);

        let overridden = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.overrides.get(&ext.to_ascii_lowercase()));
        if let Some(mime) = overridden {
            return mime.clone();
        }

        mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_extension_is_plain_text() {
        let table = MimeTable::new();
        assert_eq!(table.content_type("build.hl"), "text/plain");
        assert_eq!(table.content_type("BUILD.HL"), "text/plain");
    }

    #[test]
    fn test_standard_table() {
        let table = MimeTable::new();
        assert_eq!(table.content_type("report.pdf"), "application/pdf");
        assert_eq!(table.content_type("notes.txt"), "text/plain");
        assert_eq!(table.content_type("photo.png"), "image/png");
    }

    #[test]
    fn test_unknown_extension_falls_back() {
        let table = MimeTable::new();
        assert_eq!(table.content_type("blob.zzqx"), OCTET_STREAM);
        assert_eq!(table.content_type("Makefile"), OCTET_STREAM);
    }

    #[test]
    fn test_configured_overrides() {
        let mut configured = BTreeMap::new();
        configured.insert(".log".to_string(), "text/x-log".to_string());
        configured.insert("pdf".to_string(), "application/x-custom".to_string());

        let table = MimeTable::from_overrides(&configured);
        assert_eq!(table.content_type("server.log"), "text/x-log");
        assert_eq!(table.content_type("a.pdf"), "application/x-custom");
        // Built-in survives
        assert_eq!(table.content_type("run.hl"), "text/plain");
    }
}
