//! Error types for the gateway.
//!
//! Messages only ever carry virtual paths. Physical paths stay inside the
//! gateway.

use thiserror::Error;

/// Gateway error type covering every failure an operation reports.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The virtual path is malformed or would escape the root.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// The target (or a required parent folder) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The target already exists and the operation refuses to replace it.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The authorization capability denied the request.
    #[error("access denied")]
    AccessDenied,

    /// An upload carried no content.
    #[error("file '{0}' is empty")]
    EmptyPayload(String),

    /// An upload exceeded the configured size limit.
    #[error("payload too large: {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge {
        /// Bytes received before the limit tripped.
        size: u64,
        /// Configured limit.
        limit: u64,
    },

    /// Underlying filesystem error not otherwise classified.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    /// Whether retrying the same call could succeed.
    ///
    /// Only raw I/O failures qualify. Nothing in the gateway retries on its
    /// own.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Io(_))
    }

    /// Short machine-readable name of the variant.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::InvalidPath(_) => "invalid_path",
            GatewayError::NotFound(_) => "not_found",
            GatewayError::AlreadyExists(_) => "already_exists",
            GatewayError::AccessDenied => "access_denied",
            GatewayError::EmptyPayload(_) => "empty_payload",
            GatewayError::PayloadTooLarge { .. } => "payload_too_large",
            GatewayError::Io(_) => "io_failure",
        }
    }
}

/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_path_display() {
        let err = GatewayError::InvalidPath("/../etc/passwd".to_string());
        assert_eq!(err.to_string(), "invalid path: /../etc/passwd");
    }

    #[test]
    fn test_not_found_display() {
        let err = GatewayError::NotFound("/docs/missing.txt".to_string());
        assert_eq!(err.to_string(), "not found: /docs/missing.txt");
    }

    #[test]
    fn test_already_exists_display() {
        let err = GatewayError::AlreadyExists("/docs/".to_string());
        assert_eq!(err.to_string(), "already exists: /docs/");
    }

    #[test]
    fn test_access_denied_display() {
        assert_eq!(GatewayError::AccessDenied.to_string(), "access denied");
    }

    #[test]
    fn test_empty_payload_display() {
        let err = GatewayError::EmptyPayload("notes.txt".to_string());
        assert_eq!(err.to_string(), "file 'notes.txt' is empty");
    }

    #[test]
    fn test_payload_too_large_display() {
        let err = GatewayError::PayloadTooLarge {
            size: 2048,
            limit: 1024,
        };
        assert_eq!(
            err.to_string(),
            "payload too large: 2048 bytes exceeds limit of 1024 bytes"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let err: GatewayError = io_err.into();
        assert!(matches!(err, GatewayError::Io(_)));
        assert_eq!(err.to_string(), "IO error: disk on fire");
    }

    #[test]
    fn test_only_io_is_retryable() {
        let io = GatewayError::Io(std::io::Error::other("timeout"));
        assert!(io.is_retryable());
        assert!(!GatewayError::AccessDenied.is_retryable());
        assert!(!GatewayError::NotFound("/a".to_string()).is_retryable());
    }

    #[test]
    fn test_error_codes_are_distinct() {
        let errors = [
            GatewayError::InvalidPath(String::new()),
            GatewayError::NotFound(String::new()),
            GatewayError::AlreadyExists(String::new()),
            GatewayError::AccessDenied,
            GatewayError::EmptyPayload(String::new()),
            GatewayError::PayloadTooLarge { size: 0, limit: 0 },
            GatewayError::Io(std::io::Error::other("x")),
        ];
        let mut codes: Vec<&str> = errors.iter().map(|e| e.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }
}
