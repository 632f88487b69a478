//! Resolver and authorization gate bundled for the operation services.
//!
//! Every operation starts the same way: turn the caller's virtual path into
//! a physical path, then ask the gate. [`Sandbox`] owns both halves so the
//! services cannot forget one of them.
//!
//! Resolution is purely lexical. Nothing on disk is looked at until the gate
//! has allowed the request, so a denied caller learns nothing about what
//! exists under the root.

use std::io;
use std::path::{Path, PathBuf};

use contracts::{AccessKind, Caller, GatewayError, Result};
use crate::authorization::AuthorizationGate;
use crate::resolver::Resolver;

/// Path resolution and authorization for one root.
#[derive(Debug, Clone)]
pub struct Sandbox {
    resolver: Resolver,
    gate: AuthorizationGate,
}

impl Sandbox {
    /// Create a sandbox.
    pub fn new(resolver: Resolver, gate: AuthorizationGate) -> Self {
        Self { resolver, gate }
    }

    /// The path resolver.
    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// The authorization gate.
    pub fn gate(&self) -> &AuthorizationGate {
        &self.gate
    }

    /// Resolve a virtual path naming a file.
    ///
    /// The root itself and paths ending in `/` cannot name a file.
    pub fn file(&self, virtual_path: &str) -> Result<PathBuf> {
        let relative = virtual_path.trim_start_matches('/');
        if relative.is_empty() || relative.ends_with('/') {
            return Err(GatewayError::InvalidPath(format!(
                "'{}' does not name a file",
                virtual_path
            )));
        }

        self.resolver.resolve_file(virtual_path)
    }

    /// Resolve a virtual path naming a folder.
    pub fn folder(&self, virtual_path: &str) -> Result<PathBuf> {
        self.resolver.resolve_folder(virtual_path)
    }

    /// Fail with [`GatewayError::AccessDenied`] unless `caller` may exercise
    /// `kind` on `physical`, then check that links under `physical` stay
    /// inside the root.
    pub fn require(&self, physical: &Path, caller: &Caller, kind: AccessKind) -> Result<()> {
        self.gate.require(physical, caller, kind)?;
        self.resolver.confine(physical)
    }

    /// The virtual form of `physical`, for messages and logs.
    pub fn display(&self, physical: &Path) -> String {
        self.resolver
            .relativize(physical)
            .unwrap_or_else(|_| "<outside root>".to_string())
    }
}

/// Map an I/O error raised while touching `shown` onto the error taxonomy.
pub(crate) fn io_error(err: io::Error, shown: &str) -> GatewayError {
    match err.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory => {
            GatewayError::NotFound(shown.to_string())
        }
        io::ErrorKind::AlreadyExists => GatewayError::AlreadyExists(shown.to_string()),
        _ => GatewayError::Io(err),
    }
}
