//! Access kinds, caller identity and the authorization capability.
//!
//! Every operation the gateway performs is reduced to one or more
//! [`AccessRequest`]s, each naming a physical path, the [`Caller`] and the
//! [`AccessKind`] being exercised. An [`Authorize`] implementation turns a
//! request into an allow/deny decision.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Category of access requested for a file or folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessKind {
    /// Reading (downloading, copying from, probing) a file.
    ReadFile,
    /// Creating or overwriting a file.
    WriteFile,
    /// Deleting a file, including replacing it and moving it away.
    DeleteFile,
    /// Listing or probing a folder.
    ReadFolder,
    /// Creating a folder or moving one into place.
    WriteFolder,
    /// Deleting a folder tree or moving it away.
    DeleteFolder,
}

impl AccessKind {
    /// All access kinds, file kinds first.
    pub const ALL: [AccessKind; 6] = [
        AccessKind::ReadFile,
        AccessKind::WriteFile,
        AccessKind::DeleteFile,
        AccessKind::ReadFolder,
        AccessKind::WriteFolder,
        AccessKind::DeleteFolder,
    ];

    /// Whether this kind targets a folder.
    pub fn is_folder(&self) -> bool {
        matches!(
            self,
            Self::ReadFolder | Self::WriteFolder | Self::DeleteFolder
        )
    }

    /// Whether this kind only observes.
    pub fn is_read(&self) -> bool {
        matches!(self, Self::ReadFile | Self::ReadFolder)
    }

    /// Whether this kind creates or overwrites.
    pub fn is_write(&self) -> bool {
        matches!(self, Self::WriteFile | Self::WriteFolder)
    }

    /// Whether this kind removes.
    pub fn is_delete(&self) -> bool {
        matches!(self, Self::DeleteFile | Self::DeleteFolder)
    }

    /// Stable string form, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadFile => "read-file",
            Self::WriteFile => "write-file",
            Self::DeleteFile => "delete-file",
            Self::ReadFolder => "read-folder",
            Self::WriteFolder => "write-folder",
            Self::DeleteFolder => "delete-folder",
        }
    }
}

impl fmt::Display for AccessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown access kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown access kind: {0}")]
pub struct ParseAccessKindError(pub String);

impl FromStr for AccessKind {
    type Err = ParseAccessKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AccessKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ParseAccessKindError(s.to_string()))
    }
}

/// The party issuing a request: an identity (empty when anonymous) and the
/// roles it belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    /// Username or other identity string. Empty means anonymous.
    pub identity: String,
    /// Roles the caller belongs to.
    pub roles: BTreeSet<String>,
}

impl Caller {
    /// Create a caller with the given identity and roles.
    pub fn new<I, S>(identity: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            identity: identity.into(),
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    /// An anonymous caller with no roles.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Add a role.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    /// Whether the caller has no identity.
    pub fn is_anonymous(&self) -> bool {
        self.identity.is_empty()
    }

    /// Whether the caller belongs to `role`.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Whether the caller belongs to any of `roles`.
    pub fn has_any_role<'a, I>(&self, roles: I) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        roles.into_iter().any(|role| self.roles.contains(role))
    }
}

/// A single authorization question.
///
/// `path` is the physical path the gateway resolved. It is handed to the
/// authorizer but never returned to the caller.
#[derive(Debug, Clone, Copy)]
pub struct AccessRequest<'a> {
    /// Physical path being accessed.
    pub path: &'a Path,
    /// Who is asking.
    pub caller: &'a Caller,
    /// What kind of access is requested.
    pub kind: AccessKind,
}

impl<'a> AccessRequest<'a> {
    /// Create a new request.
    pub fn new(path: &'a Path, caller: &'a Caller, kind: AccessKind) -> Self {
        Self { path, caller, kind }
    }
}

/// Authorization capability consulted before every file or folder access.
///
/// Implementations must be free of side effects on the filesystem and safe
/// to call several times for the same logical operation. Returning an error
/// is treated as a denial by the gateway.
pub trait Authorize: Send + Sync {
    /// Decide whether `request` is allowed.
    fn authorize(&self, request: &AccessRequest<'_>) -> anyhow::Result<bool>;
}

impl<T: Authorize + ?Sized> Authorize for Arc<T> {
    fn authorize(&self, request: &AccessRequest<'_>) -> anyhow::Result<bool> {
        (**self).authorize(request)
    }
}

impl<T: Authorize + ?Sized> Authorize for Box<T> {
    fn authorize(&self, request: &AccessRequest<'_>) -> anyhow::Result<bool> {
        (**self).authorize(request)
    }
}
