//! Authorization gate and the built-in policy strategies.
//!
//! The gateway never decides on its own whether a caller may touch a path.
//! It asks the [`AuthorizationGate`], which wraps an optional
//! [`Authorize`] capability:
//!
//! - No capability configured: every request is **allowed**. Restricting
//!   access is an explicit opt-in.
//! - Capability returns `Ok(false)`: denied.
//! - Capability returns an error: denied. There is no retry.
//!
//! Built-in strategies cover the common policies: [`AllowAll`],
//! [`DenyAll`], [`RoleAllowlist`], [`RootOnly`], [`PathRules`] and
//! [`CallbackAuthorizer`] for delegating to injected code.

pub mod rules;

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use contracts::{AccessKind, AccessRequest, Authorize, Caller, GatewayError, Result};
use tracing::{debug, warn};

use crate::config::{AuthorizationConfig, AuthorizationMode};
use crate::resolver::Resolver;

pub use rules::{PathRule, PathRules, PermissionLevel};

/// Role that [`RootOnly`] requires.
pub const ROOT_ROLE: &str = "root";

/// Allows every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorize for AllowAll {
    fn authorize(&self, _request: &AccessRequest<'_>) -> anyhow::Result<bool> {
        Ok(true)
    }
}

/// Denies every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

impl Authorize for DenyAll {
    fn authorize(&self, _request: &AccessRequest<'_>) -> anyhow::Result<bool> {
        Ok(false)
    }
}

/// Allows a request when the caller belongs to at least one listed role.
#[derive(Debug, Clone, Default)]
pub struct RoleAllowlist {
    roles: BTreeSet<String>,
}

impl RoleAllowlist {
    /// Create an allowlist from role names.
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    /// The allowed roles.
    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }
}

impl Authorize for RoleAllowlist {
    fn authorize(&self, request: &AccessRequest<'_>) -> anyhow::Result<bool> {
        Ok(request.caller.has_any_role(&self.roles))
    }
}

/// Denies everything unless the caller has the `root` role.
#[derive(Debug, Clone, Copy, Default)]
pub struct RootOnly;

impl Authorize for RootOnly {
    fn authorize(&self, request: &AccessRequest<'_>) -> anyhow::Result<bool> {
        Ok(request.caller.has_role(ROOT_ROLE))
    }
}

type Callback = dyn Fn(&AccessRequest<'_>) -> anyhow::Result<bool> + Send + Sync;

/// Delegates every decision to an injected function.
///
/// The function may reach out to anything (a policy service, a signal bus),
/// but it is called synchronously and its errors count as denials.
pub struct CallbackAuthorizer {
    name: String,
    callback: Box<Callback>,
}

impl CallbackAuthorizer {
    /// Wrap `callback`. `name` identifies the policy in logs.
    pub fn new<F>(name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&AccessRequest<'_>) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            callback: Box::new(callback),
        }
    }

    /// Name given at construction.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for CallbackAuthorizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackAuthorizer")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Authorize for CallbackAuthorizer {
    fn authorize(&self, request: &AccessRequest<'_>) -> anyhow::Result<bool> {
        (self.callback)(request)
    }
}

/// Evaluates access requests for the gateway.
///
/// Cloning is cheap; the capability is shared.
#[derive(Clone, Default)]
pub struct AuthorizationGate {
    authorizer: Option<Arc<dyn Authorize>>,
}

impl AuthorizationGate {
    /// A gate with no capability configured. Every request is allowed.
    pub fn allow_all() -> Self {
        Self { authorizer: None }
    }

    /// A gate consulting `authorizer` for every request.
    pub fn new<A: Authorize + 'static>(authorizer: A) -> Self {
        Self {
            authorizer: Some(Arc::new(authorizer)),
        }
    }

    /// A gate consulting an already shared capability.
    pub fn from_shared(authorizer: Arc<dyn Authorize>) -> Self {
        Self {
            authorizer: Some(authorizer),
        }
    }

    /// Build the gate described by configuration.
    ///
    /// Path rules are written as virtual paths and resolved against
    /// `resolver` here, once.
    pub fn from_config(config: &AuthorizationConfig, resolver: &Resolver) -> Result<Self> {
        let gate = match config.mode {
            AuthorizationMode::AllowAll => Self::new(AllowAll),
            AuthorizationMode::DenyAll => Self::new(DenyAll),
            AuthorizationMode::RootOnly => Self::new(RootOnly),
            AuthorizationMode::Roles => Self::new(RoleAllowlist::new(config.roles.iter().cloned())),
            AuthorizationMode::PathRules => {
                Self::new(PathRules::from_config(config, resolver)?)
            }
        };

        debug!(mode = ?config.mode, "Authorization gate configured");
        Ok(gate)
    }

    /// Whether a capability is configured.
    pub fn is_restricted(&self) -> bool {
        self.authorizer.is_some()
    }

    /// Decide whether `caller` may exercise `kind` on `path`.
    ///
    /// Errors raised by the capability are logged and treated as a denial.
    pub fn has_access(&self, path: &Path, caller: &Caller, kind: AccessKind) -> bool {
        let Some(authorizer) = &self.authorizer else {
            return true;
        };

        let request = AccessRequest::new(path, caller, kind);
        match authorizer.authorize(&request) {
            Ok(allowed) => {
                debug!(
                    path = ?path,
                    identity = %caller.identity,
                    %kind,
                    allowed,
                    "Authorization decision"
                );
                allowed
            }
            Err(e) => {
                warn!(
                    identity = %caller.identity,
                    %kind,
                    error = %e,
                    "Authorizer failed, denying access"
                );
                false
            }
        }
    }

    /// Like [`has_access`](Self::has_access), but fails with
    /// [`GatewayError::AccessDenied`] on denial.
    pub fn require(&self, path: &Path, caller: &Caller, kind: AccessKind) -> Result<()> {
        if self.has_access(path, caller, kind) {
            Ok(())
        } else {
            warn!(path = ?path, identity = %caller.identity, %kind, "Access denied");
            Err(GatewayError::AccessDenied)
        }
    }
}

impl fmt::Debug for AuthorizationGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationGate")
            .field("restricted", &self.is_restricted())
            .finish()
    }
}
