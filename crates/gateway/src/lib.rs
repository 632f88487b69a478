//! # FsGate Gateway Library
//!
//! This crate provides the sandboxed file access gateway: remote-style file
//! and folder CRUD over a single local directory tree, gated by a pluggable
//! authorization capability.
//!
//! ## Overview
//!
//! Every operation follows the same short sequence:
//!
//! 1. **Resolve**: the caller's virtual path is mapped onto the configured
//!    root and rejected if it would escape it
//! 2. **Authorize**: the authorization gate is asked, once per resource and
//!    access kind, before anything is revealed or mutated
//! 3. **Check**: preconditions such as existence are evaluated
//! 4. **Mutate**: the filesystem is touched, atomically where possible
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            Gateway                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────────────────┐   ┌──────────────────────────┐    │
//! │  │       FileService        │   │      FolderService       │    │
//! │  │ download/upload/delete/  │   │ list/create/delete/move/ │    │
//! │  │ copy/move                │   │ exists                   │    │
//! │  └──────────────────────────┘   └──────────────────────────┘    │
//! │                                                                 │
//! │  ┌───────────────────────────────────────────────────────────┐  │
//! │  │  Sandbox: Resolver (root confinement) + AuthorizationGate  │  │
//! │  └───────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gateway::{AuthorizationGate, Gateway, Root};
//! use gateway::contracts::Caller;
//!
//! fn main() -> anyhow::Result<()> {
//!     let root = Root::new("/srv/files")?;
//!     let gateway = Gateway::new(root, AuthorizationGate::allow_all());
//!
//!     let caller = Caller::new("alice", ["editor"]);
//!     gateway.folders().create_folder("/reports", &caller)?;
//!     gateway
//!         .files()
//!         .upload(&b"quarterly numbers"[..], "/reports", "q1.txt", &caller)?;
//!
//!     for file in gateway.folders().list_files("/reports", &caller)? {
//!         println!("{}", file);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and defaults
//! - [`resolver`]: Virtual/physical path translation and root confinement
//! - [`authorization`]: Authorization gate and policy strategies
//! - [`sandbox`]: Resolver and gate bundled for the services
//! - [`files`]: File and folder operations, MIME lookup
//! - [`gateway`]: The assembled gateway

pub mod authorization;
pub mod config;
pub mod files;
pub mod gateway;
pub mod resolver;
pub mod sandbox;

// Re-export contracts for convenience
pub use contracts;

// Re-export config types for convenience
pub use config::Config;

// Re-export path types for convenience
pub use resolver::{Resolver, Root};

// Re-export authorization types for convenience
pub use authorization::{
    AllowAll, AuthorizationGate, CallbackAuthorizer, DenyAll, PathRule, PathRules,
    PermissionLevel, RoleAllowlist, RootOnly,
};

// Re-export service types for convenience
pub use files::{Download, FileService, FolderService, MimeTable};

pub use gateway::Gateway;
pub use sandbox::Sandbox;
