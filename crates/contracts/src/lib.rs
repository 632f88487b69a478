//! # FsGate Contracts
//!
//! Types shared across the FsGate gateway boundary.
//!
//! ## Overview
//!
//! The gateway confines every file and folder operation to a single root
//! directory and asks an authorization capability before touching anything.
//! This crate holds the vocabulary both sides of that conversation use:
//!
//! - **Access kinds**: the six Read/Write/Delete × File/Folder categories
//! - **Callers**: identity plus role set of whoever issues a request
//! - **Authorization capability**: the [`Authorize`] trait a policy implements
//! - **Errors**: the [`GatewayError`] taxonomy reported to callers
//!
//! ## Example Usage
//!
//! ```rust
//! use contracts::{AccessKind, AccessRequest, Authorize, Caller};
//! use std::path::Path;
//!
//! struct AdminsOnly;
//!
//! impl Authorize for AdminsOnly {
//!     fn authorize(&self, request: &AccessRequest<'_>) -> anyhow::Result<bool> {
//!         Ok(request.caller.has_role("admin"))
//!     }
//! }
//!
//! let caller = Caller::new("alice", ["admin"]);
//! let request = AccessRequest::new(Path::new("/srv/files/report.txt"), &caller, AccessKind::ReadFile);
//! assert!(AdminsOnly.authorize(&request).unwrap());
//! ```
//!
//! ## Modules
//!
//! - [`access`]: Access kinds, callers, and the authorization capability
//! - [`error`]: Error types

pub mod access;
pub mod error;

pub use access::{AccessKind, AccessRequest, Authorize, Caller, ParseAccessKindError};
pub use error::{GatewayError, Result};
