//! File and folder operations.
//!
//! This module provides the operation services of the gateway:
//! - Streaming downloads with content type detection
//! - Uploads, copies and moves through atomic temp-file writes
//! - Non-recursive folder listings that only expose virtual paths
//! - Folder creation, deletion and tree moves
//!
//! # Security
//!
//! Every operation resolves its paths through the [`Sandbox`](crate::sandbox::Sandbox)
//! and asks the authorization gate before it checks whether anything exists,
//! so a denied caller learns nothing about the tree.

pub mod folders;
pub mod mime;
pub mod transfer;

pub use folders::FolderService;
pub use mime::MimeTable;
pub use transfer::{Download, FileService, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_UPLOAD_SIZE};
