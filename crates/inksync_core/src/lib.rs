//! # inksync Core
//!
//! Local-side model of the gallery sync engine.
//!
//! This crate provides:
//! - Local snapshot builder (directory walk, extension filter, fingerprints)
//! - Folder-to-gallery mapping
//! - Reconciliation of a local snapshot against remote gallery state
//! - Ordered sync plans
//! - The error model shared by every inksync crate
//!
//! Nothing here talks to a device; see `inksync_engine` for that.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod mapping;
mod plan;
mod reconcile;
mod snapshot;
mod types;

pub use error::{CoreResult, ErrorKind, SyncError, SyncResult};
pub use mapping::{GalleryMapping, DEFAULT_GALLERY};
pub use plan::{SyncAction, SyncMode, SyncPlan};
pub use reconcile::{diff, has_changed, DiffOptions};
pub use snapshot::{
    fingerprint, scan, FingerprintMode, LocalSnapshot, ScanOptions, DEFAULT_EXTENSIONS,
};
pub use types::{AssetId, Fingerprint, Gallery, LocalAsset, RemoteAsset};
