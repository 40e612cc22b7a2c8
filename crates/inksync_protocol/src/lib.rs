//! # inksync Protocol
//!
//! Wire types for the HTTP control API of an e-ink photo frame.
//!
//! This crate provides:
//! - `Endpoint` describing every request the sync engine issues
//! - JSON payloads for gallery listings, gallery pages and device info
//! - Extraction of the device's rejection reason from error bodies
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod endpoint;
mod error;
mod messages;

pub use endpoint::{Endpoint, Method};
pub use error::{ProtocolError, ProtocolResult};
pub use messages::{
    decode_gallery_list, rejection_reason, DeviceInfo, GalleryListEntry, GalleryPage, ImageEntry,
};

/// Multipart field name carrying the image bytes of an upload.
pub const UPLOAD_FIELD: &str = "image";

/// Default page size used when listing the images of a gallery.
pub const DEFAULT_PAGE_LIMIT: u32 = 100;
