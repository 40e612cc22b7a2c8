//! # inksync Testkit
//!
//! Test utilities for inksync.
//!
//! This crate provides:
//! - Image tree fixtures backed by temporary directories
//! - Property-based test generators using proptest
//! - A reference model of device behavior for plans
//! - An end-to-end harness around the in-memory device
//!
//! ## Usage
//!
//! ```rust,ignore
//! use inksync_testkit::prelude::*;
//!
//! #[test]
//! fn syncs_a_tree() {
//!     let harness = SyncHarness::new(scenarios::single_image(), MemoryGalleryClient::new());
//!     // ... run the orchestrator against harness.tree.path()
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod integration;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
    pub use inksync_engine::MemoryGalleryClient;
}

pub use fixtures::*;
pub use generators::*;
pub use integration::*;
