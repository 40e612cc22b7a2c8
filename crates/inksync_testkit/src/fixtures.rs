//! Test fixtures and image tree helpers.
//!
//! Provides throwaway source directories laid out the way users keep their
//! photos, and device fakes seeded to match.

use inksync_engine::MemoryGalleryClient;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Returns `len` bytes framed like a JPEG (SOI ... EOI).
///
/// `seed` varies the payload so different files differ in content.
pub fn jpeg_bytes(seed: u8, len: usize) -> Vec<u8> {
    let len = len.max(4);
    let mut bytes = Vec::with_capacity(len);
    bytes.extend_from_slice(&[0xff, 0xd8]);
    bytes.extend((0..len - 4).map(|i| seed.wrapping_add(i as u8)));
    bytes.extend_from_slice(&[0xff, 0xd9]);
    bytes
}

/// A source directory with automatic cleanup.
pub struct ImageTree {
    dir: TempDir,
}

impl ImageTree {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Returns the root.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes a file, creating parent folders.
    pub fn add(&self, relative: &str, bytes: &[u8]) -> PathBuf {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create folder");
        }
        fs::write(&path, bytes).expect("Failed to write file");
        path
    }

    /// Writes a JPEG-framed file of `len` bytes.
    pub fn add_image(&self, relative: &str, len: usize) -> PathBuf {
        let seed = relative.bytes().fold(0u8, |acc, b| acc.wrapping_add(b));
        self.add(relative, &jpeg_bytes(seed, len))
    }

    /// Removes a file.
    pub fn remove(&self, relative: &str) {
        fs::remove_file(self.dir.path().join(relative)).expect("Failed to remove file");
    }
}

impl Default for ImageTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs a test with a temporary image tree.
pub fn with_image_tree<F, R>(f: F) -> R
where
    F: FnOnce(&ImageTree) -> R,
{
    let tree = ImageTree::new();
    f(&tree)
}

/// Ready-made layouts.
pub mod scenarios {
    use super::*;

    /// `galleryA/img1.jpg` of 10 bytes.
    pub fn single_image() -> ImageTree {
        let tree = ImageTree::new();
        tree.add_image("galleryA/img1.jpg", 10);
        tree
    }

    /// Two top-level galleries plus a loose file and some noise that must
    /// be ignored.
    pub fn nested_galleries() -> ImageTree {
        let tree = ImageTree::new();
        tree.add_image("loose.jpg", 12);
        tree.add_image("summer/beach.jpg", 64);
        tree.add_image("summer/2024/dunes.jpeg", 48);
        tree.add_image("winter/snow.JPG", 32);
        tree.add("winter/notes.txt", b"not an image");
        tree.add_image(".thumbnails/beach.jpg", 8);
        tree
    }

    /// A device holding `galleryA/img1.jpg` (10 bytes) and
    /// `galleryB/img2.jpg` (20 bytes).
    pub fn populated_device() -> MemoryGalleryClient {
        MemoryGalleryClient::new()
            .with_gallery("galleryA", &[("img1.jpg", 10)])
            .with_gallery("galleryB", &[("img2.jpg", 20)])
    }
}
