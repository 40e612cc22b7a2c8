//! Mapping of local folder structure to device gallery names.
//!
//! ```text
//! <root>/
//! ├─ beach.jpg              Fixed("frame") -> frame/beach.jpg
//! │                         TopLevelFolder -> <root_gallery>/beach.jpg
//! └─ summer/
//!    ├─ a.jpg               TopLevelFolder -> summer/a.jpg
//!    └─ day2/b.jpg          TopLevelFolder -> summer/b.jpg (flattened)
//! ```

use serde::Serialize;
use std::path::{Component, Path};

/// Default gallery used by [`GalleryMapping::Fixed`].
pub const DEFAULT_GALLERY: &str = "inksync";

/// How local files are assigned to device galleries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum GalleryMapping {
    /// Every file goes to one gallery.
    Fixed(String),
    /// The first folder below the root names the gallery. Files directly in
    /// the root go to `root_gallery`. Deeper folders are flattened.
    TopLevelFolder {
        /// Gallery for files that sit directly in the root.
        root_gallery: String,
    },
}

impl GalleryMapping {
    /// Creates a fixed mapping.
    pub fn fixed(name: impl Into<String>) -> Self {
        Self::Fixed(name.into())
    }

    /// Creates a top-level-folder mapping.
    pub fn by_folder(root_gallery: impl Into<String>) -> Self {
        Self::TopLevelFolder {
            root_gallery: root_gallery.into(),
        }
    }

    /// Returns the gallery for a path relative to the source root, or `None`
    /// if the path has no usable file name.
    pub fn gallery_for(&self, relative_path: &Path) -> Option<String> {
        match self {
            GalleryMapping::Fixed(name) => Some(name.clone()),
            GalleryMapping::TopLevelFolder { root_gallery } => {
                let mut components = relative_path.components().filter_map(|c| match c {
                    Component::Normal(part) => Some(part),
                    _ => None,
                });
                let first = components.next()?;
                if components.next().is_none() {
                    // The only component is the file itself.
                    Some(root_gallery.clone())
                } else {
                    Some(first.to_string_lossy().into_owned())
                }
            }
        }
    }

    /// Returns true if this mapping can produce `gallery`, i.e. whether the
    /// gallery is under this mapping's management when scoping the remote
    /// snapshot.
    pub fn manages(&self, gallery: &str) -> bool {
        match self {
            GalleryMapping::Fixed(name) => name == gallery,
            GalleryMapping::TopLevelFolder { .. } => true,
        }
    }
}

impl Default for GalleryMapping {
    fn default() -> Self {
        Self::Fixed(DEFAULT_GALLERY.to_string())
    }
}
