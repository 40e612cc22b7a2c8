//! Core data model shared by the snapshot builder, the reconciliation engine
//! and the orchestrator.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Cheap, deterministic signature of a file's state.
///
/// Two fingerprints are equal only if size, modification time and (when
/// computed) content digest all match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Fingerprint {
    /// Size in bytes.
    pub size: u64,
    /// Modification time, seconds since the Unix epoch.
    pub modified: u64,
    /// SHA-256 of the content, if computed.
    #[serde(skip)]
    pub digest: Option<[u8; 32]>,
}

impl Fingerprint {
    /// Creates a metadata-only fingerprint.
    pub fn new(size: u64, modified: u64) -> Self {
        Self {
            size,
            modified,
            digest: None,
        }
    }

    /// Attaches a content digest.
    pub fn with_digest(mut self, digest: [u8; 32]) -> Self {
        self.digest = Some(digest);
        self
    }

    /// Returns true if the two fingerprints describe the same content.
    ///
    /// When both sides carry a digest only the digest and size are compared,
    /// so a touched but unchanged file is still considered equal.
    pub fn same_content(&self, other: &Fingerprint) -> bool {
        match (self.digest, other.digest) {
            (Some(a), Some(b)) => a == b && self.size == other.size,
            _ => self == other,
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.size, self.modified)?;
        if let Some(digest) = &self.digest {
            write!(f, ":")?;
            for byte in &digest[..8] {
                write!(f, "{:02x}", byte)?;
            }
        }
        Ok(())
    }
}

/// One local file eligible for sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalAsset {
    /// Path relative to the source root; unique within a snapshot.
    pub relative_path: PathBuf,
    /// Absolute path used to read the bytes.
    #[serde(skip)]
    pub path: PathBuf,
    /// File name as stored on the device.
    pub filename: String,
    /// Target gallery.
    pub gallery: String,
    /// Size in bytes.
    pub size: u64,
    /// Change-detection fingerprint.
    pub fingerprint: Fingerprint,
}

impl LocalAsset {
    /// Returns the `(gallery, filename)` key this asset reconciles against.
    pub fn key(&self) -> AssetId {
        AssetId::new(self.gallery.clone(), self.filename.clone())
    }
}

/// Identifier of an image on the device.
///
/// The device addresses images by gallery and file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct AssetId {
    /// Gallery containing the image.
    pub gallery: String,
    /// File name of the image.
    pub filename: String,
}

impl AssetId {
    /// Creates a new identifier.
    pub fn new(gallery: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            gallery: gallery.into(),
            filename: filename.into(),
        }
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.gallery, self.filename)
    }
}

/// One image known to the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteAsset {
    /// Device identifier.
    pub id: AssetId,
    /// Size in bytes, if reported.
    pub size: Option<u64>,
    /// Device timestamp, if reported.
    pub modified: Option<u64>,
    /// Fingerprint, if the remote side exposes one.
    pub fingerprint: Option<Fingerprint>,
}

impl RemoteAsset {
    /// Creates a remote asset with no metadata.
    pub fn new(gallery: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            id: AssetId::new(gallery, filename),
            size: None,
            modified: None,
            fingerprint: None,
        }
    }

    /// Sets the reported size.
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Sets the reported timestamp.
    pub fn with_modified(mut self, modified: u64) -> Self {
        self.modified = Some(modified);
        self
    }

    /// Sets the exposed fingerprint.
    pub fn with_fingerprint(mut self, fingerprint: Fingerprint) -> Self {
        self.fingerprint = Some(fingerprint);
        self
    }

    /// Returns the file name.
    pub fn filename(&self) -> &str {
        &self.id.filename
    }

    /// Returns the gallery name.
    pub fn gallery(&self) -> &str {
        &self.id.gallery
    }
}

/// A named container of images on the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Gallery {
    /// Gallery name; unique per device.
    pub name: String,
    /// Images in the gallery.
    pub assets: Vec<RemoteAsset>,
}

impl Gallery {
    /// Creates an empty gallery.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            assets: Vec::new(),
        }
    }

    /// Creates a gallery with the given assets.
    pub fn with_assets(name: impl Into<String>, assets: Vec<RemoteAsset>) -> Self {
        Self {
            name: name.into(),
            assets,
        }
    }

    /// Returns the number of images.
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// Returns true if the gallery holds no images.
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Returns the total reported size of the gallery's images.
    pub fn total_size(&self) -> u64 {
        self.assets.iter().filter_map(|a| a.size).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_equality() {
        let a = Fingerprint::new(10, 100);
        assert!(a.same_content(&Fingerprint::new(10, 100)));
        assert!(!a.same_content(&Fingerprint::new(10, 101)));
        assert!(!a.same_content(&Fingerprint::new(11, 100)));
    }

    #[test]
    fn digest_ignores_mtime() {
        let a = Fingerprint::new(10, 100).with_digest([7u8; 32]);
        let b = Fingerprint::new(10, 999).with_digest([7u8; 32]);
        let c = Fingerprint::new(10, 100).with_digest([8u8; 32]);
        assert!(a.same_content(&b));
        assert!(!a.same_content(&c));
    }

    #[test]
    fn fingerprint_display() {
        assert_eq!(Fingerprint::new(5, 42).to_string(), "5:42");
        let with_digest = Fingerprint::new(5, 42).with_digest([0xab; 32]);
        assert_eq!(with_digest.to_string(), "5:42:abababababababab");
    }

    #[test]
    fn asset_id_display_and_order() {
        let a = AssetId::new("a", "z.jpg");
        let b = AssetId::new("b", "a.jpg");
        assert_eq!(a.to_string(), "a/z.jpg");
        assert!(a < b);
    }

    #[test]
    fn gallery_sizes() {
        let gallery = Gallery::with_assets(
            "g",
            vec![
                RemoteAsset::new("g", "a.jpg").with_size(10),
                RemoteAsset::new("g", "b.jpg"),
                RemoteAsset::new("g", "c.jpg").with_size(5),
            ],
        );
        assert_eq!(gallery.len(), 3);
        assert_eq!(gallery.total_size(), 15);
        assert!(Gallery::new("empty").is_empty());
    }
}
