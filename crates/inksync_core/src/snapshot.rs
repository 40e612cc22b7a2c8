//! Local snapshot builder.
//!
//! Walks a source directory and produces one [`LocalAsset`] per eligible
//! image. Snapshots are rebuilt on every run; nothing is cached between runs.

use crate::error::{CoreResult, SyncError};
use crate::mapping::GalleryMapping;
use crate::types::{AssetId, Fingerprint, LocalAsset};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Extensions accepted by default. The frame renders JPEG only.
pub const DEFAULT_EXTENSIONS: &[&str] = &["jpg", "jpeg"];

/// How file fingerprints are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FingerprintMode {
    /// Size and modification time.
    #[default]
    Metadata,
    /// Size, modification time and a SHA-256 of the content.
    Content,
}

/// Options for [`scan`].
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Folder-to-gallery mapping.
    pub mapping: GalleryMapping,
    /// Lower-case extension allow-list, without the dot.
    pub extensions: Vec<String>,
    /// Fingerprint computation.
    pub fingerprint: FingerprintMode,
    /// Follow symbolic links while walking.
    pub follow_links: bool,
    /// Include dot-files and dot-directories.
    pub include_hidden: bool,
}

impl ScanOptions {
    /// Creates options with the given mapping and default settings.
    pub fn new(mapping: GalleryMapping) -> Self {
        Self {
            mapping,
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            fingerprint: FingerprintMode::Metadata,
            follow_links: false,
            include_hidden: false,
        }
    }

    /// Replaces the extension allow-list.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        self
    }

    /// Sets the fingerprint mode.
    pub fn with_fingerprint(mut self, mode: FingerprintMode) -> Self {
        self.fingerprint = mode;
        self
    }

    /// Sets whether symbolic links are followed.
    pub fn with_follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| {
                let e = e.to_ascii_lowercase();
                self.extensions.iter().any(|allowed| *allowed == e)
            })
            .unwrap_or(false)
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::new(GalleryMapping::default())
    }
}

/// The set of local assets found under a root.
#[derive(Debug, Clone, Default)]
pub struct LocalSnapshot {
    /// Root that was scanned.
    pub root: PathBuf,
    /// Assets, ordered by relative path.
    pub assets: Vec<LocalAsset>,
}

impl LocalSnapshot {
    /// Returns the number of assets.
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// Returns true if no asset was found.
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Returns the galleries the assets map to.
    pub fn galleries(&self) -> BTreeSet<&str> {
        self.assets.iter().map(|a| a.gallery.as_str()).collect()
    }

    /// Returns the sum of all asset sizes.
    pub fn total_bytes(&self) -> u64 {
        self.assets.iter().map(|a| a.size).sum()
    }

    /// Looks up an asset by relative path.
    pub fn get(&self, relative_path: &Path) -> Option<&LocalAsset> {
        self.assets
            .iter()
            .find(|a| a.relative_path == relative_path)
    }
}

/// Scans `root` and returns the eligible images.
///
/// # Errors
///
/// Returns `SourceNotFound` if `root` does not exist, is not a directory or
/// cannot be listed. Unreadable entries below the root are skipped with a
/// warning.
pub fn scan(root: &Path, options: &ScanOptions) -> CoreResult<LocalSnapshot> {
    let metadata = fs::metadata(root)
        .map_err(|e| SyncError::source_not_found(root, e.to_string()))?;
    if !metadata.is_dir() {
        return Err(SyncError::source_not_found(root, "not a directory"));
    }
    fs::read_dir(root).map_err(|e| SyncError::source_not_found(root, e.to_string()))?;

    let include_hidden = options.include_hidden;
    let walker = WalkDir::new(root)
        .follow_links(options.follow_links)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |entry| include_hidden || entry.depth() == 0 || !is_hidden(entry));

    let mut by_path: BTreeMap<PathBuf, LocalAsset> = BTreeMap::new();
    let mut by_key: BTreeMap<AssetId, PathBuf> = BTreeMap::new();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry under {:?}: {}", root, e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }
        if !options.accepts(entry.path()) {
            debug!("Skipping {:?}: extension not allowed", entry.path());
            continue;
        }

        match build_asset(root, &entry, options) {
            Ok(Some(asset)) => {
                let key = asset.key();
                if let Some(first) = by_key.get(&key) {
                    // Flattened sub-folders can collide on the device.
                    return Err(SyncError::DuplicateAssetKey {
                        gallery: key.gallery,
                        filename: key.filename,
                        first: first.clone(),
                        second: asset.relative_path,
                    });
                }
                by_key.insert(key, asset.relative_path.clone());
                by_path.insert(asset.relative_path.clone(), asset);
            }
            Ok(None) => {}
            Err(e) => warn!("Skipping {:?}: {}", entry.path(), e),
        }
    }

    let assets: Vec<LocalAsset> = by_path.into_values().collect();
    debug!("Scanned {:?}: {} asset(s)", root, assets.len());

    Ok(LocalSnapshot {
        root: root.to_path_buf(),
        assets,
    })
}

fn build_asset(
    root: &Path,
    entry: &DirEntry,
    options: &ScanOptions,
) -> io::Result<Option<LocalAsset>> {
    let path = entry.path();
    let relative_path = match path.strip_prefix(root) {
        Ok(relative) => relative.to_path_buf(),
        Err(_) => return Ok(None),
    };

    let filename = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name.to_string(),
        None => {
            warn!("Skipping {:?}: file name is not valid UTF-8", path);
            return Ok(None);
        }
    };

    let gallery = match options.mapping.gallery_for(&relative_path) {
        Some(gallery) => gallery,
        None => return Ok(None),
    };

    let metadata = fs::metadata(path)?;
    let fingerprint = fingerprint(path, &metadata, options.fingerprint)?;

    Ok(Some(LocalAsset {
        relative_path,
        path: path.to_path_buf(),
        filename,
        gallery,
        size: metadata.len(),
        fingerprint,
    }))
}

/// Computes the fingerprint of a file.
pub fn fingerprint(
    path: &Path,
    metadata: &fs::Metadata,
    mode: FingerprintMode,
) -> io::Result<Fingerprint> {
    let modified = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let base = Fingerprint::new(metadata.len(), modified);
    match mode {
        FingerprintMode::Metadata => Ok(base),
        FingerprintMode::Content => {
            let mut file = File::open(path)?;
            let mut hasher = Sha256::new();
            io::copy(&mut file, &mut hasher)?;
            Ok(base.with_digest(hasher.finalize().into()))
        }
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, bytes: &[u8]) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, bytes).unwrap();
    }

    #[test]
    fn missing_root() {
        let dir = TempDir::new().unwrap();
        let result = scan(&dir.path().join("nope"), &ScanOptions::default());
        assert!(matches!(result, Err(SyncError::SourceNotFound { .. })));
    }

    #[test]
    fn root_is_a_file() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "file.jpg", b"x");
        let result = scan(&dir.path().join("file.jpg"), &ScanOptions::default());
        assert!(matches!(result, Err(SyncError::SourceNotFound { .. })));
    }

    #[test]
    fn filters_extensions_and_hidden() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.jpg", b"aaa");
        write(dir.path(), "b.JPEG", b"bb");
        write(dir.path(), "notes.txt", b"text");
        write(dir.path(), "c.png", b"png");
        write(dir.path(), ".hidden.jpg", b"h");
        write(dir.path(), ".cache/d.jpg", b"d");

        let snapshot = scan(dir.path(), &ScanOptions::default()).unwrap();
        let names: Vec<_> = snapshot.assets.iter().map(|a| a.filename.as_str()).collect();
        assert_eq!(names, vec!["a.jpg", "b.JPEG"]);
        assert_eq!(snapshot.total_bytes(), 5);
    }

    #[test]
    fn custom_extensions() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.jpg", b"a");
        write(dir.path(), "c.png", b"c");

        let options = ScanOptions::default().with_extensions([".PNG"]);
        let snapshot = scan(dir.path(), &options).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.assets[0].filename, "c.png");
    }

    #[test]
    fn folder_mapping() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "loose.jpg", b"1");
        write(dir.path(), "summer/a.jpg", b"2");
        write(dir.path(), "summer/day2/b.jpg", b"3");
        write(dir.path(), "winter/c.jpg", b"4");

        let options = ScanOptions::new(GalleryMapping::by_folder("root"));
        let snapshot = scan(dir.path(), &options).unwrap();

        let loose = snapshot.get(Path::new("loose.jpg")).unwrap();
        assert_eq!(loose.gallery, "root");
        let nested = snapshot.get(&Path::new("summer").join("day2").join("b.jpg")).unwrap();
        assert_eq!(nested.gallery, "summer");
        assert_eq!(nested.filename, "b.jpg");
        assert_eq!(
            snapshot.galleries().into_iter().collect::<Vec<_>>(),
            vec!["root", "summer", "winter"]
        );
    }

    #[test]
    fn flattened_collision_is_an_error() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "summer/a.jpg", b"1");
        write(dir.path(), "summer/day2/a.jpg", b"2");

        let options = ScanOptions::new(GalleryMapping::by_folder("root"));
        match scan(dir.path(), &options) {
            Err(SyncError::DuplicateAssetKey {
                gallery, filename, ..
            }) => {
                assert_eq!(gallery, "summer");
                assert_eq!(filename, "a.jpg");
            }
            other => panic!("expected DuplicateAssetKey, got {:?}", other),
        }
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.jpg", b"hello");

        let options = ScanOptions::default().with_fingerprint(FingerprintMode::Content);
        let first = scan(dir.path(), &options).unwrap();
        let second = scan(dir.path(), &options).unwrap();
        assert_eq!(first.assets, second.assets);
        assert!(first.assets[0].fingerprint.digest.is_some());
        assert_eq!(first.assets[0].fingerprint.size, 5);
    }

    #[test]
    fn content_change_changes_fingerprint() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.jpg", b"hello");
        let options = ScanOptions::default().with_fingerprint(FingerprintMode::Content);
        let before = scan(dir.path(), &options).unwrap().assets[0].fingerprint;

        write(dir.path(), "a.jpg", b"jello");
        let after = scan(dir.path(), &options).unwrap().assets[0].fingerprint;
        assert!(!before.same_content(&after));
    }
}
