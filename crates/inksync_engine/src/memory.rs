//! In-memory gallery device for tests.

use crate::client::RemoteGalleryClient;
use inksync_core::{AssetId, Gallery, RemoteAsset, SyncError, SyncResult};
use inksync_protocol::DeviceInfo;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
struct StoredImage {
    size: u64,
    modified: Option<u64>,
}

/// An in-memory device with failure injection and a request log.
#[derive(Debug)]
pub struct MemoryGalleryClient {
    galleries: RwLock<BTreeMap<String, BTreeMap<String, StoredImage>>>,
    log: RwLock<Vec<String>>,
    page_limit: u32,
    awake: AtomicBool,
    unreachable: AtomicBool,
    reject_uploads: RwLock<BTreeSet<String>>,
    reject_creates: RwLock<BTreeSet<String>>,
    reject_deletes: RwLock<BTreeSet<AssetId>>,
    clock: AtomicU64,
}

impl MemoryGalleryClient {
    /// Creates an empty, awake device.
    pub fn new() -> Self {
        Self {
            galleries: RwLock::new(BTreeMap::new()),
            log: RwLock::new(Vec::new()),
            page_limit: inksync_protocol::DEFAULT_PAGE_LIMIT,
            awake: AtomicBool::new(true),
            unreachable: AtomicBool::new(false),
            reject_uploads: RwLock::new(BTreeSet::new()),
            reject_creates: RwLock::new(BTreeSet::new()),
            reject_deletes: RwLock::new(BTreeSet::new()),
            clock: AtomicU64::new(1_700_000_000),
        }
    }

    /// Sets the page size used for listings.
    pub fn with_page_limit(mut self, limit: u32) -> Self {
        self.page_limit = limit.max(1);
        self
    }

    /// Seeds a gallery. Images are `(filename, size)` pairs.
    pub fn with_gallery(self, name: &str, images: &[(&str, u64)]) -> Self {
        {
            let mut galleries = self.galleries.write();
            let gallery = galleries.entry(name.to_string()).or_default();
            for (filename, size) in images {
                gallery.insert(
                    filename.to_string(),
                    StoredImage {
                        size: *size,
                        modified: None,
                    },
                );
            }
        }
        self
    }

    /// Makes every request fail as unreachable.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Sets whether the awake probe succeeds.
    pub fn set_awake(&self, awake: bool) {
        self.awake.store(awake, Ordering::SeqCst);
    }

    /// Rejects uploads of the given file name.
    pub fn reject_upload(&self, filename: &str) {
        self.reject_uploads.write().insert(filename.to_string());
    }

    /// Rejects creation of the given gallery.
    pub fn reject_create(&self, gallery: &str) {
        self.reject_creates.write().insert(gallery.to_string());
    }

    /// Rejects deletion of the given image.
    pub fn reject_delete(&self, id: AssetId) {
        self.reject_deletes.write().insert(id);
    }

    /// Returns the request log, one line per request.
    pub fn requests(&self) -> Vec<String> {
        self.log.read().clone()
    }

    /// Returns the number of logged requests that mutate the device.
    pub fn mutation_count(&self) -> usize {
        self.log
            .read()
            .iter()
            .filter(|line| !line.starts_with("GET"))
            .count()
    }

    /// Clears the request log.
    pub fn clear_requests(&self) {
        self.log.write().clear();
    }

    /// Returns the current gallery contents as `(gallery, filenames)`.
    pub fn contents(&self) -> BTreeMap<String, Vec<String>> {
        self.galleries
            .read()
            .iter()
            .map(|(name, images)| (name.clone(), images.keys().cloned().collect()))
            .collect()
    }

    /// Returns the stored size of an image.
    pub fn size_of(&self, gallery: &str, filename: &str) -> Option<u64> {
        self.galleries
            .read()
            .get(gallery)
            .and_then(|images| images.get(filename))
            .map(|image| image.size)
    }

    fn record(&self, line: String) -> SyncResult<()> {
        self.log.write().push(line);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(SyncError::unreachable("memory", "connection refused"));
        }
        Ok(())
    }
}

impl Default for MemoryGalleryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteGalleryClient for MemoryGalleryClient {
    fn list_galleries(&self) -> SyncResult<Vec<String>> {
        self.record("GET /gallery/list".into())?;
        Ok(self.galleries.read().keys().cloned().collect())
    }

    fn get_gallery_page(
        &self,
        name: &str,
        offset: u32,
        limit: u32,
    ) -> SyncResult<(Gallery, bool)> {
        self.record(format!("GET /gallery {} {}+{}", name, offset, limit))?;
        let galleries = self.galleries.read();
        let images = galleries
            .get(name)
            .ok_or_else(|| SyncError::rejected(404, "gallery not found"))?;

        let assets: Vec<RemoteAsset> = images
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .map(|(filename, image)| {
                let mut asset = RemoteAsset::new(name, filename.clone()).with_size(image.size);
                asset.modified = image.modified;
                asset
            })
            .collect();
        let has_more = (offset as usize).saturating_add(assets.len()) < images.len();

        Ok((Gallery::with_assets(name, assets), has_more))
    }

    fn page_limit(&self) -> u32 {
        self.page_limit
    }

    fn create_gallery(&self, name: &str) -> SyncResult<()> {
        self.record(format!("PUT /gallery {}", name))?;
        if self.reject_creates.read().contains(name) {
            return Err(SyncError::rejected(400, "invalid gallery name"));
        }
        self.galleries.write().entry(name.to_string()).or_default();
        Ok(())
    }

    fn upload(&self, gallery: &str, bytes: Vec<u8>, filename: &str) -> SyncResult<()> {
        self.record(format!("POST /upload {}/{}", gallery, filename))?;
        if self.reject_uploads.read().contains(filename) {
            return Err(SyncError::rejected(400, "invalid file name"));
        }
        let modified = self.clock.fetch_add(1, Ordering::SeqCst);
        let mut galleries = self.galleries.write();
        let images = galleries
            .get_mut(gallery)
            .ok_or_else(|| SyncError::rejected(404, "gallery not found"))?;
        images.insert(
            filename.to_string(),
            StoredImage {
                size: bytes.len() as u64,
                modified: Some(modified),
            },
        );
        Ok(())
    }

    fn delete_asset(&self, id: &AssetId) -> SyncResult<()> {
        self.record(format!("POST /image/delete {}", id))?;
        if self.reject_deletes.read().contains(id) {
            return Err(SyncError::rejected(403, "image is in use"));
        }
        let mut galleries = self.galleries.write();
        galleries
            .get_mut(&id.gallery)
            .and_then(|images| images.remove(&id.filename))
            .map(|_| ())
            .ok_or_else(|| SyncError::rejected(404, "image not found"))
    }

    fn delete_gallery(&self, name: &str) -> SyncResult<()> {
        self.record(format!("DELETE /gallery {}", name))?;
        self.galleries
            .write()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| SyncError::rejected(404, "gallery not found"))
    }

    fn is_awake(&self, _timeout: Duration) -> bool {
        self.log.write().push("GET /state".into());
        !self.unreachable.load(Ordering::SeqCst) && self.awake.load(Ordering::SeqCst)
    }

    fn sleep(&self) -> SyncResult<()> {
        self.record("POST /sleep".into())?;
        self.awake.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn device_info(&self) -> SyncResult<DeviceInfo> {
        self.record("GET /deviceInfo".into())?;
        Ok(DeviceInfo {
            name: Some("memory".into()),
            gallery: self.galleries.read().keys().next().cloned(),
            ..DeviceInfo::default()
        })
    }

    fn describe(&self) -> String {
        "memory".into()
    }
}
