//! Remote gallery client abstraction.

use inksync_core::{AssetId, Gallery, SyncResult};
use inksync_protocol::DeviceInfo;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::warn;

/// Upper bound on pages fetched for one gallery.
pub const MAX_GALLERY_PAGES: u32 = 1024;

/// Capability set of a gallery device.
///
/// This trait abstracts the device, allowing for different implementations
/// (HTTP, in-memory fake for testing, etc.). Implementations apply their own
/// retry policy; callers see only the final outcome.
pub trait RemoteGalleryClient: Send + Sync {
    /// Lists gallery names.
    fn list_galleries(&self) -> SyncResult<Vec<String>>;

    /// Fetches one page of a gallery. Returns the page and whether more
    /// pages follow.
    fn get_gallery_page(&self, name: &str, offset: u32, limit: u32)
        -> SyncResult<(Gallery, bool)>;

    /// Page size used by [`RemoteGalleryClient::get_gallery`].
    fn page_limit(&self) -> u32 {
        inksync_protocol::DEFAULT_PAGE_LIMIT
    }

    /// Fetches the full contents of a gallery, following pagination.
    fn get_gallery(&self, name: &str) -> SyncResult<Gallery> {
        let limit = self.page_limit().max(1);
        let mut gallery = Gallery::new(name);
        let mut seen: BTreeSet<String> = BTreeSet::new();
        let mut offset = 0u32;

        for _ in 0..MAX_GALLERY_PAGES {
            let (page, has_more) = self.get_gallery_page(name, offset, limit)?;
            let returned = page.assets.len() as u32;
            let before = gallery.assets.len();
            for asset in page.assets {
                if seen.insert(asset.id.filename.clone()) {
                    gallery.assets.push(asset);
                }
            }
            if !has_more || returned == 0 {
                return Ok(gallery);
            }
            // Firmware that ignores the offset keeps serving the same page.
            if gallery.assets.len() == before {
                warn!(
                    "Gallery {} page at offset {} repeated earlier images; stopping",
                    name, offset
                );
                return Ok(gallery);
            }
            offset = offset.saturating_add(returned);
        }

        warn!(
            "Gallery {} still reports more images after {} pages; stopping",
            name, MAX_GALLERY_PAGES
        );
        Ok(gallery)
    }

    /// Creates a gallery.
    fn create_gallery(&self, name: &str) -> SyncResult<()>;

    /// Uploads an image into a gallery, replacing any image of that name.
    fn upload(&self, gallery: &str, bytes: Vec<u8>, filename: &str) -> SyncResult<()>;

    /// Deletes one image.
    fn delete_asset(&self, id: &AssetId) -> SyncResult<()>;

    /// Deletes a gallery.
    fn delete_gallery(&self, name: &str) -> SyncResult<()>;

    /// Returns true if the device answers within `timeout`. Never retries.
    fn is_awake(&self, timeout: Duration) -> bool;

    /// Puts the device to sleep.
    fn sleep(&self) -> SyncResult<()>;

    /// Fetches hardware and firmware details.
    fn device_info(&self) -> SyncResult<DeviceInfo>;

    /// Human-readable device address for logs and errors.
    fn describe(&self) -> String;
}

impl<T: RemoteGalleryClient + ?Sized> RemoteGalleryClient for std::sync::Arc<T> {
    fn list_galleries(&self) -> SyncResult<Vec<String>> {
        (**self).list_galleries()
    }

    fn get_gallery_page(
        &self,
        name: &str,
        offset: u32,
        limit: u32,
    ) -> SyncResult<(Gallery, bool)> {
        (**self).get_gallery_page(name, offset, limit)
    }

    fn page_limit(&self) -> u32 {
        (**self).page_limit()
    }

    fn get_gallery(&self, name: &str) -> SyncResult<Gallery> {
        (**self).get_gallery(name)
    }

    fn create_gallery(&self, name: &str) -> SyncResult<()> {
        (**self).create_gallery(name)
    }

    fn upload(&self, gallery: &str, bytes: Vec<u8>, filename: &str) -> SyncResult<()> {
        (**self).upload(gallery, bytes, filename)
    }

    fn delete_asset(&self, id: &AssetId) -> SyncResult<()> {
        (**self).delete_asset(id)
    }

    fn delete_gallery(&self, name: &str) -> SyncResult<()> {
        (**self).delete_gallery(name)
    }

    fn is_awake(&self, timeout: Duration) -> bool {
        (**self).is_awake(timeout)
    }

    fn sleep(&self) -> SyncResult<()> {
        (**self).sleep()
    }

    fn device_info(&self) -> SyncResult<DeviceInfo> {
        (**self).device_info()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
