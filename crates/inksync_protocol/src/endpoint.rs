//! Request descriptors for the device control API.

/// HTTP method of a device request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET.
    Get,
    /// PUT.
    Put,
    /// POST.
    Post,
    /// DELETE.
    Delete,
}

impl Method {
    /// Returns the method name as sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

/// A device endpoint together with its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Brief task processor status; used as a liveness probe.
    State,
    /// Hardware and firmware details.
    DeviceInfo,
    /// Names of all galleries.
    GalleryList,
    /// One page of a gallery's images.
    Gallery {
        /// Gallery name.
        name: String,
        /// Index of the first image.
        offset: u32,
        /// Maximum images in the page.
        limit: u32,
    },
    /// Create or update a gallery.
    PutGallery {
        /// Gallery name.
        name: String,
    },
    /// Delete a gallery and its images.
    DeleteGallery {
        /// Gallery name.
        name: String,
    },
    /// Upload one image (multipart body).
    Upload {
        /// Target gallery.
        gallery: String,
        /// File name stored on the device.
        filename: String,
    },
    /// Delete one image.
    DeleteImage {
        /// Gallery containing the image.
        gallery: String,
        /// Image file name.
        image: String,
    },
    /// Put the device to sleep.
    Sleep,
}

impl Endpoint {
    /// Returns the HTTP method.
    pub fn method(&self) -> Method {
        match self {
            Endpoint::State | Endpoint::DeviceInfo | Endpoint::GalleryList => Method::Get,
            Endpoint::Gallery { .. } => Method::Get,
            Endpoint::PutGallery { .. } => Method::Put,
            Endpoint::DeleteGallery { .. } => Method::Delete,
            Endpoint::Upload { .. } | Endpoint::DeleteImage { .. } | Endpoint::Sleep => {
                Method::Post
            }
        }
    }

    /// Returns the request path.
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::State => "/state",
            Endpoint::DeviceInfo => "/deviceInfo",
            Endpoint::GalleryList => "/gallery/list",
            Endpoint::Gallery { .. }
            | Endpoint::PutGallery { .. }
            | Endpoint::DeleteGallery { .. } => "/gallery",
            Endpoint::Upload { .. } => "/upload",
            Endpoint::DeleteImage { .. } => "/image/delete",
            Endpoint::Sleep => "/sleep",
        }
    }

    /// Returns the query parameters, in the order the device documents them.
    pub fn query(&self) -> Vec<(&'static str, String)> {
        match self {
            Endpoint::State | Endpoint::DeviceInfo | Endpoint::GalleryList | Endpoint::Sleep => {
                Vec::new()
            }
            Endpoint::Gallery {
                name,
                offset,
                limit,
            } => vec![
                ("gallery_name", name.clone()),
                ("offset", offset.to_string()),
                ("limit", limit.to_string()),
            ],
            Endpoint::PutGallery { name } | Endpoint::DeleteGallery { name } => {
                vec![("gallery_name", name.clone())]
            }
            Endpoint::Upload { gallery, filename } => vec![
                ("filename", filename.clone()),
                ("gallery", gallery.clone()),
                // Do not switch the display to each uploaded image.
                ("show_now", "0".to_string()),
            ],
            Endpoint::DeleteImage { gallery, image } => vec![
                ("image", image.clone()),
                ("gallery", gallery.clone()),
            ],
        }
    }

    /// Returns true if repeating the request cannot change device state twice.
    pub fn is_idempotent(&self) -> bool {
        !matches!(self, Endpoint::Sleep)
    }
}
