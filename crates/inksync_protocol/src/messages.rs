//! JSON payloads returned by the device.

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};

/// One entry of `GET /gallery/list`.
///
/// Firmware versions differ: some return objects, some bare names.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum GalleryListEntry {
    /// `{"name": "..."}`
    Named {
        /// Gallery name.
        name: String,
    },
    /// `"..."`
    Bare(String),
}

impl GalleryListEntry {
    /// Returns the gallery name.
    pub fn into_name(self) -> String {
        match self {
            GalleryListEntry::Named { name } => name,
            GalleryListEntry::Bare(name) => name,
        }
    }
}

/// Decodes a gallery listing into gallery names.
pub fn decode_gallery_list(bytes: &[u8]) -> ProtocolResult<Vec<String>> {
    let entries: Vec<GalleryListEntry> =
        serde_json::from_slice(bytes).map_err(|e| ProtocolError::decode("gallery list", e))?;
    Ok(entries.into_iter().map(GalleryListEntry::into_name).collect())
}

/// One image as reported inside a gallery page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ImageEntry {
    /// File name.
    pub name: String,
    /// Size in bytes, if reported.
    #[serde(default)]
    pub size: Option<u64>,
    /// Unix timestamp of the stored file, if reported.
    #[serde(default)]
    pub time: Option<u64>,
}

/// Response of `GET /gallery`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct GalleryPage {
    /// Images in this page.
    #[serde(default)]
    pub data: Vec<ImageEntry>,
    /// Total number of images in the gallery, if reported.
    #[serde(default)]
    pub total: Option<u64>,
    /// Offset echoed by the device.
    #[serde(default)]
    pub offset: Option<u64>,
    /// Limit echoed by the device.
    #[serde(default)]
    pub limit: Option<u64>,
}

impl GalleryPage {
    /// Decodes a page from JSON.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| ProtocolError::decode("gallery page", e))
    }

    /// Returns true if another page follows the one requested at
    /// `offset` with `limit`.
    ///
    /// Uses `total` when the device reports it; otherwise a full page is
    /// taken to mean more may follow.
    pub fn has_more(&self, offset: u32, limit: u32) -> bool {
        let returned = self.data.len() as u64;
        if returned == 0 {
            return false;
        }
        match self.total {
            Some(total) => u64::from(offset) + returned < total,
            None => returned >= u64::from(limit),
        }
    }
}

/// Response of `GET /deviceInfo`. Every field is optional across firmware
/// versions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceInfo {
    /// Device name.
    pub name: Option<String>,
    /// Firmware version.
    pub version: Option<String>,
    /// Board model.
    pub board_model: Option<String>,
    /// Screen model.
    pub screen_model: Option<String>,
    /// Display width in pixels.
    pub width: Option<u32>,
    /// Display height in pixels.
    pub height: Option<u32>,
    /// Station IP address.
    pub sta_ip: Option<String>,
    /// Station SSID.
    pub sta_ssid: Option<String>,
    /// Battery level in percent.
    pub battery: Option<u8>,
    /// Total storage in bytes.
    pub total_size: Option<u64>,
    /// Free storage in bytes.
    pub free_size: Option<u64>,
    /// Gallery currently displayed.
    pub gallery: Option<String>,
    /// Playlist currently active.
    pub playlist: Option<String>,
    /// Whether the filesystem is mounted.
    pub fs_ready: Option<bool>,
}

impl DeviceInfo {
    /// Decodes device info from JSON.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| ProtocolError::decode("device info", e))
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Extracts a human-readable rejection reason from an error response body.
///
/// Prefers a JSON `msg`, `message` or `error` field, then the trimmed body
/// text, then the bare status.
pub fn rejection_reason(status: u16, body: &[u8]) -> String {
    if let Ok(parsed) = serde_json::from_slice::<ErrorBody>(body) {
        if let Some(reason) = parsed.msg.or(parsed.message).or(parsed.error) {
            return reason;
        }
    }

    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        format!("HTTP {}", status)
    } else {
        text.chars().take(200).collect()
    }
}
