//! Sync actions and plans.

use crate::types::{AssetId, LocalAsset};
use serde::Serialize;
use std::fmt;

/// One remote mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SyncAction {
    /// Create a gallery that does not exist on the device.
    CreateGallery {
        /// Gallery name.
        gallery: String,
    },
    /// Upload a local file. `overwrite` is set when the device already holds
    /// a different file under the same key.
    UploadAsset {
        /// File to upload.
        asset: LocalAsset,
        /// Whether this replaces an existing image.
        overwrite: bool,
    },
    /// Delete an image absent locally (mirror mode only).
    DeleteAsset {
        /// Image to delete.
        id: AssetId,
    },
    /// Delete a gallery absent locally (mirror mode only).
    DeleteGallery {
        /// Gallery name.
        gallery: String,
    },
}

impl SyncAction {
    /// Returns the gallery this action targets.
    pub fn gallery(&self) -> &str {
        match self {
            SyncAction::CreateGallery { gallery } | SyncAction::DeleteGallery { gallery } => {
                gallery
            }
            SyncAction::UploadAsset { asset, .. } => &asset.gallery,
            SyncAction::DeleteAsset { id } => &id.gallery,
        }
    }

    /// Returns true for actions that remove content from the device.
    pub fn is_destructive(&self) -> bool {
        matches!(
            self,
            SyncAction::DeleteAsset { .. } | SyncAction::DeleteGallery { .. }
        )
    }

    /// Returns true for gallery creation.
    pub fn is_create(&self) -> bool {
        matches!(self, SyncAction::CreateGallery { .. })
    }

    /// Returns true for uploads.
    pub fn is_upload(&self) -> bool {
        matches!(self, SyncAction::UploadAsset { .. })
    }

    /// Short human-readable description.
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncAction::CreateGallery { gallery } => write!(f, "create gallery {}", gallery),
            SyncAction::UploadAsset { asset, overwrite } => {
                let verb = if *overwrite { "replace" } else { "upload" };
                write!(f, "{} {}/{}", verb, asset.gallery, asset.filename)
            }
            SyncAction::DeleteAsset { id } => write!(f, "delete {}", id),
            SyncAction::DeleteGallery { gallery } => write!(f, "delete gallery {}", gallery),
        }
    }
}

/// Mode flags of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SyncMode {
    /// Also delete remote content absent locally.
    pub mirror: bool,
    /// Skip the confirmation gate.
    pub force: bool,
}

impl SyncMode {
    /// Additive mode: never deletes.
    pub fn additive() -> Self {
        Self::default()
    }

    /// Mirror mode.
    pub fn mirror() -> Self {
        Self {
            mirror: true,
            force: false,
        }
    }

    /// Sets the force flag.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

/// Ordered list of remote mutations for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncPlan {
    /// Mode the plan was built for.
    pub mode: SyncMode,
    /// Actions in execution order.
    pub actions: Vec<SyncAction>,
    /// Local assets already present on the device with matching state.
    pub unchanged: usize,
}

impl SyncPlan {
    /// Creates an empty plan.
    pub fn new(mode: SyncMode) -> Self {
        Self {
            mode,
            actions: Vec::new(),
            unchanged: 0,
        }
    }

    /// Returns true if nothing needs to change.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Returns the number of actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Iterates over gallery creations.
    pub fn creates(&self) -> impl Iterator<Item = &SyncAction> {
        self.actions.iter().filter(|a| a.is_create())
    }

    /// Iterates over uploads (new and overwrites).
    pub fn uploads(&self) -> impl Iterator<Item = &SyncAction> {
        self.actions.iter().filter(|a| a.is_upload())
    }

    /// Iterates over destructive actions.
    pub fn deletes(&self) -> impl Iterator<Item = &SyncAction> {
        self.actions.iter().filter(|a| a.is_destructive())
    }

    /// Returns the number of bytes the uploads will transfer.
    pub fn upload_bytes(&self) -> u64 {
        self.actions
            .iter()
            .map(|a| match a {
                SyncAction::UploadAsset { asset, .. } => asset.size,
                _ => 0,
            })
            .sum()
    }

    /// Returns true if executing this plan needs an explicit confirmation:
    /// mirror mode without force, with something to do.
    pub fn requires_confirmation(&self) -> bool {
        self.mode.mirror && !self.mode.force && !self.is_empty()
    }
}
