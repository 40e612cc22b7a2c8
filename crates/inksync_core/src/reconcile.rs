//! Reconciliation engine.
//!
//! Diffs a local snapshot against the remote gallery state and emits the
//! ordered plan that brings the device in line with the local tree.
//!
//! ## Key Invariants
//!
//! - Identity is `(gallery, filename)`; two local files on one key are an
//!   error, never a silent pick
//! - Matching keys with equal state produce no action
//! - Without mirror mode no delete action is ever emitted
//! - Plan order: gallery creates, uploads, asset deletes, gallery deletes

use crate::error::{CoreResult, SyncError};
use crate::plan::{SyncAction, SyncMode, SyncPlan};
use crate::types::{AssetId, Gallery, LocalAsset, RemoteAsset};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Tuning of change detection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffOptions {
    /// Treat a local file modified after the device timestamp as changed.
    ///
    /// Off by default: it relies on the device clock being correct.
    pub compare_modified: bool,
}

impl DiffOptions {
    /// Enables timestamp comparison.
    pub fn with_compare_modified(mut self, enabled: bool) -> Self {
        self.compare_modified = enabled;
        self
    }
}

/// Computes the plan that reconciles `remote` with `local`.
///
/// # Errors
///
/// Returns `DuplicateAssetKey` if two local assets map to the same
/// `(gallery, filename)`.
pub fn diff(
    local: &[LocalAsset],
    remote: &[Gallery],
    mode: SyncMode,
    options: &DiffOptions,
) -> CoreResult<SyncPlan> {
    let local_by_key = index_local(local)?;

    let mut remote_galleries: BTreeSet<&str> = BTreeSet::new();
    let mut remote_by_key: BTreeMap<AssetId, &RemoteAsset> = BTreeMap::new();
    for gallery in remote {
        remote_galleries.insert(gallery.name.as_str());
        for asset in &gallery.assets {
            // Membership comes from the containing gallery.
            let key = AssetId::new(gallery.name.clone(), asset.filename());
            if remote_by_key.insert(key, asset).is_some() {
                debug!("Device listed {}/{} twice", gallery.name, asset.filename());
            }
        }
    }

    let mut plan = SyncPlan::new(mode);
    let mut creates: BTreeSet<&str> = BTreeSet::new();
    let mut uploads = Vec::new();

    for (key, asset) in &local_by_key {
        match remote_by_key.get(key) {
            None => {
                if !remote_galleries.contains(asset.gallery.as_str()) {
                    creates.insert(asset.gallery.as_str());
                }
                uploads.push(SyncAction::UploadAsset {
                    asset: (*asset).clone(),
                    overwrite: false,
                });
            }
            Some(existing) if has_changed(asset, existing, options) => {
                uploads.push(SyncAction::UploadAsset {
                    asset: (*asset).clone(),
                    overwrite: true,
                });
            }
            Some(_) => plan.unchanged += 1,
        }
    }

    plan.actions.extend(creates.into_iter().map(|gallery| SyncAction::CreateGallery {
        gallery: gallery.to_string(),
    }));
    plan.actions.extend(uploads);

    if mode.mirror {
        for key in remote_by_key.keys() {
            if !local_by_key.contains_key(key) {
                plan.actions.push(SyncAction::DeleteAsset { id: key.clone() });
            }
        }

        let local_galleries: BTreeSet<&str> =
            local_by_key.keys().map(|k| k.gallery.as_str()).collect();
        for gallery in remote_galleries {
            if !local_galleries.contains(gallery) {
                plan.actions.push(SyncAction::DeleteGallery {
                    gallery: gallery.to_string(),
                });
            }
        }
    }

    debug!(
        "Plan: {} action(s), {} unchanged, mirror={}",
        plan.len(),
        plan.unchanged,
        mode.mirror
    );
    Ok(plan)
}

fn index_local(local: &[LocalAsset]) -> CoreResult<BTreeMap<AssetId, &LocalAsset>> {
    let mut by_key: BTreeMap<AssetId, &LocalAsset> = BTreeMap::new();
    for asset in local {
        let key = asset.key();
        if let Some(existing) = by_key.get(&key) {
            return Err(SyncError::DuplicateAssetKey {
                gallery: key.gallery,
                filename: key.filename,
                first: existing.relative_path.clone(),
                second: asset.relative_path.clone(),
            });
        }
        by_key.insert(key, asset);
    }
    Ok(by_key)
}

/// Returns true if the remote copy differs from the local file.
///
/// Only what the device exposes is compared: its fingerprint if it has one,
/// then its size, then (optionally) its timestamp.
pub fn has_changed(local: &LocalAsset, remote: &RemoteAsset, options: &DiffOptions) -> bool {
    if let Some(fingerprint) = &remote.fingerprint {
        if !fingerprint.same_content(&local.fingerprint) {
            return true;
        }
    }
    if let Some(size) = remote.size {
        if size != local.size {
            return true;
        }
    }
    if options.compare_modified {
        if let Some(modified) = remote.modified {
            if local.fingerprint.modified > modified {
                return true;
            }
        }
    }
    false
}
