//! Cross-crate integration test helpers.
//!
//! Provides a reference model of how a device reacts to a plan, and a
//! harness wiring an image tree, an in-memory device and an orchestrator.

use crate::fixtures::ImageTree;
use inksync_core::{AssetId, Gallery, GalleryMapping, RemoteAsset, SyncAction, SyncPlan};
use inksync_engine::{
    MemoryGalleryClient, NoopWaker, RemoteScope, SyncConfig, SyncOrchestrator, WakeOutcome,
};
use std::collections::{BTreeMap, BTreeSet};

/// Applies a plan to a remote state, the way a well-behaved device would.
pub fn apply_plan(remote: &[Gallery], plan: &SyncPlan) -> Vec<Gallery> {
    let mut galleries: BTreeMap<String, BTreeMap<String, RemoteAsset>> = remote
        .iter()
        .map(|g| {
            let assets = g
                .assets
                .iter()
                .map(|a| (a.filename().to_string(), a.clone()))
                .collect();
            (g.name.clone(), assets)
        })
        .collect();

    for action in &plan.actions {
        match action {
            SyncAction::CreateGallery { gallery } => {
                galleries.entry(gallery.clone()).or_default();
            }
            SyncAction::UploadAsset { asset, .. } => {
                let stored = RemoteAsset::new(asset.gallery.clone(), asset.filename.clone())
                    .with_size(asset.size);
                galleries
                    .get_mut(&asset.gallery)
                    .expect("Upload into a gallery that was never created")
                    .insert(asset.filename.clone(), stored);
            }
            SyncAction::DeleteAsset { id } => {
                if let Some(images) = galleries.get_mut(&id.gallery) {
                    images.remove(&id.filename);
                }
            }
            SyncAction::DeleteGallery { gallery } => {
                galleries.remove(gallery);
            }
        }
    }

    galleries
        .into_iter()
        .map(|(name, assets)| Gallery::with_assets(name, assets.into_values().collect()))
        .collect()
}

/// Returns every `(gallery, filename)` key of a remote state.
pub fn remote_keys(remote: &[Gallery]) -> BTreeSet<AssetId> {
    remote
        .iter()
        .flat_map(|g| {
            g.assets
                .iter()
                .map(move |a| AssetId::new(g.name.clone(), a.filename()))
        })
        .collect()
}

/// A test harness for end-to-end runs against an in-memory device.
pub struct SyncHarness {
    /// The local source tree.
    pub tree: ImageTree,
    /// The orchestrator under test.
    pub orchestrator: SyncOrchestrator<MemoryGalleryClient>,
}

impl SyncHarness {
    /// Creates a harness mapping top-level folders to galleries, with every
    /// device gallery in scope and a waker that always confirms.
    pub fn new(tree: ImageTree, device: MemoryGalleryClient) -> Self {
        let config = SyncConfig::default()
            .with_mapping(GalleryMapping::by_folder("root"))
            .with_remote_scope(RemoteScope::All);
        Self::with_config(tree, device, config)
    }

    /// Creates a harness with the given configuration.
    pub fn with_config(tree: ImageTree, device: MemoryGalleryClient, config: SyncConfig) -> Self {
        let waker = NoopWaker::with_outcome(WakeOutcome::Confirmed {
            address: "harness".into(),
        });
        Self {
            tree,
            orchestrator: SyncOrchestrator::with_waker(config, device, Box::new(waker)),
        }
    }

    /// Returns the device.
    pub fn device(&self) -> &MemoryGalleryClient {
        self.orchestrator.client()
    }
}
