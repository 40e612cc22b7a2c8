//! Property-based test generators using proptest.
//!
//! Names are drawn from small alphabets so local and remote states overlap
//! often: that is where reconciliation gets interesting.

use inksync_core::{Fingerprint, Gallery, LocalAsset, RemoteAsset};
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Strategy for gallery names.
pub fn gallery_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("g[a-d]").expect("Invalid regex")
}

/// Strategy for image file names.
pub fn filename_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-f]{1,2}\\.jpg").expect("Invalid regex")
}

/// Strategy for image sizes. A small range makes equal sizes likely.
pub fn size_strategy() -> impl Strategy<Value = u64> {
    1u64..6
}

/// Builds a local asset as the scanner would for a folder mapping.
pub fn local_asset(gallery: &str, filename: &str, size: u64) -> LocalAsset {
    let relative_path = PathBuf::from(gallery).join(filename);
    LocalAsset {
        path: PathBuf::from("/source").join(&relative_path),
        relative_path,
        filename: filename.to_string(),
        gallery: gallery.to_string(),
        size,
        fingerprint: Fingerprint::new(size, 1_700_000_000),
    }
}

/// Strategy for one local asset.
pub fn local_asset_strategy() -> impl Strategy<Value = LocalAsset> {
    (gallery_name_strategy(), filename_strategy(), size_strategy())
        .prop_map(|(gallery, filename, size)| local_asset(&gallery, &filename, size))
}

/// Strategy for a local snapshot with unique `(gallery, filename)` keys.
pub fn local_assets_strategy(max: usize) -> impl Strategy<Value = Vec<LocalAsset>> {
    prop::collection::vec(local_asset_strategy(), 0..max).prop_map(|assets| {
        let unique: BTreeMap<_, _> = assets.into_iter().map(|a| (a.key(), a)).collect();
        unique.into_values().collect()
    })
}

/// Strategy for remote gallery state. Galleries may be empty.
pub fn remote_galleries_strategy(max_galleries: usize) -> impl Strategy<Value = Vec<Gallery>> {
    prop::collection::btree_map(
        gallery_name_strategy(),
        prop::collection::btree_map(filename_strategy(), size_strategy(), 0..5),
        0..max_galleries,
    )
    .prop_map(|galleries| {
        galleries
            .into_iter()
            .map(|(name, images)| {
                let assets = images
                    .into_iter()
                    .map(|(filename, size)| RemoteAsset::new(name.clone(), filename).with_size(size))
                    .collect();
                Gallery::with_assets(name, assets)
            })
            .collect()
    })
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
