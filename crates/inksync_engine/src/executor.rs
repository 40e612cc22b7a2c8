//! Plan execution.
//!
//! Runs a [`SyncPlan`] against a device in three phases:
//!
//! 1. Gallery creates, sequentially
//! 2. Uploads, with bounded concurrency
//! 3. Asset and gallery deletes, sequentially
//!
//! A failed action never aborts the run. A failed create marks every action
//! on that gallery skipped.

use crate::client::RemoteGalleryClient;
use crate::report::{ActionOutcome, ActionReport, SkipReason};
use inksync_core::{LocalAsset, SyncAction, SyncPlan, SyncResult};
use parking_lot::Mutex;
use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Shared cancellation flag.
///
/// Cancelling stops new actions from being issued; in-flight actions finish.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Clears the flag.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    /// Returns true if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Executes plans against one device.
pub struct Executor<'a, R: RemoteGalleryClient + ?Sized> {
    client: &'a R,
    concurrency: usize,
    cancel: CancelToken,
}

impl<'a, R: RemoteGalleryClient + ?Sized> Executor<'a, R> {
    /// Creates an executor running one upload at a time.
    pub fn new(client: &'a R) -> Self {
        Self {
            client,
            concurrency: 1,
            cancel: CancelToken::new(),
        }
    }

    /// Sets the maximum number of uploads in flight.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Sets the cancellation token.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Executes the plan. Returns one report per action, in plan order.
    pub fn execute(&self, plan: &SyncPlan) -> Vec<ActionReport> {
        let results: Mutex<Vec<Option<ActionReport>>> = Mutex::new(vec![None; plan.len()]);
        let mut failed_galleries: BTreeSet<String> = BTreeSet::new();

        // Phase 1: creates.
        for (index, action) in plan.actions.iter().enumerate() {
            if let SyncAction::CreateGallery { gallery } = action {
                let report = self.run_one(action, || self.client.create_gallery(gallery).map(|_| 0));
                if report.outcome.is_failed() {
                    failed_galleries.insert(gallery.clone());
                }
                results.lock()[index] = Some(report);
            }
        }

        // Phase 2: uploads.
        let mut queue: VecDeque<(usize, &LocalAsset)> = VecDeque::new();
        for (index, action) in plan.actions.iter().enumerate() {
            if let SyncAction::UploadAsset { asset, .. } = action {
                if failed_galleries.contains(&asset.gallery) {
                    results.lock()[index] = Some(ActionReport::skipped(
                        action.clone(),
                        SkipReason::DependencyFailed {
                            gallery: asset.gallery.clone(),
                        },
                    ));
                } else {
                    queue.push_back((index, asset));
                }
            }
        }

        let workers = self.concurrency.min(queue.len());
        let queue = Mutex::new(queue);
        std::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| loop {
                    let next = queue.lock().pop_front();
                    let Some((index, asset)) = next else {
                        break;
                    };
                    let action = &plan.actions[index];
                    let report = self.run_one(action, || self.upload(asset));
                    results.lock()[index] = Some(report);
                });
            }
        });

        // Phase 3: deletes.
        for (index, action) in plan.actions.iter().enumerate() {
            let report = match action {
                SyncAction::DeleteAsset { id } if failed_galleries.contains(&id.gallery) => {
                    ActionReport::skipped(
                        action.clone(),
                        SkipReason::DependencyFailed {
                            gallery: id.gallery.clone(),
                        },
                    )
                }
                SyncAction::DeleteAsset { id } => {
                    self.run_one(action, || self.client.delete_asset(id).map(|_| 0))
                }
                SyncAction::DeleteGallery { gallery } => {
                    self.run_one(action, || self.client.delete_gallery(gallery).map(|_| 0))
                }
                _ => continue,
            };
            results.lock()[index] = Some(report);
        }

        results
            .into_inner()
            .into_iter()
            .zip(plan.actions.iter())
            .map(|(report, action)| {
                // Every slot is filled by one of the phases above.
                report.unwrap_or_else(|| ActionReport::skipped(action.clone(), SkipReason::Cancelled))
            })
            .collect()
    }

    fn upload(&self, asset: &LocalAsset) -> SyncResult<u64> {
        let bytes = std::fs::read(&asset.path)?;
        let len = bytes.len() as u64;
        self.client.upload(&asset.gallery, bytes, &asset.filename)?;
        Ok(len)
    }

    fn run_one<F>(&self, action: &SyncAction, op: F) -> ActionReport
    where
        F: FnOnce() -> SyncResult<u64>,
    {
        if self.cancel.is_cancelled() {
            return ActionReport::skipped(action.clone(), SkipReason::Cancelled);
        }

        let start = Instant::now();
        let (outcome, bytes) = match op() {
            Ok(bytes) => {
                info!("{}", action);
                (ActionOutcome::Applied, bytes)
            }
            Err(e) => {
                warn!("{} failed: {}", action, e);
                (
                    ActionOutcome::Failed {
                        reason: e.to_string(),
                    },
                    0,
                )
            }
        };

        ActionReport {
            action: action.clone(),
            outcome,
            bytes,
            duration: start.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryGalleryClient;
    use inksync_core::{AssetId, Fingerprint, SyncMode};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn asset(root: &Path, gallery: &str, filename: &str, bytes: &[u8]) -> LocalAsset {
        let path = root.join(filename);
        fs::write(&path, bytes).unwrap();
        LocalAsset {
            relative_path: filename.into(),
            path,
            filename: filename.into(),
            gallery: gallery.into(),
            size: bytes.len() as u64,
            fingerprint: Fingerprint::new(bytes.len() as u64, 0),
        }
    }

    fn plan(actions: Vec<SyncAction>) -> SyncPlan {
        let mut plan = SyncPlan::new(SyncMode::mirror().with_force(true));
        plan.actions = actions;
        plan
    }

    #[test]
    fn executes_in_phases() {
        let dir = TempDir::new().unwrap();
        let device = MemoryGalleryClient::new().with_gallery("old", &[("x.jpg", 1)]);
        let plan = plan(vec![
            SyncAction::CreateGallery {
                gallery: "new".into(),
            },
            SyncAction::UploadAsset {
                asset: asset(dir.path(), "new", "a.jpg", b"abc"),
                overwrite: false,
            },
            SyncAction::DeleteAsset {
                id: AssetId::new("old", "x.jpg"),
            },
            SyncAction::DeleteGallery {
                gallery: "old".into(),
            },
        ]);

        let reports = Executor::new(&device).execute(&plan);
        assert!(reports.iter().all(|r| r.outcome.is_applied()));
        assert_eq!(reports[1].bytes, 3);
        assert_eq!(
            device.requests(),
            vec![
                "PUT /gallery new",
                "POST /upload new/a.jpg",
                "POST /image/delete old/x.jpg",
                "DELETE /gallery old",
            ]
        );
    }

    #[test]
    fn failed_create_skips_dependents() {
        let dir = TempDir::new().unwrap();
        let device = MemoryGalleryClient::new();
        device.reject_create("bad");
        let plan = plan(vec![
            SyncAction::CreateGallery {
                gallery: "bad".into(),
            },
            SyncAction::CreateGallery {
                gallery: "good".into(),
            },
            SyncAction::UploadAsset {
                asset: asset(dir.path(), "bad", "a.jpg", b"a"),
                overwrite: false,
            },
            SyncAction::UploadAsset {
                asset: asset(dir.path(), "good", "b.jpg", b"b"),
                overwrite: false,
            },
        ]);

        let reports = Executor::new(&device).execute(&plan);
        assert!(reports[0].outcome.is_failed());
        assert!(reports[1].outcome.is_applied());
        assert_eq!(
            reports[2].outcome,
            ActionOutcome::Skipped {
                reason: SkipReason::DependencyFailed {
                    gallery: "bad".into()
                }
            }
        );
        assert!(reports[3].outcome.is_applied());
    }

    #[test]
    fn one_failure_does_not_stop_the_rest() {
        let dir = TempDir::new().unwrap();
        let device = MemoryGalleryClient::new().with_gallery("g", &[]);
        device.reject_upload("b.jpg");
        let plan = plan(vec![
            SyncAction::UploadAsset {
                asset: asset(dir.path(), "g", "a.jpg", b"a"),
                overwrite: false,
            },
            SyncAction::UploadAsset {
                asset: asset(dir.path(), "g", "b.jpg", b"b"),
                overwrite: false,
            },
            SyncAction::UploadAsset {
                asset: asset(dir.path(), "g", "c.jpg", b"c"),
                overwrite: false,
            },
        ]);

        let reports = Executor::new(&device).execute(&plan);
        assert!(reports[0].outcome.is_applied());
        assert!(reports[1].outcome.is_failed());
        assert!(reports[2].outcome.is_applied());
        assert_eq!(device.contents()["g"], vec!["a.jpg", "c.jpg"]);
    }

    #[test]
    fn rejected_delete_does_not_stop_later_deletes() {
        let device = MemoryGalleryClient::new()
            .with_gallery("old", &[("x.jpg", 1), ("y.jpg", 2)])
            .with_gallery("stale", &[("z.jpg", 3)]);
        device.reject_delete(AssetId::new("old", "x.jpg"));
        let plan = plan(vec![
            SyncAction::DeleteAsset {
                id: AssetId::new("old", "x.jpg"),
            },
            SyncAction::DeleteAsset {
                id: AssetId::new("old", "y.jpg"),
            },
            SyncAction::DeleteAsset {
                id: AssetId::new("stale", "z.jpg"),
            },
            SyncAction::DeleteGallery {
                gallery: "stale".into(),
            },
        ]);

        let reports = Executor::new(&device).execute(&plan);
        assert_eq!(reports.iter().filter(|r| r.outcome.is_failed()).count(), 1);
        assert!(reports[0].outcome.is_failed());
        assert!(reports[1..].iter().all(|r| r.outcome.is_applied()));
        assert_eq!(device.contents()["old"], vec!["x.jpg"]);
        assert!(!device.contents().contains_key("stale"));
    }

    #[test]
    fn missing_local_file_fails_its_upload() {
        let device = MemoryGalleryClient::new().with_gallery("g", &[]);
        let dir = TempDir::new().unwrap();
        let gone = LocalAsset {
            relative_path: "gone.jpg".into(),
            path: dir.path().join("gone.jpg"),
            filename: "gone.jpg".into(),
            gallery: "g".into(),
            size: 1,
            fingerprint: Fingerprint::new(1, 0),
        };
        let plan = plan(vec![SyncAction::UploadAsset {
            asset: gone,
            overwrite: false,
        }]);

        let reports = Executor::new(&device).execute(&plan);
        assert!(reports[0].outcome.is_failed());
        assert_eq!(device.mutation_count(), 0);
    }

    #[test]
    fn concurrent_uploads_fill_every_slot() {
        let dir = TempDir::new().unwrap();
        let device = MemoryGalleryClient::new().with_gallery("g", &[]);
        let actions = (0..12)
            .map(|i| SyncAction::UploadAsset {
                asset: asset(dir.path(), "g", &format!("{:02}.jpg", i), &[i as u8; 4]),
                overwrite: false,
            })
            .collect();
        let plan = plan(actions);

        let reports = Executor::new(&device).with_concurrency(4).execute(&plan);
        assert_eq!(reports.len(), 12);
        assert!(reports.iter().all(|r| r.outcome.is_applied()));
        for (report, action) in reports.iter().zip(&plan.actions) {
            assert_eq!(&report.action, action);
        }
        assert_eq!(device.contents()["g"].len(), 12);
    }

    #[test]
    fn cancelled_before_start_issues_nothing() {
        let device = MemoryGalleryClient::new();
        let cancel = CancelToken::new();
        cancel.cancel();
        let plan = plan(vec![
            SyncAction::CreateGallery {
                gallery: "g".into(),
            },
            SyncAction::DeleteGallery {
                gallery: "h".into(),
            },
        ]);

        let reports = Executor::new(&device).with_cancel(cancel).execute(&plan);
        assert!(reports.iter().all(|r| r.outcome
            == ActionOutcome::Skipped {
                reason: SkipReason::Cancelled
            }));
        assert!(device.requests().is_empty());
    }
}
