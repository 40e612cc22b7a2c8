//! Sync orchestrator state machine.

use crate::client::RemoteGalleryClient;
use crate::config::{RemoteScope, SyncConfig, SyncOptions};
use crate::executor::{CancelToken, Executor};
use crate::report::{ActionReport, SkipReason, SyncReport};
use crate::wake::{default_waker, WakeOutcome, Waker};
use inksync_core::{diff, scan, Gallery, LocalSnapshot, SyncError, SyncPlan, SyncResult};
use parking_lot::RwLock;
use serde::Serialize;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Stage of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Nothing happened yet.
    Start,
    /// The device was probed and, if asleep, woken.
    WakeAttempted,
    /// Remote galleries were listed and fetched.
    RemoteSnapshotTaken,
    /// The plan was computed.
    PlanBuilt,
    /// Waiting for the user to confirm the plan.
    AwaitingConfirmation,
    /// Actions are being issued.
    Executing,
    /// The run finished.
    Done,
    /// The run ended early on a fatal error.
    Failed,
}

impl RunState {
    /// Returns true while a run is in progress.
    pub fn is_active(&self) -> bool {
        !matches!(self, RunState::Start | RunState::Done | RunState::Failed)
    }

    /// Returns true if a new run can start.
    pub fn can_start(&self) -> bool {
        !self.is_active()
    }
}

/// Statistics across runs of one orchestrator.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Runs that reached `Done`.
    pub runs_completed: u64,
    /// Actions applied.
    pub actions_applied: u64,
    /// Actions failed.
    pub actions_failed: u64,
    /// Bytes uploaded.
    pub bytes_uploaded: u64,
    /// End of the last run.
    pub last_run_time: Option<Instant>,
    /// Last fatal error message.
    pub last_error: Option<String>,
}

/// Decides whether a plan may be executed.
pub trait Confirmation: Send + Sync {
    /// Called once the plan is built, whether or not confirmation is needed.
    fn plan_built(&self, _plan: &SyncPlan) {}

    /// Returns true to execute the plan.
    fn confirm(&self, plan: &SyncPlan) -> bool;
}

/// Confirms every plan.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm;

impl Confirmation for AutoConfirm {
    fn confirm(&self, _plan: &SyncPlan) -> bool {
        true
    }
}

impl<F> Confirmation for F
where
    F: Fn(&SyncPlan) -> bool + Send + Sync,
{
    fn confirm(&self, plan: &SyncPlan) -> bool {
        self(plan)
    }
}

/// Drives one device through snapshot, plan and execution.
pub struct SyncOrchestrator<R: RemoteGalleryClient> {
    config: SyncConfig,
    client: R,
    waker: Box<dyn Waker>,
    state: RwLock<RunState>,
    stats: RwLock<SyncStats>,
    cancel: CancelToken,
}

impl<R: RemoteGalleryClient> SyncOrchestrator<R> {
    /// Creates an orchestrator with the best waker this build supports.
    pub fn new(config: SyncConfig, client: R) -> Self {
        Self::with_waker(config, client, default_waker())
    }

    /// Creates an orchestrator with the given waker.
    pub fn with_waker(config: SyncConfig, client: R, waker: Box<dyn Waker>) -> Self {
        Self {
            config,
            client,
            waker,
            state: RwLock::new(RunState::Start),
            stats: RwLock::new(SyncStats::default()),
            cancel: CancelToken::new(),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the device client.
    pub fn client(&self) -> &R {
        &self.client
    }

    /// Gets the current state.
    pub fn state(&self) -> RunState {
        *self.state.read()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Returns a token that cancels the running sync from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Cancels any ongoing run.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    fn set_state(&self, state: RunState) {
        debug!("Run state: {:?}", state);
        *self.state.write() = state;
    }

    fn check_cancelled(&self) -> SyncResult<()> {
        if self.cancel.is_cancelled() {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Runs a full sync of `root`.
    ///
    /// # Errors
    ///
    /// Local failures (`SourceNotFound`, `DuplicateAssetKey`) are returned
    /// before the device is touched. Device failures while taking the remote
    /// snapshot end the run as `Failed` and are carried in the report.
    pub fn run(
        &self,
        root: &Path,
        options: &SyncOptions,
        confirmation: &dyn Confirmation,
    ) -> SyncResult<SyncReport> {
        let start = Instant::now();
        self.cancel.reset();
        self.set_state(RunState::Start);

        let mode = options.mode();
        let mut report = SyncReport::new(mode);

        // Local first: a bad root never wakes the device.
        let local = match scan(root, &self.config.scan) {
            Ok(local) => local,
            Err(e) => return Err(self.fail(e)),
        };
        report.local_assets = local.len();
        info!("Found {} local image(s) in {:?}", local.len(), root);

        let (plan, wake) = match self.plan_for(&local, options) {
            Ok(planned) => planned,
            Err((e, _)) if e.is_local() => return Err(self.fail(e)),
            Err((e, wake)) => {
                warn!("Run failed: {}", e);
                report.wake = wake;
                report.error = Some(e.to_string());
                report.error_kind = Some(e.kind());
                report.state = RunState::Failed;
                report.duration = start.elapsed();
                self.fail(e);
                return Ok(report);
            }
        };
        report.wake = wake;
        report.unchanged = plan.unchanged;
        confirmation.plan_built(&plan);

        let needs_confirmation = !plan.is_empty()
            && !options.force
            && (options.mirror || options.always_confirm);
        if needs_confirmation {
            self.set_state(RunState::AwaitingConfirmation);
            let confirmed = confirmation.confirm(&plan);
            report.confirmed = Some(confirmed);
            if !confirmed {
                info!("Plan declined; nothing applied");
                report.actions = plan
                    .actions
                    .iter()
                    .map(|a| ActionReport::skipped(a.clone(), SkipReason::NotConfirmed))
                    .collect();
                return Ok(self.finish(report, start));
            }
        }

        self.set_state(RunState::Executing);
        report.actions = Executor::new(&self.client)
            .with_concurrency(self.config.concurrency)
            .with_cancel(self.cancel.clone())
            .execute(&plan);

        Ok(self.finish(report, start))
    }

    /// Computes the plan without executing it.
    pub fn preview(&self, root: &Path, options: &SyncOptions) -> SyncResult<SyncPlan> {
        self.cancel.reset();
        self.set_state(RunState::Start);

        let local = scan(root, &self.config.scan).map_err(|e| self.fail(e))?;
        let result = self.plan_for(&local, options);
        if self.config.sleep_after {
            self.put_to_sleep();
        }

        match result {
            Ok((plan, _)) => {
                self.set_state(RunState::Done);
                Ok(plan)
            }
            Err((e, _)) => Err(self.fail(e)),
        }
    }

    /// Wakes the device if needed, takes the remote snapshot and diffs.
    fn plan_for(
        &self,
        local: &LocalSnapshot,
        options: &SyncOptions,
    ) -> Result<(SyncPlan, Option<WakeOutcome>), (SyncError, Option<WakeOutcome>)> {
        let wake = if options.wakeup {
            Some(self.wake())
        } else {
            None
        };
        self.set_state(RunState::WakeAttempted);

        let remote = self
            .check_cancelled()
            .and_then(|_| self.remote_snapshot())
            .map_err(|e| (e, wake.clone()))?;
        self.set_state(RunState::RemoteSnapshotTaken);

        let plan = diff(&local.assets, &remote, options.mode(), &self.config.diff)
            .map_err(|e| (e, wake.clone()))?;
        self.set_state(RunState::PlanBuilt);
        info!(
            "Plan: {} to create, {} to upload, {} to delete, {} unchanged",
            plan.creates().count(),
            plan.uploads().count(),
            plan.deletes().count(),
            plan.unchanged
        );

        Ok((plan, wake))
    }

    fn wake(&self) -> WakeOutcome {
        if self.client.is_awake(self.config.awake_probe_timeout) {
            debug!("Device already awake");
            return WakeOutcome::AlreadyAwake;
        }

        info!("Waking device");
        let outcome = self.waker.wake(&self.config.wake);
        match &outcome {
            WakeOutcome::Confirmed { address } => info!("Wake signal sent to {}", address),
            other => warn!("Wake {}; continuing", other),
        }
        outcome
    }

    fn remote_snapshot(&self) -> SyncResult<Vec<Gallery>> {
        let names = self.client.list_galleries()?;
        let mut galleries = Vec::new();
        for name in names {
            let in_scope = match self.config.remote_scope {
                RemoteScope::All => true,
                RemoteScope::Mapped => self.config.scan.mapping.manages(&name),
            };
            if !in_scope {
                debug!("Ignoring gallery {} outside the mapping", name);
                continue;
            }
            self.check_cancelled()?;
            galleries.push(self.client.get_gallery(&name)?);
        }
        debug!("Remote snapshot: {} gallery(ies)", galleries.len());
        Ok(galleries)
    }

    fn put_to_sleep(&self) -> bool {
        match self.client.sleep() {
            Ok(()) => {
                debug!("Device put to sleep");
                true
            }
            Err(e) => {
                warn!("Could not put the device to sleep: {}", e);
                false
            }
        }
    }

    fn fail(&self, error: SyncError) -> SyncError {
        self.set_state(RunState::Failed);
        self.stats.write().last_error = Some(error.to_string());
        error
    }

    fn finish(&self, mut report: SyncReport, start: Instant) -> SyncReport {
        if self.config.sleep_after {
            report.slept = self.put_to_sleep();
        }

        self.set_state(RunState::Done);
        report.state = RunState::Done;
        report.duration = start.elapsed();

        let counts = report.counts();
        {
            let mut stats = self.stats.write();
            stats.runs_completed += 1;
            stats.actions_applied += counts.applied as u64;
            stats.actions_failed += counts.failed as u64;
            stats.bytes_uploaded += report.bytes_transferred();
            stats.last_run_time = Some(Instant::now());
            stats.last_error = None;
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryGalleryClient;
    use crate::wake::NoopWaker;
    use inksync_core::{ErrorKind, GalleryMapping};
    use std::fs;
    use tempfile::TempDir;

    fn orchestrator(device: MemoryGalleryClient) -> SyncOrchestrator<MemoryGalleryClient> {
        let config = SyncConfig::default()
            .with_mapping(GalleryMapping::by_folder("root"))
            .with_remote_scope(RemoteScope::All);
        SyncOrchestrator::with_waker(config, device, Box::new(NoopWaker::confirmed()))
    }

    fn tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("galleryA")).unwrap();
        fs::write(dir.path().join("galleryA/img1.jpg"), b"0123456789").unwrap();
        dir
    }

    #[test]
    fn run_state_checks() {
        assert!(RunState::Start.can_start());
        assert!(RunState::Done.can_start());
        assert!(RunState::Failed.can_start());
        assert!(RunState::Executing.is_active());
        assert!(!RunState::AwaitingConfirmation.can_start());
    }

    #[test]
    fn initial_state() {
        let orchestrator = orchestrator(MemoryGalleryClient::new());
        assert_eq!(orchestrator.state(), RunState::Start);
        assert_eq!(orchestrator.stats().runs_completed, 0);
    }

    #[test]
    fn successful_run() {
        let dir = tree();
        let orchestrator = orchestrator(MemoryGalleryClient::new());
        let report = orchestrator
            .run(dir.path(), &SyncOptions::new(), &AutoConfirm)
            .unwrap();

        assert!(report.is_success());
        assert_eq!(report.counts().created, 1);
        assert_eq!(report.counts().uploaded, 1);
        assert_eq!(report.bytes_transferred(), 10);
        assert!(report.slept);
        assert_eq!(orchestrator.state(), RunState::Done);
        assert_eq!(orchestrator.stats().runs_completed, 1);
    }

    #[test]
    fn awake_device_is_not_woken() {
        let dir = tree();
        let config = SyncConfig::default().with_mapping(GalleryMapping::by_folder("root"));
        // A waker that would fail shows up in the report if it is called.
        let orchestrator = SyncOrchestrator::with_waker(
            config,
            MemoryGalleryClient::new(),
            Box::new(NoopWaker::with_outcome(WakeOutcome::Unavailable {
                reason: "no adapter".into(),
            })),
        );
        let report = orchestrator
            .run(dir.path(), &SyncOptions::new(), &AutoConfirm)
            .unwrap();
        assert_eq!(report.wake, Some(WakeOutcome::AlreadyAwake));
        assert_eq!(report.wake.unwrap().to_string(), "already awake");
    }

    #[test]
    fn unconfirmed_wake_does_not_block() {
        let dir = tree();
        let device = MemoryGalleryClient::new();
        device.set_awake(false);
        let config = SyncConfig::default().with_mapping(GalleryMapping::by_folder("root"));
        let orchestrator = SyncOrchestrator::with_waker(
            config,
            device,
            Box::new(NoopWaker::with_outcome(WakeOutcome::NotConfirmed {
                reason: "not found".into(),
            })),
        );

        let report = orchestrator
            .run(dir.path(), &SyncOptions::new(), &AutoConfirm)
            .unwrap();
        assert!(report.is_success());
        assert!(!report.wake.unwrap().is_confirmed());
    }

    #[test]
    fn missing_root_never_touches_the_device() {
        let dir = TempDir::new().unwrap();
        let orchestrator = orchestrator(MemoryGalleryClient::new());
        let result = orchestrator.run(&dir.path().join("nope"), &SyncOptions::new(), &AutoConfirm);

        assert!(matches!(result, Err(SyncError::SourceNotFound { .. })));
        assert_eq!(orchestrator.state(), RunState::Failed);
        assert!(orchestrator.client().requests().is_empty());
    }

    #[test]
    fn unreachable_device_fails_the_run() {
        let dir = tree();
        let device = MemoryGalleryClient::new();
        device.set_unreachable(true);
        let orchestrator = orchestrator(device);

        let report = orchestrator
            .run(dir.path(), &SyncOptions::new(), &AutoConfirm)
            .unwrap();
        assert_eq!(report.state, RunState::Failed);
        assert!(report.actions.is_empty());
        assert_eq!(report.error_kind, Some(ErrorKind::DeviceUnreachable));
        assert!(report.error.unwrap().contains("unreachable"));
        assert!(orchestrator.stats().last_error.is_some());
    }

    #[test]
    fn declined_mirror_applies_nothing() {
        let dir = tree();
        let device = MemoryGalleryClient::new().with_gallery("galleryB", &[("img2.jpg", 20)]);
        let orchestrator = orchestrator(device);

        let report = orchestrator
            .run(
                dir.path(),
                &SyncOptions::new().with_mirror(true),
                &|_: &SyncPlan| false,
            )
            .unwrap();

        assert!(report.declined());
        assert!(report.is_success());
        assert_eq!(report.counts().applied, 0);
        assert_eq!(report.counts().skipped, report.actions.len());
        // Only the sleep mutates the device.
        assert_eq!(orchestrator.client().mutation_count(), 1);
    }

    #[test]
    fn additive_run_skips_confirmation() {
        let dir = tree();
        let orchestrator = orchestrator(MemoryGalleryClient::new());
        let report = orchestrator
            .run(dir.path(), &SyncOptions::new(), &|_: &SyncPlan| false)
            .unwrap();
        assert_eq!(report.confirmed, None);
        assert_eq!(report.counts().applied, 2);
    }

    #[test]
    fn always_confirm_asks_for_additive_runs() {
        let dir = tree();
        let orchestrator = orchestrator(MemoryGalleryClient::new());
        let report = orchestrator
            .run(
                dir.path(),
                &SyncOptions::new().with_always_confirm(true),
                &|_: &SyncPlan| false,
            )
            .unwrap();
        assert!(report.declined());
        assert_eq!(report.counts().applied, 0);
    }

    #[test]
    fn preview_does_not_mutate() {
        let dir = tree();
        let config = SyncConfig::default()
            .with_mapping(GalleryMapping::by_folder("root"))
            .with_sleep_after(false);
        let orchestrator = SyncOrchestrator::with_waker(
            config,
            MemoryGalleryClient::new(),
            Box::new(NoopWaker::confirmed()),
        );

        let plan = orchestrator
            .preview(dir.path(), &SyncOptions::new())
            .unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(orchestrator.client().mutation_count(), 0);
    }
}
