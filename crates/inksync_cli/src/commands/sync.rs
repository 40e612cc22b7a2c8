//! Sync command implementation.

use super::{check_format, human_bytes, SyncArgs};
use inksync_core::{
    DiffOptions, FingerprintMode, GalleryMapping, ScanOptions, SyncAction, SyncPlan,
    DEFAULT_GALLERY,
};
use inksync_engine::{
    ActionOutcome, CancelToken, Confirmation, SyncConfig, SyncOptions, SyncOrchestrator,
    SyncReport, WakeRequest,
};
use serde::Serialize;
use std::future::Future;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::time::Duration;
use tracing::warn;

/// Plan summary shown before confirmation and in dry runs.
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct Overview {
    /// Images not yet on the device.
    pub new: usize,
    /// Images on the device that differ.
    pub changed: usize,
    /// Images already in sync.
    pub unchanged: usize,
    /// Images to remove from the device.
    pub to_remove: usize,
    /// Galleries to create.
    pub galleries_to_create: usize,
    /// Galleries to delete.
    pub galleries_to_delete: usize,
    /// Bytes to upload.
    pub upload_bytes: u64,
}

impl Overview {
    /// Summarizes a plan.
    pub fn of(plan: &SyncPlan) -> Self {
        let mut overview = Overview {
            unchanged: plan.unchanged,
            upload_bytes: plan.upload_bytes(),
            ..Overview::default()
        };
        for action in &plan.actions {
            match action {
                SyncAction::CreateGallery { .. } => overview.galleries_to_create += 1,
                SyncAction::UploadAsset {
                    overwrite: false, ..
                } => overview.new += 1,
                SyncAction::UploadAsset { overwrite: true, .. } => overview.changed += 1,
                SyncAction::DeleteAsset { .. } => overview.to_remove += 1,
                SyncAction::DeleteGallery { .. } => overview.galleries_to_delete += 1,
            }
        }
        overview
    }

    fn print(&self) {
        println!("Synchronization overview");
        println!("  New images:          {}", self.new);
        println!("  Changed images:      {}", self.changed);
        println!("  Unchanged images:    {}", self.unchanged);
        println!("  Images to remove:    {}", self.to_remove);
        println!("  Galleries to create: {}", self.galleries_to_create);
        println!("  Galleries to delete: {}", self.galleries_to_delete);
        println!("  Upload size:         {}", human_bytes(self.upload_bytes));
    }
}

/// Asks on the terminal before applying a plan.
struct PromptConfirmation {
    show_overview: bool,
}

impl Confirmation for PromptConfirmation {
    fn plan_built(&self, plan: &SyncPlan) {
        if self.show_overview {
            Overview::of(plan).print();
            println!();
        }
    }

    fn confirm(&self, plan: &SyncPlan) -> bool {
        // Prompts go to stderr so stdout stays parseable with --format json.
        if plan.requires_confirmation() {
            eprintln!("This will delete {} item(s) from the device.", plan.deletes().count());
        }
        eprint!("Proceed with {} action(s)? [y/N] ", plan.len());
        if io::stderr().flush().is_err() {
            return false;
        }

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => is_yes(&answer),
            Err(e) => {
                warn!("Could not read answer: {}", e);
                false
            }
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Builds the run configuration from the flags.
pub fn config_from(args: &SyncArgs) -> SyncConfig {
    let mapping = match (&args.gallery, args.by_folder) {
        (_, true) => GalleryMapping::by_folder(args.root_gallery.clone()),
        (Some(name), false) => GalleryMapping::fixed(name.clone()),
        (None, false) => GalleryMapping::fixed(DEFAULT_GALLERY),
    };
    let fingerprint = if args.content_hash {
        FingerprintMode::Content
    } else {
        FingerprintMode::Metadata
    };
    let scan = ScanOptions::new(mapping)
        .with_extensions(args.extensions.iter().map(|e| e.trim()))
        .with_fingerprint(fingerprint)
        .with_follow_links(args.follow_links);
    let wake = WakeRequest::new()
        .with_name_filter(Some(args.device_name.clone()))
        .with_known_address(args.ble_address.clone())
        .with_settle(Duration::from_secs(args.wake_settle));

    SyncConfig::new(args.device.config())
        .with_retry(args.device.retry())
        .with_scan(scan)
        .with_diff(DiffOptions::default().with_compare_modified(args.compare_time))
        .with_wake(wake)
        .with_sleep_after(!args.no_sleep)
        .with_concurrency(args.concurrency)
}

/// Builds the run options from the flags.
pub fn options_from(args: &SyncArgs) -> SyncOptions {
    SyncOptions::new()
        .with_mirror(args.mirror)
        .with_force(args.force)
        .with_wakeup(!args.no_wakeup)
        // Additive runs are confirmed too unless forced.
        .with_always_confirm(true)
}

/// Runs the sync command.
pub fn run(args: &SyncArgs) -> Result<ExitCode, Box<dyn std::error::Error>> {
    check_format(&args.format)?;
    let json = args.format == "json";

    let client = args.device.client()?;
    let orchestrator = SyncOrchestrator::new(config_from(args), client);
    let options = options_from(args);

    if args.dry_run {
        let plan = orchestrator.preview(&args.source, &options)?;
        if json {
            let output = DryRun {
                overview: Overview::of(&plan),
                plan: &plan,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            Overview::of(&plan).print();
            println!();
            for action in &plan.actions {
                println!("  {}", action);
            }
            if plan.is_empty() {
                println!("Nothing to do");
            }
        }
        return Ok(ExitCode::SUCCESS);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()?;
    watch_ctrl_c(&runtime, orchestrator.cancel_token());

    let confirmation = PromptConfirmation {
        show_overview: !json,
    };
    let report = orchestrator.run(&args.source, &options, &confirmation)?;
    runtime.shutdown_background();

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

#[derive(Serialize)]
struct DryRun<'a> {
    overview: Overview,
    plan: &'a SyncPlan,
}

/// Exit code after a second Ctrl-C.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Cancels the run on the first interrupt. In-flight requests still finish.
///
/// Returns the exit code to leave with if a second interrupt arrives.
async fn handle_interrupts<S, F>(mut signal: S, token: CancelToken) -> Option<i32>
where
    S: FnMut() -> F,
    F: Future<Output = io::Result<()>>,
{
    signal().await.ok()?;
    warn!("Interrupted; finishing in-flight requests (Ctrl-C again to quit)");
    token.cancel();

    signal().await.ok()?;
    warn!("Interrupted again; exiting");
    Some(INTERRUPTED_EXIT_CODE)
}

fn watch_ctrl_c(runtime: &tokio::runtime::Runtime, token: CancelToken) {
    runtime.spawn(async move {
        if let Some(code) = handle_interrupts(tokio::signal::ctrl_c, token).await {
            std::process::exit(code);
        }
    });
}

fn print_report(report: &SyncReport) {
    if let Some(wake) = &report.wake {
        println!("Wake: {}", wake);
    }
    for action in &report.actions {
        match &action.outcome {
            ActionOutcome::Applied => println!("  ✓ {}", action.action),
            ActionOutcome::Skipped { reason } => {
                println!("  - {} (skipped: {})", action.action, reason)
            }
            ActionOutcome::Failed { reason } => println!("  ✗ {}: {}", action.action, reason),
        }
    }

    println!();
    if report.declined() {
        println!("Plan declined; nothing was changed");
        return;
    }
    if let Some(error) = &report.error {
        println!("✗ Sync aborted: {}", error);
        return;
    }

    let counts = report.counts();
    println!(
        "Uploaded {}, deleted {}, created {} galleries, {} unchanged",
        counts.uploaded, counts.deleted, counts.created, report.unchanged
    );
    println!(
        "Transferred {} in {:.1}s ({}/s)",
        human_bytes(report.bytes_transferred()),
        report.duration.as_secs_f64(),
        human_bytes(report.throughput() as u64)
    );
    if report.is_success() {
        println!("✓ Sync complete");
    } else {
        println!(
            "✗ Sync finished with {} failed and {} skipped action(s)",
            counts.failed, counts.skipped
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use inksync_core::{AssetId, LocalAsset, SyncMode};
    use inksync_engine::RemoteScope;
    use std::path::PathBuf;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        sync: SyncArgs,
    }

    fn parse(args: &[&str]) -> SyncArgs {
        let mut argv = vec!["inksync", "--source", "/photos"];
        argv.extend_from_slice(args);
        TestCli::parse_from(argv).sync
    }

    fn upload(gallery: &str, filename: &str, overwrite: bool) -> SyncAction {
        let relative_path = PathBuf::from(gallery).join(filename);
        SyncAction::UploadAsset {
            asset: LocalAsset {
                path: PathBuf::from("/photos").join(&relative_path),
                relative_path,
                filename: filename.into(),
                gallery: gallery.into(),
                size: 100,
                fingerprint: inksync_core::Fingerprint::new(100, 0),
            },
            overwrite,
        }
    }

    fn current_thread() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread().build().unwrap()
    }

    #[test]
    fn second_interrupt_exits() {
        let token = CancelToken::new();
        let code = current_thread().block_on(handle_interrupts(
            || std::future::ready(Ok(())),
            token.clone(),
        ));
        assert_eq!(code, Some(INTERRUPTED_EXIT_CODE));
        assert!(token.is_cancelled());
    }

    #[test]
    fn single_interrupt_only_cancels() {
        let token = CancelToken::new();
        let mut calls = 0;
        let signal = move || {
            calls += 1;
            std::future::ready(if calls == 1 {
                Ok(())
            } else {
                Err(io::Error::other("handler gone"))
            })
        };
        let code = current_thread().block_on(handle_interrupts(signal, token.clone()));
        assert_eq!(code, None);
        assert!(token.is_cancelled());
    }

    #[test]
    fn defaults() {
        let args = parse(&[]);
        let config = config_from(&args);
        assert_eq!(config.scan.mapping, GalleryMapping::fixed(DEFAULT_GALLERY));
        assert_eq!(config.scan.extensions, vec!["jpg", "jpeg"]);
        assert_eq!(config.scan.fingerprint, FingerprintMode::Metadata);
        assert_eq!(config.remote_scope, RemoteScope::Mapped);
        assert!(config.sleep_after);
        assert_eq!(config.concurrency, 1);
        assert!(!config.scan.follow_links);
        assert_eq!(config.wake.settle, Duration::from_secs(2));

        let options = options_from(&args);
        assert!(!options.mirror);
        assert!(options.wakeup);
        assert!(options.always_confirm);
    }

    #[test]
    fn folder_mapping_and_flags() {
        let args = parse(&[
            "--by-folder",
            "--root-gallery",
            "misc",
            "--mirror",
            "--force",
            "--no-wakeup",
            "--no-sleep",
            "--extensions",
            "jpg,png",
            "--content-hash",
            "--concurrency",
            "3",
            "--follow-links",
            "--wake-settle",
            "5",
        ]);
        let config = config_from(&args);
        assert!(config.scan.follow_links);
        assert_eq!(config.wake.settle, Duration::from_secs(5));
        assert_eq!(config.scan.mapping, GalleryMapping::by_folder("misc"));
        assert_eq!(config.scan.extensions, vec!["jpg", "png"]);
        assert_eq!(config.scan.fingerprint, FingerprintMode::Content);
        assert!(!config.sleep_after);
        assert_eq!(config.concurrency, 3);

        let options = options_from(&args);
        assert_eq!(options.mode(), SyncMode::mirror().with_force(true));
        assert!(!options.wakeup);
    }

    #[test]
    fn gallery_conflicts_with_by_folder() {
        let result = TestCli::try_parse_from([
            "inksync",
            "--source",
            "/photos",
            "--gallery",
            "frame",
            "--by-folder",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn overview_counts() {
        let mut plan = SyncPlan::new(SyncMode::mirror());
        plan.unchanged = 4;
        plan.actions = vec![
            SyncAction::CreateGallery {
                gallery: "new".into(),
            },
            upload("new", "a.jpg", false),
            upload("old", "b.jpg", true),
            SyncAction::DeleteAsset {
                id: AssetId::new("gone", "c.jpg"),
            },
            SyncAction::DeleteGallery {
                gallery: "gone".into(),
            },
        ];

        assert_eq!(
            Overview::of(&plan),
            Overview {
                new: 1,
                changed: 1,
                unchanged: 4,
                to_remove: 1,
                galleries_to_create: 1,
                galleries_to_delete: 1,
                upload_bytes: 200,
            }
        );
    }

    #[test]
    fn yes_answers() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes("\n"));
        assert!(!is_yes("no"));
    }
}
