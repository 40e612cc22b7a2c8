//! CLI command implementations.

pub mod info;
pub mod list;
pub mod sync;
pub mod wake;

use clap::Args;
use inksync_engine::{
    DeviceConfig, HttpGalleryClient, ReqwestClient, RetryConfig, DEFAULT_HOST,
};
use std::path::PathBuf;
use std::time::Duration;

/// Connection flags shared by every command that talks to the device.
#[derive(Args, Debug, Clone)]
pub struct DeviceArgs {
    /// Device IP address or host name
    #[arg(long, default_value = DEFAULT_HOST)]
    pub host: String,

    /// Device HTTP port
    #[arg(long, default_value = "80")]
    pub port: u16,

    /// Use HTTPS
    #[arg(long)]
    pub https: bool,

    /// Request timeout in seconds
    #[arg(long, default_value = "10")]
    pub timeout: u64,

    /// Attempts per idempotent request
    #[arg(long, default_value = "3")]
    pub retries: u32,
}

impl DeviceArgs {
    /// Returns the device configuration.
    pub fn config(&self) -> DeviceConfig {
        DeviceConfig::new(self.host.clone())
            .with_port(self.port)
            .with_https(self.https)
            .with_timeout(Duration::from_secs(self.timeout.max(1)))
    }

    /// Returns the retry policy.
    pub fn retry(&self) -> RetryConfig {
        RetryConfig::new(self.retries)
    }

    /// Builds an HTTP client for the device.
    pub fn client(
        &self,
    ) -> Result<HttpGalleryClient<ReqwestClient>, Box<dyn std::error::Error>> {
        let transport = ReqwestClient::new().map_err(|e| e.to_string())?;
        Ok(HttpGalleryClient::new(self.config(), transport).with_retry(self.retry()))
    }
}

/// Flags of the `sync` command.
#[derive(Args, Debug, Clone)]
pub struct SyncArgs {
    /// Local folder to sync
    #[arg(short, long)]
    pub source: PathBuf,

    #[command(flatten)]
    pub device: DeviceArgs,

    /// Upload everything into this gallery
    #[arg(short, long, conflicts_with = "by_folder")]
    pub gallery: Option<String>,

    /// Map each top-level folder to a gallery of the same name
    #[arg(long)]
    pub by_folder: bool,

    /// Gallery for files directly in the source folder (with --by-folder)
    #[arg(long, default_value = "root", requires = "by_folder")]
    pub root_gallery: String,

    /// Delete device images that are not in the source folder
    #[arg(long)]
    pub mirror: bool,

    /// Skip confirmation
    #[arg(long)]
    pub force: bool,

    /// Do not try to wake the device first
    #[arg(long)]
    pub no_wakeup: bool,

    /// Advertised device name used by the Bluetooth wake
    #[arg(long, default_value = inksync_engine::DEFAULT_DEVICE_NAME)]
    pub device_name: String,

    /// Known Bluetooth address of the device
    #[arg(long)]
    pub ble_address: Option<String>,

    /// Seconds to wait after the wake signal for the network to come up
    #[arg(long, default_value = "2")]
    pub wake_settle: u64,

    /// File extensions to sync
    #[arg(long, value_delimiter = ',', default_value = "jpg,jpeg")]
    pub extensions: Vec<String>,

    /// Follow symbolic links in the source tree
    #[arg(long)]
    pub follow_links: bool,

    /// Fingerprint files by content hash instead of size and time
    #[arg(long)]
    pub content_hash: bool,

    /// Treat a differing modification time as a change
    #[arg(long)]
    pub compare_time: bool,

    /// Number of uploads in flight
    #[arg(long, default_value = "1")]
    pub concurrency: usize,

    /// Leave the device awake after the run
    #[arg(long)]
    pub no_sleep: bool,

    /// Show the plan without changing anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    pub format: String,
}

/// Formats a byte count for humans.
pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// Rejects output formats other than text and json.
pub fn check_format(format: &str) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        "text" | "json" => Ok(()),
        other => Err(format!("Unknown format: {} (expected text or json)", other).into()),
    }
}
