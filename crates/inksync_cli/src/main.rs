//! inksync CLI
//!
//! Command-line tool keeping a BLOOMIN8 e-ink frame in step with a local
//! photo folder.
//!
//! # Commands
//!
//! - `sync` - Upload new and changed images, optionally mirror deletions
//! - `list` - List device galleries with image counts
//! - `wake` - Send the Bluetooth wake signal
//! - `info` - Display device information

mod commands;

use clap::{Parser, Subcommand};
use commands::{DeviceArgs, SyncArgs};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Sync a photo folder to a BLOOMIN8 e-ink frame.
#[derive(Parser)]
#[command(name = "inksync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync a local folder to the device
    Sync(SyncArgs),

    /// List device galleries with image counts
    List {
        #[command(flatten)]
        device: DeviceArgs,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Send the Bluetooth wake signal
    Wake {
        /// Advertised device name to look for
        #[arg(long, default_value = inksync_engine::DEFAULT_DEVICE_NAME)]
        device_name: String,

        /// Known Bluetooth address; skips name matching
        #[arg(long)]
        ble_address: Option<String>,

        /// Scan timeout in seconds
        #[arg(long, default_value = "10")]
        scan_timeout: u64,

        /// Seconds to wait after the signal for the network to come up
        #[arg(long, default_value = "2")]
        settle: u64,
    },

    /// Display device information
    Info {
        #[command(flatten)]
        device: DeviceArgs,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over the flag
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Sync(args) => commands::sync::run(&args),
        Commands::List { device, format } => commands::list::run(&device, &format),
        Commands::Wake {
            device_name,
            ble_address,
            scan_timeout,
            settle,
        } => commands::wake::run(device_name, ble_address, scan_timeout, settle),
        Commands::Info { device, format } => commands::info::run(&device, &format),
    }
}
