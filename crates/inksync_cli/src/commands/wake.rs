//! Wake command implementation.

use inksync_engine::{default_waker, WakeRequest};
use std::process::ExitCode;
use std::time::Duration;

fn request_from(
    device_name: String,
    ble_address: Option<String>,
    scan_timeout: u64,
    settle: u64,
) -> WakeRequest {
    WakeRequest::new()
        .with_name_filter(Some(device_name))
        .with_known_address(ble_address)
        .with_scan_timeout(Duration::from_secs(scan_timeout.max(1)))
        .with_settle(Duration::from_secs(settle))
}

/// Runs the wake command.
pub fn run(
    device_name: String,
    ble_address: Option<String>,
    scan_timeout: u64,
    settle: u64,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let request = request_from(device_name, ble_address, scan_timeout, settle);

    let outcome = default_waker().wake(&request);
    if outcome.is_confirmed() {
        println!("✓ Device {}", outcome);
        Ok(ExitCode::SUCCESS)
    } else {
        println!("✗ Wake {}", outcome);
        Ok(ExitCode::FAILURE)
    }
}
