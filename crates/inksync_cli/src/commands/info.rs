//! Info command implementation.

use super::{check_format, human_bytes, DeviceArgs};
use inksync_engine::RemoteGalleryClient;
use std::process::ExitCode;

/// Runs the info command.
pub fn run(device: &DeviceArgs, format: &str) -> Result<ExitCode, Box<dyn std::error::Error>> {
    check_format(format)?;
    let client = device.client()?;
    let info = client.device_info()?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(ExitCode::SUCCESS);
    }

    println!("Device at {}", client.base_url());
    let field = |label: &str, value: Option<String>| {
        println!("  {:<16} {}", label, value.unwrap_or_else(|| "-".into()));
    };
    field("Name:", info.name.clone());
    field("Firmware:", info.version.clone());
    field("Board:", info.board_model.clone());
    field("Screen:", info.screen_model.clone());
    field(
        "Resolution:",
        info.width
            .zip(info.height)
            .map(|(w, h)| format!("{}x{}", w, h)),
    );
    field("Battery:", info.battery.map(|b| format!("{}%", b)));
    field(
        "Storage free:",
        info.free_size
            .zip(info.total_size)
            .map(|(free, total)| format!("{} of {}", human_bytes(free), human_bytes(total))),
    );
    field("Wi-Fi:", info.sta_ssid.clone());
    field("IP:", info.sta_ip.clone());
    field("Gallery:", info.gallery.clone());
    field("Playlist:", info.playlist.clone());
    Ok(ExitCode::SUCCESS)
}
