//! List command implementation.

use super::{check_format, human_bytes, DeviceArgs};
use inksync_engine::RemoteGalleryClient;
use serde::Serialize;
use std::process::ExitCode;

/// One gallery as listed.
#[derive(Debug, Serialize)]
pub struct GallerySummary {
    /// Gallery name.
    pub name: String,
    /// Number of images.
    pub images: usize,
    /// Total image size in bytes, as reported by the device.
    pub bytes: u64,
}

/// Runs the list command.
pub fn run(device: &DeviceArgs, format: &str) -> Result<ExitCode, Box<dyn std::error::Error>> {
    check_format(format)?;
    let client = device.client()?;

    let mut summaries = Vec::new();
    for name in client.list_galleries()? {
        let gallery = client.get_gallery(&name)?;
        summaries.push(GallerySummary {
            images: gallery.len(),
            bytes: gallery.total_size(),
            name,
        });
    }

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(ExitCode::SUCCESS);
    }

    println!("Galleries on {}", client.base_url());
    if summaries.is_empty() {
        println!("  (none)");
    }
    for summary in &summaries {
        println!(
            "  {:<24} {:>6} images  {:>10}",
            summary.name,
            summary.images,
            human_bytes(summary.bytes)
        );
    }
    Ok(ExitCode::SUCCESS)
}
