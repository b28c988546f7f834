//! CLI command implementation for `extroot list`

use anyhow::Result;

use crate::cli::output::{is_json, print_info};
use crate::core::inventory::{human_size, Inventory};

/// Execute the list command
pub fn execute() -> Result<()> {
    let inventory = Inventory::default();
    let candidates = inventory.list_candidates();

    if is_json() {
        println!("{}", serde_json::to_string_pretty(&candidates)?);
        return Ok(());
    }

    if candidates.is_empty() {
        print_info("No removable storage found. Plug in a USB drive or SD card and retry.");
        return Ok(());
    }

    println!("{:<4}{:<16}{:>8}  {:<8}{:<16}{}", "#", "DEVICE", "SIZE", "FS", "MOUNTED", "MODEL");
    for (i, candidate) in candidates.iter().enumerate() {
        println!(
            "{:<4}{:<16}{:>8}  {:<8}{:<16}{}",
            i + 1,
            candidate.path.display(),
            human_size(candidate.size_bytes),
            candidate.fs_type.as_deref().unwrap_or("-"),
            candidate.mount_state(),
            candidate.model
        );
    }
    Ok(())
}
