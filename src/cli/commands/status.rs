//! CLI command implementation for `extroot status`

use anyhow::Result;
use std::path::Path;

use crate::cli::output::{is_json, print_info};
use crate::core::fstab::FstabStore;

/// Execute the status command
pub fn execute(config: &Path) -> Result<()> {
    let store = FstabStore::new(config);
    let fstab = store.load()?;

    if is_json() {
        println!("{}", serde_json::to_string_pretty(&fstab)?);
        return Ok(());
    }

    if !store.exists() {
        print_info(&format!(
            "No mount configuration at {} yet.",
            config.display()
        ));
        return Ok(());
    }

    match fstab.overlay() {
        Some(overlay) => {
            println!("Overlay:");
            println!("  uuid:    {}", overlay.key);
            println!(
                "  target:  {}",
                overlay.target.as_deref().unwrap_or("(none)")
            );
            if let Some(fs) = &overlay.fs_type {
                println!("  fstype:  {fs}");
            }
            if let Some(options) = &overlay.options {
                println!("  options: {options}");
            }
            println!("  enabled: {}", if overlay.enabled { "yes" } else { "no" });
        }
        None => println!("Overlay: not configured"),
    }

    match fstab.swap() {
        Some(swap) => {
            println!("Swap:");
            println!("  device:  {}", swap.key);
            println!("  enabled: {}", if swap.enabled { "yes" } else { "no" });
        }
        None => println!("Swap: not configured"),
    }

    let backups = store.backups();
    if !backups.is_empty() {
        println!("Backups: {}", backups.len());
        if let Some(newest) = backups.last() {
            println!("  newest: {}", newest.display());
        }
    }

    Ok(())
}
