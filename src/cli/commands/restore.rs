//! CLI command implementation for `extroot restore`

use anyhow::Result;
use std::path::Path;

use crate::cli::output::print_success;
use crate::core::fstab::FstabStore;

/// Execute the restore command
pub fn execute(config: &Path, backup: Option<&Path>, list: bool) -> Result<()> {
    let store = FstabStore::new(config);

    if list {
        let backups = store.backups();
        if backups.is_empty() {
            println!("No backups next to {}.", config.display());
        } else {
            for path in backups {
                println!("{}", path.display());
            }
        }
        return Ok(());
    }

    let source = store.restore(backup)?;
    print_success(&format!(
        "Restored {} from {}",
        config.display(),
        source.display()
    ));
    Ok(())
}
