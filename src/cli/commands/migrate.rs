//! CLI command implementation for `extroot migrate`

use anyhow::{bail, Result};
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};

use crate::cli::output::{print_info, print_success, print_warning};
use crate::config::defaults;
use crate::core::fstab::FstabStore;
use crate::core::inventory::{human_size, Inventory, Partition};
use crate::core::migrate::Migrator;
use crate::core::plan::MigrationPlan;
use crate::core::resolver::{Resolver, SystemProbe};
use crate::core::supervisor::{RunState, Supervisor};
use crate::error::ResolveError;
use crate::infra::process::Runner;

/// Migrate options from CLI
#[derive(Debug, Clone)]
pub struct MigrateOptions {
    pub device: Option<String>,
    pub partition: Option<String>,
    pub mount_point: PathBuf,
    pub fs_type: String,
    pub swap_mb: u64,
    pub format: bool,
    pub yes: bool,
    pub dry_run: bool,
    pub config: PathBuf,
}

/// Execute the migrate command
pub fn execute(options: &MigrateOptions) -> Result<()> {
    let inventory = Inventory::default();
    let probe = SystemProbe;
    let resolver = Resolver::new(&inventory, &probe, Path::new(defaults::DEV_ROOT));

    let (partition, device) = resolve_target(&resolver, options)?;
    print_info(&format!(
        "Target: {} ({}, {})",
        partition.path.display(),
        human_size(partition.size_bytes),
        if device.model.is_empty() {
            "unknown model"
        } else {
            &device.model
        }
    ));

    // Destructive format needs an explicit yes before anything runs
    let confirmed = if options.format {
        options.yes || confirm_format(&partition)?
    } else {
        false
    };
    if options.format && !confirmed {
        bail!("Format cancelled by user.");
    }

    let plan = MigrationPlan::new(
        partition.path.clone(),
        options.mount_point.clone(),
        options.fs_type.clone(),
    )
    .with_format(options.format, confirmed)
    .with_swap(options.swap_mb)
    .with_dry_run(options.dry_run);

    let runner = Runner::new(options.dry_run);
    let store = FstabStore::new(&options.config);
    let migrator = Migrator::new(&runner);
    let supervisor = Supervisor::new(&store, &runner, migrator);

    let report = supervisor
        .execute(&plan)
        .map_err(|failure| anyhow::anyhow!("{failure}"))?;

    for warning in &report.warnings {
        print_warning(warning);
    }

    match report.state {
        RunState::Verified => {
            if let Some(backup) = &report.backup {
                print_info(&format!("Previous configuration saved to {}", backup.display()));
            }
            if let Some(swap_file) = &report.swap_file {
                print_info(&format!("Swap file at {}", swap_file.display()));
            }
            print_success(&format!(
                "Overlay migration written and verified (UUID {}).",
                report.overlay_uuid.as_deref().unwrap_or("unknown")
            ));
            println!("Reboot to activate the new overlay: reboot");
        }
        RunState::Prepared => {
            // Dry run; intentions were already printed
        }
        other => print_info(&format!("Run ended in state: {other}")),
    }

    Ok(())
}

fn resolve_target(
    resolver: &Resolver<'_, SystemProbe>,
    options: &MigrateOptions,
) -> Result<(Partition, crate::core::inventory::BlockDevice)> {
    if options.device.is_none() && options.partition.is_none() {
        if !io::stdin().is_terminal() {
            return Err(ResolveError::NonInteractive.into());
        }
        let stdin = io::stdin();
        let mut input = stdin.lock();
        return Ok(resolver.resolve(None, None, Some(&mut input as &mut dyn BufRead))?);
    }
    Ok(resolver.resolve(options.device.as_deref(), options.partition.as_deref(), None)?)
}

/// Require user confirmation before the destructive format
fn confirm_format(partition: &Partition) -> Result<bool> {
    // Nobody can answer without a terminal; bail before any prompt output
    if !io::stdin().is_terminal() {
        bail!(
            "Cannot prompt for confirmation in non-interactive mode.\n\
             Use --yes to skip confirmation."
        );
    }
    let stdin = io::stdin();
    let mut input = stdin.lock();
    read_confirmation(partition, &mut input)
}

fn read_confirmation(partition: &Partition, input: &mut dyn BufRead) -> Result<bool> {
    eprintln!();
    eprintln!(
        "⚠️  WARNING: This will erase all data on {}!",
        partition.path.display()
    );
    if let Some(mount) = &partition.mount_point {
        eprintln!("   Currently mounted at {mount}; it will be unmounted first.");
    }
    eprintln!();
    eprint!("   Are you sure you want to continue? [y/N] ");
    io::stderr().flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    let answer = line.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}
