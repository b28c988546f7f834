//! Mount and unmount operations
//!
//! Thin wrappers over the system `mount`/`umount` utilities plus
//! `/proc/mounts` parsing for verification.

use anyhow::{Context, Result};
use std::path::Path;

use super::process::Runner;

/// Mount a device at a target path.
pub fn mount_device(
    runner: &Runner,
    device: &Path,
    target: &Path,
    fstype: Option<&str>,
    options: Option<&str>,
) -> Result<()> {
    let mut args: Vec<String> = Vec::new();
    if let Some(fs) = fstype {
        args.push("-t".to_string());
        args.push(fs.to_string());
    }
    if let Some(opts) = options {
        args.push("-o".to_string());
        args.push(opts.to_string());
    }
    args.push(device.display().to_string());
    args.push(target.display().to_string());

    runner
        .run_checked("mount", &args)
        .with_context(|| format!("mounting {} at {}", device.display(), target.display()))?;
    Ok(())
}

/// Mount an overlay filesystem combining a read-only lower layer with a
/// writable upper/work pair.
pub fn mount_overlay(
    runner: &Runner,
    lower: &Path,
    upper: &Path,
    work: &Path,
    target: &Path,
) -> Result<()> {
    let options = format!(
        "lowerdir={},upperdir={},workdir={}",
        lower.display(),
        upper.display(),
        work.display()
    );
    let target_str = target.display().to_string();
    runner
        .run_checked(
            "mount",
            &[
                "-t",
                "overlay",
                "overlay",
                "-o",
                options.as_str(),
                target_str.as_str(),
            ],
        )
        .with_context(|| format!("overlay test mount at {}", target.display()))?;
    Ok(())
}

/// Unmount a target path. With `ignore_unmounted`, "not mounted" is not an
/// error.
pub fn unmount(runner: &Runner, target: &Path, ignore_unmounted: bool) -> Result<()> {
    let output = runner.run("umount", &[target])?;
    if output.success {
        return Ok(());
    }
    let stderr = output.stderr.to_lowercase();
    if ignore_unmounted && (stderr.contains("not mounted") || stderr.contains("invalid argument")) {
        tracing::debug!("{} was not mounted", target.display());
        return Ok(());
    }
    anyhow::bail!(
        "Failed to unmount {}: {}",
        target.display(),
        output.stderr.lines().next().unwrap_or("unknown error")
    );
}

/// Check whether a path appears as a mount point in the mount table.
pub fn is_mounted(proc_mounts: &Path, target: &Path) -> Result<bool> {
    let table = std::fs::read_to_string(proc_mounts)
        .with_context(|| format!("reading mount table {}", proc_mounts.display()))?;
    let target = target.display().to_string();
    Ok(table
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .any(|mp| mp == target))
}

/// Look up where a device is currently mounted, along with its filesystem
/// type, from the mount table. Returns `None` when unmounted.
pub fn mount_entry_for(proc_mounts: &Path, device: &Path) -> Option<(String, String)> {
    let table = std::fs::read_to_string(proc_mounts).ok()?;
    let device = device.display().to_string();
    for line in table.lines() {
        let mut fields = line.split_whitespace();
        let (Some(dev), Some(mp), Some(fs)) = (fields.next(), fields.next(), fields.next()) else {
            continue;
        };
        if dev == device {
            return Some((mp.to_string(), fs.to_string()));
        }
    }
    None
}
