//! Filesystem provisioner
//!
//! Destructively formats a resolved partition. Guarded twice: the plan's
//! format flag selects the step at all, and the confirmation flag must have
//! been set by the operator before anything runs.

use std::path::Path;

use crate::error::FormatError;
use crate::infra::{mounts, process::Runner};

/// mkfs flags and opkg package per filesystem. Unknown types fall through
/// to a bare `mkfs.<fs>` invocation and a generic install hint.
const FS_TABLE: &[(&str, &[&str], &str)] = &[
    ("ext4", &["-F"], "e2fsprogs"),
    ("ext3", &["-F"], "e2fsprogs"),
    ("ext2", &["-F"], "e2fsprogs"),
    ("f2fs", &["-f"], "f2fs-tools"),
    ("btrfs", &["-f"], "btrfs-progs"),
    ("vfat", &[], "dosfstools"),
];

/// Format `partition` as `fs_type`.
///
/// No-op when `format` is unset. Unmounts the target first, tolerating
/// "already unmounted". Irreversible, so `confirmed` must be set.
pub fn format_partition(
    runner: &Runner,
    partition: &Path,
    fs_type: &str,
    format: bool,
    confirmed: bool,
) -> Result<(), FormatError> {
    if !format {
        return Ok(());
    }
    if !confirmed {
        return Err(FormatError::NotConfirmed {
            path: partition.to_path_buf(),
        });
    }

    let tool = format!("mkfs.{fs_type}");
    if which::which(&tool).is_err() {
        return Err(FormatError::FormatterMissing {
            fs_type: fs_type.to_string(),
            tool: tool.clone(),
            package: package_hint(fs_type),
        });
    }

    mounts::unmount(runner, partition, true).map_err(|e| FormatError::UnmountFailed {
        path: partition.to_path_buf(),
        detail: format!("{e:#}"),
    })?;

    let mut args: Vec<String> = mkfs_flags(fs_type)
        .iter()
        .map(|s| (*s).to_string())
        .collect();
    args.push(partition.display().to_string());

    tracing::info!("formatting {} as {fs_type}", partition.display());
    runner
        .run_checked(&tool, &args)
        .map_err(|e| FormatError::MkfsFailed {
            path: partition.to_path_buf(),
            fs_type: fs_type.to_string(),
            detail: format!("{e:#}"),
        })?;
    Ok(())
}

fn mkfs_flags(fs_type: &str) -> &'static [&'static str] {
    FS_TABLE
        .iter()
        .find(|(fs, _, _)| *fs == fs_type)
        .map_or(&[], |(_, flags, _)| *flags)
}

fn package_hint(fs_type: &str) -> String {
    FS_TABLE
        .iter()
        .find(|(fs, _, _)| *fs == fs_type)
        .map_or_else(
            || format!("<package providing mkfs.{fs_type}>"),
            |(_, _, package)| (*package).to_string(),
        )
}
