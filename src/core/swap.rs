//! Swap provisioner
//!
//! Creates and activates a swap backing file on the new storage. Activation
//! is best-effort: a router without `swapon` still gets the persisted
//! record, so swap comes up on the next boot. Creation failures stay fatal.

use std::path::{Path, PathBuf};

use crate::config::defaults;
use crate::error::SwapError;
use crate::infra::process::Runner;

use super::fstab::MountRecord;

/// A successful result that may carry non-fatal warnings, so callers and
/// tests can tell "warning but success" apart from fatal.
#[derive(Debug)]
pub struct Provisioned<T> {
    pub value: T,
    pub warnings: Vec<String>,
}

impl<T> Provisioned<T> {
    pub fn clean(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    pub fn warn(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

/// Provision a swap file of `size_mb` megabytes under `mount_point`.
///
/// Returns `None` when `size_mb` is zero: no file is written and no record
/// is created. Otherwise the returned record is registered only after the
/// backing file exists and has swap metadata.
pub fn provision(
    runner: &Runner,
    mount_point: &Path,
    size_mb: u64,
) -> Result<Option<Provisioned<MountRecord>>, SwapError> {
    if size_mb == 0 {
        return Ok(None);
    }

    let swap_file = mount_point.join(defaults::SWAP_FILE_NAME);
    allocate(runner, &swap_file, size_mb)?;
    restrict_permissions(runner, &swap_file)?;

    let path_str = swap_file.display().to_string();
    runner
        .run_checked("mkswap", &[path_str.as_str()])
        .map_err(|e| SwapError::MkswapFailed {
            path: swap_file.clone(),
            detail: format!("{e:#}"),
        })?;

    let mut result = Provisioned::clean(MountRecord::swap(path_str.clone()));

    // Best-effort immediate activation; the record alone guarantees
    // activation on the next boot
    match activate(runner, &swap_file) {
        Ok(()) => tracing::info!("swap active on {}", swap_file.display()),
        Err(warning) => {
            tracing::warn!("{warning}");
            result = result.warn(warning);
        }
    }

    Ok(Some(result))
}

/// Zero-fill exactly `size_mb` megabytes at `path`.
fn allocate(runner: &Runner, path: &Path, size_mb: u64) -> Result<(), SwapError> {
    let args = [
        "if=/dev/zero".to_string(),
        format!("of={}", path.display()),
        "bs=1M".to_string(),
        format!("count={size_mb}"),
    ];
    runner
        .run_checked("dd", &args)
        .map_err(|e| SwapError::AllocateFailed {
            path: path.to_path_buf(),
            size_mb,
            detail: format!("{e:#}"),
        })?;
    Ok(())
}

/// Swap files must be owner-only.
fn restrict_permissions(runner: &Runner, path: &Path) -> Result<(), SwapError> {
    use std::os::unix::fs::PermissionsExt;
    if runner.is_dry_run() {
        return Ok(());
    }
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).map_err(|e| {
        SwapError::PermissionsFailed {
            path: path.to_path_buf(),
            detail: e.to_string(),
        }
    })
}

fn activate(runner: &Runner, path: &Path) -> Result<(), String> {
    if which::which("swapon").is_err() {
        return Err(format!(
            "swapon not available; {} will activate on next boot",
            path.display()
        ));
    }
    let path_str = path.display().to_string();
    match runner.run("swapon", &[path_str.as_str()]) {
        Ok(output) if output.success => Ok(()),
        Ok(output) => Err(format!(
            "swapon {} failed ({}); swap will activate on next boot",
            path.display(),
            output.stderr.lines().next().unwrap_or("unknown error").trim()
        )),
        Err(e) => Err(format!(
            "swapon {} failed ({e:#}); swap will activate on next boot",
            path.display()
        )),
    }
}

/// Expected swap file path for a mount point
pub fn swap_file_path(mount_point: &Path) -> PathBuf {
    mount_point.join(defaults::SWAP_FILE_NAME)
}
