//! Block device metadata queries
//!
//! Filesystem UUID and type lookups go through OpenWrt's `block info` when
//! present, falling back to `blkid`. Model strings come from sysfs.

use std::path::Path;

use crate::error::MigrateError;

use super::process::Runner;

/// Resolve the filesystem UUID of a partition.
///
/// Prefers `block info` (ships with block-mount on OpenWrt), falls back to
/// `blkid`. Both missing is an environment error; a present tool reporting
/// no UUID means the partition has no filesystem.
pub fn uuid_of(runner: &Runner, partition: &Path) -> Result<String, MigrateError> {
    let mut probed = false;

    if which::which("block").is_ok() {
        probed = true;
        if let Some(uuid) = block_info_field(runner, partition, "UUID") {
            return Ok(uuid);
        }
    }

    if which::which("blkid").is_ok() {
        probed = true;
        if let Some(uuid) = blkid_value(runner, partition, "UUID") {
            return Ok(uuid);
        }
    }

    if probed {
        Err(MigrateError::UuidUnavailable {
            device: partition.to_path_buf(),
        })
    } else {
        Err(MigrateError::BlockInfoMissing)
    }
}

/// Best-effort filesystem type lookup. Failures are not errors.
pub fn fs_type_of(runner: &Runner, partition: &Path) -> Option<String> {
    if which::which("block").is_ok() {
        if let Some(fs) = block_info_field(runner, partition, "TYPE") {
            return Some(fs);
        }
    }
    if which::which("blkid").is_ok() {
        return blkid_value(runner, partition, "TYPE");
    }
    None
}

/// Parse one `KEY="value"` field out of `block info <partition>` output.
fn block_info_field(runner: &Runner, partition: &Path, key: &str) -> Option<String> {
    let partition = partition.display().to_string();
    let output = runner.run("block", &["info", partition.as_str()]).ok()?;
    if !output.success {
        return None;
    }
    extract_field(&output.stdout, key)
}

fn blkid_value(runner: &Runner, partition: &Path, key: &str) -> Option<String> {
    let partition = partition.display().to_string();
    let output = runner
        .run("blkid", &["-s", key, "-o", "value", partition.as_str()])
        .ok()?;
    if !output.success {
        return None;
    }
    let value = output.stdout.trim().to_string();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Extract `KEY="value"` from block/blkid style output.
pub fn extract_field(output: &str, key: &str) -> Option<String> {
    let pattern = format!(r#"{key}="([^"]+)""#);
    let re = regex::Regex::new(&pattern).ok()?;
    re.captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Best-effort device model string from sysfs. Empty when unavailable.
pub fn model_of(sys_root: &Path, device: &str) -> String {
    let model_path = sys_root.join("block").join(device).join("device/model");
    match std::fs::read_to_string(&model_path) {
        Ok(model) => model.trim().to_string(),
        Err(e) => {
            tracing::debug!("no model for {device}: {e}");
            String::new()
        }
    }
}
