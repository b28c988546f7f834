//! Block device inventory
//!
//! Enumerates removable-class storage from the kernel's partition table
//! (`/proc/partitions`), enriched with mount state from the mount table and
//! a best-effort model string from sysfs. Read-only: no processes are
//! spawned and nothing is mutated.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::defaults;
use crate::infra::{blockinfo, mounts};

use super::resolver::DevicePath;

/// A whole block device with its child partitions.
#[derive(Debug, Clone, Serialize)]
pub struct BlockDevice {
    /// Kernel name, e.g. `sda`
    pub name: String,
    /// Stable device node path, e.g. `/dev/sda`
    pub path: PathBuf,
    /// Total size in bytes
    pub size_bytes: u64,
    /// Human-readable model string, empty when unavailable
    pub model: String,
    /// Child partitions in scan order
    pub partitions: Vec<Partition>,
}

/// One partition, the unit a migration targets.
#[derive(Debug, Clone, Serialize)]
pub struct Partition {
    /// Kernel name, e.g. `sda1`
    pub name: String,
    /// Device node path, e.g. `/dev/sda1`
    pub path: PathBuf,
    /// Parent device name (back-reference, no ownership)
    pub parent: String,
    /// Size in bytes
    pub size_bytes: u64,
    /// Filesystem type when mounted, unknown otherwise
    pub fs_type: Option<String>,
    /// Current mount point, `None` when unmounted
    pub mount_point: Option<String>,
    /// Parent device model, empty when unavailable
    pub model: String,
}

impl Partition {
    /// "unmounted" or the mount point, for display
    pub fn mount_state(&self) -> &str {
        self.mount_point.as_deref().unwrap_or("unmounted")
    }
}

/// Scans the system for candidate external storage.
#[derive(Debug, Clone)]
pub struct Inventory {
    proc_root: PathBuf,
    sys_root: PathBuf,
    dev_root: PathBuf,
}

impl Default for Inventory {
    fn default() -> Self {
        Self::new(
            Path::new(defaults::PROC_ROOT),
            Path::new(defaults::SYS_ROOT),
            Path::new(defaults::DEV_ROOT),
        )
    }
}

impl Inventory {
    pub fn new(proc_root: &Path, sys_root: &Path, dev_root: &Path) -> Self {
        Self {
            proc_root: proc_root.to_path_buf(),
            sys_root: sys_root.to_path_buf(),
            dev_root: dev_root.to_path_buf(),
        }
    }

    /// Device node path for a kernel name
    pub fn dev_path(&self, name: &str) -> PathBuf {
        self.dev_root.join(name)
    }

    /// All removable-class devices with their partitions, in scan order.
    ///
    /// A missing or unreadable enumeration source yields an empty list, not
    /// an error; callers treat empty as "no candidates".
    pub fn devices(&self) -> Vec<BlockDevice> {
        let table = match std::fs::read_to_string(self.proc_root.join("partitions")) {
            Ok(table) => table,
            Err(e) => {
                tracing::warn!("cannot read partition table: {e}");
                return Vec::new();
            }
        };

        let proc_mounts = self.proc_root.join("mounts");
        let mut devices: Vec<BlockDevice> = Vec::new();

        for line in table.lines().skip(2) {
            let mut fields = line.split_whitespace();
            let (_major, _minor, blocks, name) = match (
                fields.next(),
                fields.next(),
                fields.next(),
                fields.next(),
            ) {
                (Some(a), Some(b), Some(c), Some(d)) => (a, b, c, d),
                _ => continue,
            };
            if !is_candidate_name(name) {
                continue;
            }
            let size_bytes = blocks.parse::<u64>().unwrap_or(0) * 1024;
            let parsed = DevicePath::parse(name);

            if parsed.partition_number.is_none() {
                devices.push(BlockDevice {
                    name: name.to_string(),
                    path: self.dev_path(name),
                    size_bytes,
                    model: blockinfo::model_of(&self.sys_root, name),
                    partitions: Vec::new(),
                });
                continue;
            }

            let path = self.dev_path(name);
            let entry = mounts::mount_entry_for(&proc_mounts, &path);
            let model = devices
                .iter()
                .find(|d| d.name == parsed.device)
                .map_or_else(
                    || blockinfo::model_of(&self.sys_root, &parsed.device),
                    |d| d.model.clone(),
                );
            let partition = Partition {
                name: name.to_string(),
                path,
                parent: parsed.device.clone(),
                size_bytes,
                fs_type: entry.as_ref().map(|(_, fs)| fs.clone()),
                mount_point: entry.map(|(mp, _)| mp),
                model,
            };
            match devices.iter_mut().find(|d| d.name == parsed.device) {
                Some(parent) => parent.partitions.push(partition),
                // Partition row without a parent row; synthesize the parent
                None => devices.push(BlockDevice {
                    name: parsed.device.clone(),
                    path: self.dev_path(&parsed.device),
                    size_bytes: 0,
                    model: partition.model.clone(),
                    partitions: vec![partition],
                }),
            }
        }

        devices
    }

    /// Candidate partitions in a stable, human-presentable order.
    ///
    /// Partitioned devices contribute their partitions; a device with no
    /// partition table contributes itself as a single whole-device
    /// candidate.
    pub fn list_candidates(&self) -> Vec<Partition> {
        let proc_mounts = self.proc_root.join("mounts");
        let mut candidates = Vec::new();
        for device in self.devices() {
            if device.partitions.is_empty() {
                let entry = mounts::mount_entry_for(&proc_mounts, &device.path);
                candidates.push(Partition {
                    name: device.name.clone(),
                    path: device.path.clone(),
                    parent: device.name.clone(),
                    size_bytes: device.size_bytes,
                    fs_type: entry.as_ref().map(|(_, fs)| fs.clone()),
                    mount_point: entry.map(|(mp, _)| mp),
                    model: device.model.clone(),
                });
            } else {
                candidates.extend(device.partitions.clone());
            }
        }
        candidates
    }

    /// Find a scanned device by kernel name
    pub fn device(&self, name: &str) -> Option<BlockDevice> {
        self.devices().into_iter().find(|d| d.name == name)
    }
}

/// USB-class (`sd*`) and memory-card-class (`mmcblk*`) names
fn is_candidate_name(name: &str) -> bool {
    if let Some(rest) = name.strip_prefix("sd") {
        return !rest.is_empty() && rest.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    }
    if let Some(rest) = name.strip_prefix("mmcblk") {
        return !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit() || c == 'p');
    }
    false
}

/// Render a byte count the way `lsblk` would, for the selection list
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "K", "M", "G", "T"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes}{}", UNITS[0])
    } else {
        format!("{value:.1}{}", UNITS[unit])
    }
}
