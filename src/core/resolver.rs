//! Target resolver
//!
//! Turns a user-supplied or inferred identifier into a concrete partition
//! path plus its parent device. Device names are parsed with an enumerated
//! suffix table instead of ad hoc string slicing: NVMe/MMC-style buses
//! separate the partition number with a `p`, everything else appends the
//! number directly.

use std::io::BufRead;
use std::path::{Path, PathBuf};

use crate::error::ResolveError;

use super::inventory::{human_size, BlockDevice, Inventory, Partition};

/// Buses whose device names end in a digit and therefore take a `p<N>`
/// partition suffix (`mmcblk0p1`, `nvme0n1p2`).
const P_SUFFIX_BUSES: &[&str] = &["mmcblk", "nvme", "loop", "md"];

/// A device name split into its device and optional partition number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevicePath {
    /// Parent device name without `/dev/` prefix, e.g. `sda` or `mmcblk0`
    pub device: String,
    /// Partition number when the name addresses a partition
    pub partition_number: Option<u32>,
}

impl DevicePath {
    /// Parse a device or partition name (with or without `/dev/` prefix).
    pub fn parse(path: &str) -> Self {
        let name = path.strip_prefix("/dev/").unwrap_or(path);

        for bus in P_SUFFIX_BUSES {
            if name.starts_with(bus) {
                // Partition only when a `p<digits>` tail follows the device
                if let Some((head, tail)) = name.rsplit_once('p') {
                    if !head.is_empty()
                        && head.len() > bus.len()
                        && !tail.is_empty()
                        && tail.chars().all(|c| c.is_ascii_digit())
                        && head.ends_with(|c: char| c.is_ascii_digit())
                    {
                        return Self {
                            device: head.to_string(),
                            partition_number: tail.parse().ok(),
                        };
                    }
                }
                return Self {
                    device: name.to_string(),
                    partition_number: None,
                };
            }
        }

        let digits = name.chars().rev().take_while(char::is_ascii_digit).count();
        if digits == 0 || digits == name.len() {
            Self {
                device: name.to_string(),
                partition_number: None,
            }
        } else {
            let split = name.len() - digits;
            Self {
                device: name[..split].to_string(),
                partition_number: name[split..].parse().ok(),
            }
        }
    }

    /// True when this device's partitions carry a `p` separator
    pub fn uses_p_suffix(&self) -> bool {
        P_SUFFIX_BUSES.iter().any(|bus| self.device.starts_with(bus))
    }

    /// Synthesize the path of partition `n` on this device
    pub fn partition_path(&self, dev_root: &Path, n: u32) -> PathBuf {
        if self.uses_p_suffix() {
            dev_root.join(format!("{}p{n}", self.device))
        } else {
            dev_root.join(format!("{}{n}", self.device))
        }
    }
}

/// What kind of node a path points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    /// Nothing there
    Missing,
    /// A block special file
    BlockSpecial,
    /// Exists, but is not a block device
    Other,
}

/// Classifies device paths. A trait seam so tests can run without real
/// device nodes.
pub trait DeviceProbe {
    fn kind(&self, path: &Path) -> DeviceKind;
}

/// Probes the real filesystem
#[derive(Debug, Default)]
pub struct SystemProbe;

impl DeviceProbe for SystemProbe {
    fn kind(&self, path: &Path) -> DeviceKind {
        use std::os::unix::fs::FileTypeExt;
        match std::fs::metadata(path) {
            Ok(meta) if meta.file_type().is_block_device() => DeviceKind::BlockSpecial,
            Ok(_) => DeviceKind::Other,
            Err(_) => DeviceKind::Missing,
        }
    }
}

/// Resolves user input to a concrete (partition, parent device) pair.
pub struct Resolver<'a, P: DeviceProbe> {
    inventory: &'a Inventory,
    probe: &'a P,
    dev_root: PathBuf,
}

impl<'a, P: DeviceProbe> Resolver<'a, P> {
    pub fn new(inventory: &'a Inventory, probe: &'a P, dev_root: &Path) -> Self {
        Self {
            inventory,
            probe,
            dev_root: dev_root.to_path_buf(),
        }
    }

    /// Resolve in precedence order: explicit partition wins, then an
    /// explicit device (used directly if it already names a partition, else
    /// its first partition is synthesized), then interactive selection.
    pub fn resolve(
        &self,
        user_device: Option<&str>,
        user_partition: Option<&str>,
        input: Option<&mut dyn BufRead>,
    ) -> Result<(Partition, BlockDevice), ResolveError> {
        if let Some(partition) = user_partition {
            return self.resolve_explicit_partition(partition);
        }
        if let Some(device) = user_device {
            return self.resolve_device_argument(device);
        }
        match input {
            Some(input) => self.select_interactively(input),
            None => Err(ResolveError::NonInteractive),
        }
    }

    fn resolve_explicit_partition(
        &self,
        arg: &str,
    ) -> Result<(Partition, BlockDevice), ResolveError> {
        let path = self.to_dev_path(arg);
        match self.probe.kind(&path) {
            DeviceKind::BlockSpecial => Ok(self.build_pair(&path)),
            DeviceKind::Missing => Err(ResolveError::DeviceNotFound { path }),
            DeviceKind::Other => Err(ResolveError::NotABlockDevice { path }),
        }
    }

    fn resolve_device_argument(
        &self,
        arg: &str,
    ) -> Result<(Partition, BlockDevice), ResolveError> {
        let parsed = DevicePath::parse(arg);

        // Already looks like a partition path: use it directly
        if parsed.partition_number.is_some() {
            return self.resolve_explicit_partition(arg);
        }

        // Synthesize the first partition; only the parent device's
        // existence is checked here, the partition itself may appear after
        // formatting
        let parent_path = self.dev_root.join(&parsed.device);
        if self.probe.kind(&parent_path) == DeviceKind::Missing {
            return Err(ResolveError::ParentMissing {
                device: parsed.device.clone(),
                partition: parsed.partition_path(&self.dev_root, 1),
            });
        }
        let partition_path = parsed.partition_path(&self.dev_root, 1);
        Ok(self.build_pair(&partition_path))
    }

    /// Numbered selection loop over the inventory. Accepts a list index, a
    /// bare device name, or an absolute path; loops until a real block
    /// special file is chosen or the operator cancels with an empty line or
    /// `q`.
    fn select_interactively(
        &self,
        input: &mut dyn BufRead,
    ) -> Result<(Partition, BlockDevice), ResolveError> {
        let candidates = self.inventory.list_candidates();
        if candidates.is_empty() && self.inventory.devices().is_empty() {
            return Err(ResolveError::NoBlockDevices);
        }

        println!("Available storage:");
        for (i, candidate) in candidates.iter().enumerate() {
            println!(
                "  {}) {}  {}  {}  {}",
                i + 1,
                candidate.path.display(),
                human_size(candidate.size_bytes),
                candidate.mount_state(),
                candidate.model
            );
        }
        println!("Select a device (number, name, or path; empty to cancel):");

        loop {
            let mut line = String::new();
            match input.read_line(&mut line) {
                // End of input is a cancel, a read failure is not
                Ok(0) => return Err(ResolveError::Cancelled),
                Ok(_) => {}
                Err(e) => {
                    return Err(ResolveError::ReadInput {
                        detail: e.to_string(),
                    })
                }
            }
            let answer = line.trim();
            if answer.is_empty() || answer.eq_ignore_ascii_case("q") {
                return Err(ResolveError::Cancelled);
            }

            let path = if let Ok(index) = answer.parse::<usize>() {
                match index.checked_sub(1).and_then(|i| candidates.get(i)) {
                    Some(candidate) => candidate.path.clone(),
                    None => {
                        println!("No entry {answer}; pick one of the numbers above.");
                        continue;
                    }
                }
            } else {
                self.to_dev_path(answer)
            };

            match self.probe.kind(&path) {
                DeviceKind::BlockSpecial => return Ok(self.build_pair(&path)),
                DeviceKind::Missing => {
                    println!("{} does not exist; try again.", path.display());
                }
                DeviceKind::Other => {
                    println!("{} is not a block device; try again.", path.display());
                }
            }
        }
    }

    fn to_dev_path(&self, arg: &str) -> PathBuf {
        if arg.starts_with('/') {
            PathBuf::from(arg)
        } else {
            self.dev_root.join(arg)
        }
    }

    /// Build the (partition, parent) pair, preferring inventory data and
    /// synthesizing minimal records for paths outside the scan.
    fn build_pair(&self, path: &Path) -> (Partition, BlockDevice) {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let parsed = DevicePath::parse(&name);

        let device = self.inventory.device(&parsed.device).unwrap_or(BlockDevice {
            name: parsed.device.clone(),
            path: self.dev_root.join(&parsed.device),
            size_bytes: 0,
            model: String::new(),
            partitions: Vec::new(),
        });

        let partition = device
            .partitions
            .iter()
            .find(|p| p.name == name)
            .cloned()
            .unwrap_or(Partition {
                name,
                path: path.to_path_buf(),
                parent: parsed.device,
                size_bytes: device.size_bytes,
                fs_type: None,
                mount_point: None,
                model: device.model.clone(),
            });

        (partition, device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_suffix() {
        assert_eq!(
            DevicePath::parse("sda1"),
            DevicePath {
                device: "sda".to_string(),
                partition_number: Some(1)
            }
        );
        assert_eq!(
            DevicePath::parse("/dev/sdb12"),
            DevicePath {
                device: "sdb".to_string(),
                partition_number: Some(12)
            }
        );
        assert_eq!(DevicePath::parse("sda").partition_number, None);
    }

    #[test]
    fn test_parse_p_suffix_buses() {
        assert_eq!(
            DevicePath::parse("mmcblk0p1"),
            DevicePath {
                device: "mmcblk0".to_string(),
                partition_number: Some(1)
            }
        );
        assert_eq!(
            DevicePath::parse("/dev/nvme0n1p2"),
            DevicePath {
                device: "nvme0n1".to_string(),
                partition_number: Some(2)
            }
        );
        // Bare devices on p-suffix buses keep their trailing digits
        assert_eq!(DevicePath::parse("mmcblk0").partition_number, None);
        assert_eq!(DevicePath::parse("nvme0n1").partition_number, None);
        assert_eq!(DevicePath::parse("loop3").partition_number, None);
    }

    #[test]
    fn test_partition_path_synthesis() {
        let dev = Path::new("/dev");
        assert_eq!(
            DevicePath::parse("sda").partition_path(dev, 1),
            PathBuf::from("/dev/sda1")
        );
        assert_eq!(
            DevicePath::parse("mmcblk0").partition_path(dev, 1),
            PathBuf::from("/dev/mmcblk0p1")
        );
        assert_eq!(
            DevicePath::parse("nvme0n1").partition_path(dev, 1),
            PathBuf::from("/dev/nvme0n1p1")
        );
    }
}
