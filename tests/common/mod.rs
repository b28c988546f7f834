//! Common test utilities and helpers
//!
//! Builds fake `/proc`, `/sys`, and `/dev` trees plus a temp-dir mount
//! configuration so the core can be exercised without real block devices.

#![allow(dead_code)]

use std::path::PathBuf;
use tempfile::TempDir;

use extroot::core::fstab::FstabStore;
use extroot::core::inventory::Inventory;

/// Test rig with fake system roots
pub struct TestRig {
    pub dir: TempDir,
}

impl TestRig {
    pub fn new() -> Self {
        let rig = Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        };
        std::fs::create_dir_all(rig.proc_root()).expect("Failed to create proc root");
        std::fs::create_dir_all(rig.sys_root()).expect("Failed to create sys root");
        std::fs::create_dir_all(rig.dev_root()).expect("Failed to create dev root");
        std::fs::create_dir_all(rig.config_dir()).expect("Failed to create config dir");
        // An empty mount table by default
        rig.write_mounts("");
        rig
    }

    pub fn proc_root(&self) -> PathBuf {
        self.dir.path().join("proc")
    }

    pub fn sys_root(&self) -> PathBuf {
        self.dir.path().join("sys")
    }

    pub fn dev_root(&self) -> PathBuf {
        self.dir.path().join("dev")
    }

    pub fn config_dir(&self) -> PathBuf {
        self.dir.path().join("etc/config")
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir().join("fstab")
    }

    /// Write the fake `/proc/partitions` (header included)
    pub fn write_partitions(&self, rows: &str) {
        let content = format!("major minor  #blocks  name\n\n{rows}");
        std::fs::write(self.proc_root().join("partitions"), content)
            .expect("Failed to write partitions");
    }

    /// Write the fake `/proc/mounts`
    pub fn write_mounts(&self, content: &str) {
        std::fs::write(self.proc_root().join("mounts"), content)
            .expect("Failed to write mounts");
    }

    /// Record a sysfs model string for a device
    pub fn set_model(&self, device: &str, model: &str) {
        let dir = self.sys_root().join("block").join(device).join("device");
        std::fs::create_dir_all(&dir).expect("Failed to create sysfs dir");
        std::fs::write(dir.join("model"), format!("{model}\n")).expect("Failed to write model");
    }

    /// Create a stand-in device node (a regular file; tests that need the
    /// block-special distinction use a fake probe instead)
    pub fn add_dev_node(&self, name: &str) -> PathBuf {
        let path = self.dev_root().join(name);
        std::fs::write(&path, "").expect("Failed to create dev node");
        path
    }

    pub fn inventory(&self) -> Inventory {
        Inventory::new(&self.proc_root(), &self.sys_root(), &self.dev_root())
    }

    pub fn store(&self) -> FstabStore {
        FstabStore::new(&self.config_path())
    }

    pub fn read_config(&self) -> String {
        std::fs::read_to_string(self.config_path()).expect("Failed to read config")
    }
}

impl Default for TestRig {
    fn default() -> Self {
        Self::new()
    }
}
