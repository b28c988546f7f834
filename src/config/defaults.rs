//! Default configuration values

/// Persisted mount configuration file
pub const FSTAB_CONFIG: &str = "/etc/config/fstab";

/// Default mount point for the new external overlay storage
pub const DEFAULT_MOUNT_POINT: &str = "/mnt/extroot";

/// Where the overlay is mounted at boot
pub const OVERLAY_TARGET: &str = "/overlay";

/// The live writable overlay on internal flash
pub const LIVE_OVERLAY: &str = "/overlay";

/// Throwaway path used for the overlay test mount
pub const VERIFY_MOUNT_POINT: &str = "/tmp/extroot-verify";

/// Default filesystem for --format
pub const DEFAULT_FS_TYPE: &str = "ext4";

/// Mount options for the relocated overlay
pub const OVERLAY_MOUNT_OPTIONS: &str = "rw,noatime,lazytime,data=writeback";

/// Boot delay before mount attempts, lets USB enumeration settle
pub const DELAY_ROOT_SECONDS: u32 = 15;

/// Swap backing file name under the overlay mount point
pub const SWAP_FILE_NAME: &str = "swapfile";

/// Partition table source
pub const PROC_ROOT: &str = "/proc";

/// Sysfs root, for device model lookups
pub const SYS_ROOT: &str = "/sys";

/// Device node root
pub const DEV_ROOT: &str = "/dev";

/// Minimum proptest iterations
pub const MIN_PROPTEST_ITERATIONS: u32 = 100;
