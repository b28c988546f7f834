//! Migration plan
//!
//! A [`MigrationPlan`] is built once per invocation from CLI input and then
//! threaded by value through every component. No component keeps its own
//! notion of the "current" device or mount point.

use std::path::PathBuf;

/// Everything one migration run needs to know, fixed at construction.
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    /// Target partition, resolved to a block special file before any
    /// destructive step
    pub partition: PathBuf,
    /// Where the new storage gets mounted
    pub mount_point: PathBuf,
    /// Filesystem used when formatting
    pub fs_type: String,
    /// Destructively format the partition first
    pub format: bool,
    /// Swap file size in megabytes, 0 disables swap
    pub swap_mb: u64,
    /// Operator confirmed the destructive format (or --yes)
    pub confirmed: bool,
    /// Report intended actions without performing any
    pub dry_run: bool,
}

impl MigrationPlan {
    pub fn new(partition: PathBuf, mount_point: PathBuf, fs_type: String) -> Self {
        Self {
            partition,
            mount_point,
            fs_type,
            format: false,
            swap_mb: 0,
            confirmed: false,
            dry_run: false,
        }
    }

    pub fn with_format(mut self, format: bool, confirmed: bool) -> Self {
        self.format = format;
        self.confirmed = confirmed;
        self
    }

    pub fn with_swap(mut self, swap_mb: u64) -> Self {
        self.swap_mb = swap_mb;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Swap provisioning requested
    pub fn wants_swap(&self) -> bool {
        self.swap_mb > 0
    }
}
