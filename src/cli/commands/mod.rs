//! CLI command implementations
//!
//! Each command is implemented in its own submodule.

pub mod doctor;
pub mod list;
pub mod migrate;
pub mod restore;
pub mod status;

use anyhow::Result;
use clap::Subcommand;
use std::path::PathBuf;

use crate::config::defaults;

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Migrate the writable overlay to external storage
    Migrate {
        /// Device path (e.g. /dev/sda); its first partition is targeted
        #[arg(short, long, conflicts_with = "partition")]
        device: Option<String>,

        /// Partition path (e.g. /dev/sda1); wins over --device
        #[arg(short, long)]
        partition: Option<String>,

        /// Where to mount the new storage
        #[arg(short, long, default_value = defaults::DEFAULT_MOUNT_POINT)]
        mount_point: PathBuf,

        /// Filesystem used with --format
        #[arg(short, long, default_value = defaults::DEFAULT_FS_TYPE)]
        fs_type: String,

        /// Swap file size in MB (0 disables swap)
        #[arg(short, long, default_value = "0")]
        swap: u64,

        /// Destructively format the partition first (asks for confirmation)
        #[arg(long)]
        format: bool,

        /// Skip the format confirmation prompt
        #[arg(short, long)]
        yes: bool,

        /// Report intended actions without performing any
        #[arg(long)]
        dry_run: bool,

        /// Mount configuration file
        #[arg(long, default_value = defaults::FSTAB_CONFIG)]
        config: PathBuf,
    },

    /// List candidate external storage devices
    List,

    /// Show the persisted overlay and swap configuration
    Status {
        /// Mount configuration file
        #[arg(long, default_value = defaults::FSTAB_CONFIG)]
        config: PathBuf,
    },

    /// Restore the mount configuration from a backup
    Restore {
        /// Backup file to restore (newest when omitted)
        #[arg(short, long)]
        backup: Option<PathBuf>,

        /// List available backups instead of restoring
        #[arg(short, long)]
        list: bool,

        /// Mount configuration file
        #[arg(long, default_value = defaults::FSTAB_CONFIG)]
        config: PathBuf,
    },

    /// Check that the required system utilities are available
    Doctor {
        /// Mount configuration file
        #[arg(long, default_value = defaults::FSTAB_CONFIG)]
        config: PathBuf,

        /// Filesystem the formatter check looks for
        #[arg(short, long, default_value = defaults::DEFAULT_FS_TYPE)]
        fs_type: String,
    },
}

impl Commands {
    /// Execute the command
    pub fn run(self) -> Result<()> {
        match self {
            Self::Migrate {
                device,
                partition,
                mount_point,
                fs_type,
                swap,
                format,
                yes,
                dry_run,
                config,
            } => {
                let options = migrate::MigrateOptions {
                    device,
                    partition,
                    mount_point,
                    fs_type,
                    swap_mb: swap,
                    format,
                    yes,
                    dry_run,
                    config,
                };
                migrate::execute(&options)
            }
            Self::List => list::execute(),
            Self::Status { config } => status::execute(&config),
            Self::Restore {
                backup,
                list,
                config,
            } => restore::execute(&config, backup.as_deref(), list),
            Self::Doctor { config, fs_type } => doctor::execute(&config, &fs_type),
        }
    }
}
