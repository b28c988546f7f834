//! Error types for extroot
//!
//! Domain-specific error types using thiserror.

use std::path::PathBuf;
use thiserror::Error;

/// Target resolution errors
#[derive(Error, Debug)]
pub enum ResolveError {
    /// No block devices present on the system at all
    #[error("No block devices found. Plug in a USB drive or SD card and retry.")]
    NoBlockDevices,

    /// Path does not exist
    #[error("Device not found: {path}")]
    DeviceNotFound { path: PathBuf },

    /// Path exists but is not a block special file
    #[error("Not a block device: {path} (exists, but is not a block special file)")]
    NotABlockDevice { path: PathBuf },

    /// Parent device for a synthesized partition does not exist
    #[error("Device '{device}' not found; cannot derive partition {partition}")]
    ParentMissing { device: String, partition: PathBuf },

    /// Operator cancelled interactive selection
    #[error("Selection cancelled")]
    Cancelled,

    /// Reading the interactive selection failed
    #[error("Failed to read selection: {detail}")]
    ReadInput { detail: String },

    /// Interactive selection needed but stdin is not a terminal
    #[error("No device specified and not running interactively. Use --device or --partition.")]
    NonInteractive,
}

/// Filesystem provisioning errors
#[derive(Error, Debug)]
pub enum FormatError {
    /// Formatting requested without operator confirmation
    #[error("Refusing to format {path} without confirmation. Re-run and confirm, or pass --yes.")]
    NotConfirmed { path: PathBuf },

    /// No mkfs utility for the requested filesystem
    #[error("No formatter for '{fs_type}' ('{tool}' not in PATH). Install it with: opkg install {package}")]
    FormatterMissing {
        fs_type: String,
        tool: String,
        package: String,
    },

    /// mkfs itself failed
    #[error("Formatting {path} as {fs_type} failed: {detail}")]
    MkfsFailed {
        path: PathBuf,
        fs_type: String,
        detail: String,
    },

    /// Could not unmount the target before formatting
    #[error("Failed to unmount {path} before formatting: {detail}")]
    UnmountFailed { path: PathBuf, detail: String },
}

/// Overlay migration errors
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Mount point could not be created
    #[error("Failed to create mount point '{path}': {detail}")]
    MountPointFailed { path: PathBuf, detail: String },

    /// Mounting the target partition failed
    #[error("Failed to mount {device} at {target}: {detail}")]
    MountFailed {
        device: PathBuf,
        target: PathBuf,
        detail: String,
    },

    /// Copying the live overlay failed
    #[error("Failed to copy overlay contents from {source_path} to {dest}: {detail}")]
    CopyFailed {
        source_path: PathBuf,
        dest: PathBuf,
        detail: String,
    },

    /// The overlay test mount did not come up
    #[error("Overlay test mount at {path} failed verification: {detail}")]
    TestMountFailed { path: PathBuf, detail: String },

    /// Neither `block info` nor `blkid` is available
    #[error("No block-info utility found ('block' or 'blkid'). Install one with: opkg install block-mount")]
    BlockInfoMissing,

    /// The partition has no resolvable filesystem UUID
    #[error("Could not resolve a filesystem UUID for {device}. An overlay entry keyed by nothing is unsafe; format the partition first.")]
    UuidUnavailable { device: PathBuf },
}

/// Persisted mount configuration errors
#[derive(Error, Debug)]
pub enum FstabError {
    /// Failed to read the config file
    #[error("Failed to read '{path}': {detail}")]
    ReadFile { path: PathBuf, detail: String },

    /// Failed to write the config file
    #[error("Failed to write '{path}': {detail}")]
    WriteFile { path: PathBuf, detail: String },

    /// Malformed config content
    #[error("Parse error in mount configuration at line {line}: {detail}")]
    Parse { line: usize, detail: String },

    /// Config directory missing (no supported way to persist)
    #[error("Configuration directory '{path}' does not exist; cannot persist mount configuration")]
    ConfigDirMissing { path: PathBuf },

    /// Backup creation failed
    #[error("Failed to back up '{path}': {detail}")]
    BackupFailed { path: PathBuf, detail: String },

    /// Restore requested but no backup exists
    #[error("No backup found next to '{path}'")]
    NoBackup { path: PathBuf },
}

/// Swap provisioning errors
#[derive(Error, Debug)]
pub enum SwapError {
    /// Zero-fill allocation failed
    #[error("Failed to allocate {size_mb} MB swap file at '{path}': {detail}")]
    AllocateFailed {
        path: PathBuf,
        size_mb: u64,
        detail: String,
    },

    /// Could not restrict swap file permissions
    #[error("Failed to set permissions on '{path}': {detail}")]
    PermissionsFailed { path: PathBuf, detail: String },

    /// mkswap failed
    #[error("mkswap failed on '{path}': {detail}")]
    MkswapFailed { path: PathBuf, detail: String },
}

/// Filesystem helper errors
#[derive(Error, Debug)]
pub enum FilesystemError {
    /// Failed to create directory
    #[error("Failed to create directory '{path}': {error}")]
    CreateDir { path: PathBuf, error: String },

    /// Failed to remove directory
    #[error("Failed to remove directory '{path}': {error}")]
    RemoveDir { path: PathBuf, error: String },

    /// Failed to write file
    #[error("Failed to write file '{path}': {error}")]
    WriteFile { path: PathBuf, error: String },

    /// Failed to read file
    #[error("Failed to read file '{path}': {error}")]
    ReadFile { path: PathBuf, error: String },
}

/// Top-level extroot error type
#[derive(Error, Debug)]
pub enum ExtrootError {
    /// Resolver error
    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),

    /// Format error
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    /// Migration error
    #[error("Migration error: {0}")]
    Migrate(#[from] MigrateError),

    /// Mount configuration error
    #[error("Mount configuration error: {0}")]
    Fstab(#[from] FstabError),

    /// Swap error
    #[error("Swap error: {0}")]
    Swap(#[from] SwapError),

    /// Filesystem error
    #[error("Filesystem error: {0}")]
    Filesystem(#[from] FilesystemError),

    /// Post-write verification failed
    #[error("Verification failed: {0}")]
    Verification(String),

    /// IO error
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}
