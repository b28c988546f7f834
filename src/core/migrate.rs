//! Overlay migration engine
//!
//! Copies the live writable overlay onto the new storage, proves the result
//! with a throwaway overlay test mount, and produces the UUID-keyed overlay
//! [`MountRecord`]. Any failure here is fatal before the persisted
//! configuration is touched; partial migrations never reach the
//! configurator.

use std::path::{Path, PathBuf};

use crate::cli::output::create_spinner;
use crate::config::defaults;
use crate::error::MigrateError;
use crate::infra::{blockinfo, filesystem, mounts, process::Runner};

use super::fstab::MountRecord;

/// Directory layout on the new storage: `upper/` holds the overlay data,
/// `work/` is overlayfs scratch space.
#[derive(Debug)]
pub struct OverlayDirs {
    pub upper: PathBuf,
    pub work: PathBuf,
}

impl OverlayDirs {
    pub fn under(mount_point: &Path) -> Self {
        Self {
            upper: mount_point.join("upper"),
            work: mount_point.join("work"),
        }
    }

    /// Create both directories, idempotently.
    pub fn ensure(&self) -> Result<(), MigrateError> {
        for dir in [&self.upper, &self.work] {
            filesystem::create_dir_all(dir).map_err(|e| MigrateError::MountPointFailed {
                path: dir.clone(),
                detail: e.to_string(),
            })?;
        }
        Ok(())
    }
}

/// Runs the migration steps against the live system.
pub struct Migrator<'a> {
    runner: &'a Runner,
    /// Live writable overlay root (internal flash)
    live_overlay: PathBuf,
    /// Mount table used to verify the test mount
    proc_mounts: PathBuf,
    /// Throwaway path for the overlay test mount
    verify_dir: PathBuf,
}

impl<'a> Migrator<'a> {
    pub fn new(runner: &'a Runner) -> Self {
        Self {
            runner,
            live_overlay: PathBuf::from(defaults::LIVE_OVERLAY),
            proc_mounts: Path::new(defaults::PROC_ROOT).join("mounts"),
            verify_dir: PathBuf::from(defaults::VERIFY_MOUNT_POINT),
        }
    }

    /// Override scan/verify paths (tests)
    pub fn with_paths(mut self, live_overlay: &Path, proc_mounts: &Path, verify_dir: &Path) -> Self {
        self.live_overlay = live_overlay.to_path_buf();
        self.proc_mounts = proc_mounts.to_path_buf();
        self.verify_dir = verify_dir.to_path_buf();
        self
    }

    /// Migrate the overlay onto `partition`, mounted at `mount_point`.
    ///
    /// A partition left mounted at `mount_point` by an earlier run is
    /// reused as-is instead of mounted a second time, so the flow can be
    /// re-run against already-migrated storage.
    pub fn migrate(
        &self,
        partition: &Path,
        mount_point: &Path,
    ) -> Result<MountRecord, MigrateError> {
        filesystem::create_dir_all(mount_point).map_err(|e| MigrateError::MountPointFailed {
            path: mount_point.to_path_buf(),
            detail: e.to_string(),
        })?;

        let premounted = self.mounted_at(partition, mount_point);
        if premounted {
            tracing::info!(
                "{} already mounted at {}, reusing the mount",
                partition.display(),
                mount_point.display()
            );
        } else {
            mounts::mount_device(self.runner, partition, mount_point, None, None).map_err(
                |e| MigrateError::MountFailed {
                    device: partition.to_path_buf(),
                    target: mount_point.to_path_buf(),
                    detail: format!("{e:#}"),
                },
            )?;
        }

        let record = self.copy_and_verify(partition, mount_point);

        // Leave a pre-existing mount alone, but take down the one this run
        // created when a later step failed.
        if record.is_err() && !premounted {
            if let Err(e) = mounts::unmount(self.runner, mount_point, true) {
                tracing::warn!(
                    "cleanup unmount of {} failed: {e:#}",
                    mount_point.display()
                );
            }
        }
        record
    }

    fn copy_and_verify(
        &self,
        partition: &Path,
        mount_point: &Path,
    ) -> Result<MountRecord, MigrateError> {
        let dirs = OverlayDirs::under(mount_point);
        dirs.ensure()?;

        self.copy_overlay(&dirs)?;
        self.verify_overlay(&dirs)?;

        let uuid = blockinfo::uuid_of(self.runner, partition)?;
        let fs_type = blockinfo::fs_type_of(self.runner, partition);
        tracing::info!("overlay target {} has UUID {uuid}", partition.display());

        Ok(MountRecord::overlay(uuid, fs_type))
    }

    /// True when `device` already appears in the mount table at `target`.
    fn mounted_at(&self, device: &Path, target: &Path) -> bool {
        mounts::mount_entry_for(&self.proc_mounts, device)
            .is_some_and(|(mount_point, _)| Path::new(&mount_point) == target)
    }

    /// Archive-copy the live overlay's upper data area into the new upper
    /// directory, preserving attributes. An empty live overlay is a no-op
    /// (first-time setup).
    fn copy_overlay(&self, dirs: &OverlayDirs) -> Result<(), MigrateError> {
        let live_upper = self.live_overlay.join("upper");
        if !filesystem::dir_has_entries(&live_upper) {
            tracing::info!("live overlay is empty, nothing to copy");
            return Ok(());
        }

        let src = live_upper.display().to_string();
        let dst = dirs.upper.display().to_string();
        let spinner = create_spinner("Copying overlay contents...");
        let result = self.runner.pipe(
            ("tar", &["-C", src.as_str(), "-cf", "-", "."]),
            ("tar", &["-C", dst.as_str(), "-xf", "-"]),
        );
        spinner.finish_and_clear();

        result.map_err(|e| MigrateError::CopyFailed {
            source_path: live_upper,
            dest: dirs.upper.clone(),
            detail: format!("{e:#}"),
        })
    }

    /// Test mount: combine the existing root (read-only lower) with the new
    /// upper/work pair at a throwaway path and confirm the kernel actually
    /// mounted it. The path is unmounted and removed regardless of outcome.
    fn verify_overlay(&self, dirs: &OverlayDirs) -> Result<(), MigrateError> {
        filesystem::create_dir_all(&self.verify_dir).map_err(|e| {
            MigrateError::MountPointFailed {
                path: self.verify_dir.clone(),
                detail: e.to_string(),
            }
        })?;

        let mounted = mounts::mount_overlay(
            self.runner,
            Path::new("/"),
            &dirs.upper,
            &dirs.work,
            &self.verify_dir,
        );

        let active = match &mounted {
            Ok(()) => mounts::is_mounted(&self.proc_mounts, &self.verify_dir).unwrap_or(false),
            Err(_) => false,
        };

        // Cleanup happens regardless of outcome
        if let Err(e) = mounts::unmount(self.runner, &self.verify_dir, true) {
            tracing::warn!("cleanup unmount of {} failed: {e:#}", self.verify_dir.display());
        }
        if let Err(e) = std::fs::remove_dir(&self.verify_dir) {
            tracing::debug!("could not remove {}: {e}", self.verify_dir.display());
        }

        match (mounted, active) {
            (Ok(()), true) => Ok(()),
            (Ok(()), false) => Err(MigrateError::TestMountFailed {
                path: self.verify_dir.clone(),
                detail: "mount reported success but the path is not in the mount table"
                    .to_string(),
            }),
            (Err(e), _) => Err(MigrateError::TestMountFailed {
                path: self.verify_dir.clone(),
                detail: format!("{e:#}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_dirs_layout() {
        let dirs = OverlayDirs::under(Path::new("/mnt/extroot"));
        assert_eq!(dirs.upper, PathBuf::from("/mnt/extroot/upper"));
        assert_eq!(dirs.work, PathBuf::from("/mnt/extroot/work"));
    }

    #[test]
    fn test_overlay_dirs_ensure_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let dirs = OverlayDirs::under(dir.path());
        dirs.ensure().unwrap();
        dirs.ensure().unwrap();
        assert!(dirs.upper.is_dir());
        assert!(dirs.work.is_dir());
    }

    #[test]
    fn test_mounted_at_detects_prior_run() {
        let dir = tempfile::tempdir().unwrap();
        let mounts_path = dir.path().join("mounts");
        std::fs::write(&mounts_path, "/dev/sda1 /mnt/extroot ext4 rw,noatime 0 0\n").unwrap();

        let runner = Runner::new(true);
        let migrator = Migrator::new(&runner).with_paths(
            &dir.path().join("overlay"),
            &mounts_path,
            &dir.path().join("verify"),
        );

        assert!(migrator.mounted_at(Path::new("/dev/sda1"), Path::new("/mnt/extroot")));
        assert!(!migrator.mounted_at(Path::new("/dev/sda1"), Path::new("/mnt/other")));
        assert!(!migrator.mounted_at(Path::new("/dev/sdb1"), Path::new("/mnt/extroot")));
    }

    #[test]
    fn test_copy_overlay_skips_empty_live_overlay() {
        let dir = tempfile::tempdir().unwrap();
        let live = dir.path().join("overlay");
        std::fs::create_dir_all(live.join("upper")).unwrap();

        let runner = Runner::new(false);
        let migrator = Migrator::new(&runner).with_paths(
            &live,
            &dir.path().join("mounts"),
            &dir.path().join("verify"),
        );
        let dirs = OverlayDirs::under(&dir.path().join("mnt"));
        dirs.ensure().unwrap();

        migrator.copy_overlay(&dirs).unwrap();
        assert!(!filesystem::dir_has_entries(&dirs.upper));
    }

    #[test]
    fn test_copy_overlay_preserves_tree() {
        let dir = tempfile::tempdir().unwrap();
        let live = dir.path().join("overlay");
        std::fs::create_dir_all(live.join("upper/etc/config")).unwrap();
        std::fs::write(
            live.join("upper/etc/config/network"),
            "config interface 'lan'\n",
        )
        .unwrap();

        let runner = Runner::new(false);
        let migrator = Migrator::new(&runner).with_paths(
            &live,
            &dir.path().join("mounts"),
            &dir.path().join("verify"),
        );
        let dirs = OverlayDirs::under(&dir.path().join("mnt"));
        dirs.ensure().unwrap();

        migrator.copy_overlay(&dirs).unwrap();
        let copied = std::fs::read_to_string(dirs.upper.join("etc/config/network")).unwrap();
        assert_eq!(copied, "config interface 'lan'\n");
    }
}
