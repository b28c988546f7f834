//! Verification and rollback supervisor
//!
//! Drives one migration run through its states:
//! `Prepared -> Migrated -> Configured -> {Verified | RolledBack}`.
//!
//! The backup is always taken before the first mutating write, and the
//! overlay record is always written before the swap record, so a partial
//! run leaves swap absent rather than referencing nothing.

use std::path::{Path, PathBuf};

use crate::error::{ExtrootError, MigrateError};
use crate::infra::process::Runner;

use super::fstab::{FstabStore, MountRecord};
use super::migrate::Migrator;
use super::plan::MigrationPlan;
use super::swap;

/// The migration step as the supervisor sees it. A trait seam so the
/// orchestration can be exercised without real block devices.
pub trait MigrateStep {
    fn migrate(&self, partition: &Path, mount_point: &Path)
        -> Result<MountRecord, MigrateError>;
}

impl MigrateStep for Migrator<'_> {
    fn migrate(
        &self,
        partition: &Path,
        mount_point: &Path,
    ) -> Result<MountRecord, MigrateError> {
        Migrator::migrate(self, partition, mount_point)
    }
}

/// Where a run got to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Plan built, nothing touched (terminal for dry runs)
    Prepared,
    /// Overlay copied and test-mounted on the new storage
    Migrated,
    /// Configuration written
    Configured,
    /// Configuration re-read and internally consistent; reboot to commit
    Verified,
    /// A fatal error occurred and the previous configuration was restored
    RolledBack,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Prepared => "prepared",
            Self::Migrated => "migrated",
            Self::Configured => "configured",
            Self::Verified => "verified",
            Self::RolledBack => "rolled back",
        };
        write!(f, "{name}")
    }
}

/// Outcome of a completed (or dry) run.
#[derive(Debug)]
pub struct RunReport {
    pub state: RunState,
    /// Backup taken before the first mutation, if any configuration existed
    pub backup: Option<PathBuf>,
    /// UUID the overlay record was keyed by
    pub overlay_uuid: Option<String>,
    /// Swap backing file, when provisioned
    pub swap_file: Option<PathBuf>,
    /// Non-fatal warnings collected along the way
    pub warnings: Vec<String>,
}

/// A fatal run error, tagged with the state the run ended in.
#[derive(Debug)]
pub struct RunFailure {
    pub state: RunState,
    pub source: ExtrootError,
}

impl std::fmt::Display for RunFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (run ended {})", self.source, self.state)
    }
}

impl std::error::Error for RunFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Orchestrates one operator-driven run to completion or full failure.
pub struct Supervisor<'a, M: MigrateStep> {
    store: &'a FstabStore,
    runner: &'a Runner,
    migrator: M,
}

impl<'a, M: MigrateStep> Supervisor<'a, M> {
    pub fn new(store: &'a FstabStore, runner: &'a Runner, migrator: M) -> Self {
        Self {
            store,
            runner,
            migrator,
        }
    }

    /// Execute the plan. Dry runs report intentions and stop at
    /// [`RunState::Prepared`] without touching any file.
    pub fn execute(&self, plan: &MigrationPlan) -> Result<RunReport, RunFailure> {
        if plan.dry_run {
            self.print_intentions(plan);
            return Ok(RunReport {
                state: RunState::Prepared,
                backup: None,
                overlay_uuid: None,
                swap_file: None,
                warnings: Vec::new(),
            });
        }

        // Destructive format happens before any persisted mutation; a
        // failure here aborts with nothing to roll back.
        super::format::format_partition(
            self.runner,
            &plan.partition,
            &plan.fs_type,
            plan.format,
            plan.confirmed,
        )
        .map_err(|e| RunFailure {
            state: RunState::Prepared,
            source: e.into(),
        })?;

        let overlay_record = self
            .migrator
            .migrate(&plan.partition, &plan.mount_point)
            .map_err(|e| RunFailure {
                state: RunState::Prepared,
                source: e.into(),
            })?;
        let uuid = overlay_record.key.clone();
        tracing::debug!("migration complete, state: {}", RunState::Migrated);

        // Backup strictly before the first mutating write
        let backup = self.store.backup().map_err(|e| RunFailure {
            state: RunState::Migrated,
            source: e.into(),
        })?;

        let mut warnings = Vec::new();
        let mut swap_file = None;

        let configured: Result<(), ExtrootError> = (|| {
            // Overlay record first, swap second, each in its own atomic
            // rewrite
            let mut config = self.store.load()?;
            config.upsert(overlay_record);
            config.assert_policy();
            self.store.write(&config)?;

            if plan.wants_swap() {
                if let Some(provisioned) =
                    swap::provision(self.runner, &plan.mount_point, plan.swap_mb)?
                {
                    warnings.extend(provisioned.warnings);
                    swap_file = Some(swap::swap_file_path(&plan.mount_point));

                    let mut config = self.store.load()?;
                    config.upsert(provisioned.value);
                    self.store.write(&config)?;
                }
            }
            Ok(())
        })();

        if let Err(source) = configured {
            return Err(self.roll_back(backup.as_deref(), RunState::Migrated, source));
        }

        if let Err(source) = self.verify(&uuid) {
            return Err(self.roll_back(backup.as_deref(), RunState::Configured, source));
        }

        Ok(RunReport {
            state: RunState::Verified,
            backup,
            overlay_uuid: Some(uuid),
            swap_file,
            warnings,
        })
    }

    /// Re-read the persisted overlay record and confirm it matches the
    /// resolved partition.
    fn verify(&self, uuid: &str) -> Result<(), ExtrootError> {
        let config = self.store.load()?;
        let overlay = config.overlay().ok_or_else(|| {
            ExtrootError::Verification("no overlay record found after write".to_string())
        })?;
        if overlay.key != uuid {
            return Err(ExtrootError::Verification(format!(
                "overlay record is keyed by '{}', expected '{uuid}'",
                overlay.key
            )));
        }
        if !overlay.enabled {
            return Err(ExtrootError::Verification(
                "overlay record is not enabled".to_string(),
            ));
        }
        Ok(())
    }

    /// Restore the pre-run configuration. With no backup the file did not
    /// exist before the run, so removing it is the restoration.
    fn roll_back(
        &self,
        backup: Option<&std::path::Path>,
        state: RunState,
        source: ExtrootError,
    ) -> RunFailure {
        tracing::warn!("fatal error after {state}, rolling back: {source}");
        let restored = match backup {
            Some(path) => self.store.restore(Some(path)).map(|_| ()),
            None => {
                if self.store.exists() {
                    std::fs::remove_file(self.store.path()).map_err(|e| {
                        crate::error::FstabError::WriteFile {
                            path: self.store.path().to_path_buf(),
                            detail: e.to_string(),
                        }
                    })
                } else {
                    Ok(())
                }
            }
        };
        match restored {
            Ok(()) => RunFailure {
                state: RunState::RolledBack,
                source,
            },
            Err(e) => {
                tracing::error!("rollback itself failed: {e}");
                RunFailure {
                    state,
                    source,
                }
            }
        }
    }

    fn print_intentions(&self, plan: &MigrationPlan) {
        println!("Dry run; no changes will be made.");
        if plan.format {
            println!(
                "  - would format {} as {}",
                plan.partition.display(),
                plan.fs_type
            );
        }
        println!(
            "  - would mount {} at {}",
            plan.partition.display(),
            plan.mount_point.display()
        );
        println!("  - would copy the live overlay and test-mount the result");
        println!(
            "  - would write an overlay mount record (keyed by the UUID of {}) to {}",
            plan.partition.display(),
            self.store.path().display()
        );
        if plan.wants_swap() {
            println!(
                "  - would provision a {} MB swap file at {}",
                plan.swap_mb,
                swap::swap_file_path(&plan.mount_point).display()
            );
        }
        println!("  - a reboot would then be required to activate the new overlay");
    }
}
