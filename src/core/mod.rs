//! Core business logic module
//!
//! # Submodules
//!
//! - [`plan`] - The immutable per-invocation migration plan
//! - [`inventory`] - Block device inventory (removable storage scan)
//! - [`resolver`] - Device/partition identifier resolution
//! - [`format`] - Guarded destructive filesystem provisioning
//! - [`migrate`] - Overlay copy, test mount, and UUID resolution
//! - [`fstab`] - Persisted declarative mount configuration with backups
//! - [`swap`] - Swap file provisioning with best-effort activation
//! - [`supervisor`] - Run state machine, verification, rollback
//! - [`doctor`] - Environment checks

pub mod doctor;
pub mod format;
pub mod fstab;
pub mod inventory;
pub mod migrate;
pub mod plan;
pub mod resolver;
pub mod supervisor;
pub mod swap;
