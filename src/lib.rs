//! Extroot - OpenWrt overlay migration
//!
//! This library provides the core functionality for provisioning external
//! block storage on an OpenWrt router and migrating the writable overlay
//! (`/overlay`) onto it, with UUID-keyed persisted mount configuration,
//! optional swap provisioning, and backup-based rollback.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`cli`] - Command-line interface parsing and output formatting
//! - [`core`] - Business logic (plan, resolve, migrate, configure, verify)
//! - [`infra`] - Infrastructure layer (filesystem, mounts, processes)
//! - [`config`] - Configuration and constants
//! - [`error`] - Error types and handling

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod infra;
