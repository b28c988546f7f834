//! Infrastructure layer
//!
//! Handles all I/O operations: filesystem, mount table, block device
//! metadata, and external processes. This module is the only place where
//! side effects occur.

pub mod blockinfo;
pub mod filesystem;
pub mod mounts;
pub mod process;
