//! Persistent mount configuration
//!
//! The declarative mount store (`/etc/config/fstab`) modeled as typed
//! records instead of raw text: [`FstabConfig::parse`] and
//! [`FstabConfig::render`] are a pure function pair, and [`FstabStore`]
//! adds atomic rewrites, timestamped backups, and restore.
//!
//! Invariant: the overlay record is keyed by filesystem UUID, never by a
//! device path, because device letters can change across reboots.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::defaults;
use crate::error::FstabError;

/// Which mount a record describes. A `mount` section targeting anything
/// other than the overlay is a foreign entry from a hand-maintained file;
/// it is carried through rewrites untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MountRole {
    Overlay,
    Swap,
    Other,
}

/// One persisted declarative mount entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountRecord {
    pub role: MountRole,
    /// Stable key: filesystem UUID for overlay, backing file path for swap
    pub key: String,
    /// Mount target; swap entries have none
    pub target: Option<String>,
    /// `option device` of a foreign mount section; never set on records
    /// this tool creates
    pub device: Option<String>,
    pub fs_type: Option<String>,
    pub options: Option<String>,
    pub enabled: bool,
}

impl MountRecord {
    /// Overlay entry with the robust default mount options
    pub fn overlay(uuid: impl Into<String>, fs_type: Option<String>) -> Self {
        Self {
            role: MountRole::Overlay,
            key: uuid.into(),
            target: Some(defaults::OVERLAY_TARGET.to_string()),
            device: None,
            fs_type,
            options: Some(defaults::OVERLAY_MOUNT_OPTIONS.to_string()),
            enabled: true,
        }
    }

    /// Swap entry keyed by its backing file path
    pub fn swap(device: impl Into<String>) -> Self {
        Self {
            role: MountRole::Swap,
            key: device.into(),
            target: None,
            device: None,
            fs_type: None,
            options: None,
            enabled: true,
        }
    }
}

/// Global policy for the mount subsystem, re-asserted on every rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlobalPolicy {
    pub anon_swap: bool,
    pub anon_mount: bool,
    pub auto_swap: bool,
    pub auto_mount: bool,
    /// Boot delay in seconds before mount attempts, lets USB settle
    pub delay_root: u32,
    pub check_fs: bool,
}

impl Default for GlobalPolicy {
    fn default() -> Self {
        Self {
            anon_swap: false,
            anon_mount: false,
            auto_swap: true,
            auto_mount: true,
            delay_root: defaults::DELAY_ROOT_SECONDS,
            check_fs: false,
        }
    }
}

/// The whole persisted configuration: one global section plus an ordered
/// list of mount records, at most one per role after an upsert.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FstabConfig {
    pub global: GlobalPolicy,
    pub mounts: Vec<MountRecord>,
}

impl FstabConfig {
    /// Parse UCI fstab text. Pure; the inverse of [`render`](Self::render).
    pub fn parse(text: &str) -> Result<Self, FstabError> {
        enum Section {
            None,
            Global,
            Mount(MountRecord),
            Swap(MountRecord),
            Skip,
        }

        let mut config = Self::default();
        let mut section = Section::None;

        // Role is decided at section close: only the section targeting the
        // overlay is ours, everything else is a foreign entry to preserve
        let mut close = |config: &mut Self, section: Section| match section {
            Section::Mount(mut record) => {
                if record.target.as_deref() != Some(defaults::OVERLAY_TARGET) {
                    record.role = MountRole::Other;
                    tracing::debug!(
                        "keeping foreign mount section (target {:?})",
                        record.target
                    );
                }
                config.mounts.push(record);
            }
            Section::Swap(record) => config.mounts.push(record),
            _ => {}
        };

        for (line_no, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(rest) = line
                .strip_prefix("config")
                .filter(|r| r.starts_with(char::is_whitespace))
            {
                let kind = rest.split_whitespace().next().map(unquote).unwrap_or("");
                let previous = std::mem::replace(&mut section, Section::None);
                close(&mut config, previous);
                section = match kind {
                    "global" => Section::Global,
                    "mount" => Section::Mount(MountRecord {
                        role: MountRole::Overlay,
                        key: String::new(),
                        target: None,
                        device: None,
                        fs_type: None,
                        options: None,
                        enabled: false,
                    }),
                    "swap" => Section::Swap(MountRecord {
                        role: MountRole::Swap,
                        key: String::new(),
                        target: None,
                        device: None,
                        fs_type: None,
                        options: None,
                        enabled: false,
                    }),
                    other => {
                        tracing::warn!("skipping unknown config section '{other}'");
                        Section::Skip
                    }
                };
                continue;
            }

            if let Some(rest) = line
                .strip_prefix("option")
                .filter(|r| r.starts_with(char::is_whitespace))
            {
                let mut parts = rest.trim().splitn(2, char::is_whitespace);
                let key = parts.next().map(unquote).unwrap_or("");
                let value = parts.next().map(str::trim).map(unquote).unwrap_or("");
                if key.is_empty() {
                    return Err(FstabError::Parse {
                        line: line_no + 1,
                        detail: "option without a key".to_string(),
                    });
                }
                match &mut section {
                    Section::None => {
                        return Err(FstabError::Parse {
                            line: line_no + 1,
                            detail: format!("option '{key}' outside any section"),
                        });
                    }
                    Section::Skip => {}
                    Section::Global => match key {
                        "anon_swap" => config.global.anon_swap = truthy(value),
                        "anon_mount" => config.global.anon_mount = truthy(value),
                        "auto_swap" => config.global.auto_swap = truthy(value),
                        "auto_mount" => config.global.auto_mount = truthy(value),
                        "delay_root" => {
                            config.global.delay_root = value.parse().map_err(|_| {
                                FstabError::Parse {
                                    line: line_no + 1,
                                    detail: format!("delay_root is not a number: '{value}'"),
                                }
                            })?;
                        }
                        "check_fs" => config.global.check_fs = truthy(value),
                        other => tracing::debug!("ignoring global option '{other}'"),
                    },
                    Section::Mount(record) => match key {
                        "uuid" => record.key = value.to_string(),
                        "device" => record.device = Some(value.to_string()),
                        "target" => record.target = Some(value.to_string()),
                        "fstype" => record.fs_type = Some(value.to_string()),
                        "options" => record.options = Some(value.to_string()),
                        "enabled" => record.enabled = truthy(value),
                        other => tracing::debug!("ignoring mount option '{other}'"),
                    },
                    Section::Swap(record) => match key {
                        "device" => record.key = value.to_string(),
                        "enabled" => record.enabled = truthy(value),
                        other => tracing::debug!("ignoring swap option '{other}'"),
                    },
                }
                continue;
            }

            return Err(FstabError::Parse {
                line: line_no + 1,
                detail: format!("unrecognized line: '{line}'"),
            });
        }

        close(&mut config, section);
        Ok(config)
    }

    /// Render to UCI fstab text. Pure; the inverse of [`parse`](Self::parse).
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("config 'global'\n");
        push_option(&mut out, "anon_swap", flag(self.global.anon_swap));
        push_option(&mut out, "anon_mount", flag(self.global.anon_mount));
        push_option(&mut out, "auto_swap", flag(self.global.auto_swap));
        push_option(&mut out, "auto_mount", flag(self.global.auto_mount));
        push_option(&mut out, "delay_root", &self.global.delay_root.to_string());
        push_option(&mut out, "check_fs", flag(self.global.check_fs));

        for record in &self.mounts {
            out.push('\n');
            match record.role {
                MountRole::Overlay | MountRole::Other => {
                    out.push_str("config 'mount'\n");
                    if let Some(target) = &record.target {
                        push_option(&mut out, "target", target);
                    }
                    if !record.key.is_empty() {
                        push_option(&mut out, "uuid", &record.key);
                    }
                    if let Some(device) = &record.device {
                        push_option(&mut out, "device", device);
                    }
                    push_option(&mut out, "enabled", flag(record.enabled));
                    if let Some(fs) = &record.fs_type {
                        push_option(&mut out, "fstype", fs);
                    }
                    if let Some(options) = &record.options {
                        push_option(&mut out, "options", options);
                    }
                }
                MountRole::Swap => {
                    out.push_str("config 'swap'\n");
                    push_option(&mut out, "device", &record.key);
                    push_option(&mut out, "enabled", flag(record.enabled));
                }
            }
        }
        out
    }

    /// Replace any record with the same role, then append. Never leaves
    /// two records of one role; foreign entries keep their place.
    pub fn upsert(&mut self, record: MountRecord) {
        self.mounts.retain(|r| r.role != record.role);
        self.mounts.push(record);
    }

    /// Re-assert global policy: at least the minimum boot delay, auto-mount
    /// on. Operator choices like `check_fs` are left alone.
    pub fn assert_policy(&mut self) {
        self.global.delay_root = self.global.delay_root.max(defaults::DELAY_ROOT_SECONDS);
        self.global.auto_mount = true;
    }

    pub fn overlay(&self) -> Option<&MountRecord> {
        self.mounts.iter().find(|r| r.role == MountRole::Overlay)
    }

    pub fn swap(&self) -> Option<&MountRecord> {
        self.mounts.iter().find(|r| r.role == MountRole::Swap)
    }
}

fn truthy(value: &str) -> bool {
    matches!(value, "1" | "yes" | "true" | "on")
}

fn flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

fn push_option(out: &mut String, key: &str, value: &str) {
    out.push_str(&format!("\toption\t{key}\t'{value}'\n"));
}

fn unquote(s: &str) -> &str {
    s.trim_matches(|c| c == '\'' || c == '"')
}

/// The configuration file on disk, with backup and restore.
#[derive(Debug, Clone)]
pub struct FstabStore {
    path: PathBuf,
}

impl FstabStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the configuration; a missing file is an empty default, not an
    /// error (first-time setup).
    pub fn load(&self) -> Result<FstabConfig, FstabError> {
        if !self.path.exists() {
            return Ok(FstabConfig::default());
        }
        let text = std::fs::read_to_string(&self.path).map_err(|e| FstabError::ReadFile {
            path: self.path.clone(),
            detail: e.to_string(),
        })?;
        FstabConfig::parse(&text)
    }

    /// Atomically rewrite the file: write a sibling temp file, then rename
    /// over the target. No reader observes a partial configuration.
    pub fn write(&self, config: &FstabConfig) -> Result<(), FstabError> {
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| FstabError::ConfigDirMissing {
                path: self.path.clone(),
            })?;
        if !parent.is_dir() {
            return Err(FstabError::ConfigDirMissing {
                path: parent.to_path_buf(),
            });
        }

        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, config.render()).map_err(|e| FstabError::WriteFile {
            path: tmp.clone(),
            detail: e.to_string(),
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|e| FstabError::WriteFile {
            path: self.path.clone(),
            detail: e.to_string(),
        })
    }

    /// Take a timestamped, read-only backup of the current file. Returns
    /// `None` when no file exists yet (nothing to protect).
    pub fn backup(&self) -> Result<Option<PathBuf>, FstabError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let stamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let mut candidate = self.backup_path(&stamp.to_string());
        let mut counter = 1u32;
        while candidate.exists() {
            candidate = self.backup_path(&format!("{stamp}.{counter}"));
            counter += 1;
        }

        std::fs::copy(&self.path, &candidate).map_err(|e| FstabError::BackupFailed {
            path: self.path.clone(),
            detail: e.to_string(),
        })?;
        if let Ok(meta) = std::fs::metadata(&candidate) {
            let mut perms = meta.permissions();
            perms.set_readonly(true);
            let _ = std::fs::set_permissions(&candidate, perms);
        }
        tracing::info!("backed up {} to {}", self.path.display(), candidate.display());
        Ok(Some(candidate))
    }

    fn backup_path(&self, suffix: &str) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "fstab".to_string());
        self.path
            .with_file_name(format!("{name}.bak.{suffix}"))
    }

    /// All backups next to the config file, oldest first.
    pub fn backups(&self) -> Vec<PathBuf> {
        let Some(parent) = self.path.parent() else {
            return Vec::new();
        };
        let prefix = format!(
            "{}.bak.",
            self.path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        );
        let Ok(entries) = std::fs::read_dir(parent) else {
            return Vec::new();
        };
        let mut backups: Vec<PathBuf> = entries
            .filter_map(std::result::Result::ok)
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .map(|n| n.to_string_lossy().starts_with(&prefix))
                    .unwrap_or(false)
            })
            .collect();
        backups.sort_by_key(|p| {
            std::fs::metadata(p)
                .and_then(|m| m.modified())
                .unwrap_or(std::time::UNIX_EPOCH)
        });
        backups
    }

    /// Copy a backup (the newest when unspecified) back over the live
    /// configuration. Returns the backup that was restored.
    pub fn restore(&self, backup: Option<&Path>) -> Result<PathBuf, FstabError> {
        let source = match backup {
            Some(path) => path.to_path_buf(),
            None => self
                .backups()
                .pop()
                .ok_or_else(|| FstabError::NoBackup {
                    path: self.path.clone(),
                })?,
        };
        let content = std::fs::read_to_string(&source).map_err(|e| FstabError::ReadFile {
            path: source.clone(),
            detail: e.to_string(),
        })?;

        // Go through the same atomic temp-and-rename as write(); a plain
        // copy would carry the backup's read-only permissions along.
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, &content).map_err(|e| FstabError::WriteFile {
            path: tmp.clone(),
            detail: e.to_string(),
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|e| FstabError::WriteFile {
            path: self.path.clone(),
            detail: e.to_string(),
        })?;
        tracing::info!("restored {} from {}", self.path.display(), source.display());
        Ok(source)
    }
}
