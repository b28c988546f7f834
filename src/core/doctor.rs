//! Doctor command logic
//!
//! Checks the utilities the migration flow shells out to and reports issues
//! with install suggestions.

use std::path::Path;

/// Result of a single dependency check
#[derive(Debug, Clone)]
pub struct CheckResult {
    /// Name of the dependency being checked
    pub name: String,
    /// Whether the check passed
    pub passed: bool,
    /// Version if available
    pub version: Option<String>,
    /// Error message if check failed
    pub error: Option<String>,
    /// Suggestion for fixing the issue
    pub suggestion: Option<String>,
    /// Whether this is a required or optional dependency
    pub required: bool,
}

impl CheckResult {
    /// Create a passing check result
    pub fn pass(name: &str, version: Option<String>, required: bool) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            version,
            error: None,
            suggestion: None,
            required,
        }
    }

    /// Create a failing check result
    pub fn fail(name: &str, error: &str, suggestion: Option<&str>, required: bool) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            version: None,
            error: Some(error.to_string()),
            suggestion: suggestion.map(String::from),
            required,
        }
    }
}

/// Overall doctor report
#[derive(Debug, Default)]
pub struct DoctorReport {
    /// Individual check results
    pub checks: Vec<CheckResult>,
    /// Configuration issues found
    pub config_issues: Vec<String>,
}

impl DoctorReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_check(&mut self, result: CheckResult) {
        self.checks.push(result);
    }

    pub fn add_config_issue(&mut self, issue: String) {
        self.config_issues.push(issue);
    }

    /// Check if all required checks passed
    pub fn all_required_passed(&self) -> bool {
        self.checks.iter().filter(|c| c.required).all(|c| c.passed)
    }

    /// Check if all checks passed (including optional)
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed) && self.config_issues.is_empty()
    }

    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed).count()
    }

    pub fn failed_count(&self) -> usize {
        self.checks.iter().filter(|c| !c.passed).count()
    }

    /// Get all failed required checks
    pub fn failed_required(&self) -> Vec<&CheckResult> {
        self.checks
            .iter()
            .filter(|c| c.required && !c.passed)
            .collect()
    }
}

/// Locate a command and best-effort extract its version.
///
/// Busybox applets often reject `--version`, so a tool found in PATH with
/// no parseable version still counts as present.
fn probe_tool(command: &str) -> Option<Option<String>> {
    which::which(command).ok()?;
    let version = std::process::Command::new(command)
        .arg("--version")
        .output()
        .ok()
        .and_then(|output| {
            if output.status.success() {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                extract_version(&format!("{stdout}{stderr}"))
            } else {
                None
            }
        });
    Some(version)
}

/// Extract version string from command output
fn extract_version(output: &str) -> Option<String> {
    let version_regex = regex::Regex::new(r"v?(\d+\.\d+(?:\.\d+)?(?:-\w+)?)").ok()?;
    version_regex
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Check a single utility
fn check_tool(display: &str, command: &str, suggestion: &str, required: bool) -> CheckResult {
    match probe_tool(command) {
        Some(version) => CheckResult::pass(display, version, required),
        None => CheckResult::fail(
            display,
            &format!("'{command}' not found in PATH"),
            Some(suggestion),
            required,
        ),
    }
}

/// Check the block-info utilities: either `block` or `blkid` satisfies the
/// UUID-resolution requirement.
fn check_block_info() -> CheckResult {
    if let Some(version) = probe_tool("block") {
        return CheckResult::pass("Block info (block)", version, true);
    }
    if let Some(version) = probe_tool("blkid") {
        return CheckResult::pass("Block info (blkid)", version, true);
    }
    CheckResult::fail(
        "Block info",
        "Neither 'block' nor 'blkid' found in PATH",
        Some("Install with: opkg install block-mount"),
        true,
    )
}

/// Check that the persisted configuration can actually be written
fn check_config_store(config_path: &Path) -> Vec<String> {
    let mut issues = Vec::new();
    match config_path.parent() {
        Some(parent) if parent.is_dir() => {}
        Some(parent) => issues.push(format!(
            "Configuration directory '{}' does not exist; mount configuration cannot be persisted",
            parent.display()
        )),
        None => issues.push(format!(
            "Configuration path '{}' has no parent directory",
            config_path.display()
        )),
    }
    if config_path.exists() {
        if let Err(e) = std::fs::read_to_string(config_path) {
            issues.push(format!(
                "Cannot read existing configuration '{}': {e}",
                config_path.display()
            ));
        } else if let Err(e) = crate::core::fstab::FstabStore::new(config_path).load() {
            issues.push(format!("Existing configuration is malformed: {e}"));
        }
    }
    issues
}

/// Run all doctor checks
pub fn run_doctor(config_path: &Path, fs_type: &str) -> DoctorReport {
    let mut report = DoctorReport::new();

    // Required for any migration
    report.add_check(check_tool(
        "mount",
        "mount",
        "mount is part of busybox; your system is badly broken without it",
        true,
    ));
    report.add_check(check_tool(
        "umount",
        "umount",
        "umount is part of busybox; your system is badly broken without it",
        true,
    ));
    report.add_check(check_tool(
        "tar (overlay copy)",
        "tar",
        "Install with: opkg install tar",
        true,
    ));
    report.add_check(check_block_info());

    // Needed only with --format / --swap
    report.add_check(check_tool(
        &format!("mkfs.{fs_type} (for --format)"),
        &format!("mkfs.{fs_type}"),
        "Install with: opkg install e2fsprogs (or the tools for your filesystem)",
        false,
    ));
    report.add_check(check_tool(
        "mkswap (for --swap)",
        "mkswap",
        "Install with: opkg install swap-utils",
        false,
    ));
    report.add_check(check_tool(
        "swapon (for --swap)",
        "swapon",
        "Install with: opkg install swap-utils (swap still activates on boot without it)",
        false,
    ));

    for issue in check_config_store(config_path) {
        report.add_config_issue(issue);
    }

    report
}
