//! Integration tests for doctor checks
//!
//! Tool presence varies by host, so these assert the report's structure
//! and the configuration checks, not which utilities happen to be in PATH.

mod common;

use common::TestRig;

use extroot::core::doctor::run_doctor;

#[test]
fn test_report_covers_required_and_optional_tools() {
    let rig = TestRig::new();
    let report = run_doctor(&rig.config_path(), "ext4");

    let names: Vec<&str> = report.checks.iter().map(|c| c.name.as_str()).collect();
    assert!(names.contains(&"mount"));
    assert!(names.contains(&"umount"));
    assert!(names.iter().any(|n| n.starts_with("tar")));
    assert!(names.iter().any(|n| n.starts_with("Block info")));
    assert!(names.iter().any(|n| n.starts_with("mkfs.ext4")));
    assert!(names.iter().any(|n| n.starts_with("mkswap")));
    assert!(names.iter().any(|n| n.starts_with("swapon")));

    // Format and swap helpers are never required
    for check in &report.checks {
        if check.name.starts_with("mkfs.") || check.name.contains("--swap") {
            assert!(!check.required, "{} should be optional", check.name);
        }
    }

    // Every failed check carries an actionable suggestion
    for check in &report.checks {
        if !check.passed {
            assert!(check.suggestion.is_some(), "{} lacks a suggestion", check.name);
        }
    }
}

#[test]
fn test_fs_type_flows_into_formatter_check() {
    let rig = TestRig::new();
    let report = run_doctor(&rig.config_path(), "f2fs");
    assert!(report.checks.iter().any(|c| c.name.starts_with("mkfs.f2fs")));
    assert!(!report.checks.iter().any(|c| c.name.starts_with("mkfs.ext4")));
}

#[test]
fn test_no_config_issues_with_healthy_store() {
    let rig = TestRig::new();
    // Directory exists, no file yet: a valid first-time state
    let report = run_doctor(&rig.config_path(), "ext4");
    assert!(report.config_issues.is_empty());
}

#[test]
fn test_missing_config_dir_is_reported() {
    let rig = TestRig::new();
    let report = run_doctor(&rig.dir.path().join("gone/fstab"), "ext4");
    assert_eq!(report.config_issues.len(), 1);
    assert!(report.config_issues[0].contains("does not exist"));
    assert!(!report.all_passed());
}

#[test]
fn test_malformed_config_is_reported() {
    let rig = TestRig::new();
    std::fs::write(rig.config_path(), "config mount\noption uuid\n\tjunk\n").unwrap();
    let report = run_doctor(&rig.config_path(), "ext4");
    assert!(report
        .config_issues
        .iter()
        .any(|i| i.contains("malformed")));
}

#[test]
fn test_valid_config_raises_no_issue() {
    let rig = TestRig::new();
    std::fs::write(
        rig.config_path(),
        "config 'global'\n\toption\tdelay_root\t'15'\n",
    )
    .unwrap();
    let report = run_doctor(&rig.config_path(), "ext4");
    assert!(report.config_issues.is_empty());
}
