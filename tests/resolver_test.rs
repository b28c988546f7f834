//! Integration tests for target resolution
//!
//! - An explicit partition path is returned unchanged with its parent
//! - An explicit device resolves to the same partition its enumeration
//!   would yield
//! - Distinct diagnostics for missing paths vs non-block files
//! - Interactive selection accepts index, bare name, or absolute path
//!
//! **Property: device-path parsing round-trips through the suffix table**

mod common;

use common::TestRig;
use proptest::prelude::*;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use extroot::core::resolver::{DeviceKind, DevicePath, DeviceProbe, Resolver};
use extroot::error::ResolveError;

/// Probe backed by an explicit map, so tests control what counts as a
/// block special file
struct FakeProbe {
    kinds: HashMap<PathBuf, DeviceKind>,
}

impl FakeProbe {
    fn new() -> Self {
        Self {
            kinds: HashMap::new(),
        }
    }

    fn block(mut self, path: PathBuf) -> Self {
        self.kinds.insert(path, DeviceKind::BlockSpecial);
        self
    }

    fn regular(mut self, path: PathBuf) -> Self {
        self.kinds.insert(path, DeviceKind::Other);
        self
    }
}

impl DeviceProbe for FakeProbe {
    fn kind(&self, path: &Path) -> DeviceKind {
        self.kinds
            .get(path)
            .copied()
            .unwrap_or(DeviceKind::Missing)
    }
}

fn usb_rig() -> TestRig {
    let rig = TestRig::new();
    rig.write_partitions(
        "8 0 7864320 sda\n\
         8 1 7863296 sda1\n",
    );
    rig
}

#[test]
fn test_explicit_partition_returned_unchanged() {
    let rig = usb_rig();
    let sda1 = rig.dev_root().join("sda1");
    let probe = FakeProbe::new().block(sda1.clone());
    let inventory = rig.inventory();
    let resolver = Resolver::new(&inventory, &probe, &rig.dev_root());

    let (partition, device) = resolver
        .resolve(None, Some(sda1.to_str().unwrap()), None)
        .unwrap();
    assert_eq!(partition.path, sda1);
    assert_eq!(partition.parent, "sda");
    assert_eq!(device.name, "sda");
}

#[test]
fn test_device_argument_yields_first_partition() {
    let rig = usb_rig();
    let sda = rig.dev_root().join("sda");
    let sda1 = rig.dev_root().join("sda1");
    let probe = FakeProbe::new().block(sda).block(sda1.clone());
    let inventory = rig.inventory();
    let resolver = Resolver::new(&inventory, &probe, &rig.dev_root());

    let (partition, _) = resolver.resolve(Some("sda"), None, None).unwrap();
    assert_eq!(partition.path, sda1);

    // Same partition explicit enumeration finds
    let devices = inventory.devices();
    assert_eq!(partition.name, devices[0].partitions[0].name);
}

#[test]
fn test_device_argument_that_names_a_partition_is_used_directly() {
    let rig = usb_rig();
    let sda1 = rig.dev_root().join("sda1");
    let probe = FakeProbe::new().block(sda1.clone());
    let inventory = rig.inventory();
    let resolver = Resolver::new(&inventory, &probe, &rig.dev_root());

    let (partition, _) = resolver
        .resolve(Some(sda1.to_str().unwrap()), None, None)
        .unwrap();
    assert_eq!(partition.path, sda1);
}

#[test]
fn test_mmc_device_synthesizes_p_suffix() {
    let rig = TestRig::new();
    rig.write_partitions("179 0 15558144 mmcblk0\n");
    let mmc = rig.dev_root().join("mmcblk0");
    let probe = FakeProbe::new().block(mmc);
    let inventory = rig.inventory();
    let resolver = Resolver::new(&inventory, &probe, &rig.dev_root());

    let (partition, _) = resolver.resolve(Some("mmcblk0"), None, None).unwrap();
    assert_eq!(partition.path, rig.dev_root().join("mmcblk0p1"));
}

#[test]
fn test_missing_parent_device_is_an_error() {
    let rig = usb_rig();
    let probe = FakeProbe::new();
    let inventory = rig.inventory();
    let resolver = Resolver::new(&inventory, &probe, &rig.dev_root());

    let err = resolver.resolve(Some("sdz"), None, None).unwrap_err();
    assert!(matches!(err, ResolveError::ParentMissing { .. }));
}

#[test]
fn test_missing_and_wrong_type_have_distinct_errors() {
    let rig = usb_rig();
    let regular = rig.dev_root().join("sdq1");
    let probe = FakeProbe::new().regular(regular.clone());
    let inventory = rig.inventory();
    let resolver = Resolver::new(&inventory, &probe, &rig.dev_root());

    let missing = resolver
        .resolve(None, Some("/no/such/node"), None)
        .unwrap_err();
    assert!(matches!(missing, ResolveError::DeviceNotFound { .. }));

    let wrong = resolver
        .resolve(None, Some(regular.to_str().unwrap()), None)
        .unwrap_err();
    assert!(matches!(wrong, ResolveError::NotABlockDevice { .. }));

    // Different diagnostic text per category
    assert_ne!(missing.to_string(), wrong.to_string());
}

#[test]
fn test_non_interactive_without_arguments_fails() {
    let rig = usb_rig();
    let probe = FakeProbe::new();
    let inventory = rig.inventory();
    let resolver = Resolver::new(&inventory, &probe, &rig.dev_root());

    let err = resolver.resolve(None, None, None).unwrap_err();
    assert!(matches!(err, ResolveError::NonInteractive));
}

#[test]
fn test_interactive_selection_by_index() {
    let rig = usb_rig();
    let sda1 = rig.dev_root().join("sda1");
    let probe = FakeProbe::new().block(sda1.clone());
    let inventory = rig.inventory();
    let resolver = Resolver::new(&inventory, &probe, &rig.dev_root());

    let mut input = Cursor::new(b"1\n".to_vec());
    let (partition, _) = resolver.resolve(None, None, Some(&mut input)).unwrap();
    assert_eq!(partition.path, sda1);
}

#[test]
fn test_interactive_selection_loops_until_valid() {
    let rig = usb_rig();
    let sda1 = rig.dev_root().join("sda1");
    let probe = FakeProbe::new().block(sda1.clone());
    let inventory = rig.inventory();
    let resolver = Resolver::new(&inventory, &probe, &rig.dev_root());

    // Bad index, nonexistent name, then a good absolute path
    let script = format!("99\nsdq1\n{}\n", sda1.display());
    let mut input = Cursor::new(script.into_bytes());
    let (partition, _) = resolver.resolve(None, None, Some(&mut input)).unwrap();
    assert_eq!(partition.path, sda1);
}

#[test]
fn test_interactive_cancel() {
    let rig = usb_rig();
    let probe = FakeProbe::new();
    let inventory = rig.inventory();
    let resolver = Resolver::new(&inventory, &probe, &rig.dev_root());

    let mut input = Cursor::new(b"q\n".to_vec());
    let err = resolver.resolve(None, None, Some(&mut input)).unwrap_err();
    assert!(matches!(err, ResolveError::Cancelled));
}

#[test]
fn test_interactive_eof_is_a_cancel() {
    let rig = usb_rig();
    let probe = FakeProbe::new();
    let inventory = rig.inventory();
    let resolver = Resolver::new(&inventory, &probe, &rig.dev_root());

    let mut input = Cursor::new(Vec::new());
    let err = resolver.resolve(None, None, Some(&mut input)).unwrap_err();
    assert!(matches!(err, ResolveError::Cancelled));
}

/// Reader that fails like a torn-down pipe
struct BrokenInput;

impl std::io::Read for BrokenInput {
    fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
        Err(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "pipe closed",
        ))
    }
}

impl std::io::BufRead for BrokenInput {
    fn fill_buf(&mut self) -> std::io::Result<&[u8]> {
        Err(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "pipe closed",
        ))
    }
    fn consume(&mut self, _amt: usize) {}
}

#[test]
fn test_interactive_read_failure_is_not_a_cancel() {
    let rig = usb_rig();
    let probe = FakeProbe::new();
    let inventory = rig.inventory();
    let resolver = Resolver::new(&inventory, &probe, &rig.dev_root());

    let mut input = BrokenInput;
    let err = resolver.resolve(None, None, Some(&mut input)).unwrap_err();
    match err {
        ResolveError::ReadInput { detail } => assert!(detail.contains("pipe closed")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_interactive_no_devices_at_all() {
    let rig = TestRig::new();
    rig.write_partitions("");
    let probe = FakeProbe::new();
    let inventory = rig.inventory();
    let resolver = Resolver::new(&inventory, &probe, &rig.dev_root());

    let mut input = Cursor::new(b"1\n".to_vec());
    let err = resolver.resolve(None, None, Some(&mut input)).unwrap_err();
    assert!(matches!(err, ResolveError::NoBlockDevices));
}

proptest! {
    #[test]
    fn prop_sd_names_roundtrip(letter in "[a-z]", number in 1u32..64) {
        let name = format!("sd{letter}{number}");
        let parsed = DevicePath::parse(&name);
        prop_assert_eq!(parsed.device, format!("sd{letter}"));
        prop_assert_eq!(parsed.partition_number, Some(number));
    }

    #[test]
    fn prop_mmc_names_roundtrip(disk in 0u32..8, number in 1u32..64) {
        let name = format!("mmcblk{disk}p{number}");
        let parsed = DevicePath::parse(&name);
        prop_assert_eq!(parsed.device, format!("mmcblk{disk}"));
        prop_assert_eq!(parsed.partition_number, Some(number));
    }

    #[test]
    fn prop_bare_devices_have_no_partition(disk in 0u32..8) {
        for name in [format!("mmcblk{disk}"), format!("nvme{disk}n1"), format!("loop{disk}")] {
            let parsed = DevicePath::parse(&name);
            prop_assert_eq!(parsed.partition_number, None);
            prop_assert_eq!(parsed.device, name);
        }
    }

    #[test]
    fn prop_synthesized_first_partition_parses_back(disk in 0u32..8) {
        let dev = Path::new("/dev");
        for device in [format!("sd{}", char::from(b'a' + (disk % 26) as u8)), format!("mmcblk{disk}")] {
            let parsed = DevicePath::parse(&device);
            let first = parsed.partition_path(dev, 1);
            let name = first.file_name().unwrap().to_string_lossy().into_owned();
            let reparsed = DevicePath::parse(&name);
            prop_assert_eq!(reparsed.device, device);
            prop_assert_eq!(reparsed.partition_number, Some(1));
        }
    }
}
