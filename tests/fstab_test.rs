//! Integration tests for the persistent mount configuration store
//!
//! - A fresh setup produces a config with exactly one overlay and at most
//!   one swap record, UUID-keyed
//! - Re-running replaces records instead of appending duplicates
//! - Restore brings back the pre-migration bytes exactly
//!
//! **Property: render/parse round-trips arbitrary well-formed configs**

mod common;

use assert_fs::prelude::*;
use common::TestRig;
use predicates::prelude::*;
use proptest::prelude::*;

use extroot::config::defaults;
use extroot::core::fstab::{FstabConfig, GlobalPolicy, MountRecord, MountRole};

/// The config an OpenWrt image ships with before any migration
const STOCK_CONFIG: &str = "config 'global'\n\
    \toption\tanon_swap\t'0'\n\
    \toption\tanon_mount\t'0'\n\
    \toption\tauto_swap\t'1'\n\
    \toption\tauto_mount\t'1'\n\
    \toption\tdelay_root\t'5'\n\
    \toption\tcheck_fs\t'0'\n";

#[test]
fn test_fresh_setup_writes_uuid_keyed_overlay() {
    let rig = TestRig::new();
    let store = rig.store();

    let mut config = store.load().unwrap();
    config.upsert(MountRecord::overlay(
        "2f3a9c1e-0000-4d2a-9df1-6f3b1c2d4e5f",
        Some("ext4".to_string()),
    ));
    config.assert_policy();
    store.write(&config).unwrap();

    let written = rig.read_config();
    assert!(written.contains("option\tuuid\t'2f3a9c1e-0000-4d2a-9df1-6f3b1c2d4e5f'"));
    assert!(written.contains("option\ttarget\t'/overlay'"));
    // Keyed by UUID, never by a device path
    assert!(!written.contains("/dev/"));

    let reloaded = store.load().unwrap();
    assert_eq!(reloaded.mounts.len(), 1);
    assert!(reloaded.global.auto_mount);
    assert!(reloaded.global.delay_root >= defaults::DELAY_ROOT_SECONDS);
}

#[test]
fn test_policy_raises_stock_delay_root() {
    let rig = TestRig::new();
    std::fs::write(rig.config_path(), STOCK_CONFIG).unwrap();
    let store = rig.store();

    let mut config = store.load().unwrap();
    assert_eq!(config.global.delay_root, 5);
    config.assert_policy();
    store.write(&config).unwrap();

    assert_eq!(
        store.load().unwrap().global.delay_root,
        defaults::DELAY_ROOT_SECONDS
    );
}

#[test]
fn test_rerun_replaces_overlay_and_takes_second_backup() {
    let rig = TestRig::new();
    std::fs::write(rig.config_path(), STOCK_CONFIG).unwrap();
    let store = rig.store();

    // First migration
    let first_backup = store.backup().unwrap().unwrap();
    let mut config = store.load().unwrap();
    config.upsert(MountRecord::overlay("uuid-first", Some("ext4".to_string())));
    store.write(&config).unwrap();

    // Second migration to a different stick
    let second_backup = store.backup().unwrap().unwrap();
    let mut config = store.load().unwrap();
    config.upsert(MountRecord::overlay("uuid-second", Some("f2fs".to_string())));
    store.write(&config).unwrap();

    let final_config = store.load().unwrap();
    let overlays: Vec<_> = final_config
        .mounts
        .iter()
        .filter(|r| r.role == MountRole::Overlay)
        .collect();
    assert_eq!(overlays.len(), 1);
    assert_eq!(overlays[0].key, "uuid-second");

    assert_ne!(first_backup, second_backup);
    assert_eq!(store.backups().len(), 2);
    // The second backup captured the first migration's record
    let captured = std::fs::read_to_string(&second_backup).unwrap();
    assert!(captured.contains("uuid-first"));
}

#[test]
fn test_restore_is_byte_exact() {
    let rig = TestRig::new();
    std::fs::write(rig.config_path(), STOCK_CONFIG).unwrap();
    let store = rig.store();

    store.backup().unwrap().unwrap();
    let mut config = store.load().unwrap();
    config.upsert(MountRecord::overlay("uuid-x", None));
    config.upsert(MountRecord::swap("/mnt/extroot/swapfile"));
    store.write(&config).unwrap();
    assert_ne!(rig.read_config(), STOCK_CONFIG);

    store.restore(None).unwrap();
    assert_eq!(rig.read_config(), STOCK_CONFIG);

    // The restored file stays writable for the next run
    let perms = std::fs::metadata(rig.config_path()).unwrap().permissions();
    assert!(!perms.readonly());
}

#[test]
fn test_restore_named_backup() {
    let rig = TestRig::new();
    std::fs::write(rig.config_path(), STOCK_CONFIG).unwrap();
    let store = rig.store();

    let first = store.backup().unwrap().unwrap();
    std::fs::write(rig.config_path(), "config 'global'\n").unwrap();
    store.backup().unwrap().unwrap();
    std::fs::write(rig.config_path(), "config 'global'\n\toption\tcheck_fs\t'1'\n").unwrap();

    let restored = store.restore(Some(&first)).unwrap();
    assert_eq!(restored, first);
    assert_eq!(rig.read_config(), STOCK_CONFIG);
}

#[test]
fn test_swap_record_alongside_overlay() {
    let rig = TestRig::new();
    let store = rig.store();

    let mut config = FstabConfig::default();
    config.upsert(MountRecord::overlay("uuid-y", Some("ext4".to_string())));
    config.upsert(MountRecord::swap("/mnt/extroot/swapfile"));
    store.write(&config).unwrap();

    let reloaded = store.load().unwrap();
    let swap = reloaded.swap().unwrap();
    assert_eq!(swap.key, "/mnt/extroot/swapfile");
    assert!(swap.enabled);
    assert!(reloaded.overlay().is_some());
}

#[test]
fn test_hand_maintained_mount_survives_migration_rewrite() {
    let rig = TestRig::new();
    let hand_edited = format!(
        "{STOCK_CONFIG}\n\
         config 'mount'\n\
         \toption\ttarget\t'/mnt/share'\n\
         \toption\tdevice\t'/dev/sdb1'\n\
         \toption\tenabled\t'1'\n\
         \toption\tfstype\t'vfat'\n"
    );
    std::fs::write(rig.config_path(), &hand_edited).unwrap();
    let store = rig.store();

    // A migration-style rewrite
    let mut config = store.load().unwrap();
    config.upsert(MountRecord::overlay("uuid-mine", Some("ext4".to_string())));
    config.assert_policy();
    store.write(&config).unwrap();

    let reloaded = store.load().unwrap();
    assert_eq!(reloaded.overlay().unwrap().key, "uuid-mine");
    let foreign: Vec<_> = reloaded
        .mounts
        .iter()
        .filter(|r| r.role == MountRole::Other)
        .collect();
    assert_eq!(foreign.len(), 1);
    assert_eq!(foreign[0].target.as_deref(), Some("/mnt/share"));
    assert_eq!(foreign[0].device.as_deref(), Some("/dev/sdb1"));
    assert!(rig.read_config().contains("'/mnt/share'"));
}

#[test]
fn test_written_file_shape() {
    let temp = assert_fs::TempDir::new().unwrap();
    let file = temp.child("fstab");
    let store = extroot::core::fstab::FstabStore::new(file.path());

    let mut config = FstabConfig::default();
    config.upsert(MountRecord::overlay("uuid-shape", Some("ext4".to_string())));
    store.write(&config).unwrap();

    file.assert(predicate::str::contains("config 'global'"));
    file.assert(predicate::str::contains("config 'mount'"));
    file.assert(predicate::str::contains("\toption\tuuid\t'uuid-shape'"));
    // No leftover temp file from the atomic rewrite
    temp.child("fstab.tmp").assert(predicate::path::missing());
}

fn arbitrary_policy() -> impl Strategy<Value = GlobalPolicy> {
    (
        any::<bool>(),
        any::<bool>(),
        any::<bool>(),
        any::<bool>(),
        0u32..600,
        any::<bool>(),
    )
        .prop_map(
            |(anon_swap, anon_mount, auto_swap, auto_mount, delay_root, check_fs)| GlobalPolicy {
                anon_swap,
                anon_mount,
                auto_swap,
                auto_mount,
                delay_root,
                check_fs,
            },
        )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(defaults::MIN_PROPTEST_ITERATIONS))]

    #[test]
    fn prop_render_parse_roundtrip(
        policy in arbitrary_policy(),
        uuid in "[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}",
        fs_type in prop::option::of("(ext4|ext3|f2fs|btrfs|vfat)"),
        with_swap in any::<bool>(),
    ) {
        let mut config = FstabConfig {
            global: policy,
            mounts: Vec::new(),
        };
        config.upsert(MountRecord::overlay(uuid, fs_type));
        if with_swap {
            config.upsert(MountRecord::swap("/mnt/extroot/swapfile"));
        }

        let rendered = config.render();
        let reparsed = FstabConfig::parse(&rendered).unwrap();
        prop_assert_eq!(&reparsed.global, &config.global);
        prop_assert_eq!(&reparsed.mounts, &config.mounts);
        prop_assert_eq!(reparsed.render(), rendered);
    }

    #[test]
    fn prop_upsert_never_duplicates_roles(keys in prop::collection::vec("[a-z0-9-]{1,16}", 1..8)) {
        let mut config = FstabConfig::default();
        for key in &keys {
            config.upsert(MountRecord::overlay(key.clone(), None));
        }
        prop_assert_eq!(config.mounts.len(), 1);
        prop_assert_eq!(&config.overlay().unwrap().key, keys.last().unwrap());
    }
}
