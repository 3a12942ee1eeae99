#![forbid(unsafe_code)]

use kts_kernel_contracts::device::{CallerId, DeviceHash, NftMintState};
use kts_kernel_contracts::event::RegistryEventId;
use kts_kernel_contracts::slot::SlotId;
use kts_kernel_contracts::usage::{DailyUsageUpload, DataHash, DayBoundary};
use kts_kernel_contracts::UnixTimeSec;
use kts_storage::config::{DayBoundaryPolicy, RegistryConfig};
use kts_storage::derive::RegistryNamespace;
use kts_storage::registry::KtsStore;
use kts_storage::slots::{InMemorySlotStore, SlotEntry, SlotStore};
use kts_storage::snapshot::{RegistrySnapshot, SnapshotError};

const NOW: UnixTimeSec = UnixTimeSec(1_700_000_000);
const D0: i64 = 1_699_920_000;

fn owner() -> CallerId {
    CallerId::from_bytes([0xA1; 32])
}

fn config() -> RegistryConfig {
    RegistryConfig {
        namespace: RegistryNamespace([0x33; 32]),
        ..RegistryConfig::default()
    }
}

fn populated() -> KtsStore {
    let mut s = KtsStore::with_config(config());
    for b in 1..=3u8 {
        let h = DeviceHash::from_bytes([b; 32]);
        s.register_device(h, &format!("dev-{b}"), owner(), NOW).unwrap();
        s.upload_daily_usage(
            DailyUsageUpload {
                device_hash: h,
                timestamp: D0,
                avg_cpu_usage: f64::from(b) * 10.0,
                avg_memory_usage: 50.5,
                top_processes: (0..5).map(|i| format!("proc{i}")).collect(),
                data_hash: DataHash::from_bytes([b; 32]),
            },
            &owner(),
            NOW,
        )
        .unwrap();
    }
    s.mark_nft_minted(&DeviceHash::from_bytes([2; 32]), &owner(), NOW)
        .unwrap();
    s
}

fn import(snapshot: RegistrySnapshot) -> Result<KtsStore, SnapshotError> {
    KtsStore::<InMemorySlotStore>::import_snapshot(config(), snapshot)
}

#[test]
fn at_snap_db_01_json_export_restores_every_record() {
    let original = populated();
    let json = original.export_snapshot().to_json().unwrap();
    let restored = import(RegistrySnapshot::from_json(&json).unwrap()).unwrap();

    assert_eq!(restored.slot_store().len(), 6);
    for b in 1..=3u8 {
        let h = DeviceHash::from_bytes([b; 32]);
        assert_eq!(restored.device(&h), original.device(&h));
        let day = DayBoundary::aligned(D0).unwrap();
        assert_eq!(restored.daily_usage(&h, day), original.daily_usage(&h, day));
    }
    assert_eq!(
        restored
            .device(&DeviceHash::from_bytes([2; 32]))
            .unwrap()
            .nft_minted,
        NftMintState::Minted
    );
    assert!(restored.audit_events().is_empty());
}

#[test]
fn at_snap_db_02_restored_store_keeps_enforcing_uniqueness() {
    let mut restored = import(populated().export_snapshot()).unwrap();
    assert!(restored
        .register_device(DeviceHash::from_bytes([1; 32]), "again", owner(), NOW)
        .is_err());
    assert!(restored
        .mark_nft_minted(&DeviceHash::from_bytes([2; 32]), &owner(), NOW)
        .is_err());
    assert!(restored
        .mark_nft_minted(&DeviceHash::from_bytes([3; 32]), &owner(), NOW)
        .is_ok());
}

#[test]
fn at_snap_db_03_tampered_slot_id_is_rejected() {
    let mut snap = populated().export_snapshot();
    snap.slots[0].slot = SlotId::from_bytes([0xFF; 32]);
    assert!(matches!(
        import(snap),
        Err(SnapshotError::SlotMismatch { .. })
    ));
}

#[test]
fn at_snap_db_04_tampered_record_key_is_rejected() {
    let mut snap = populated().export_snapshot();
    let target = snap
        .slots
        .iter_mut()
        .find_map(|s| match &mut s.entry {
            SlotEntry::Device(d) => Some(d),
            SlotEntry::DailyUsage(_) => None,
        })
        .unwrap();
    target.device_hash = DeviceHash::from_bytes([0xEE; 32]);
    assert!(matches!(
        import(snap),
        Err(SnapshotError::SlotMismatch { .. })
    ));
}

#[test]
fn at_snap_db_05_orphan_usage_is_rejected() {
    let mut snap = populated().export_snapshot();
    snap.slots
        .retain(|s| !matches!(s.entry, SlotEntry::Device(ref d) if d.device_hash == DeviceHash::from_bytes([1; 32])));
    assert!(matches!(
        import(snap),
        Err(SnapshotError::DanglingDeviceReference { .. })
    ));
}

#[test]
fn at_snap_db_06_namespace_and_version_must_match() {
    let snap = populated().export_snapshot();
    let other = RegistryConfig {
        namespace: RegistryNamespace([0x44; 32]),
        ..RegistryConfig::default()
    };
    assert!(matches!(
        KtsStore::<InMemorySlotStore>::import_snapshot(other, snap.clone()),
        Err(SnapshotError::NamespaceMismatch)
    ));

    let mut wrong_version = snap;
    wrong_version.schema_version.0 = 9;
    assert!(matches!(
        import(wrong_version),
        Err(SnapshotError::UnsupportedVersion(9))
    ));
}

#[test]
fn at_snap_db_07_strict_import_rejects_off_grid_days() {
    let lenient = RegistryConfig {
        day_boundary_policy: DayBoundaryPolicy::AcceptAsKey,
        ..config()
    };
    let mut s = KtsStore::with_config(lenient.clone());
    let h = DeviceHash::from_bytes([9; 32]);
    s.register_device(h, "d", owner(), NOW).unwrap();
    s.upload_daily_usage(
        DailyUsageUpload {
            device_hash: h,
            timestamp: D0 + 7,
            avg_cpu_usage: 1.0,
            avg_memory_usage: 1.0,
            top_processes: (0..5).map(|i| format!("p{i}")).collect(),
            data_hash: DataHash::from_bytes([0; 32]),
        },
        &owner(),
        NOW,
    )
    .unwrap();
    let snap = s.export_snapshot();

    assert!(KtsStore::<InMemorySlotStore>::import_snapshot(lenient, snap.clone()).is_ok());
    assert!(matches!(
        import(snap),
        Err(SnapshotError::MisalignedDay { .. })
    ));
}

#[test]
fn at_snap_db_08_json_restores_metric_bits_exactly() {
    let metrics = [
        (30.162999940000002, 23.4 / 3.0),
        (0.1 + 0.2, 1.0 / 3.0),
        (99.99999999999999, 2.0f64.sqrt()),
    ];
    let mut s = KtsStore::with_config(config());
    let h = DeviceHash::from_bytes([7; 32]);
    s.register_device(h, "d", owner(), NOW).unwrap();
    for (i, (cpu, mem)) in metrics.iter().enumerate() {
        s.upload_daily_usage(
            DailyUsageUpload {
                device_hash: h,
                timestamp: D0 + i as i64 * 86_400,
                avg_cpu_usage: *cpu,
                avg_memory_usage: *mem,
                top_processes: (0..5).map(|p| format!("p{p}")).collect(),
                data_hash: DataHash::from_bytes([0; 32]),
            },
            &owner(),
            NOW,
        )
        .unwrap();
    }

    let json = s.export_snapshot().to_json().unwrap();
    let restored = import(RegistrySnapshot::from_json(&json).unwrap()).unwrap();
    for (i, (cpu, mem)) in metrics.iter().enumerate() {
        let day = DayBoundary::aligned(D0 + i as i64 * 86_400).unwrap();
        let rec = restored.daily_usage(&h, day).unwrap();
        assert_eq!(rec.avg_cpu_usage.to_bits(), cpu.to_bits());
        assert_eq!(rec.avg_memory_usage.to_bits(), mem.to_bits());
    }
}

#[test]
fn at_snap_db_09_event_ids_continue_after_restore() {
    let original = populated();
    let next = original.next_event_id();
    assert_eq!(next, RegistryEventId(8));

    let json = original.export_snapshot().to_json().unwrap();
    let mut restored = import(RegistrySnapshot::from_json(&json).unwrap()).unwrap();
    assert_eq!(restored.next_event_id(), next);
    restored
        .mark_nft_minted(&DeviceHash::from_bytes([3; 32]), &owner(), NOW)
        .unwrap();
    assert_eq!(restored.audit_events()[0].event_id, next);

    let mut zeroed = original.export_snapshot();
    zeroed.next_event_id = RegistryEventId(0);
    assert!(matches!(import(zeroed), Err(SnapshotError::Contract(_))));
}
