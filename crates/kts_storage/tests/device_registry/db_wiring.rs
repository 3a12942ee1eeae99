#![forbid(unsafe_code)]

use kts_kernel_contracts::device::{CallerId, DeviceHash, NftMintState};
use kts_kernel_contracts::event::{RegistryEventId, RegistryEventKind};
use kts_kernel_contracts::usage::{DailyUsageUpload, DataHash, DayBoundary};
use kts_kernel_contracts::UnixTimeSec;
use kts_storage::error::{RegistryError, RegistryErrorKind};
use kts_storage::registry::KtsStore;
use kts_storage::repo::{DailyUsageRepo, DeviceRegistryRepo, RegistryAuditRepo};
use kts_storage::slots::{SlotStore, StorageError};

const NOW: UnixTimeSec = UnixTimeSec(1_700_000_000);

fn authority() -> CallerId {
    CallerId::from_bytes([0xA1; 32])
}

fn secondary_user() -> CallerId {
    CallerId::from_bytes([0xB2; 32])
}

fn h1() -> DeviceHash {
    DeviceHash::from_bytes([0; 32])
}

fn five_processes() -> Vec<String> {
    ["chrome", "code", "slack", "zoom", "kernel_task"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[test]
fn at_dev_db_01_register_sets_owner_and_unminted_state() {
    let mut s = KtsStore::new_in_memory();
    let rec = s
        .register_device_row(h1(), "ValidDevice", authority(), NOW)
        .unwrap();

    assert_eq!(rec.owner, authority());
    assert_eq!(rec.nft_minted, NftMintState::Unminted);
    assert_eq!(rec.device_hash, h1());
    assert_eq!(rec.name.as_str(), "ValidDevice");
    assert!(rec.registered_at.0 > 0);
    assert_eq!(s.device_row(&h1()), Some(&rec));
}

#[test]
fn at_dev_db_02_duplicate_registration_fails_and_keeps_first_record() {
    let mut s = KtsStore::new_in_memory();
    s.register_device_row(h1(), "DuplicateTest", authority(), NOW)
        .unwrap();

    let err = s
        .register_device_row(h1(), "Other", secondary_user(), UnixTimeSec(NOW.0 + 1))
        .unwrap_err();
    assert_eq!(err, RegistryError::DeviceAlreadyRegistered { device_hash: h1() });
    assert_eq!(err.kind(), RegistryErrorKind::AlreadyExists);
    assert_eq!(err.code(), "DeviceAlreadyRegistered");

    let stored = s.device_row(&h1()).unwrap();
    assert_eq!(stored.owner, authority());
    assert_eq!(stored.name.as_str(), "DuplicateTest");
    assert_eq!(stored.registered_at, NOW);
    assert_eq!(s.audit_rows().len(), 1);
}

#[test]
fn at_dev_db_03_name_over_64_bytes_is_rejected_without_side_effects() {
    let mut s = KtsStore::new_in_memory();
    let err = s
        .register_device_row(h1(), &"x".repeat(65), authority(), NOW)
        .unwrap_err();
    assert_eq!(
        err,
        RegistryError::InvalidDeviceNameLength { len: 65, max: 64 }
    );
    assert_eq!(err.kind(), RegistryErrorKind::ValidationFailed);
    assert!(s.device_row(&h1()).is_none());
    assert!(s.slot_store().is_empty());
    assert!(s.audit_rows().is_empty());

    // The slot stays free for a later valid registration.
    assert!(s
        .register_device_row(h1(), &"x".repeat(64), authority(), NOW)
        .is_ok());
}

#[test]
fn at_dev_db_04_request_time_must_be_positive() {
    let mut s = KtsStore::new_in_memory();
    let err = s
        .register_device_row(h1(), "d", authority(), UnixTimeSec(0))
        .unwrap_err();
    assert_eq!(err, RegistryError::InvalidTimestamp { got: 0 });
    assert!(s.device_row(&h1()).is_none());
}

#[test]
fn at_dev_db_05_mint_is_one_shot_and_never_reverts() {
    let mut s = KtsStore::new_in_memory();
    let before = s
        .register_device_row(h1(), "ValidDevice", authority(), NOW)
        .unwrap();

    s.mark_nft_minted_row(&h1(), &authority(), UnixTimeSec(NOW.0 + 10))
        .unwrap();
    let after = s.device_row(&h1()).unwrap().clone();
    assert_eq!(after.nft_minted, NftMintState::Minted);
    assert_eq!(after.owner, before.owner);
    assert_eq!(after.name, before.name);
    assert_eq!(after.registered_at, before.registered_at);

    let err = s
        .mark_nft_minted_row(&h1(), &authority(), UnixTimeSec(NOW.0 + 20))
        .unwrap_err();
    assert_eq!(err, RegistryError::NftAlreadyMinted { device_hash: h1() });
    assert_eq!(err.kind(), RegistryErrorKind::InvalidStateTransition);
    assert_eq!(s.device_row(&h1()).unwrap().nft_minted, NftMintState::Minted);
}

#[test]
fn at_dev_db_06_mint_requires_existing_device_and_owner() {
    let mut s = KtsStore::new_in_memory();
    let err = s
        .mark_nft_minted_row(&h1(), &authority(), NOW)
        .unwrap_err();
    assert_eq!(err.kind(), RegistryErrorKind::NotFound);

    s.register_device_row(h1(), "d", authority(), NOW).unwrap();
    let err = s
        .mark_nft_minted_row(&h1(), &secondary_user(), NOW)
        .unwrap_err();
    assert_eq!(err, RegistryError::InvalidDeviceOwner { device_hash: h1() });
    assert_eq!(err.kind(), RegistryErrorKind::Unauthorized);
    assert_eq!(
        s.device_row(&h1()).unwrap().nft_minted,
        NftMintState::Unminted
    );
}

#[test]
fn at_dev_db_07_audit_trail_records_only_committed_mutations() {
    let mut s = KtsStore::new_in_memory();
    s.register_device_row(h1(), "d", authority(), NOW).unwrap();
    let _ = s.register_device_row(h1(), "d", authority(), NOW);
    s.mark_nft_minted_row(&h1(), &authority(), UnixTimeSec(NOW.0 + 1))
        .unwrap();
    let _ = s.mark_nft_minted_row(&h1(), &authority(), UnixTimeSec(NOW.0 + 2));

    let rows = s.audit_rows_for_device(&h1());
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].event_id, RegistryEventId(1));
    assert_eq!(rows[0].kind, RegistryEventKind::DeviceRegistered);
    assert_eq!(rows[1].event_id, RegistryEventId(2));
    assert_eq!(rows[1].kind, RegistryEventKind::NftMinted);
    assert_eq!(rows[1].actor, authority());
    assert_eq!(rows[0].slot, s.device_slot(&h1()));

    assert!(matches!(
        s.attempt_overwrite_audit_event(RegistryEventId(1)),
        Err(StorageError::AppendOnlyViolation { .. })
    ));
}

#[test]
fn at_dev_db_08_end_to_end_scenario() {
    let mut s = KtsStore::new_in_memory();
    let d0 = DayBoundary::floor(NOW).unwrap();

    let rec = s
        .register_device_row(h1(), "ValidDevice", authority(), NOW)
        .unwrap();
    assert_eq!(rec.nft_minted, NftMintState::Unminted);

    assert_eq!(
        s.register_device_row(h1(), "Other", authority(), NOW)
            .unwrap_err()
            .kind(),
        RegistryErrorKind::AlreadyExists
    );

    let upload = DailyUsageUpload {
        device_hash: h1(),
        timestamp: d0.as_secs(),
        avg_cpu_usage: 37.5,
        avg_memory_usage: 61.25,
        top_processes: five_processes(),
        data_hash: DataHash::from_bytes([0x5A; 32]),
    };
    s.upload_daily_usage_row(upload.clone(), &authority(), NOW)
        .unwrap();
    assert_eq!(
        s.upload_daily_usage_row(upload, &authority(), NOW)
            .unwrap_err()
            .kind(),
        RegistryErrorKind::AlreadyExists
    );

    s.mark_nft_minted_row(&h1(), &authority(), NOW).unwrap();
    assert_eq!(
        s.mark_nft_minted_row(&h1(), &authority(), NOW)
            .unwrap_err()
            .kind(),
        RegistryErrorKind::InvalidStateTransition
    );

    assert_eq!(s.device_rows().len(), 1);
    assert_eq!(s.daily_usage_rows_for_device(&h1()).len(), 1);
    assert_eq!(s.audit_rows().len(), 3);
}
