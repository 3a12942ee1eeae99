#![forbid(unsafe_code)]

use kts_kernel_contracts::device::{CallerId, DeviceHash, DeviceRecord};
use kts_kernel_contracts::event::RegistryEvent;
use kts_kernel_contracts::usage::{DailyUsageUpload, DayBoundary, UsageRecord};
use kts_kernel_contracts::UnixTimeSec;

use crate::error::RegistryError;
use crate::registry::KtsStore;
use crate::slots::SlotStore;

/// Typed repository interface for the device registry.
pub trait DeviceRegistryRepo {
    fn register_device_row(
        &mut self,
        device_hash: DeviceHash,
        name: &str,
        caller: CallerId,
        now: UnixTimeSec,
    ) -> Result<DeviceRecord, RegistryError>;

    fn mark_nft_minted_row(
        &mut self,
        device_hash: &DeviceHash,
        caller: &CallerId,
        now: UnixTimeSec,
    ) -> Result<(), RegistryError>;

    fn device_row(&self, device_hash: &DeviceHash) -> Option<&DeviceRecord>;
    fn device_rows(&self) -> Vec<&DeviceRecord>;
}

/// Typed repository interface for the append-only daily usage ledger.
pub trait DailyUsageRepo {
    fn upload_daily_usage_row(
        &mut self,
        upload: DailyUsageUpload,
        caller: &CallerId,
        now: UnixTimeSec,
    ) -> Result<UsageRecord, RegistryError>;

    fn daily_usage_row(&self, device_hash: &DeviceHash, day: DayBoundary) -> Option<&UsageRecord>;
    fn daily_usage_rows_for_device(&self, device_hash: &DeviceHash) -> Vec<&UsageRecord>;
}

/// Typed repository interface for the registry audit journal.
pub trait RegistryAuditRepo {
    fn audit_rows(&self) -> &[RegistryEvent];
    fn audit_rows_for_device(&self, device_hash: &DeviceHash) -> Vec<&RegistryEvent>;
}

impl<S: SlotStore> DeviceRegistryRepo for KtsStore<S> {
    fn register_device_row(
        &mut self,
        device_hash: DeviceHash,
        name: &str,
        caller: CallerId,
        now: UnixTimeSec,
    ) -> Result<DeviceRecord, RegistryError> {
        self.register_device(device_hash, name, caller, now)
    }

    fn mark_nft_minted_row(
        &mut self,
        device_hash: &DeviceHash,
        caller: &CallerId,
        now: UnixTimeSec,
    ) -> Result<(), RegistryError> {
        self.mark_nft_minted(device_hash, caller, now)
    }

    fn device_row(&self, device_hash: &DeviceHash) -> Option<&DeviceRecord> {
        self.device(device_hash)
    }

    fn device_rows(&self) -> Vec<&DeviceRecord> {
        self.devices()
    }
}

impl<S: SlotStore> DailyUsageRepo for KtsStore<S> {
    fn upload_daily_usage_row(
        &mut self,
        upload: DailyUsageUpload,
        caller: &CallerId,
        now: UnixTimeSec,
    ) -> Result<UsageRecord, RegistryError> {
        self.upload_daily_usage(upload, caller, now)
    }

    fn daily_usage_row(&self, device_hash: &DeviceHash, day: DayBoundary) -> Option<&UsageRecord> {
        self.daily_usage(device_hash, day)
    }

    fn daily_usage_rows_for_device(&self, device_hash: &DeviceHash) -> Vec<&UsageRecord> {
        self.daily_usage_for_device(device_hash)
    }
}

impl<S: SlotStore> RegistryAuditRepo for KtsStore<S> {
    fn audit_rows(&self) -> &[RegistryEvent] {
        self.audit_events()
    }

    fn audit_rows_for_device(&self, device_hash: &DeviceHash) -> Vec<&RegistryEvent> {
        self.audit_events_for_device(device_hash)
    }
}
