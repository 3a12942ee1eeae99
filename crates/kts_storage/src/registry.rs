#![forbid(unsafe_code)]

use tracing::{info, warn};

use kts_kernel_contracts::device::{
    CallerId, DeviceHash, DeviceName, DeviceRecord, MAX_DEVICE_NAME_LENGTH,
};
use kts_kernel_contracts::event::{
    RegistryEvent, RegistryEventId, RegistryEventInput, RegistryEventKind,
};
use kts_kernel_contracts::slot::SlotId;
use kts_kernel_contracts::usage::{
    DailyUsageUpload, DayBoundary, TopProcesses, UsageRecord, MAX_PROCESS_NAME_LENGTH,
    PROCESS_ARRAY_SIZE,
};
use kts_kernel_contracts::UnixTimeSec;

use crate::audit::RegistryAuditLog;
use crate::config::{DayBoundaryPolicy, RegistryConfig};
use crate::derive::AddressDeriver;
use crate::error::RegistryError;
use crate::slots::{InMemorySlotStore, SlotEntry, SlotStore, StorageError};

/// Device registry and daily usage ledger over a slot store.
///
/// Every record lives in the slot derived from its key; occupancy of that
/// slot is the only uniqueness check. Callers pass identity and time
/// explicitly on every request.
#[derive(Debug, Clone)]
pub struct KtsStore<S = InMemorySlotStore> {
    config: RegistryConfig,
    deriver: AddressDeriver,
    slots: S,
    audit: RegistryAuditLog,
}

impl KtsStore<InMemorySlotStore> {
    pub fn new_in_memory() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        Self::with_slot_store(config, InMemorySlotStore::new())
    }
}

impl<S: SlotStore> KtsStore<S> {
    pub fn with_slot_store(config: RegistryConfig, slots: S) -> Self {
        Self {
            deriver: AddressDeriver::new(config.namespace),
            config,
            slots,
            audit: RegistryAuditLog::default(),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn deriver(&self) -> &AddressDeriver {
        &self.deriver
    }

    pub fn slot_store(&self) -> &S {
        &self.slots
    }

    pub fn device_slot(&self, device_hash: &DeviceHash) -> SlotId {
        self.deriver.device_slot(device_hash)
    }

    pub fn daily_usage_slot(&self, device_hash: &DeviceHash, day: DayBoundary) -> SlotId {
        self.deriver.daily_usage_slot(device_hash, day)
    }

    pub fn register_device(
        &mut self,
        device_hash: DeviceHash,
        name: &str,
        caller: CallerId,
        now: UnixTimeSec,
    ) -> Result<DeviceRecord, RegistryError> {
        self.register_device_inner(device_hash, name, caller, now)
            .map_err(|e| rejected("register_device", &device_hash, e))
    }

    fn register_device_inner(
        &mut self,
        device_hash: DeviceHash,
        name: &str,
        caller: CallerId,
        now: UnixTimeSec,
    ) -> Result<DeviceRecord, RegistryError> {
        if name.len() > MAX_DEVICE_NAME_LENGTH {
            return Err(RegistryError::InvalidDeviceNameLength {
                len: name.len(),
                max: MAX_DEVICE_NAME_LENGTH,
            });
        }
        if now.0 <= 0 {
            return Err(RegistryError::InvalidTimestamp { got: now.0 });
        }

        let slot = self.deriver.device_slot(&device_hash);
        let record = DeviceRecord::v1(device_hash, caller, DeviceName::new(name)?, now)?;
        let staged = self.audit.stage(RegistryEventInput::v1(
            RegistryEventKind::DeviceRegistered,
            slot,
            device_hash,
            caller,
            now,
        )?)?;

        match self.slots.try_insert(slot, SlotEntry::Device(record.clone())) {
            Ok(()) => {}
            Err(StorageError::DuplicateKey { .. }) => {
                return Err(RegistryError::DeviceAlreadyRegistered { device_hash })
            }
            Err(e) => return Err(e.into()),
        }
        self.audit.commit(staged);

        info!(
            slot = %slot,
            device_hash = %device_hash,
            owner = %caller,
            "device registered"
        );
        Ok(record)
    }

    pub fn mark_nft_minted(
        &mut self,
        device_hash: &DeviceHash,
        caller: &CallerId,
        now: UnixTimeSec,
    ) -> Result<(), RegistryError> {
        self.mark_nft_minted_inner(device_hash, caller, now)
            .map_err(|e| rejected("mark_nft_minted", device_hash, e))
    }

    fn mark_nft_minted_inner(
        &mut self,
        device_hash: &DeviceHash,
        caller: &CallerId,
        now: UnixTimeSec,
    ) -> Result<(), RegistryError> {
        let slot = self.deriver.device_slot(device_hash);
        let current = self.load_device(&slot, device_hash)?;
        if &current.owner != caller {
            return Err(RegistryError::InvalidDeviceOwner {
                device_hash: *device_hash,
            });
        }
        let Some(minted) = current.minted() else {
            return Err(RegistryError::NftAlreadyMinted {
                device_hash: *device_hash,
            });
        };
        if now.0 <= 0 {
            return Err(RegistryError::InvalidTimestamp { got: now.0 });
        }
        let staged = self.audit.stage(RegistryEventInput::v1(
            RegistryEventKind::NftMinted,
            slot,
            *device_hash,
            *caller,
            now,
        )?)?;

        self.slots.replace(&slot, SlotEntry::Device(minted))?;
        self.audit.commit(staged);

        info!(
            slot = %slot,
            device_hash = %device_hash,
            owner = %caller,
            "nft marked as minted"
        );
        Ok(())
    }

    pub fn upload_daily_usage(
        &mut self,
        upload: DailyUsageUpload,
        caller: &CallerId,
        now: UnixTimeSec,
    ) -> Result<UsageRecord, RegistryError> {
        let device_hash = upload.device_hash;
        self.upload_daily_usage_inner(upload, caller, now)
            .map_err(|e| rejected("upload_daily_usage", &device_hash, e))
    }

    fn upload_daily_usage_inner(
        &mut self,
        upload: DailyUsageUpload,
        caller: &CallerId,
        now: UnixTimeSec,
    ) -> Result<UsageRecord, RegistryError> {
        let device_hash = upload.device_hash;
        let device_slot = self.deriver.device_slot(&device_hash);
        let device = self.load_device(&device_slot, &device_hash)?;
        if &device.owner != caller {
            return Err(RegistryError::InvalidDeviceOwner { device_hash });
        }

        if upload.top_processes.len() != PROCESS_ARRAY_SIZE {
            return Err(RegistryError::InvalidTopProcessesArraySize {
                expected: PROCESS_ARRAY_SIZE,
                got: upload.top_processes.len(),
            });
        }
        if let Some((index, p)) = upload
            .top_processes
            .iter()
            .enumerate()
            .find(|(_, p)| p.len() > MAX_PROCESS_NAME_LENGTH)
        {
            return Err(RegistryError::InvalidProcessNameLength {
                index,
                len: p.len(),
                max: MAX_PROCESS_NAME_LENGTH,
            });
        }
        check_percentage("avg_cpu_usage", upload.avg_cpu_usage)?;
        check_percentage("avg_memory_usage", upload.avg_memory_usage)?;
        let day = self.day_key(upload.timestamp)?;
        if now.0 <= 0 {
            return Err(RegistryError::InvalidTimestamp { got: now.0 });
        }

        let slot = self.deriver.daily_usage_slot(&device_hash, day);
        let record = UsageRecord::v1(
            device_slot,
            device_hash,
            day,
            upload.avg_cpu_usage,
            upload.avg_memory_usage,
            TopProcesses::new(upload.top_processes)?,
            upload.data_hash,
            now,
        )?;
        let staged = self.audit.stage(RegistryEventInput::v1(
            RegistryEventKind::DailyUsageUploaded { day },
            slot,
            device_hash,
            *caller,
            now,
        )?)?;

        match self
            .slots
            .try_insert(slot, SlotEntry::DailyUsage(record.clone()))
        {
            Ok(()) => {}
            Err(StorageError::DuplicateKey { .. }) => {
                return Err(RegistryError::DailyUsageAlreadyUploaded { device_hash, day })
            }
            Err(e) => return Err(e.into()),
        }
        self.audit.commit(staged);

        info!(
            slot = %slot,
            device_hash = %device_hash,
            day = day.as_secs(),
            "daily usage uploaded"
        );
        Ok(record)
    }

    /// Ledger key for a supplied timestamp under the configured policy.
    pub fn day_key(&self, timestamp: i64) -> Result<DayBoundary, RegistryError> {
        let day = match self.config.day_boundary_policy {
            DayBoundaryPolicy::Strict => DayBoundary::aligned(timestamp),
            DayBoundaryPolicy::AcceptAsKey => DayBoundary::verbatim(timestamp),
        };
        day.map_err(|_| RegistryError::InvalidDayBoundary { timestamp })
    }

    fn load_device(
        &self,
        slot: &SlotId,
        device_hash: &DeviceHash,
    ) -> Result<DeviceRecord, RegistryError> {
        let Some(entry) = self.slots.get(slot) else {
            return Err(RegistryError::DeviceNotFound {
                device_hash: *device_hash,
            });
        };
        match entry.as_device() {
            Some(d) => Ok(d.clone()),
            None => Err(StorageError::FamilyMismatch {
                key: slot.to_hex(),
                expected: "device",
                found: entry.family(),
            }
            .into()),
        }
    }

    pub fn device(&self, device_hash: &DeviceHash) -> Option<&DeviceRecord> {
        self.slots
            .get(&self.deriver.device_slot(device_hash))
            .and_then(SlotEntry::as_device)
    }

    pub fn daily_usage(&self, device_hash: &DeviceHash, day: DayBoundary) -> Option<&UsageRecord> {
        self.slots
            .get(&self.deriver.daily_usage_slot(device_hash, day))
            .and_then(SlotEntry::as_daily_usage)
    }

    /// All usage records of one device, oldest day first.
    pub fn daily_usage_for_device(&self, device_hash: &DeviceHash) -> Vec<&UsageRecord> {
        let mut rows: Vec<&UsageRecord> = self
            .slots
            .entries()
            .filter_map(|(_, e)| e.as_daily_usage())
            .filter(|u| &u.device_hash == device_hash)
            .collect();
        rows.sort_by_key(|u| u.timestamp);
        rows
    }

    pub fn devices(&self) -> Vec<&DeviceRecord> {
        self.slots
            .entries()
            .filter_map(|(_, e)| e.as_device())
            .collect()
    }

    pub fn audit_events(&self) -> &[RegistryEvent] {
        self.audit.events()
    }

    pub fn audit_events_for_device(&self, device_hash: &DeviceHash) -> Vec<&RegistryEvent> {
        self.audit.events_for_device(device_hash)
    }

    /// Id the next committed audit event will receive.
    pub fn next_event_id(&self) -> RegistryEventId {
        self.audit.next_event_id()
    }

    pub(crate) fn resume_audit_at(&mut self, next_event_id: RegistryEventId) {
        self.audit = RegistryAuditLog::resume_at(next_event_id);
    }

    pub fn attempt_overwrite_audit_event(
        &mut self,
        event_id: RegistryEventId,
    ) -> Result<(), StorageError> {
        self.audit.attempt_overwrite_event(event_id)
    }

    /// Attempts to rewrite a usage record. The ledger has no update path.
    pub fn attempt_overwrite_daily_usage(
        &mut self,
        _device_hash: &DeviceHash,
        _day: DayBoundary,
    ) -> Result<(), StorageError> {
        Err(StorageError::AppendOnlyViolation {
            table: "daily_usage",
        })
    }
}

fn check_percentage(field: &'static str, got: f64) -> Result<(), RegistryError> {
    if !got.is_finite() || got < 0.0 {
        return Err(RegistryError::InvalidUsageMetric { field, got });
    }
    Ok(())
}

fn rejected(op: &'static str, device_hash: &DeviceHash, err: RegistryError) -> RegistryError {
    warn!(
        op = op,
        device_hash = %device_hash,
        code = err.code(),
        kind = ?err.kind(),
        "request rejected: {err}"
    );
    err
}
