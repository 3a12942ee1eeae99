#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use tracing::info;

use kts_kernel_contracts::event::RegistryEventId;
use kts_kernel_contracts::slot::SlotId;
use kts_kernel_contracts::{ContractViolation, SchemaVersion, Validate};

use crate::config::{DayBoundaryPolicy, RegistryConfig};
use crate::derive::{AddressDeriver, RegistryNamespace};
use crate::registry::KtsStore;
use crate::slots::{SlotEntry, SlotStore, StorageError};

pub const SNAPSHOT_VERSION: SchemaVersion = SchemaVersion(1);

/// Point-in-time export of every occupied slot. Audit rows are not included,
/// only the id the next audit event will receive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub schema_version: SchemaVersion,
    pub namespace: RegistryNamespace,
    pub next_event_id: RegistryEventId,
    pub slots: Vec<SnapshotSlot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotSlot {
    pub slot: SlotId,
    pub entry: SlotEntry,
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("unsupported snapshot schema version {0}")]
    UnsupportedVersion(u32),
    #[error("snapshot namespace does not match the configured registry namespace")]
    NamespaceMismatch,
    #[error("slot {slot} does not match the key of the record stored in it")]
    SlotMismatch { slot: SlotId },
    #[error("usage record in slot {slot} references a device that is not in the snapshot")]
    DanglingDeviceReference { slot: SlotId },
    #[error("usage record in slot {slot} is keyed off the day grid")]
    MisalignedDay { slot: SlotId },
    #[error(transparent)]
    Contract(#[from] ContractViolation),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("snapshot json: {0}")]
    Json(#[from] serde_json::Error),
}

impl RegistrySnapshot {
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(s: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(s)?)
    }
}

impl<S: SlotStore> KtsStore<S> {
    pub fn export_snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            schema_version: SNAPSHOT_VERSION,
            namespace: self.config().namespace,
            next_event_id: self.next_event_id(),
            slots: self
                .slot_store()
                .entries()
                .map(|(slot, entry)| SnapshotSlot {
                    slot: *slot,
                    entry: entry.clone(),
                })
                .collect(),
        }
    }
}

impl<S: SlotStore + Default> KtsStore<S> {
    /// Rebuilds a store from a snapshot. Every slot id is re-derived from the
    /// record it holds; any inconsistency rejects the whole snapshot.
    pub fn import_snapshot(
        config: RegistryConfig,
        snapshot: RegistrySnapshot,
    ) -> Result<Self, SnapshotError> {
        if snapshot.schema_version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(snapshot.schema_version.0));
        }
        if snapshot.namespace != config.namespace {
            return Err(SnapshotError::NamespaceMismatch);
        }
        snapshot.next_event_id.validate()?;

        let deriver = AddressDeriver::new(config.namespace);
        let mut slots = S::default();
        for SnapshotSlot { slot, entry } in snapshot.slots {
            entry.validate()?;
            let expected = match &entry {
                SlotEntry::Device(d) => deriver.device_slot(&d.device_hash),
                SlotEntry::DailyUsage(u) => {
                    if config.day_boundary_policy == DayBoundaryPolicy::Strict
                        && !u.timestamp.is_aligned()
                    {
                        return Err(SnapshotError::MisalignedDay { slot });
                    }
                    if u.device != deriver.device_slot(&u.device_hash) {
                        return Err(SnapshotError::SlotMismatch { slot });
                    }
                    deriver.daily_usage_slot(&u.device_hash, u.timestamp)
                }
            };
            if expected != slot {
                return Err(SnapshotError::SlotMismatch { slot });
            }
            slots.try_insert(slot, entry)?;
        }

        let dangling = slots.entries().find_map(|(slot, e)| {
            let u = e.as_daily_usage()?;
            let parent = slots.get(&u.device).and_then(SlotEntry::as_device);
            parent.is_none().then_some(*slot)
        });
        if let Some(slot) = dangling {
            return Err(SnapshotError::DanglingDeviceReference { slot });
        }

        info!(
            slots = slots.len(),
            next_event_id = snapshot.next_event_id.0,
            "registry snapshot imported"
        );
        let mut store = Self::with_slot_store(config, slots);
        store.resume_audit_at(snapshot.next_event_id);
        Ok(store)
    }
}
