#![forbid(unsafe_code)]

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use kts_kernel_contracts::device::DeviceRecord;
use kts_kernel_contracts::slot::SlotId;
use kts_kernel_contracts::usage::UsageRecord;
use kts_kernel_contracts::{ContractViolation, Validate};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StorageError {
    #[error("duplicate key in {table}: {key}")]
    DuplicateKey { table: &'static str, key: String },
    #[error("missing key in {table}: {key}")]
    MissingKey { table: &'static str, key: String },
    #[error("{table} is append-only")]
    AppendOnlyViolation { table: &'static str },
    #[error("slot {key} holds a {found} record, expected {expected}")]
    FamilyMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error(transparent)]
    ContractViolation(#[from] ContractViolation),
}

/// Content of one occupied slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum SlotEntry {
    Device(DeviceRecord),
    DailyUsage(UsageRecord),
}

impl SlotEntry {
    pub fn family(&self) -> &'static str {
        match self {
            SlotEntry::Device(_) => "device",
            SlotEntry::DailyUsage(_) => "daily_usage",
        }
    }

    pub fn as_device(&self) -> Option<&DeviceRecord> {
        match self {
            SlotEntry::Device(d) => Some(d),
            SlotEntry::DailyUsage(_) => None,
        }
    }

    pub fn as_daily_usage(&self) -> Option<&UsageRecord> {
        match self {
            SlotEntry::DailyUsage(u) => Some(u),
            SlotEntry::Device(_) => None,
        }
    }
}

impl Validate for SlotEntry {
    fn validate(&self) -> Result<(), ContractViolation> {
        match self {
            SlotEntry::Device(d) => d.validate(),
            SlotEntry::DailyUsage(u) => u.validate(),
        }
    }
}

/// Key-value storage addressed by derived slot ids.
///
/// Implementations must make `try_insert` a single create-if-absent step:
/// of two inserts for the same slot, exactly one may return `Ok`.
pub trait SlotStore {
    fn get(&self, slot: &SlotId) -> Option<&SlotEntry>;

    fn try_insert(&mut self, slot: SlotId, entry: SlotEntry) -> Result<(), StorageError>;

    /// Overwrites an occupied slot and returns the previous entry.
    fn replace(&mut self, slot: &SlotId, entry: SlotEntry) -> Result<SlotEntry, StorageError>;

    fn entries(&self) -> Box<dyn Iterator<Item = (&SlotId, &SlotEntry)> + '_>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains(&self, slot: &SlotId) -> bool {
        self.get(slot).is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemorySlotStore {
    slots: BTreeMap<SlotId, SlotEntry>,
}

impl InMemorySlotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SlotStore for InMemorySlotStore {
    fn get(&self, slot: &SlotId) -> Option<&SlotEntry> {
        self.slots.get(slot)
    }

    fn try_insert(&mut self, slot: SlotId, entry: SlotEntry) -> Result<(), StorageError> {
        entry.validate()?;
        match self.slots.entry(slot) {
            Entry::Occupied(o) => Err(StorageError::DuplicateKey {
                table: "slots",
                key: o.key().to_hex(),
            }),
            Entry::Vacant(v) => {
                v.insert(entry);
                Ok(())
            }
        }
    }

    fn replace(&mut self, slot: &SlotId, entry: SlotEntry) -> Result<SlotEntry, StorageError> {
        entry.validate()?;
        let Some(current) = self.slots.get_mut(slot) else {
            return Err(StorageError::MissingKey {
                table: "slots",
                key: slot.to_hex(),
            });
        };
        if current.family() != entry.family() {
            return Err(StorageError::FamilyMismatch {
                key: slot.to_hex(),
                expected: current.family(),
                found: entry.family(),
            });
        }
        Ok(std::mem::replace(current, entry))
    }

    fn entries(&self) -> Box<dyn Iterator<Item = (&SlotId, &SlotEntry)> + '_> {
        Box::new(self.slots.iter())
    }

    fn len(&self) -> usize {
        self.slots.len()
    }
}
