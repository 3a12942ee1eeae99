#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::device::{CallerId, DeviceHash};
use crate::slot::SlotId;
use crate::usage::DayBoundary;
use crate::{ContractViolation, SchemaVersion, UnixTimeSec, Validate};

pub const EVENT_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RegistryEventId(pub u64);

impl Validate for RegistryEventId {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "registry_event_id",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegistryEventKind {
    DeviceRegistered,
    DailyUsageUploaded { day: DayBoundary },
    NftMinted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEventInput {
    pub schema_version: SchemaVersion,
    pub kind: RegistryEventKind,
    pub slot: SlotId,
    pub device_hash: DeviceHash,
    pub actor: CallerId,
    pub recorded_at: UnixTimeSec,
}

impl RegistryEventInput {
    pub fn v1(
        kind: RegistryEventKind,
        slot: SlotId,
        device_hash: DeviceHash,
        actor: CallerId,
        recorded_at: UnixTimeSec,
    ) -> Result<Self, ContractViolation> {
        let e = Self {
            schema_version: EVENT_CONTRACT_VERSION,
            kind,
            slot,
            device_hash,
            actor,
            recorded_at,
        };
        e.validate()?;
        Ok(e)
    }
}

impl Validate for RegistryEventInput {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != EVENT_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "registry_event_input.schema_version",
                reason: "must match EVENT_CONTRACT_VERSION",
            });
        }
        if let RegistryEventKind::DailyUsageUploaded { day } = self.kind {
            day.validate()?;
        }
        if self.recorded_at.0 <= 0 {
            return Err(ContractViolation::InvalidValue {
                field: "registry_event_input.recorded_at",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

/// One committed registry mutation. Rows are never rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEvent {
    pub schema_version: SchemaVersion,
    pub event_id: RegistryEventId,
    pub kind: RegistryEventKind,
    pub slot: SlotId,
    pub device_hash: DeviceHash,
    pub actor: CallerId,
    pub recorded_at: UnixTimeSec,
}

impl RegistryEvent {
    pub fn from_input_v1(
        event_id: RegistryEventId,
        input: RegistryEventInput,
    ) -> Result<Self, ContractViolation> {
        event_id.validate()?;
        input.validate()?;
        Ok(Self {
            schema_version: EVENT_CONTRACT_VERSION,
            event_id,
            kind: input.kind,
            slot: input.slot,
            device_hash: input.device_hash,
            actor: input.actor,
            recorded_at: input.recorded_at,
        })
    }
}
