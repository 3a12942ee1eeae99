#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::common::bytes32_id;
use crate::device::DeviceHash;
use crate::slot::SlotId;
use crate::{ContractViolation, SchemaVersion, UnixTimeSec, Validate};

pub const USAGE_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

pub const SECONDS_PER_DAY: i64 = 86_400;

/// Number of entries in a daily top-process list.
pub const PROCESS_ARRAY_SIZE: usize = 5;

/// Maximum process name length, in bytes of UTF-8.
pub const MAX_PROCESS_NAME_LENGTH: usize = 32;

bytes32_id!(
    /// SHA-256 of the raw usage payload the averages were computed from.
    DataHash,
    "data_hash"
);

/// Start of a UTC day, in seconds. Non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DayBoundary(i64);

impl DayBoundary {
    /// Accepts only timestamps that sit exactly on the 86400-second grid.
    pub fn aligned(timestamp: i64) -> Result<Self, ContractViolation> {
        let d = Self::verbatim(timestamp)?;
        if !d.is_aligned() {
            return Err(ContractViolation::InvalidValue {
                field: "day_boundary",
                reason: "must be a multiple of 86400",
            });
        }
        Ok(d)
    }

    /// Accepts any non-negative timestamp as-is.
    pub fn verbatim(timestamp: i64) -> Result<Self, ContractViolation> {
        if timestamp < 0 {
            return Err(ContractViolation::InvalidValue {
                field: "day_boundary",
                reason: "must be >= 0",
            });
        }
        Ok(Self(timestamp))
    }

    /// Rounds a wall-clock time down to the start of its day.
    pub fn floor(t: UnixTimeSec) -> Result<Self, ContractViolation> {
        Self::verbatim(t.0)?;
        Ok(Self(t.0 - t.0.rem_euclid(SECONDS_PER_DAY)))
    }

    pub fn is_aligned(self) -> bool {
        self.0.rem_euclid(SECONDS_PER_DAY) == 0
    }

    pub fn as_secs(self) -> i64 {
        self.0
    }

    /// Key bytes used for slot derivation.
    pub fn to_le_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }
}

impl fmt::Display for DayBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Validate for DayBoundary {
    fn validate(&self) -> Result<(), ContractViolation> {
        Self::verbatim(self.0).map(|_| ())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessName(String);

impl ProcessName {
    pub fn new(name: impl Into<String>) -> Result<Self, ContractViolation> {
        let name = Self(name.into());
        name.validate()?;
        Ok(name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for ProcessName {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0.len() > MAX_PROCESS_NAME_LENGTH {
            return Err(ContractViolation::InvalidValue {
                field: "process_name",
                reason: "must be <= 32 bytes",
            });
        }
        Ok(())
    }
}

/// The five heaviest processes of the day, heaviest first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopProcesses([ProcessName; PROCESS_ARRAY_SIZE]);

impl TopProcesses {
    pub fn new(names: Vec<String>) -> Result<Self, ContractViolation> {
        let got = names.len();
        if got != PROCESS_ARRAY_SIZE {
            return Err(ContractViolation::InvalidLength {
                field: "top_processes",
                expected: PROCESS_ARRAY_SIZE,
                got,
            });
        }
        let names: Vec<ProcessName> = names
            .into_iter()
            .map(ProcessName::new)
            .collect::<Result<_, _>>()?;
        let arr: [ProcessName; PROCESS_ARRAY_SIZE] =
            names
                .try_into()
                .map_err(|_| ContractViolation::InvalidLength {
                    field: "top_processes",
                    expected: PROCESS_ARRAY_SIZE,
                    got,
                })?;
        Ok(Self(arr))
    }

    pub fn as_slice(&self) -> &[ProcessName] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProcessName> {
        self.0.iter()
    }
}

impl Validate for TopProcesses {
    fn validate(&self) -> Result<(), ContractViolation> {
        for p in &self.0 {
            p.validate()?;
        }
        Ok(())
    }
}

fn validate_percentage(field: &'static str, value: f64) -> Result<(), ContractViolation> {
    if !value.is_finite() {
        return Err(ContractViolation::NotFinite { field });
    }
    if value < 0.0 {
        return Err(ContractViolation::InvalidRange {
            field,
            min: 0.0,
            max: f64::MAX,
            got: value,
        });
    }
    Ok(())
}

/// Raw daily usage request as it arrives from a client, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyUsageUpload {
    pub device_hash: DeviceHash,
    pub timestamp: i64,
    pub avg_cpu_usage: f64,
    pub avg_memory_usage: f64,
    pub top_processes: Vec<String>,
    pub data_hash: DataHash,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub schema_version: SchemaVersion,
    /// Slot of the owning device record.
    pub device: SlotId,
    pub device_hash: DeviceHash,
    pub timestamp: DayBoundary,
    pub avg_cpu_usage: f64,
    pub avg_memory_usage: f64,
    pub top_processes: TopProcesses,
    pub data_hash: DataHash,
    pub created_at: UnixTimeSec,
}

impl UsageRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn v1(
        device: SlotId,
        device_hash: DeviceHash,
        timestamp: DayBoundary,
        avg_cpu_usage: f64,
        avg_memory_usage: f64,
        top_processes: TopProcesses,
        data_hash: DataHash,
        created_at: UnixTimeSec,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: USAGE_CONTRACT_VERSION,
            device,
            device_hash,
            timestamp,
            avg_cpu_usage,
            avg_memory_usage,
            top_processes,
            data_hash,
            created_at,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for UsageRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != USAGE_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "usage_record.schema_version",
                reason: "must match USAGE_CONTRACT_VERSION",
            });
        }
        self.timestamp.validate()?;
        validate_percentage("usage_record.avg_cpu_usage", self.avg_cpu_usage)?;
        validate_percentage("usage_record.avg_memory_usage", self.avg_memory_usage)?;
        self.top_processes.validate()?;
        if self.created_at.0 <= 0 {
            return Err(ContractViolation::InvalidValue {
                field: "usage_record.created_at",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}
