#![forbid(unsafe_code)]

use kts_kernel_contracts::device::DeviceHash;
use kts_kernel_contracts::usage::DayBoundary;
use kts_kernel_contracts::ContractViolation;

use crate::slots::StorageError;

/// Coarse class of a rejected request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistryErrorKind {
    /// A create-once slot is already occupied.
    AlreadyExists,
    ValidationFailed,
    /// A one-shot flag was already set.
    InvalidStateTransition,
    /// The referenced parent record does not exist.
    NotFound,
    /// The caller is not the device owner.
    Unauthorized,
    /// The slot store itself refused the write.
    Storage,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    #[error("device {device_hash} is already registered")]
    DeviceAlreadyRegistered { device_hash: DeviceHash },
    #[error("daily usage for device {device_hash} on day {day} has already been uploaded")]
    DailyUsageAlreadyUploaded {
        device_hash: DeviceHash,
        day: DayBoundary,
    },
    #[error("device name is {len} bytes, max is {max}")]
    InvalidDeviceNameLength { len: usize, max: usize },
    #[error("top processes must contain exactly {expected} entries, got {got}")]
    InvalidTopProcessesArraySize { expected: usize, got: usize },
    #[error("process name at index {index} is {len} bytes, max is {max}")]
    InvalidProcessNameLength { index: usize, len: usize, max: usize },
    #[error("{field} must be a finite, non-negative percentage, got {got}")]
    InvalidUsageMetric { field: &'static str, got: f64 },
    #[error("timestamp {timestamp} is not a day boundary")]
    InvalidDayBoundary { timestamp: i64 },
    #[error("request time {got} must be > 0")]
    InvalidTimestamp { got: i64 },
    #[error("NFT already minted for device {device_hash}")]
    NftAlreadyMinted { device_hash: DeviceHash },
    #[error("device {device_hash} not found")]
    DeviceNotFound { device_hash: DeviceHash },
    #[error("caller is not the owner of device {device_hash}")]
    InvalidDeviceOwner { device_hash: DeviceHash },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<ContractViolation> for RegistryError {
    fn from(v: ContractViolation) -> Self {
        RegistryError::Storage(StorageError::ContractViolation(v))
    }
}

impl RegistryError {
    pub fn kind(&self) -> RegistryErrorKind {
        match self {
            RegistryError::DeviceAlreadyRegistered { .. }
            | RegistryError::DailyUsageAlreadyUploaded { .. } => RegistryErrorKind::AlreadyExists,
            RegistryError::InvalidDeviceNameLength { .. }
            | RegistryError::InvalidTopProcessesArraySize { .. }
            | RegistryError::InvalidProcessNameLength { .. }
            | RegistryError::InvalidUsageMetric { .. }
            | RegistryError::InvalidDayBoundary { .. }
            | RegistryError::InvalidTimestamp { .. } => RegistryErrorKind::ValidationFailed,
            RegistryError::NftAlreadyMinted { .. } => RegistryErrorKind::InvalidStateTransition,
            RegistryError::DeviceNotFound { .. } => RegistryErrorKind::NotFound,
            RegistryError::InvalidDeviceOwner { .. } => RegistryErrorKind::Unauthorized,
            RegistryError::Storage(_) => RegistryErrorKind::Storage,
        }
    }

    /// Stable identifier reported to clients.
    pub fn code(&self) -> &'static str {
        match self {
            RegistryError::DeviceAlreadyRegistered { .. } => "DeviceAlreadyRegistered",
            RegistryError::DailyUsageAlreadyUploaded { .. } => "DailyUsageAlreadyUploaded",
            RegistryError::InvalidDeviceNameLength { .. } => "InvalidDeviceNameLength",
            RegistryError::InvalidTopProcessesArraySize { .. } => "InvalidTopProcessesArraySize",
            RegistryError::InvalidProcessNameLength { .. } => "InvalidProcessNameLength",
            RegistryError::InvalidUsageMetric { .. } => "InvalidUsageMetric",
            RegistryError::InvalidDayBoundary { .. } => "InvalidDayBoundary",
            RegistryError::InvalidTimestamp { .. } => "InvalidTimestamp",
            RegistryError::NftAlreadyMinted { .. } => "NftAlreadyMinted",
            RegistryError::DeviceNotFound { .. } => "DeviceNotFound",
            RegistryError::InvalidDeviceOwner { .. } => "InvalidDeviceOwner",
            RegistryError::Storage(_) => "StorageFailure",
        }
    }
}
