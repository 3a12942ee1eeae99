#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::common::bytes32_id;
use crate::{ContractViolation, SchemaVersion, UnixTimeSec, Validate};

pub const DEVICE_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

/// Maximum device name length, in bytes of UTF-8.
pub const MAX_DEVICE_NAME_LENGTH: usize = 64;

bytes32_id!(
    /// SHA-256 fingerprint of the device, computed by the client.
    DeviceHash,
    "device_hash"
);

bytes32_id!(
    /// Identity of the party submitting a request (the signer's public key).
    CallerId,
    "caller_id"
);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceName(String);

impl DeviceName {
    pub fn new(name: impl Into<String>) -> Result<Self, ContractViolation> {
        let name = Self(name.into());
        name.validate()?;
        Ok(name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for DeviceName {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0.len() > MAX_DEVICE_NAME_LENGTH {
            return Err(ContractViolation::InvalidValue {
                field: "device_name",
                reason: "must be <= 64 bytes",
            });
        }
        Ok(())
    }
}

/// Mint status of the device NFT. `Minted` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NftMintState {
    #[default]
    Unminted,
    Minted,
}

impl NftMintState {
    /// The state after a mint, or `None` when the mint already happened.
    pub fn mint(self) -> Option<NftMintState> {
        match self {
            NftMintState::Unminted => Some(NftMintState::Minted),
            NftMintState::Minted => None,
        }
    }

    pub fn is_minted(self) -> bool {
        self == NftMintState::Minted
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub schema_version: SchemaVersion,
    pub device_hash: DeviceHash,
    pub owner: CallerId,
    pub name: DeviceName,
    pub nft_minted: NftMintState,
    pub registered_at: UnixTimeSec,
}

impl DeviceRecord {
    pub fn v1(
        device_hash: DeviceHash,
        owner: CallerId,
        name: DeviceName,
        registered_at: UnixTimeSec,
    ) -> Result<Self, ContractViolation> {
        let d = Self {
            schema_version: DEVICE_CONTRACT_VERSION,
            device_hash,
            owner,
            name,
            nft_minted: NftMintState::Unminted,
            registered_at,
        };
        d.validate()?;
        Ok(d)
    }

    /// Copy of this record with the mint flag set. Every other field is carried over.
    pub fn minted(&self) -> Option<Self> {
        let nft_minted = self.nft_minted.mint()?;
        Some(Self {
            nft_minted,
            ..self.clone()
        })
    }
}

impl Validate for DeviceRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != DEVICE_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "device_record.schema_version",
                reason: "must match DEVICE_CONTRACT_VERSION",
            });
        }
        self.name.validate()?;
        if self.registered_at.0 <= 0 {
            return Err(ContractViolation::InvalidValue {
                field: "device_record.registered_at",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}
