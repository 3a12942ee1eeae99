#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SchemaVersion(pub u32);

/// Seconds since the Unix epoch, as reported by the execution substrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnixTimeSec(pub i64);

impl Validate for UnixTimeSec {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0 <= 0 {
            return Err(ContractViolation::InvalidValue {
                field: "unix_time_sec",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ContractViolation {
    #[error("{field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: &'static str,
    },
    #[error("{field}: {got} outside [{min}, {max}]")]
    InvalidRange {
        field: &'static str,
        min: f64,
        max: f64,
        got: f64,
    },
    #[error("{field}: must be finite")]
    NotFinite { field: &'static str },
    #[error("{field}: expected length {expected}, got {got}")]
    InvalidLength {
        field: &'static str,
        expected: usize,
        got: usize,
    },
}

pub trait Validate {
    fn validate(&self) -> Result<(), ContractViolation>;
}

/// Declares a fixed 32-byte identifier that renders and serializes as lowercase hex.
macro_rules! bytes32_id {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
        )]
        pub struct $name(#[serde(with = "hex::serde")] [u8; 32]);

        impl $name {
            pub const LEN: usize = 32;

            pub const fn from_bytes(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            pub fn from_slice(bytes: &[u8]) -> Result<Self, $crate::ContractViolation> {
                let arr: [u8; 32] =
                    bytes
                        .try_into()
                        .map_err(|_| $crate::ContractViolation::InvalidLength {
                            field: $field,
                            expected: 32,
                            got: bytes.len(),
                        })?;
                Ok(Self(arr))
            }

            pub fn from_hex(s: &str) -> Result<Self, $crate::ContractViolation> {
                let mut arr = [0u8; 32];
                hex::decode_to_slice(s, &mut arr).map_err(|_| {
                    $crate::ContractViolation::InvalidValue {
                        field: $field,
                        reason: "must be 64 hex chars",
                    }
                })?;
                Ok(Self(arr))
            }

            pub const fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }
    };
}

pub(crate) use bytes32_id;
