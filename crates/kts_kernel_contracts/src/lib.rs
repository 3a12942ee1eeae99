#![forbid(unsafe_code)]

pub mod common;
pub mod device;
pub mod event;
pub mod slot;
pub mod usage;

pub use common::{ContractViolation, SchemaVersion, UnixTimeSec, Validate};
