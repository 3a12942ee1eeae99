#![forbid(unsafe_code)]

use crate::common::bytes32_id;

bytes32_id!(
    /// Address of a storage slot. Produced by key derivation, never chosen by callers.
    SlotId,
    "slot_id"
);
