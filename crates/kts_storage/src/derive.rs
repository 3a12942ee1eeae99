#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use kts_kernel_contracts::device::DeviceHash;
use kts_kernel_contracts::slot::SlotId;
use kts_kernel_contracts::usage::DayBoundary;

pub const DEVICE_DOMAIN: &[u8] = b"device";
pub const DAILY_USAGE_DOMAIN: &[u8] = b"daily_usage";

const DERIVATION_LABEL: &[u8] = b"kts.slot.v1";

/// 32-byte namespace that scopes every derived slot to one registry deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RegistryNamespace(#[serde(with = "hex::serde")] pub [u8; 32]);

impl RegistryNamespace {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// Maps semantic keys to slot ids.
///
/// The hash input is a length-prefixed encoding of
/// `label || namespace || domain_tag || part_count || parts...`, so two
/// different `(domain_tag, key_parts)` tuples never share an encoding and a
/// device slot can only equal a usage slot through a SHA-256 collision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressDeriver {
    namespace: RegistryNamespace,
}

impl AddressDeriver {
    pub fn new(namespace: RegistryNamespace) -> Self {
        Self { namespace }
    }

    pub fn namespace(&self) -> RegistryNamespace {
        self.namespace
    }

    pub fn derive(&self, domain_tag: &[u8], key_parts: &[&[u8]]) -> SlotId {
        let mut h = Sha256::new();
        h.update(DERIVATION_LABEL);
        h.update(self.namespace.as_bytes());
        absorb(&mut h, domain_tag);
        h.update((key_parts.len() as u64).to_le_bytes());
        for part in key_parts {
            absorb(&mut h, part);
        }
        let out: [u8; 32] = h.finalize().into();
        SlotId::from_bytes(out)
    }

    pub fn device_slot(&self, device_hash: &DeviceHash) -> SlotId {
        self.derive(DEVICE_DOMAIN, &[device_hash.as_bytes()])
    }

    pub fn daily_usage_slot(&self, device_hash: &DeviceHash, day: DayBoundary) -> SlotId {
        self.derive(
            DAILY_USAGE_DOMAIN,
            &[device_hash.as_bytes(), &day.to_le_bytes()],
        )
    }
}

fn absorb(h: &mut Sha256, bytes: &[u8]) {
    h.update((bytes.len() as u64).to_le_bytes());
    h.update(bytes);
}
