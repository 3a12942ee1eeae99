#![forbid(unsafe_code)]

use kts_kernel_contracts::device::DeviceHash;
use kts_kernel_contracts::event::{RegistryEvent, RegistryEventId, RegistryEventInput};

use crate::slots::StorageError;

/// Append-only journal of committed registry mutations.
///
/// Writers stage an event with [`RegistryAuditLog::stage`] before touching any
/// slot and [`RegistryAuditLog::commit`] it after the slot write succeeds, so
/// a rejected request leaves no row behind.
#[derive(Debug, Clone)]
pub struct RegistryAuditLog {
    events: Vec<RegistryEvent>,
    next_event_id: u64,
}

impl Default for RegistryAuditLog {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            next_event_id: 1,
        }
    }
}

impl RegistryAuditLog {
    /// Empty journal whose next committed event gets `next_event_id`.
    pub(crate) fn resume_at(next_event_id: RegistryEventId) -> Self {
        Self {
            events: Vec::new(),
            next_event_id: next_event_id.0,
        }
    }

    pub fn next_event_id(&self) -> RegistryEventId {
        RegistryEventId(self.next_event_id)
    }

    pub(crate) fn stage(&self, input: RegistryEventInput) -> Result<RegistryEvent, StorageError> {
        let ev = RegistryEvent::from_input_v1(RegistryEventId(self.next_event_id), input)?;
        Ok(ev)
    }

    pub(crate) fn commit(&mut self, ev: RegistryEvent) -> RegistryEventId {
        debug_assert_eq!(ev.event_id.0, self.next_event_id);
        let id = ev.event_id;
        self.next_event_id = self.next_event_id.saturating_add(1);
        self.events.push(ev);
        id
    }

    pub fn events(&self) -> &[RegistryEvent] {
        &self.events
    }

    pub fn events_for_device(&self, device_hash: &DeviceHash) -> Vec<&RegistryEvent> {
        self.events
            .iter()
            .filter(|e| &e.device_hash == device_hash)
            .collect()
    }

    pub fn attempt_overwrite_event(
        &mut self,
        _event_id: RegistryEventId,
    ) -> Result<(), StorageError> {
        Err(StorageError::AppendOnlyViolation {
            table: "registry_events",
        })
    }
}
