#![forbid(unsafe_code)]

use std::sync::Arc;

use parking_lot::Mutex;

use kts_kernel_contracts::device::{CallerId, DeviceHash, DeviceRecord};
use kts_kernel_contracts::usage::{DailyUsageUpload, DayBoundary, UsageRecord};
use kts_kernel_contracts::UnixTimeSec;

use crate::error::RegistryError;
use crate::registry::KtsStore;
use crate::slots::{InMemorySlotStore, SlotStore};

/// In-process execution substrate: applies each request to the store as one
/// serialized step. Clones share the same store.
pub struct SharedRegistry<S = InMemorySlotStore> {
    inner: Arc<Mutex<KtsStore<S>>>,
}

impl<S> Clone for SharedRegistry<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: SlotStore> SharedRegistry<S> {
    pub fn new(store: KtsStore<S>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    pub fn register_device(
        &self,
        device_hash: DeviceHash,
        name: &str,
        caller: CallerId,
        now: UnixTimeSec,
    ) -> Result<DeviceRecord, RegistryError> {
        self.inner
            .lock()
            .register_device(device_hash, name, caller, now)
    }

    pub fn mark_nft_minted(
        &self,
        device_hash: &DeviceHash,
        caller: &CallerId,
        now: UnixTimeSec,
    ) -> Result<(), RegistryError> {
        self.inner.lock().mark_nft_minted(device_hash, caller, now)
    }

    pub fn upload_daily_usage(
        &self,
        upload: DailyUsageUpload,
        caller: &CallerId,
        now: UnixTimeSec,
    ) -> Result<UsageRecord, RegistryError> {
        self.inner.lock().upload_daily_usage(upload, caller, now)
    }

    pub fn device(&self, device_hash: &DeviceHash) -> Option<DeviceRecord> {
        self.inner.lock().device(device_hash).cloned()
    }

    pub fn daily_usage(&self, device_hash: &DeviceHash, day: DayBoundary) -> Option<UsageRecord> {
        self.inner.lock().daily_usage(device_hash, day).cloned()
    }

    /// Runs `f` against a consistent view of the store.
    pub fn read<R>(&self, f: impl FnOnce(&KtsStore<S>) -> R) -> R {
        let guard = self.inner.lock();
        f(&*guard)
    }
}
