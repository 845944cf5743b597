//! Single-slot registry of the stream currently driving the SPU.
//!
//! The SPU has one IRQ and one DMA channel, so at most one stream can be
//! serviced at a time. Interrupt handlers look the active stream up here.
//!
//! Every access takes a [`Masked`] token. On a single core the handlers can
//! then never preempt a foreground holder of the slot's lock and spin on it.

use alloc::sync::Arc;

use spin::Mutex;

use super::critical::Masked;

/// Registry holding at most one active entry.
pub struct ActiveSlot<T> {
    slot: Mutex<Option<Arc<T>>>,
}

impl<T> ActiveSlot<T> {
    pub const fn new() -> Self {
        ActiveSlot {
            slot: Mutex::new(None),
        }
    }

    /// Make `entry` the active one.
    ///
    /// Returns `false` and changes nothing if the slot is already taken
    /// (even by `entry` itself).
    pub fn try_acquire(&self, entry: &Arc<T>, _cs: Masked<'_>) -> bool {
        let mut slot = self.slot.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(entry.clone());
        true
    }

    /// Empty the slot if `entry` is the active one.
    pub fn release(&self, entry: &Arc<T>, _cs: Masked<'_>) -> bool {
        let mut slot = self.slot.lock();
        match slot.as_ref() {
            Some(active) if Arc::ptr_eq(active, entry) => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    /// The active entry, if any.
    pub fn current(&self, _cs: Masked<'_>) -> Option<Arc<T>> {
        self.slot.lock().clone()
    }

    pub fn is_active(&self, entry: &Arc<T>, _cs: Masked<'_>) -> bool {
        self.slot
            .lock()
            .as_ref()
            .is_some_and(|active| Arc::ptr_eq(active, entry))
    }

    pub fn is_empty(&self, _cs: Masked<'_>) -> bool {
        self.slot.lock().is_none()
    }
}

impl<T> Default for ActiveSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}
