//! Request pool: slot storage plus a free list, grown in fixed batches.
//!
//! Index 0 exists in storage but is never placed on the free list, so
//! `RequestHandle::NULL` can never resolve to a live request.

use super::RequestSlot;
use crate::error::{RegistryError, Result};
use crate::handle::RequestHandle;

/// Slots added each time the free list runs dry.
pub const SLOT_BATCH: usize = 64;

pub struct RequestPool {
    slots: Vec<RequestSlot>,
    free: Vec<u32>,
    batch_size: usize,
    outstanding: usize,
}

impl RequestPool {
    /// Create a pool holding one batch. `batch_size` is raised to 2 if smaller.
    pub fn new(batch_size: usize) -> Self {
        let batch_size = batch_size.max(2);
        let mut pool = Self {
            slots: Vec::with_capacity(batch_size),
            free: Vec::with_capacity(batch_size),
            batch_size,
            outstanding: 0,
        };
        pool.grow();
        pool
    }

    fn grow(&mut self) {
        let start = self.slots.len();
        let end = start + self.batch_size;
        self.slots.resize_with(end, RequestSlot::default);

        // Reverse so the lowest index is popped first.
        for index in (start..end).rev() {
            if index != 0 {
                self.free.push(index as u32);
            }
        }

        tracing::debug!(
            capacity = self.slots.len(),
            free = self.free.len(),
            "Request pool grown"
        );
    }

    /// Take a free slot, growing by one batch if none is left.
    pub fn acquire(&mut self) -> RequestHandle {
        let index = loop {
            if let Some(index) = self.free.pop() {
                break index;
            }
            self.grow();
        };

        let slot = &mut self.slots[index as usize];
        slot.occupy();
        self.outstanding += 1;

        RequestHandle::new(index, slot.generation())
    }

    /// Reset the slot behind `handle` and return it to the free list.
    ///
    /// Stale or never-issued handles are rejected and leave the free list untouched.
    pub fn release(&mut self, handle: RequestHandle) -> Result<()> {
        let slot = self.get_mut(handle)?;
        slot.reset();
        self.free.push(handle.index());
        self.outstanding -= 1;
        Ok(())
    }

    pub fn get(&self, handle: RequestHandle) -> Result<&RequestSlot> {
        if handle.is_null() {
            return Err(RegistryError::InvalidHandle(handle));
        }
        match self.slots.get(handle.index() as usize) {
            Some(slot) if slot.is_in_use() && slot.generation() == handle.generation() => Ok(slot),
            _ => Err(RegistryError::InvalidHandle(handle)),
        }
    }

    pub fn get_mut(&mut self, handle: RequestHandle) -> Result<&mut RequestSlot> {
        if handle.is_null() {
            return Err(RegistryError::InvalidHandle(handle));
        }
        match self.slots.get_mut(handle.index() as usize) {
            Some(slot) if slot.is_in_use() && slot.generation() == handle.generation() => Ok(slot),
            _ => Err(RegistryError::InvalidHandle(handle)),
        }
    }

    /// Total slots in storage, including the reserved index 0.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Slots currently handed out.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    pub fn free_len(&self) -> usize {
        self.free.len()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

impl Default for RequestPool {
    fn default() -> Self {
        Self::new(SLOT_BATCH)
    }
}
