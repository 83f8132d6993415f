//! Device-wide staging buffer for team partial results.
//!
//! The buffer holds `num_of_records` record slots. A team writes only the
//! slot `team_id % num_of_records`, and the admission protocol guarantees at
//! most one team owns a given slot at a time, so slot locks are never
//! contended. When several variables are reduced together, use one buffer
//! per variable (struct-of-arrays).
//!
//! ```text
//! var a: [a0][a1] ... [aR-1]
//! var b: [b0][b1] ... [bR-1]
//!        |_______________|
//!          num_of_records
//! ```

/// Fixed-capacity array of record slots shared by all teams of a grid.
pub struct StagingBuffer<T> {
    /// Slot storage.
    slots: Vec<parking_lot::Mutex<T>>,
    /// Value written back on `clear`. Locked so the buffer is `Sync`
    /// whenever `T: Send`.
    init: parking_lot::Mutex<T>,
}

impl<T: Clone> StagingBuffer<T> {
    /// Create a buffer with `capacity` slots, each holding `init`.
    pub fn new(capacity: usize, init: T) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            slots.push(parking_lot::Mutex::new(init.clone()));
        }

        Self {
            slots,
            init: parking_lot::Mutex::new(init),
        }
    }

    /// Number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Overwrite a slot.
    pub fn store(&self, slot: usize, value: &T) {
        debug_assert!(slot < self.capacity(), "slot {} out of range", slot);
        self.slots[slot].lock().clone_from(value);
    }

    /// Read a slot.
    pub fn load(&self, slot: usize) -> T {
        debug_assert!(slot < self.capacity(), "slot {} out of range", slot);
        self.slots[slot].lock().clone()
    }

    /// Read a slot into an existing record.
    pub fn load_into(&self, slot: usize, dst: &mut T) {
        debug_assert!(slot < self.capacity(), "slot {} out of range", slot);
        dst.clone_from(&self.slots[slot].lock());
    }

    /// Update a slot in place.
    pub fn update<F>(&self, slot: usize, f: F)
    where
        F: FnOnce(&mut T),
    {
        debug_assert!(slot < self.capacity(), "slot {} out of range", slot);
        let mut guard = self.slots[slot].lock();
        f(&mut guard);
    }

    /// Reset every slot to the initial value.
    pub fn clear(&self) {
        let init = self.init.lock();
        for slot in &self.slots {
            slot.lock().clone_from(&init);
        }
    }

    /// Copy out all slots.
    pub fn snapshot(&self) -> Vec<T> {
        self.slots.iter().map(|s| s.lock().clone()).collect()
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for StagingBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagingBuffer")
            .field("capacity", &self.slots.len())
            .field("init", &*self.init.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_load() {
        let buffer = StagingBuffer::new(4, 0i64);
        buffer.store(2, &42);
        assert_eq!(buffer.load(2), 42);
        assert_eq!(buffer.load(0), 0);
        assert_eq!(buffer.capacity(), 4);
    }

    #[test]
    fn test_update_and_clear() {
        let buffer = StagingBuffer::new(2, 1.0f64);
        buffer.update(1, |v| *v *= 3.0);
        assert_eq!(buffer.snapshot(), vec![1.0, 3.0]);

        buffer.clear();
        assert_eq!(buffer.snapshot(), vec![1.0, 1.0]);
    }

    #[test]
    fn test_load_into() {
        let buffer = StagingBuffer::new(1, (0u32, 0u32));
        buffer.store(0, &(3, 4));
        let mut dst = (9, 9);
        buffer.load_into(0, &mut dst);
        assert_eq!(dst, (3, 4));
    }
}
