//! Caller-supplied reduction operations.
//!
//! The engine never decides *what* a combination means; it only decides
//! *when* and *where* the caller's operations run. Operations are split in
//! two traits:
//!
//! - [`ReduceOps`]: lane and block scope (shuffle-combine, inter-warp copy).
//! - [`BufferOps`]: team scope, indexed access to a device-wide staging
//!   buffer (list copy/reduce on deposit, global copy/reduce on finalize).

use crate::buffer::StagingBuffer;
use crate::types::AlgoVersion;

/// Lane- and block-scope operations over a record type.
pub trait ReduceOps: Send + Sync {
    /// Per-thread partial result.
    type Record: Clone + Send;

    /// Fold `other` into `acc`.
    fn combine(&self, acc: &mut Self::Record, other: &Self::Record);

    /// Combine the record received from the lane `offset` positions above.
    ///
    /// Every lane of a warp calls this each round, including lanes whose
    /// result is later discarded. With [`AlgoVersion::Irregular`], lanes at
    /// or above `offset` take the remote value instead of combining, which
    /// compacts the live range for the next round.
    fn shuffle_combine(
        &self,
        local: &mut Self::Record,
        remote: &Self::Record,
        lane_id: u32,
        offset: u32,
        version: AlgoVersion,
    ) {
        match version {
            AlgoVersion::Regular => self.combine(local, remote),
            AlgoVersion::Irregular => {
                if lane_id < offset {
                    self.combine(local, remote);
                } else {
                    local.clone_from(remote);
                }
            }
        }
    }

    /// Relay a record between thread-local storage and a shared-memory slot.
    fn inter_warp_copy(&self, src: &Self::Record, dst: &mut Self::Record) {
        dst.clone_from(src);
    }
}

/// Anything that can serve as a team staging buffer.
pub trait RecordBuffer: Send + Sync {
    /// Number of record slots available.
    fn capacity(&self) -> usize;
}

impl<T: Clone + Send> RecordBuffer for StagingBuffer<T> {
    fn capacity(&self) -> usize {
        StagingBuffer::capacity(self)
    }
}

impl<A: RecordBuffer, B: RecordBuffer> RecordBuffer for (A, B) {
    fn capacity(&self) -> usize {
        self.0.capacity().min(self.1.capacity())
    }
}

impl<A: RecordBuffer, B: RecordBuffer, C: RecordBuffer> RecordBuffer for (A, B, C) {
    fn capacity(&self) -> usize {
        self.0.capacity().min(self.1.capacity()).min(self.2.capacity())
    }
}

/// Team-scope operations against a staging buffer.
pub trait BufferOps: ReduceOps {
    /// Buffer layout (single array or struct-of-arrays).
    type Buffer: RecordBuffer;

    /// First writer of a slot: copy the record in.
    fn list_copy(&self, buffer: &Self::Buffer, slot: usize, record: &Self::Record);

    /// Later writer of a slot: combine the record into the slot.
    fn list_reduce(&self, buffer: &Self::Buffer, slot: usize, record: &Self::Record);

    /// Finalizer: load a slot into the thread's record.
    fn global_copy(&self, buffer: &Self::Buffer, slot: usize, record: &mut Self::Record);

    /// Finalizer: fold a slot into the thread's record.
    fn global_reduce(&self, buffer: &Self::Buffer, slot: usize, record: &mut Self::Record);
}
