//! Device-wide progress counters of the teams reduction.
//!
//! Two atomics drive admission into the staging buffer:
//!
//! - `iter_cnt`: base team index of the chunk currently admitted. Advanced
//!   by `num_of_records` when a chunk has been fully deposited.
//! - `cnt`: arrival position within the current chunk, `0..num_of_records`.
//!
//! # Memory ordering
//!
//! - Admission polls of `iter_cnt` use `Acquire`, pairing with the `SeqCst`
//!   chunk release so a newly admitted team observes every deposit of the
//!   previous chunk.
//! - The arrival increment of `cnt` is `SeqCst`: a team's deposit is
//!   sequenced before its increment, and the team that observes the final
//!   position of a chunk therefore observes all of that chunk's deposits.
//! - Resets are `SeqCst` stores performed only by the finalizing team after
//!   every other team has arrived.

use std::sync::atomic::{AtomicU32, Ordering};

use serde::Serialize;

/// Point-in-time view of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CounterSnapshot {
    /// Chunk base (`IterCnt`).
    pub iter_cnt: u32,
    /// Position within the chunk (`Cnt`).
    pub cnt: u32,
}

/// The `IterCnt` / `Cnt` pair.
#[derive(Debug, Default)]
pub struct ProgressCounters {
    iter_cnt: AtomicU32,
    cnt: AtomicU32,
}

impl ProgressCounters {
    /// Counters at zero, ready for a reduction.
    pub const fn new() -> Self {
        Self {
            iter_cnt: AtomicU32::new(0),
            cnt: AtomicU32::new(0),
        }
    }

    /// Acquire-load the chunk base.
    #[inline]
    pub fn chunk_base(&self) -> u32 {
        self.iter_cnt.load(Ordering::Acquire)
    }

    /// Acquire-load the position within the chunk.
    #[inline]
    pub fn chunk_position(&self) -> u32 {
        self.cnt.load(Ordering::Acquire)
    }

    /// Bounded increment of the chunk position; returns the previous value.
    ///
    /// Follows accelerator `atomicInc` semantics: the value after `limit`
    /// wraps to 0, so `cnt` stays within `0..=limit` and a new chunk starts
    /// counting from 0.
    #[inline]
    pub fn advance_position(&self, limit: u32) -> u32 {
        self.cnt
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |old| {
                Some(if old >= limit { 0 } else { old + 1 })
            })
            .unwrap_or_else(|old| old)
    }

    /// Admit the next chunk of `num_of_records` teams; returns the previous base.
    #[inline]
    pub fn release_chunk(&self, num_of_records: u32) -> u32 {
        self.iter_cnt.fetch_add(num_of_records, Ordering::SeqCst)
    }

    /// Zero both counters for the next reduction.
    pub fn reset(&self) {
        self.cnt.store(0, Ordering::SeqCst);
        self.iter_cnt.store(0, Ordering::SeqCst);
    }

    /// Read both counters.
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            iter_cnt: self.chunk_base(),
            cnt: self.chunk_position(),
        }
    }
}
