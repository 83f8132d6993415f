//! Team admission and staging buffer coordination.
//!
//! At most `num_of_records` teams may be past admission at once. Teams are
//! admitted in chunks of consecutive team indices:
//!
//! ```text
//!            chunk 0          chunk 1          chunk 2
//! teams   [0 .. R-1]       [R .. 2R-1]      [2R .. T-1]
//! slots   copy into s      reduce into s    reduce into s     (s = team % R)
//! gate    iter_cnt = 0     iter_cnt = R     iter_cnt = 2R
//! ```
//!
//! The team arriving at position `R - 1` of a chunk releases the next
//! chunk. The team arriving at position `T - base - 1` of the final chunk
//! is the last team of the grid and runs the finalizer.

use std::sync::atomic::{fence, AtomicBool, AtomicU64, Ordering};

use serde::Serialize;
use tracing::{debug, error, trace, warn};

use crate::config::ReductionConfig;
use crate::counters::{CounterSnapshot, ProgressCounters};
use crate::error::{ReductionError, Result};
use crate::ops::BufferOps;
use crate::types::{ExecutionMode, TeamContext};

/// Polls after which a waiting team logs a warning.
const LONG_SPIN_WARN: u64 = 1 << 20;

/// Outcome of a team's pass through the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    /// Staging buffer slot written by the team.
    pub slot: usize,
    /// Chunk base observed at admission, held for the whole pass.
    pub bound: u32,
    /// Arrival position within the chunk.
    pub chunk_position: u32,
    /// This team is the last of the whole grid.
    pub is_globally_last: bool,
    /// The deposit initialized the slot rather than merging into it.
    pub first_writer: bool,
    /// Admission polls performed.
    pub spins: u64,
}

impl Admission {
    /// This team filled the final position of its chunk.
    #[inline]
    pub fn fills_chunk(&self, num_of_records: u32) -> bool {
        self.chunk_position == num_of_records - 1
    }
}

/// Coordinator statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoordinatorStats {
    /// Teams admitted into the buffer.
    pub admitted: u64,
    /// Deposits that initialized a slot.
    pub slot_copies: u64,
    /// Deposits that merged into a slot.
    pub slot_merges: u64,
    /// Chunks released to waiting teams.
    pub rollovers: u64,
    /// Grid finalizations performed.
    pub finalized: u64,
    /// Counter resets performed.
    pub resets: u64,
    /// Admission polls that found the team outside the current chunk.
    pub spin_iterations: u64,
    /// Teams currently between admission and the end of their deposit.
    pub in_flight: u64,
    /// Maximum teams observed between admission and deposit at once. Teams
    /// that have deposited but not yet taken an arrival position are not
    /// counted.
    pub max_in_flight: u64,
}

/// Internal statistics with atomics.
#[derive(Debug, Default)]
struct CoordinatorStatsInner {
    admitted: AtomicU64,
    slot_copies: AtomicU64,
    slot_merges: AtomicU64,
    rollovers: AtomicU64,
    finalized: AtomicU64,
    resets: AtomicU64,
    spin_iterations: AtomicU64,
    in_flight: AtomicU64,
    max_in_flight: AtomicU64,
}

impl CoordinatorStatsInner {
    fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let mut max = self.max_in_flight.load(Ordering::Relaxed);
        while now > max {
            match self.max_in_flight.compare_exchange_weak(
                max,
                now,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(current) => max = current,
            }
        }
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Admission gate and progress bookkeeping for one staging buffer.
#[derive(Debug)]
pub struct AdmissionCoordinator {
    config: ReductionConfig,
    counters: ProgressCounters,
    cancelled: AtomicBool,
    stats: CoordinatorStatsInner,
}

impl AdmissionCoordinator {
    /// Create a coordinator with zeroed counters.
    pub fn new(config: ReductionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            counters: ProgressCounters::new(),
            cancelled: AtomicBool::new(false),
            stats: CoordinatorStatsInner::default(),
        })
    }

    /// Configuration.
    pub fn config(&self) -> &ReductionConfig {
        &self.config
    }

    /// Buffer capacity (`num_of_records`).
    #[inline]
    pub fn num_of_records(&self) -> u32 {
        self.config.num_of_records
    }

    /// Current counter values.
    pub fn counters(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    /// Spin until `team_id` falls inside the admitted chunk.
    ///
    /// Returns the observed chunk base and the number of polls that failed.
    /// With a spin limit configured, gives up with
    /// [`ReductionError::SpinLimitExceeded`] instead of livelocking when the
    /// teams gating this one never get scheduled. After [`cancel`](Self::cancel)
    /// a waiting team stops with [`ReductionError::AdmissionCancelled`].
    pub fn await_turn(&self, team_id: u32) -> Result<(u32, u64)> {
        let records = u64::from(self.config.num_of_records);
        let mut spins = 0u64;

        loop {
            let bound = self.counters.chunk_base();
            if u64::from(team_id) < u64::from(bound) + records {
                if spins > 0 {
                    self.stats.spin_iterations.fetch_add(spins, Ordering::Relaxed);
                }
                return Ok((bound, spins));
            }

            if self.cancelled.load(Ordering::Acquire) {
                debug!(team_id, bound, spins, "admission cancelled");
                self.stats.spin_iterations.fetch_add(spins, Ordering::Relaxed);
                return Err(ReductionError::AdmissionCancelled { team_id });
            }

            spins += 1;
            if let Some(limit) = self.config.spin_limit {
                if spins >= limit {
                    error!(
                        team_id,
                        bound,
                        spins,
                        "admission spin limit exceeded; teams gating this one are not making progress"
                    );
                    self.stats.spin_iterations.fetch_add(spins, Ordering::Relaxed);
                    return Err(ReductionError::SpinLimitExceeded {
                        team_id,
                        bound,
                        spins,
                    });
                }
            }
            if spins == LONG_SPIN_WARN {
                warn!(team_id, bound, spins, "team still waiting for admission");
            }

            if spins < u64::from(self.config.yield_after) {
                std::hint::spin_loop();
            } else {
                std::thread::yield_now();
            }
        }
    }

    /// Admit the team, deposit its record and take an arrival position.
    ///
    /// Executed by the team master only. The chunk base is read once and
    /// held for the rest of the pass, so the slot choice, the chunk release
    /// and the last-team test all use the same base. The chunk release
    /// itself is left to [`release_chunk_if_filled`](Self::release_chunk_if_filled)
    /// so the caller can run it after the team synchronization.
    pub fn admit_and_deposit<O: BufferOps>(
        &self,
        ctx: &TeamContext,
        ops: &O,
        buffer: &O::Buffer,
        record: &O::Record,
    ) -> Result<Admission> {
        let records = self.config.num_of_records;
        let (bound, spins) = self.await_turn(ctx.team_id)?;
        debug_assert_eq!(
            bound,
            ctx.team_id / records * records,
            "team {} admitted against a foreign chunk base",
            ctx.team_id
        );
        self.stats.admitted.fetch_add(1, Ordering::Relaxed);
        self.stats.enter();

        let slot = (ctx.team_id % records) as usize;
        let first_writer = ctx.team_id < records;
        if first_writer {
            ops.list_copy(buffer, slot, record);
            self.stats.slot_copies.fetch_add(1, Ordering::Relaxed);
        } else {
            ops.list_reduce(buffer, slot, record);
            self.stats.slot_merges.fetch_add(1, Ordering::Relaxed);
        }

        self.stats.leave();
        let chunk_position = self.counters.advance_position(records - 1);
        debug_assert!(chunk_position < records);

        let is_globally_last = u64::from(chunk_position) + u64::from(bound) + 1
            == u64::from(ctx.num_teams);

        trace!(
            team_id = ctx.team_id,
            slot,
            bound,
            chunk_position,
            first_writer,
            is_globally_last,
            "team deposited"
        );

        Ok(Admission {
            slot,
            bound,
            chunk_position,
            is_globally_last,
            first_writer,
            spins,
        })
    }

    /// Release the next chunk if this team filled the current one.
    ///
    /// The last team of the grid never releases: it resets instead.
    pub fn release_chunk_if_filled(&self, ctx: &TeamContext, admission: &Admission) -> bool {
        if admission.is_globally_last || !admission.fills_chunk(self.config.num_of_records) {
            return false;
        }

        let previous = self.counters.release_chunk(self.config.num_of_records);
        self.stats.rollovers.fetch_add(1, Ordering::Relaxed);
        debug!(
            team_id = ctx.team_id,
            previous_base = previous,
            next_base = previous + self.config.num_of_records,
            "chunk released"
        );
        true
    }

    /// Make every team waiting in [`await_turn`](Self::await_turn) give up.
    ///
    /// Used when a team of the grid failed and the chunk it belongs to can
    /// never fill. Teams already inside the chunk are not affected. The flag
    /// stays set until [`reset`](Self::reset).
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            debug!("admission cancelled");
        }
    }

    /// True if [`cancel`](Self::cancel) was called since the last reset.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Zero the counters and clear any cancellation so the buffer can serve
    /// another reduction.
    ///
    /// Slots left over from an abandoned grid need no clearing: the first
    /// chunk of the next grid overwrites them with `list_copy`.
    pub fn reset(&self) {
        self.counters.reset();
        self.cancelled.store(false, Ordering::Release);
        self.stats.resets.fetch_add(1, Ordering::Relaxed);
        debug!("progress counters reset");
    }

    pub(crate) fn record_finalization(&self) {
        self.stats.finalized.fetch_add(1, Ordering::Relaxed);
    }

    /// Statistics snapshot.
    pub fn stats(&self) -> CoordinatorStats {
        CoordinatorStats {
            admitted: self.stats.admitted.load(Ordering::Relaxed),
            slot_copies: self.stats.slot_copies.load(Ordering::Relaxed),
            slot_merges: self.stats.slot_merges.load(Ordering::Relaxed),
            rollovers: self.stats.rollovers.load(Ordering::Relaxed),
            finalized: self.stats.finalized.load(Ordering::Relaxed),
            resets: self.stats.resets.load(Ordering::Relaxed),
            spin_iterations: self.stats.spin_iterations.load(Ordering::Relaxed),
            in_flight: self.stats.in_flight.load(Ordering::SeqCst),
            max_in_flight: self.stats.max_in_flight.load(Ordering::Relaxed),
        }
    }

    /// Zero the statistics.
    pub fn reset_stats(&self) {
        self.stats.admitted.store(0, Ordering::Relaxed);
        self.stats.slot_copies.store(0, Ordering::Relaxed);
        self.stats.slot_merges.store(0, Ordering::Relaxed);
        self.stats.rollovers.store(0, Ordering::Relaxed);
        self.stats.finalized.store(0, Ordering::Relaxed);
        self.stats.resets.store(0, Ordering::Relaxed);
        self.stats.spin_iterations.store(0, Ordering::Relaxed);
        self.stats.max_in_flight.store(0, Ordering::Relaxed);
    }
}

/// Make the master's deposit visible to the whole team and the device.
///
/// SPMD teams meet at an aligned barrier, implicit in lock-step execution;
/// Generic teams only have the main thread left and need a kernel fence.
#[inline]
pub fn synchronize_team(mode: ExecutionMode) {
    match mode {
        ExecutionMode::Spmd => fence(Ordering::AcqRel),
        ExecutionMode::Generic => fence(Ordering::SeqCst),
    }
}
