//! Grid-scope reduction across teams.
//!
//! A [`TeamsReduction`] bundles the caller's operations, the device-wide
//! staging buffer and the admission coordinator. Every team of a grid calls
//! [`TeamsReduction::reduce_team`] (or [`TeamsReduction::teams_reduce_nowait`]
//! once its block result is in thread 0); exactly one thread of the whole
//! grid gets a set completion signal and holds the final value.

use tracing::trace;

use crate::block::parallel_reduce_nowait;
use crate::config::ReductionConfig;
use crate::coordinator::{synchronize_team, Admission, AdmissionCoordinator, CoordinatorStats};
use crate::counters::CounterSnapshot;
use crate::error::{ReductionError, Result};
use crate::finalize::finalize_grid;
use crate::ops::{BufferOps, RecordBuffer};
use crate::types::{TeamContext, ThreadMask};

/// Device-wide state of a grid reduction.
pub struct TeamsReduction<O: BufferOps> {
    ops: O,
    buffer: O::Buffer,
    coordinator: AdmissionCoordinator,
}

impl<O: BufferOps> TeamsReduction<O> {
    /// Create the reduction state over a caller-supplied staging buffer.
    ///
    /// The buffer must hold at least `config.num_of_records` slots.
    pub fn new(config: ReductionConfig, ops: O, buffer: O::Buffer) -> Result<Self> {
        let capacity = buffer.capacity();
        if capacity < config.num_of_records as usize {
            return Err(ReductionError::InvalidConfig(format!(
                "staging buffer holds {} slots, num_of_records is {}",
                capacity, config.num_of_records
            )));
        }

        Ok(Self {
            ops,
            buffer,
            coordinator: AdmissionCoordinator::new(config)?,
        })
    }

    /// Caller operations.
    pub fn ops(&self) -> &O {
        &self.ops
    }

    /// Staging buffer.
    pub fn buffer(&self) -> &O::Buffer {
        &self.buffer
    }

    /// Configuration.
    pub fn config(&self) -> &ReductionConfig {
        self.coordinator.config()
    }

    /// Admission coordinator.
    pub fn coordinator(&self) -> &AdmissionCoordinator {
        &self.coordinator
    }

    /// Current progress counters.
    pub fn counters(&self) -> CounterSnapshot {
        self.coordinator.counters()
    }

    /// Coordinator statistics.
    pub fn stats(&self) -> CoordinatorStats {
        self.coordinator.stats()
    }

    /// Check a team's topology against this reduction.
    pub fn check_team(&self, ctx: &TeamContext, lanes: usize) -> Result<()> {
        ctx.validate()?;
        if ctx.warp_size != self.config().warp_size {
            return Err(ReductionError::InvalidTopology(format!(
                "team warp size {} differs from the configured {}",
                ctx.warp_size,
                self.config().warp_size
            )));
        }
        if lanes != ctx.num_threads as usize {
            return Err(ReductionError::InvalidTopology(format!(
                "register file holds {} records for a team of {} threads",
                lanes, ctx.num_threads
            )));
        }
        Ok(())
    }

    /// Block-reduce the team's records, then run the teams protocol.
    pub fn reduce_team(&self, ctx: &TeamContext, lanes: &mut [O::Record]) -> Result<ThreadMask> {
        self.check_team(ctx, lanes.len())?;
        parallel_reduce_nowait(ctx, lanes, &self.ops)?;
        self.teams_reduce_nowait(ctx, lanes)
    }

    /// Teams protocol for a team whose block result sits in thread 0.
    ///
    /// The master (thread 0) is admitted, deposits and takes an arrival
    /// position; the team then synchronizes. The last team of the grid
    /// drains the buffer and returns a mask with thread 0 set; every other
    /// team returns an empty mask, after releasing the next chunk if it
    /// filled the current one.
    pub fn teams_reduce_nowait(
        &self,
        ctx: &TeamContext,
        lanes: &mut [O::Record],
    ) -> Result<ThreadMask> {
        self.check_team(ctx, lanes.len())?;

        // Generic mode: non-main threads leave, the main thread acts as 0.
        let width = ctx.teams_width() as usize;
        let lanes = &mut lanes[..width];

        let admission: Admission =
            self.coordinator
                .admit_and_deposit(ctx, &self.ops, &self.buffer, &lanes[0])?;
        synchronize_team(ctx.mode);

        if admission.is_globally_last {
            trace!(team_id = ctx.team_id, "last team finalizing");
            return Ok(finalize_grid(
                &self.coordinator,
                &self.ops,
                &self.buffer,
                ctx,
                lanes,
            ));
        }

        self.coordinator.release_chunk_if_filled(ctx, &admission);
        Ok(ThreadMask::none(ctx.num_threads as usize))
    }
}

impl<O: BufferOps> std::fmt::Debug for TeamsReduction<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TeamsReduction")
            .field("config", self.config())
            .field("capacity", &self.buffer.capacity())
            .field("counters", &self.counters())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::{ReductionOp, ScalarReduction};
    use crate::types::ExecutionMode;

    fn sum_reduction(records: u32, warp_size: u32) -> TeamsReduction<ScalarReduction<i64>> {
        let config = ReductionConfig::builder()
            .num_of_records(records)
            .warp_size(warp_size)
            .spin_limit(Some(1_000_000))
            .build()
            .unwrap();
        let ops = ScalarReduction::new(ReductionOp::Sum).unwrap();
        let buffer = ops.staging_buffer(records as usize);
        TeamsReduction::new(config, ops, buffer).unwrap()
    }

    #[test]
    fn test_buffer_too_small() {
        let config = ReductionConfig::builder().num_of_records(4).build().unwrap();
        let ops = ScalarReduction::<i64>::new(ReductionOp::Sum).unwrap();
        let buffer = ops.staging_buffer(2);
        assert!(TeamsReduction::new(config, ops, buffer).is_err());
    }

    #[test]
    fn test_single_team_finalizes_its_own_value() {
        let reduction = sum_reduction(4, 32);
        let ctx = TeamContext::new(0, 1, 1, 32);
        let mut lanes = vec![7i64];

        let mask = reduction.reduce_team(&ctx, &mut lanes).unwrap();
        assert!(mask.is_set(0));
        assert_eq!(lanes[0], 7);
        assert_eq!(reduction.stats().spin_iterations, 0);
        assert_eq!(reduction.counters(), CounterSnapshot::default());
    }

    #[test]
    fn test_in_order_teams_on_one_thread() {
        let reduction = sum_reduction(2, 8);
        let mut holders = Vec::new();
        let mut result = None;

        for team in 0..5u32 {
            let ctx = TeamContext::new(team, 5, 16, 8);
            let mut lanes = vec![1i64; 16];
            let mask = reduction.reduce_team(&ctx, &mut lanes).unwrap();
            for thread in mask.iter() {
                holders.push((team, thread));
                result = Some(lanes[thread]);
            }
        }

        assert_eq!(holders, vec![(4, 0)]);
        assert_eq!(result, Some(80));
    }

    #[test]
    fn test_generic_mode_uses_main_thread_only() {
        let reduction = sum_reduction(4, 32);
        let mut result = None;

        for team in 0..3u32 {
            let ctx = TeamContext::new(team, 3, 64, 32).with_mode(ExecutionMode::Generic);
            let mut lanes = vec![0i64; 64];
            lanes[0] = i64::from(team) + 1;
            let mask = reduction.teams_reduce_nowait(&ctx, &mut lanes).unwrap();
            if mask.is_set(0) {
                result = Some(lanes[0]);
            }
            assert_eq!(mask.len(), 64);
        }

        assert_eq!(result, Some(6));
    }

    #[test]
    fn test_warp_size_mismatch() {
        let reduction = sum_reduction(4, 32);
        let ctx = TeamContext::new(0, 1, 8, 8);
        let mut lanes = vec![1i64; 8];
        assert!(reduction.reduce_team(&ctx, &mut lanes).is_err());
    }
}
