//! # GridReduce
//!
//! Grid-wide reductions across SIMT teams without a device-wide barrier.
//!
//! Every thread of every team contributes one partial record. Records are
//! folded inside warps by shuffle-down rounds, across warps through shared
//! memory, and across teams through a bounded staging buffer guarded by two
//! atomic counters. Exactly one thread of the grid ends up holding the
//! combined value, and the counters are left zeroed for the next reduction.
//!
//! ## Quick Start
//!
//! ```
//! use gridreduce::prelude::*;
//!
//! let grid = GridReduce::builder()
//!     .teams(12)
//!     .threads_per_team(64)
//!     .num_of_records(4)
//!     .build()
//!     .unwrap();
//!
//! let data: Vec<i64> = (1..=1000).collect();
//! assert_eq!(grid.reduce_slice(ReductionOp::Sum, &data).unwrap(), 500_500);
//! assert_eq!(grid.reduce_slice(ReductionOp::Max, &data).unwrap(), 1000);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ Host                                                     │
//! │   GridReduce ─ CpuGrid ─ resident team workers           │
//! └───────────────────────────┬──────────────────────────────┘
//!                             │ team ids in ascending order
//! ┌───────────────────────────┴──────────────────────────────┐
//! │ Team: lanes ─ warp shuffle ─ shared memory ─ thread 0    │
//! │                                             │            │
//! │   IterCnt gate ─ slot team % R ─ Cnt ─ last team drains  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Custom record types plug in through [`ReduceOps`] and [`BufferOps`];
//! see [`GridReduce::reduce_with`].

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(hidden_glob_reexports)]

mod reduce;

use std::sync::Arc;

use tracing::debug;

pub use gridreduce_core::*;
pub use gridreduce_cpu::{CpuGrid, DispatchOrder, GridMetrics, GridOutcome, LaunchConfig, ResultHolder};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{GridReduce, GridReduceBuilder};
    pub use gridreduce_core::prelude::*;
    pub use gridreduce_cpu::{CpuGrid, DispatchOrder, GridOutcome, LaunchConfig, ResultHolder};
}

/// Grid reduction front end: a reduction configuration paired with a grid
/// shape, executed on the CPU backend.
#[derive(Debug, Clone)]
pub struct GridReduce {
    reduction: ReductionConfig,
    grid: CpuGrid,
}

impl GridReduce {
    /// Create a new builder.
    pub fn builder() -> GridReduceBuilder {
        GridReduceBuilder::new()
    }

    /// Create from explicit configurations.
    pub fn from_configs(reduction: ReductionConfig, launch: LaunchConfig) -> Result<Self> {
        reduction.validate()?;
        launch.validate(reduction.warp_size)?;
        TeamContext::new(0, launch.num_teams, launch.threads_per_team, reduction.warp_size)
            .with_mode(launch.mode)
            .validate()?;

        Ok(Self {
            reduction,
            grid: CpuGrid::new(launch),
        })
    }

    /// Reduction configuration.
    pub fn reduction_config(&self) -> &ReductionConfig {
        &self.reduction
    }

    /// Launch configuration.
    pub fn launch_config(&self) -> &LaunchConfig {
        self.grid.config()
    }

    /// The underlying grid launcher.
    pub fn grid(&self) -> &CpuGrid {
        &self.grid
    }

    /// Total threads in the grid.
    pub fn total_threads(&self) -> u64 {
        let launch = self.grid.config();
        u64::from(launch.num_teams) * u64::from(launch.threads_per_team)
    }

    /// Build the device-wide reduction state for caller operations.
    pub fn prepare<O: BufferOps>(&self, ops: O, buffer: O::Buffer) -> Result<TeamsReduction<O>> {
        TeamsReduction::new(self.reduction.clone(), ops, buffer)
    }

    /// Run one grid reduction with caller operations and staging buffer.
    ///
    /// `init(team_id, thread_id)` yields each thread's partial record.
    pub fn reduce_with<O, F>(&self, ops: O, buffer: O::Buffer, init: F) -> Result<GridOutcome<O::Record>>
    where
        O: BufferOps,
        F: Fn(u32, u32) -> O::Record + Sync,
    {
        let reduction = self.prepare(ops, buffer)?;
        self.grid.launch(&reduction, init)
    }

    /// Run one grid reduction of scalars with a built-in operator.
    pub fn reduce_scalar<T, F>(&self, op: ReductionOp, init: F) -> Result<GridOutcome<T>>
    where
        T: ReductionScalar,
        F: Fn(u32, u32) -> T + Sync,
    {
        let ops = ScalarReduction::<T>::new(op)?;
        let buffer = ops.staging_buffer(self.reduction.num_of_records as usize);
        debug!(%op, teams = self.grid.config().num_teams, "scalar grid reduction");
        self.reduce_with(ops, buffer, init)
    }

    /// Async variant of [`GridReduce::reduce_with`], run on the tokio
    /// blocking pool.
    pub async fn reduce_with_async<O, F>(
        &self,
        ops: O,
        buffer: O::Buffer,
        init: F,
    ) -> Result<GridOutcome<O::Record>>
    where
        O: BufferOps + 'static,
        O::Record: 'static,
        O::Buffer: 'static,
        F: Fn(u32, u32) -> O::Record + Send + Sync + 'static,
    {
        let reduction = Arc::new(self.prepare(ops, buffer)?);
        self.grid.launch_async(reduction, init).await
    }
}

/// Builder for [`GridReduce`].
#[derive(Debug, Clone, Default)]
pub struct GridReduceBuilder {
    reduction: ReductionConfig,
    launch: LaunchConfig,
}

impl GridReduceBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of teams in the grid.
    pub fn teams(mut self, teams: u32) -> Self {
        self.launch.num_teams = teams;
        self
    }

    /// Threads per team.
    pub fn threads_per_team(mut self, threads: u32) -> Self {
        self.launch.threads_per_team = threads;
        self
    }

    /// Staging buffer slots.
    pub fn num_of_records(mut self, records: u32) -> Self {
        self.reduction.num_of_records = records;
        self
    }

    /// Warp width.
    pub fn warp_size(mut self, warp_size: u32) -> Self {
        self.reduction.warp_size = warp_size;
        self
    }

    /// Kernel execution mode.
    pub fn mode(mut self, mode: ExecutionMode) -> Self {
        self.launch.mode = mode;
        self
    }

    /// Admission spin limit.
    pub fn spin_limit(mut self, spin_limit: Option<u64>) -> Self {
        self.reduction.spin_limit = spin_limit;
        self
    }

    /// Polls before an admission spinner yields.
    pub fn yield_after(mut self, polls: u32) -> Self {
        self.reduction.yield_after = polls;
        self
    }

    /// Cap on concurrently resident teams.
    pub fn max_resident_teams(mut self, teams: usize) -> Self {
        self.launch.max_resident_teams = Some(teams);
        self
    }

    /// Team dispatch order.
    pub fn dispatch(mut self, dispatch: DispatchOrder) -> Self {
        self.launch.dispatch = dispatch;
        self
    }

    /// Replace the reduction configuration.
    pub fn reduction_config(mut self, config: ReductionConfig) -> Self {
        self.reduction = config;
        self
    }

    /// Replace the launch configuration.
    pub fn launch_config(mut self, config: LaunchConfig) -> Self {
        self.launch = config;
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<GridReduce> {
        GridReduce::from_configs(self.reduction, self.launch)
    }
}
