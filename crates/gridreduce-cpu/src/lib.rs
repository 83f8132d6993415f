//! CPU Backend for GridReduce
//!
//! Emulates a SIMT grid on host threads. Each resident worker executes one
//! team at a time with its lanes in lock-step; teams synchronize only through
//! the device-wide admission counters of the reduction state.
//!
//! Teams are dispatched in ascending index order by default, which keeps the
//! grid live with any number of resident workers: the lowest unfinished team
//! is always inside the current admission chunk.
//!
//! ## Example
//!
//! ```
//! use gridreduce_core::prelude::*;
//! use gridreduce_cpu::{CpuGrid, LaunchConfig};
//!
//! let config = ReductionConfig::builder().num_of_records(4).build().unwrap();
//! let ops = ScalarReduction::<u64>::new(ReductionOp::Sum).unwrap();
//! let buffer = ops.staging_buffer(4);
//! let reduction = TeamsReduction::new(config, ops, buffer).unwrap();
//!
//! let grid = CpuGrid::new(LaunchConfig::new(10, 64).with_max_resident_teams(2));
//! let outcome = grid.launch(&reduction, |_, _| 1).unwrap();
//! assert_eq!(*outcome.value().unwrap(), 640);
//! ```

#![warn(missing_docs)]

mod grid;
mod launch;

pub use grid::{CpuGrid, GridMetrics, GridOutcome, ResultHolder};
pub use launch::{DispatchOrder, LaunchConfig};
