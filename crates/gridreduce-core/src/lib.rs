//! # GridReduce Core
//!
//! Hierarchical, lock-free reduction of per-thread partial results across
//! a grid of SIMT teams, without a device-wide barrier.
//!
//! ## Reduction Hierarchy
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │ Team (block)                                                   │
//! │   warp 0 ─ shuffle ─┐                                          │
//! │   warp 1 ─ shuffle ─┼─ shared memory ─ warp 0 ─ thread 0        │
//! │   warp N ─ shuffle ─┘                                │         │
//! └──────────────────────────────────────────────────────┼─────────┘
//!                                                        ▼
//!            admission gate (IterCnt) ─ staging slot (team % R) ─ Cnt
//!                                                        │
//!                                   last team ─ drain slots ─ block reduce
//!                                                        ▼
//!                                              one thread holds the result
//! ```
//!
//! ## Core Abstractions
//!
//! - [`ReduceOps`] / [`BufferOps`] - caller-supplied combine and copy operations
//! - [`reduce_within_block`] - lane and block reducers
//! - [`AdmissionCoordinator`] - bounded admission into the staging buffer
//! - [`TeamsReduction`] - grid-scope reduction state shared by all teams
//!
//! ## Example
//!
//! ```
//! use gridreduce_core::prelude::*;
//!
//! let config = ReductionConfig::builder().num_of_records(2).build().unwrap();
//! let ops = ScalarReduction::<i64>::new(ReductionOp::Sum).unwrap();
//! let buffer = ops.staging_buffer(2);
//! let reduction = TeamsReduction::new(config, ops, buffer).unwrap();
//!
//! let mut result = None;
//! for team in 0..3 {
//!     let ctx = TeamContext::new(team, 3, 1, 32);
//!     let mut lanes = vec![10];
//!     if reduction.reduce_team(&ctx, &mut lanes).unwrap().is_set(0) {
//!         result = Some(lanes[0]);
//!     }
//! }
//! assert_eq!(result, Some(30));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod block;
pub mod buffer;
pub mod config;
pub mod coordinator;
pub mod counters;
pub mod error;
pub mod finalize;
pub mod ops;
pub mod scalar;
pub mod teams;
pub mod types;
pub mod warp;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::block::{parallel_reduce_nowait, reduce_within_block};
    pub use crate::buffer::StagingBuffer;
    pub use crate::config::{ReductionConfig, ReductionConfigBuilder};
    pub use crate::coordinator::{Admission, AdmissionCoordinator, CoordinatorStats};
    pub use crate::counters::{CounterSnapshot, ProgressCounters};
    pub use crate::error::{ReductionError, Result};
    pub use crate::finalize::finalize_grid;
    pub use crate::ops::{BufferOps, RecordBuffer, ReduceOps};
    pub use crate::scalar::{fold, ReductionOp, ReductionScalar, ScalarReduction};
    pub use crate::teams::TeamsReduction;
    pub use crate::types::{
        AlgoVersion, ExecutionMode, TeamContext, ThreadMask, WarpId, DEFAULT_WARP_SIZE,
    };
    pub use crate::warp::{irregular_warp_reduce, regular_warp_reduce};
}

// Re-exports for convenience
pub use block::{parallel_reduce_nowait, reduce_within_block};
pub use buffer::StagingBuffer;
pub use config::ReductionConfig;
pub use coordinator::{AdmissionCoordinator, CoordinatorStats};
pub use error::{ReductionError, Result};
pub use ops::{BufferOps, RecordBuffer, ReduceOps};
pub use scalar::{ReductionOp, ReductionScalar, ScalarReduction};
pub use teams::TeamsReduction;
pub use types::{ExecutionMode, TeamContext, ThreadMask};
