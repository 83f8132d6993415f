//! Block-level reduction: warps fold locally, then warp 0 folds the warps.
//!
//! ```text
//!  warp 0      warp 1      warp 2
//! [........]  [........]  [....]       regular / irregular lane reduce
//!  |           |           |
//!  v           v           v
//! shared[0]   shared[1]   shared[2]    inter-warp copy (lane 0 of each warp)
//!  |___________|___________|
//!              v
//!         warp 0 lanes 0..3            irregular lane reduce
//!              v
//!          thread 0 holds the block result
//! ```

use tracing::trace;

use crate::error::{ReductionError, Result};
use crate::ops::ReduceOps;
use crate::types::{warps_for, ExecutionMode, TeamContext, ThreadMask};
use crate::warp::{irregular_warp_reduce, regular_warp_reduce};

/// Fold every thread's record of a block into thread 0.
///
/// `lanes` is the block's register file, one record per thread. Returns the
/// per-thread "holds result" signal: exactly thread 0 is set. A trailing
/// partial warp is folded with the irregular reducer over its live lanes,
/// so any thread count up to `warp_size²` is accepted.
pub fn reduce_within_block<O: ReduceOps>(
    lanes: &mut [O::Record],
    warp_size: u32,
    ops: &O,
) -> ThreadMask {
    let num_threads = lanes.len();
    debug_assert!(num_threads > 0, "block reduction needs at least one thread");

    // Degenerate region: the only thread already holds the result.
    if num_threads == 1 {
        return ThreadMask::single(1, 0);
    }

    let ws = warp_size as usize;
    for warp in lanes.chunks_mut(ws) {
        if warp.len() == ws {
            regular_warp_reduce(warp, warp_size, ops);
        } else {
            let live = warp.len() as u32;
            irregular_warp_reduce(warp, live, ops);
        }
    }

    if num_threads > ws {
        let num_warps = warps_for(num_threads as u32, warp_size);
        debug_assert!(
            num_warps <= warp_size,
            "{} warps cannot be gathered into one warp of {}",
            num_warps,
            warp_size
        );

        // Warp masters publish into shared memory, indexed by warp number.
        let mut shared: Vec<O::Record> = vec![lanes[0].clone(); num_warps as usize];
        for (warp_id, slot) in shared.iter_mut().enumerate() {
            ops.inter_warp_copy(&lanes[warp_id * ws], slot);
        }

        // Block barrier is implicit in lock-step execution; warp 0 gathers.
        for (thread_id, slot) in shared.iter().enumerate() {
            ops.inter_warp_copy(slot, &mut lanes[thread_id]);
        }

        irregular_warp_reduce(&mut lanes[..ws], num_warps, ops);
        trace!(num_threads, num_warps, "gathered per-warp results into warp 0");
    }

    ThreadMask::single(num_threads, 0)
}

/// Block-scope reduction entry point for a parallel region.
///
/// Validates the region shape for the execution mode, then runs
/// [`reduce_within_block`] over the team's register file. In Generic mode a
/// parallel region is either a single thread or a whole number of warps.
pub fn parallel_reduce_nowait<O: ReduceOps>(
    ctx: &TeamContext,
    lanes: &mut [O::Record],
    ops: &O,
) -> Result<ThreadMask> {
    ctx.validate()?;
    if lanes.len() != ctx.num_threads as usize {
        return Err(ReductionError::InvalidTopology(format!(
            "register file holds {} records for a team of {} threads",
            lanes.len(),
            ctx.num_threads
        )));
    }
    if ctx.mode == ExecutionMode::Generic
        && ctx.num_threads != 1
        && ctx.num_threads % ctx.warp_size != 0
    {
        return Err(ReductionError::InvalidTopology(format!(
            "generic-mode parallel region of {} threads is not a multiple of the warp size {}",
            ctx.num_threads, ctx.warp_size
        )));
    }

    Ok(reduce_within_block(lanes, ctx.warp_size, ops))
}
