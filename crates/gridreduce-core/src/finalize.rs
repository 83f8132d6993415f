//! Grid finalization by the last team.
//!
//! The staging buffer may hold more live records than the finalizing team
//! has threads, or fewer records than slots. Survivors load one slot each,
//! stride over the remainder, and fold the per-thread values with the block
//! reducer.

use tracing::debug;

use crate::block::reduce_within_block;
use crate::coordinator::AdmissionCoordinator;
use crate::ops::BufferOps;
use crate::types::{round_to_warp_size, TeamContext, ThreadMask};

/// Threads of the finalizing team that take part in draining the buffer.
///
/// Threads beyond the live record count leave, then the rest is rounded
/// down to whole warps (or to a single thread below one warp) so lane
/// reduction only ever sees uniformly participating warps.
#[inline]
pub fn finalizer_width(team_width: u32, num_active_records: u32, warp_size: u32) -> u32 {
    round_to_warp_size(team_width.min(num_active_records), warp_size)
}

/// Drain the staging buffer into thread 0 of the last team and re-arm the
/// counters.
///
/// `lanes` is the register file of the threads taking part in the teams
/// reduction (one in Generic mode). Returns the per-thread completion
/// signal sized to the whole team: only thread 0 is set.
pub fn finalize_grid<O: BufferOps>(
    coordinator: &AdmissionCoordinator,
    ops: &O,
    buffer: &O::Buffer,
    ctx: &TeamContext,
    lanes: &mut [O::Record],
) -> ThreadMask {
    let num_active_records = ctx.num_teams.min(coordinator.num_of_records());
    let width = finalizer_width(lanes.len() as u32, num_active_records, ctx.warp_size);

    for (thread_id, record) in lanes.iter_mut().take(width as usize).enumerate() {
        let thread_id = thread_id as u32;
        ops.global_copy(buffer, thread_id as usize, record);

        let mut slot = width + thread_id;
        while slot < num_active_records {
            ops.global_reduce(buffer, slot as usize, record);
            slot += width;
        }
    }

    if width > 1 {
        reduce_within_block(&mut lanes[..width as usize], ctx.warp_size, ops);
    }

    // Team master re-arms the mechanism for the next reduction.
    coordinator.reset();
    coordinator.record_finalization();

    debug!(
        team_id = ctx.team_id,
        num_active_records,
        finalizer_threads = width,
        "grid reduction finalized"
    );

    ThreadMask::single(ctx.num_threads as usize, 0)
}
