//! Scalar Sum Example
//!
//! Reduces a slice and a per-thread generator with the built-in operators,
//! and shows how the staging buffer bounds the number of admitted teams.

use gridreduce::prelude::*;

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    println!("=== gridreduce Scalar Sum Example ===\n");

    let grid = GridReduce::builder()
        .teams(300)
        .threads_per_team(128)
        .num_of_records(64)
        .build()?;

    println!(
        "Grid: {} teams x {} threads, {} staging slots\n",
        grid.launch_config().num_teams,
        grid.launch_config().threads_per_team,
        grid.reduction_config().num_of_records
    );

    // Slice reductions stride over the grid's global thread ids.
    let samples: Vec<f64> = (0..100_000).map(|i| (i as f64 * 0.001).sin()).collect();
    let total = grid.reduce_slice(ReductionOp::Sum, &samples)?;
    let peak = grid.reduce_slice(ReductionOp::Max, &samples)?;
    let sequential: f64 = samples.iter().sum();
    println!("Slice of {} samples:", samples.len());
    println!("  sum  = {:.6} (sequential {:.6})", total, sequential);
    println!("  peak = {:.6}\n", peak);

    // Every thread contributes its own partial result.
    let outcome = grid.reduce_scalar(ReductionOp::Sum, |team, thread| {
        u64::from(team) * 128 + u64::from(thread)
    })?;
    let holder = outcome.holder()?;
    println!("Sum of global thread ids:");
    println!("  value          = {}", holder.value);
    println!("  held by        = team {}, thread {}", holder.team_id, holder.thread_id);
    println!("  teams admitted = {}", outcome.stats.admitted);
    println!("  max in flight  = {}", outcome.stats.max_in_flight);
    println!("  elapsed        = {:?}\n", outcome.elapsed);

    println!("Scalar sum example complete!");

    Ok(())
}
