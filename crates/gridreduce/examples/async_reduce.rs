//! Async Reduce Example
//!
//! Runs several independent grid reductions concurrently from a tokio
//! runtime. Each launch gets its own staging buffer and counters, and runs
//! on the blocking pool.

use std::sync::Arc;

use gridreduce::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    println!("=== gridreduce Async Reduce Example ===\n");

    let grid = Arc::new(
        GridReduce::builder()
            .teams(64)
            .threads_per_team(64)
            .num_of_records(8)
            .max_resident_teams(4)
            .build()?,
    );

    let ops = [ReductionOp::Sum, ReductionOp::Min, ReductionOp::Max, ReductionOp::Xor];
    let mut handles = Vec::with_capacity(ops.len());
    for op in ops {
        let grid = Arc::clone(&grid);
        handles.push(tokio::spawn(async move {
            let scalar = ScalarReduction::<i64>::new(op)?;
            let buffer = scalar.staging_buffer(8);
            let outcome = grid
                .reduce_with_async(scalar, buffer, |team, thread| {
                    i64::from(team * 64 + thread) - 2000
                })
                .await?;
            Ok::<_, ReductionError>((op, outcome.into_value()?))
        }));
    }

    for handle in handles {
        let (op, value) = handle
            .await
            .map_err(|e| ReductionError::BackendError(e.to_string()))??;
        println!("  {:<8} = {}", op.to_string(), value);
    }

    println!("\nLauncher metrics: {:?}", grid.grid().metrics());
    println!("Async reduce example complete!");

    Ok(())
}
