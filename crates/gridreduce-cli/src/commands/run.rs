//! `gridreduce run` - Run one grid reduction and check it against a
//! sequential fold.

use colored::Colorize;
use gridreduce::{CoordinatorStats, ExecutionMode, ReductionOp, ScalarReduction};
use serde::Serialize;
use tracing::info;

use super::{build_grid, expected_value, OutputFormat, ValuePattern};
use crate::config::FileConfig;
use crate::error::{CliError, CliResult};

/// Report of a single run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Teams in the grid.
    pub teams: u32,
    /// Threads per team.
    pub threads_per_team: u32,
    /// Staging buffer slots.
    pub num_of_records: u32,
    /// Warp width.
    pub warp_size: u32,
    /// Execution mode.
    pub mode: ExecutionMode,
    /// Reduction operator.
    pub op: ReductionOp,
    /// Grid result.
    pub result: i64,
    /// Sequential fold of the same contributions.
    pub expected: i64,
    /// Team holding the result.
    pub holder_team: u32,
    /// Thread holding the result.
    pub holder_thread: u32,
    /// Wall-clock time in microseconds.
    pub elapsed_us: u128,
    /// Coordinator statistics.
    pub stats: CoordinatorStats,
}

/// Execute the run command.
pub async fn execute(
    config: FileConfig,
    op: ReductionOp,
    value: i64,
    pattern: ValuePattern,
    format: OutputFormat,
) -> CliResult<()> {
    let grid = build_grid(&config)?;
    let teams = config.launch.num_teams;
    let threads = config.launch.threads_per_team;

    info!(
        "Running {} reduction over {} teams x {} threads ({} records)",
        op, teams, threads, config.reduction.num_of_records
    );

    let ops = ScalarReduction::<i64>::new(op)?;
    let buffer = ops.staging_buffer(config.reduction.num_of_records as usize);
    let outcome = grid
        .reduce_with_async(ops, buffer, move |team, thread| {
            pattern.contribution(value, threads, team, thread)
        })
        .await?;

    let holder = outcome.holder()?.clone();
    let report = RunReport {
        teams,
        threads_per_team: threads,
        num_of_records: config.reduction.num_of_records,
        warp_size: config.reduction.warp_size,
        mode: config.launch.mode,
        op,
        result: holder.value,
        expected: expected_value(op, pattern, value, teams, threads),
        holder_team: holder.team_id,
        holder_thread: holder.thread_id,
        elapsed_us: outcome.elapsed.as_micros(),
        stats: outcome.stats,
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_report(&report),
    }

    if report.result != report.expected {
        return Err(CliError::Validation(format!(
            "grid result {} differs from sequential result {}",
            report.result, report.expected
        )));
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    println!("{}", "Grid reduction".bold());
    println!(
        "  grid:      {} teams x {} threads ({}, warp {})",
        report.teams.to_string().bright_white(),
        report.threads_per_team.to_string().bright_white(),
        report.mode,
        report.warp_size
    );
    println!("  records:   {}", report.num_of_records);
    println!("  op:        {}", report.op.to_string().bright_white());
    println!(
        "  result:    {} (team {}, thread {})",
        report.result.to_string().bright_green(),
        report.holder_team,
        report.holder_thread
    );
    let check = if report.result == report.expected {
        "ok".green()
    } else {
        "MISMATCH".red().bold()
    };
    println!("  expected:  {} [{}]", report.expected, check);
    println!("  elapsed:   {} us", report.elapsed_us);
    println!(
        "  admission: {} admitted, {} rollovers, max {} in flight, {} spins",
        report.stats.admitted,
        report.stats.rollovers,
        report.stats.max_in_flight,
        report.stats.spin_iterations
    );
}
