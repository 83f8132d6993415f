//! `gridreduce sweep` - Run grids of 1..=max teams and verify every result.

use colored::Colorize;
use gridreduce::ReductionOp;
use serde::Serialize;
use tracing::{debug, warn};

use super::{build_grid, expected_value, OutputFormat, ValuePattern};
use crate::config::FileConfig;
use crate::error::{CliError, CliResult};

/// One row of a sweep.
#[derive(Debug, Clone, Serialize)]
pub struct SweepRow {
    /// Teams in the grid.
    pub teams: u32,
    /// Grid result.
    pub result: i64,
    /// Sequential fold.
    pub expected: i64,
    /// Result holders reported by the grid.
    pub holders: usize,
    /// Largest number of teams admitted at once.
    pub max_in_flight: u64,
    /// Wall-clock time in microseconds.
    pub elapsed_us: u128,
}

impl SweepRow {
    /// True if the grid produced exactly one correct result within the
    /// admission bound.
    pub fn passed(&self, num_of_records: u32) -> bool {
        self.holders == 1
            && self.result == self.expected
            && self.max_in_flight <= u64::from(num_of_records)
    }
}

/// Execute the sweep command.
pub fn execute(
    config: FileConfig,
    max_teams: u32,
    op: ReductionOp,
    value: i64,
    pattern: ValuePattern,
    format: OutputFormat,
) -> CliResult<()> {
    if max_teams == 0 {
        return Err(CliError::InvalidArgument(
            "--max-teams must be at least 1".to_string(),
        ));
    }

    let records = config.reduction.num_of_records;
    let threads = config.launch.threads_per_team;
    let mut rows = Vec::with_capacity(max_teams as usize);

    for teams in 1..=max_teams {
        let mut config = config.clone();
        config.launch.num_teams = teams;
        let grid = build_grid(&config)?;

        let outcome = grid.reduce_scalar(op, |team, thread| {
            pattern.contribution(value, threads, team, thread)
        })?;
        let row = SweepRow {
            teams,
            result: outcome.holders.first().map(|h| h.value).unwrap_or_default(),
            expected: expected_value(op, pattern, value, teams, threads),
            holders: outcome.holders.len(),
            max_in_flight: outcome.stats.max_in_flight,
            elapsed_us: outcome.elapsed.as_micros(),
        };
        debug!(teams, result = row.result, expected = row.expected, "sweep step");
        if !row.passed(records) {
            warn!("Sweep mismatch at {} teams", teams);
        }
        rows.push(row);
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Text => print_rows(&rows, records),
    }

    let failed: Vec<u32> = rows
        .iter()
        .filter(|row| !row.passed(records))
        .map(|row| row.teams)
        .collect();
    if !failed.is_empty() {
        return Err(CliError::Validation(format!(
            "{} of {} grids failed (teams: {:?})",
            failed.len(),
            rows.len(),
            failed
        )));
    }
    Ok(())
}

fn print_rows(rows: &[SweepRow], records: u32) {
    println!(
        "{:>6}  {:>20}  {:>20}  {:>7}  {:>9}  {:>10}",
        "teams", "result", "expected", "holders", "in-flight", "time (us)"
    );
    for row in rows {
        let status = if row.passed(records) {
            "ok".green()
        } else {
            "FAIL".red().bold()
        };
        println!(
            "{:>6}  {:>20}  {:>20}  {:>7}  {:>9}  {:>10}  {}",
            row.teams,
            row.result,
            row.expected,
            row.holders,
            row.max_in_flight,
            row.elapsed_us,
            status
        );
    }
}
