//! CLI command implementations.

pub mod run;
pub mod sweep;

use clap::ValueEnum;
use gridreduce::scalar::fold;
use gridreduce::{ExecutionMode, GridReduce, ReductionOp};

use crate::config::FileConfig;
use crate::error::CliResult;

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON for programmatic consumption.
    Json,
}

/// Per-thread contribution pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ValuePattern {
    /// Every thread contributes `--value`.
    #[default]
    Constant,
    /// Thread contributes `--value` plus its global thread index.
    Index,
}

impl ValuePattern {
    /// Contribution of one thread.
    pub fn contribution(self, value: i64, threads_per_team: u32, team: u32, thread: u32) -> i64 {
        match self {
            ValuePattern::Constant => value,
            ValuePattern::Index => {
                let global = u64::from(team) * u64::from(threads_per_team) + u64::from(thread);
                value.wrapping_add(global as i64)
            }
        }
    }
}

/// Clap parser for `--op`.
pub fn parse_op(s: &str) -> Result<ReductionOp, String> {
    ReductionOp::parse(s).map_err(|e| e.to_string())
}

/// Clap parser for `--mode`.
pub fn parse_mode(s: &str) -> Result<ExecutionMode, String> {
    ExecutionMode::parse(s).map_err(|e| e.to_string())
}

/// Build the grid front end from a merged configuration.
pub fn build_grid(config: &FileConfig) -> CliResult<GridReduce> {
    Ok(GridReduce::from_configs(config.reduction.clone(), config.launch.clone())?)
}

/// Sequential reference result for a grid.
pub fn expected_value(
    op: ReductionOp,
    pattern: ValuePattern,
    value: i64,
    teams: u32,
    threads: u32,
) -> i64 {
    fold(
        op,
        (0..teams).flat_map(|team| {
            (0..threads).map(move |thread| pattern.contribution(value, threads, team, thread))
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contribution_patterns() {
        assert_eq!(ValuePattern::Constant.contribution(5, 32, 3, 7), 5);
        assert_eq!(ValuePattern::Index.contribution(5, 32, 3, 7), 5 + 96 + 7);
    }

    #[test]
    fn test_expected_value() {
        assert_eq!(expected_value(ReductionOp::Sum, ValuePattern::Constant, 1, 5, 1), 5);
        assert_eq!(expected_value(ReductionOp::Max, ValuePattern::Index, 0, 4, 8), 31);
        assert_eq!(expected_value(ReductionOp::Xor, ValuePattern::Constant, 3, 2, 1), 0);
    }

    #[test]
    fn test_parsers() {
        assert_eq!(parse_op("^").unwrap(), ReductionOp::Xor);
        assert!(parse_op("mean").is_err());
        assert_eq!(parse_mode("GENERIC").unwrap(), ExecutionMode::Generic);
    }
}
