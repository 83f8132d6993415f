//! TOML configuration file.
//!
//! ```toml
//! [reduction]
//! num_of_records = 64
//! warp_size = 32
//! spin_limit = 100000000
//!
//! [launch]
//! num_teams = 256
//! threads_per_team = 128
//! mode = "spmd"
//! max_resident_teams = 8
//! ```

use std::path::Path;

use gridreduce::{ExecutionMode, LaunchConfig, ReductionConfig};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CliResult;

/// Contents of a `--config` file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Reduction settings.
    pub reduction: ReductionConfig,
    /// Grid shape.
    pub launch: LaunchConfig,
}

impl FileConfig {
    /// Parse a TOML document.
    pub fn parse(content: &str) -> CliResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load from a file, or defaults when no path is given.
    pub fn load(path: Option<&str>) -> CliResult<Self> {
        match path {
            Some(path) => {
                let content = std::fs::read_to_string(Path::new(path))?;
                debug!("Loaded configuration from {}", path);
                Self::parse(&content)
            }
            None => Ok(Self::default()),
        }
    }
}

/// Grid flags shared by the commands. Set flags override file values.
#[derive(Debug, Clone, Default)]
pub struct GridOverrides {
    /// Teams in the grid.
    pub teams: Option<u32>,
    /// Threads per team.
    pub threads: Option<u32>,
    /// Staging buffer slots.
    pub records: Option<u32>,
    /// Warp width.
    pub warp_size: Option<u32>,
    /// Execution mode.
    pub mode: Option<ExecutionMode>,
    /// Resident worker cap.
    pub workers: Option<usize>,
    /// Admission spin limit; 0 disables the limit.
    pub spin_limit: Option<u64>,
}

impl GridOverrides {
    /// Apply the flags on top of a file configuration.
    pub fn apply(&self, mut config: FileConfig) -> FileConfig {
        if let Some(teams) = self.teams {
            config.launch.num_teams = teams;
        }
        if let Some(threads) = self.threads {
            config.launch.threads_per_team = threads;
        }
        if let Some(records) = self.records {
            config.reduction.num_of_records = records;
        }
        if let Some(warp_size) = self.warp_size {
            config.reduction.warp_size = warp_size;
        }
        if let Some(mode) = self.mode {
            config.launch.mode = mode;
        }
        if let Some(workers) = self.workers {
            config.launch.max_resident_teams = Some(workers);
        }
        if let Some(limit) = self.spin_limit {
            config.reduction.spin_limit = (limit > 0).then_some(limit);
        }
        config
    }
}
