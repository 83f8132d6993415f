//! Grid launch configuration for the CPU backend.

use serde::{Deserialize, Serialize};

use gridreduce_core::error::{ReductionError, Result};
use gridreduce_core::types::ExecutionMode;

/// Order in which team indices are handed to resident workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchOrder {
    /// Ascending team index. Deadlock-free for any number of workers: the
    /// lowest unfinished team is never waiting on a team that has not run.
    #[default]
    InOrder,
    /// Descending team index. With fewer workers than teams the admission
    /// gate can never open; useful to exercise the livelock diagnostic.
    Reversed,
}

impl DispatchOrder {
    /// Team index for the `ticket`-th dispatch.
    #[inline]
    pub fn team_for(&self, ticket: u32, num_teams: u32) -> u32 {
        match self {
            DispatchOrder::InOrder => ticket,
            DispatchOrder::Reversed => num_teams - 1 - ticket,
        }
    }
}

/// Shape of a grid launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchConfig {
    /// Teams in the grid.
    pub num_teams: u32,
    /// Threads per team.
    pub threads_per_team: u32,
    /// Kernel execution mode.
    pub mode: ExecutionMode,
    /// Teams resident at once (worker threads). `None` uses the host's
    /// available parallelism.
    pub max_resident_teams: Option<usize>,
    /// Team dispatch order.
    pub dispatch: DispatchOrder,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            num_teams: 1,
            threads_per_team: 1,
            mode: ExecutionMode::Spmd,
            max_resident_teams: None,
            dispatch: DispatchOrder::InOrder,
        }
    }
}

impl LaunchConfig {
    /// Create a launch of `num_teams` teams of `threads_per_team` threads.
    pub fn new(num_teams: u32, threads_per_team: u32) -> Self {
        Self {
            num_teams,
            threads_per_team,
            ..Default::default()
        }
    }

    /// Set the execution mode.
    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Cap the number of concurrently resident teams.
    pub fn with_max_resident_teams(mut self, teams: usize) -> Self {
        self.max_resident_teams = Some(teams);
        self
    }

    /// Set the dispatch order.
    pub fn with_dispatch(mut self, dispatch: DispatchOrder) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Worker threads used for this launch.
    pub fn resident_teams(&self) -> usize {
        let cap = self.max_resident_teams.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });
        cap.clamp(1, self.num_teams.max(1) as usize)
    }

    /// Check the launch shape for a given warp width.
    pub fn validate(&self, warp_size: u32) -> Result<()> {
        if self.num_teams == 0 {
            return Err(ReductionError::InvalidTopology(
                "grid must have at least one team".to_string(),
            ));
        }
        if self.threads_per_team == 0 {
            return Err(ReductionError::InvalidTopology(
                "team must have at least one thread".to_string(),
            ));
        }
        if self.max_resident_teams == Some(0) {
            return Err(ReductionError::InvalidTopology(
                "at least one team must be resident".to_string(),
            ));
        }
        if self.mode == ExecutionMode::Generic
            && self.threads_per_team != 1
            && self.threads_per_team % warp_size != 0
        {
            return Err(ReductionError::InvalidTopology(format!(
                "generic mode needs 1 thread or a multiple of the warp size {} per team, got {}",
                warp_size, self.threads_per_team
            )));
        }
        Ok(())
    }
}
