//! SIMT topology types shared by the reducers and runtimes.

use serde::{Deserialize, Serialize};

use crate::error::{ReductionError, Result};

/// Default warp width (lanes executing in lock-step).
pub const DEFAULT_WARP_SIZE: u32 = 32;

/// How the threads of a team execute the surrounding kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Every thread of the team runs the same code from launch.
    #[default]
    Spmd,
    /// A single main thread runs serial code; workers wait for parallel work.
    Generic,
}

impl ExecutionMode {
    /// Parse a mode name (`spmd` or `generic`).
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "spmd" => Ok(Self::Spmd),
            "generic" => Ok(Self::Generic),
            other => Err(ReductionError::InvalidConfig(format!(
                "Unknown execution mode '{}'. Valid options: spmd, generic",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionMode::Spmd => write!(f, "spmd"),
            ExecutionMode::Generic => write!(f, "generic"),
        }
    }
}

/// Shuffle algorithm flag passed to the shuffle-combine operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum AlgoVersion {
    /// Full warp: every lane combines with the lane `offset` above it.
    Regular = 0,
    /// Contiguous partial set: lanes below `offset` combine, the rest
    /// take the shuffled value so the live range is compacted.
    Irregular = 1,
}

/// Warp index within a team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WarpId(pub u32);

impl WarpId {
    /// Warp containing the given team-local thread.
    #[inline]
    pub fn from_thread(thread_id: u32, warp_size: u32) -> Self {
        Self(thread_id / warp_size)
    }

    /// Lane of a team-local thread within its warp.
    #[inline]
    pub fn lane_id(thread_id: u32, warp_size: u32) -> u32 {
        thread_id % warp_size
    }
}

/// Number of warps needed to cover `threads` threads.
#[inline]
pub fn warps_for(threads: u32, warp_size: u32) -> u32 {
    threads.div_ceil(warp_size)
}

/// Round a thread count down to a whole number of warps, or to 1 below one warp.
#[inline]
pub fn round_to_warp_size(threads: u32, warp_size: u32) -> u32 {
    if threads < warp_size {
        1
    } else {
        threads & !(warp_size - 1)
    }
}

/// Topology queries for one team, as seen from inside the kernel.
///
/// Plays the role of the platform abstraction: team and grid sizes, warp
/// width and execution mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeamContext {
    /// Team index within the grid.
    pub team_id: u32,
    /// Number of teams in the grid.
    pub num_teams: u32,
    /// Threads in this team.
    pub num_threads: u32,
    /// Lanes per warp.
    pub warp_size: u32,
    /// Execution mode of the kernel.
    pub mode: ExecutionMode,
}

impl TeamContext {
    /// Create a context for a team.
    pub fn new(team_id: u32, num_teams: u32, num_threads: u32, warp_size: u32) -> Self {
        Self {
            team_id,
            num_teams,
            num_threads,
            warp_size,
            mode: ExecutionMode::Spmd,
        }
    }

    /// Set the execution mode.
    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Number of warps in this team.
    #[inline]
    pub fn num_warps(&self) -> u32 {
        warps_for(self.num_threads, self.warp_size)
    }

    /// Threads taking part in the teams reduction.
    ///
    /// In Generic mode only the main thread participates, acting as thread 0.
    #[inline]
    pub fn teams_width(&self) -> u32 {
        match self.mode {
            ExecutionMode::Spmd => self.num_threads,
            ExecutionMode::Generic => 1,
        }
    }

    /// Is this the last team of the grid by index.
    #[inline]
    pub fn is_last_team_index(&self) -> bool {
        self.team_id + 1 == self.num_teams
    }

    /// Check the topology is well formed.
    pub fn validate(&self) -> Result<()> {
        if self.warp_size == 0 || !self.warp_size.is_power_of_two() {
            return Err(ReductionError::InvalidTopology(format!(
                "warp size must be a power of two, got {}",
                self.warp_size
            )));
        }
        if self.num_threads == 0 {
            return Err(ReductionError::InvalidTopology(
                "team must have at least one thread".to_string(),
            ));
        }
        if self.num_warps() > self.warp_size {
            return Err(ReductionError::InvalidTopology(format!(
                "{} threads span {} warps; at most {} warps fit the inter-warp gather",
                self.num_threads,
                self.num_warps(),
                self.warp_size
            )));
        }
        if self.num_teams == 0 || self.team_id >= self.num_teams {
            return Err(ReductionError::InvalidTopology(format!(
                "team {} out of range for a grid of {} teams",
                self.team_id, self.num_teams
            )));
        }
        Ok(())
    }
}

/// Per-thread boolean signal of a team, e.g. "holds the result".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadMask {
    bits: Vec<bool>,
}

impl ThreadMask {
    /// Mask with no thread set.
    pub fn none(threads: usize) -> Self {
        Self {
            bits: vec![false; threads],
        }
    }

    /// Mask with exactly one thread set.
    pub fn single(threads: usize, thread_id: usize) -> Self {
        let mut mask = Self::none(threads);
        mask.set(thread_id);
        mask
    }

    /// Set a thread.
    pub fn set(&mut self, thread_id: usize) {
        self.bits[thread_id] = true;
    }

    /// Is the thread set.
    pub fn is_set(&self, thread_id: usize) -> bool {
        self.bits.get(thread_id).copied().unwrap_or(false)
    }

    /// Number of threads covered.
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    /// True if the mask covers no threads.
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Number of threads set.
    pub fn count(&self) -> usize {
        self.bits.iter().filter(|b| **b).count()
    }

    /// Lowest thread set.
    pub fn first(&self) -> Option<usize> {
        self.bits.iter().position(|b| *b)
    }

    /// Iterate over the threads set.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits
            .iter()
            .enumerate()
            .filter_map(|(i, b)| b.then_some(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warp_id() {
        assert_eq!(WarpId::from_thread(35, 32), WarpId(1));
        assert_eq!(WarpId::lane_id(35, 32), 3);
        assert_eq!(WarpId::from_thread(7, 8), WarpId(0));
    }

    #[test]
    fn test_round_to_warp_size() {
        assert_eq!(round_to_warp_size(1, 32), 1);
        assert_eq!(round_to_warp_size(31, 32), 1);
        assert_eq!(round_to_warp_size(32, 32), 32);
        assert_eq!(round_to_warp_size(100, 32), 96);
        assert_eq!(round_to_warp_size(9, 4), 8);
    }

    #[test]
    fn test_warps_for() {
        assert_eq!(warps_for(1, 32), 1);
        assert_eq!(warps_for(32, 32), 1);
        assert_eq!(warps_for(33, 32), 2);
        assert_eq!(warps_for(256, 32), 8);
    }

    #[test]
    fn test_context_validation() {
        assert!(TeamContext::new(0, 1, 64, 32).validate().is_ok());
        assert!(TeamContext::new(0, 1, 64, 24).validate().is_err());
        assert!(TeamContext::new(0, 1, 0, 32).validate().is_err());
        assert!(TeamContext::new(3, 3, 1, 32).validate().is_err());
        assert!(TeamContext::new(0, 1, 1024, 32).validate().is_ok());
        assert!(TeamContext::new(0, 1, 17, 4).validate().is_err());
    }

    #[test]
    fn test_teams_width() {
        let ctx = TeamContext::new(0, 4, 128, 32);
        assert_eq!(ctx.teams_width(), 128);
        assert_eq!(ctx.with_mode(ExecutionMode::Generic).teams_width(), 1);
        assert_eq!(ctx.num_warps(), 4);
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!(ExecutionMode::parse("SPMD").unwrap(), ExecutionMode::Spmd);
        assert_eq!(
            ExecutionMode::parse("generic").unwrap(),
            ExecutionMode::Generic
        );
        assert!(ExecutionMode::parse("simd").is_err());
    }

    #[test]
    fn test_thread_mask() {
        let mask = ThreadMask::single(8, 0);
        assert_eq!(mask.count(), 1);
        assert_eq!(mask.first(), Some(0));
        assert!(mask.is_set(0));
        assert!(!mask.is_set(5));
        assert!(!mask.is_set(100));
        assert_eq!(mask.iter().collect::<Vec<_>>(), vec![0]);
        assert_eq!(ThreadMask::none(4).first(), None);
    }
}
