//! Error types for grid reductions.

use thiserror::Error;

/// Result type for reduction operations.
pub type Result<T> = std::result::Result<T, ReductionError>;

/// Errors reported by the reduction engine and its runtimes.
///
/// The data path itself (lane, block and team reducers) is infallible by
/// construction; these errors cover configuration, launch topology and the
/// liveness diagnostic of the admission spin.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReductionError {
    /// Reduction configuration is invalid.
    #[error("Invalid reduction configuration: {0}")]
    InvalidConfig(String),

    /// Launch topology (teams, threads, warp width) is invalid.
    #[error("Invalid launch topology: {0}")]
    InvalidTopology(String),

    /// A team master polled the chunk counter past the configured spin limit.
    #[error(
        "Team {team_id} exceeded the admission spin limit after {spins} polls (chunk counter stuck at {bound})"
    )]
    SpinLimitExceeded {
        /// Team that gave up waiting.
        team_id: u32,
        /// Last observed value of the chunk counter.
        bound: u32,
        /// Number of polls performed.
        spins: u64,
    },

    /// Admission was cancelled while the team waited for its chunk.
    #[error("Team {team_id} left admission after the grid was cancelled")]
    AdmissionCancelled {
        /// Team that stopped waiting.
        team_id: u32,
    },

    /// A team worker panicked while executing.
    #[error("Team worker panicked while executing team {team_id}")]
    TeamPanicked {
        /// Team the worker was executing, if known.
        team_id: u32,
    },

    /// The grid completed without any thread reporting the final value.
    #[error("Grid completed without a final value")]
    MissingResult,

    /// More than one thread reported holding the final value.
    #[error("Grid completed with {0} result holders, expected exactly one")]
    MultipleResults(usize),

    /// Runtime backend failure.
    #[error("Backend error: {0}")]
    BackendError(String),
}

impl ReductionError {
    /// Returns true if this error is the admission livelock diagnostic.
    pub fn is_livelock(&self) -> bool {
        matches!(self, ReductionError::SpinLimitExceeded { .. })
    }
}
