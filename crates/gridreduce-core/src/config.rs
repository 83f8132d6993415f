//! Reduction engine configuration.
//!
//! # Example
//!
//! ```
//! use gridreduce_core::config::ReductionConfig;
//!
//! let config = ReductionConfig::builder()
//!     .num_of_records(64)
//!     .warp_size(32)
//!     .spin_limit(Some(1_000_000))
//!     .build()
//!     .unwrap();
//! assert_eq!(config.num_of_records, 64);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{ReductionError, Result};
use crate::types::DEFAULT_WARP_SIZE;

/// Default staging buffer capacity (teams admitted per chunk).
pub const DEFAULT_NUM_OF_RECORDS: u32 = 1024;

/// Admission poll cap applied in debug builds.
pub const DEFAULT_DEBUG_SPIN_LIMIT: u64 = 1 << 26;

/// Polls before an admission spinner starts yielding its OS thread.
pub const DEFAULT_YIELD_AFTER: u32 = 64;

/// Configuration shared by every team of a grid reduction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReductionConfig {
    /// Staging buffer slots; bound on concurrently admitted teams.
    pub num_of_records: u32,
    /// Lanes per warp (power of two).
    pub warp_size: u32,
    /// Maximum admission polls before reporting livelock. `None` spins forever.
    pub spin_limit: Option<u64>,
    /// Polls before the spinner yields between polls.
    pub yield_after: u32,
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self {
            num_of_records: DEFAULT_NUM_OF_RECORDS,
            warp_size: DEFAULT_WARP_SIZE,
            spin_limit: if cfg!(debug_assertions) {
                Some(DEFAULT_DEBUG_SPIN_LIMIT)
            } else {
                None
            },
            yield_after: DEFAULT_YIELD_AFTER,
        }
    }
}

impl ReductionConfig {
    /// Create a builder.
    pub fn builder() -> ReductionConfigBuilder {
        ReductionConfigBuilder::new()
    }

    /// Check the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.num_of_records == 0 {
            return Err(ReductionError::InvalidConfig(
                "num_of_records must be at least 1".to_string(),
            ));
        }
        if self.warp_size == 0 || !self.warp_size.is_power_of_two() {
            return Err(ReductionError::InvalidConfig(format!(
                "warp_size must be a power of two, got {}",
                self.warp_size
            )));
        }
        if self.spin_limit == Some(0) {
            return Err(ReductionError::InvalidConfig(
                "spin_limit must be positive when set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`ReductionConfig`].
#[derive(Debug, Clone, Default)]
pub struct ReductionConfigBuilder {
    config: ReductionConfig,
}

impl ReductionConfigBuilder {
    /// Create a builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the staging buffer capacity.
    pub fn num_of_records(mut self, num_of_records: u32) -> Self {
        self.config.num_of_records = num_of_records;
        self
    }

    /// Set the warp width.
    pub fn warp_size(mut self, warp_size: u32) -> Self {
        self.config.warp_size = warp_size;
        self
    }

    /// Set the admission spin limit.
    pub fn spin_limit(mut self, spin_limit: Option<u64>) -> Self {
        self.config.spin_limit = spin_limit;
        self
    }

    /// Set the polls before yielding.
    pub fn yield_after(mut self, yield_after: u32) -> Self {
        self.config.yield_after = yield_after;
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<ReductionConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
