//! Error types for the gridreduce CLI.

use gridreduce::ReductionError;
use thiserror::Error;

/// CLI result type alias.
pub type CliResult<T> = Result<T, CliError>;

/// CLI error type.
#[derive(Error, Debug)]
pub enum CliError {
    /// IO error while reading configuration.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file or flag error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid command-line argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Output serialization error.
    #[error("Output error: {0}")]
    Output(String),

    /// The reduction engine failed.
    #[error(transparent)]
    Reduction(#[from] ReductionError),

    /// A reduction result disagreed with the sequential fold.
    #[error("Validation failed: {0}")]
    Validation(String),
}

impl From<toml::de::Error> for CliError {
    fn from(e: toml::de::Error) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Output(e.to_string())
    }
}
