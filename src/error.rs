//! Error types for lead-time analysis.

use thiserror::Error;

/// Result type for lead-time analysis operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while analyzing lead times.
#[derive(Debug, Error)]
pub enum Error {
    /// Granularity name is neither weekly nor monthly.
    #[error("unsupported granularity: {0}")]
    UnsupportedGranularity(String),

    /// Period key does not match the expected `YYYY-MM` or `YYYY-Wnn` form.
    #[error("malformed period key: {0}")]
    MalformedPeriodKey(String),

    /// Filter conditions contradict each other or are out of range.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// Lead-time record violates its invariants.
    #[error("invalid record #{number}: {reason}")]
    InvalidRecord { number: i64, reason: String },

    /// Numeric computation produced an unusable value.
    #[error("computation failed: {0}")]
    Computation(String),
}
