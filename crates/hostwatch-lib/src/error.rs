//! Error types for the analytics core

use thiserror::Error;

/// Recognized analytics states that are surfaced as errors
///
/// Only [`AnalyticsError::NotTrainedYet`] signals a sequencing bug at the
/// call site. The other variants describe data conditions the caller is
/// expected to handle as "still collecting".
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalyticsError {
    /// Fewer usable samples than the operation requires
    #[error("insufficient data: {available} usable samples, need {required}")]
    InsufficientData { available: usize, required: usize },

    /// Detection was requested before a baseline was trained
    #[error("anomaly detector has not been trained yet")]
    NotTrainedYet,

    /// The fitted distribution could not be used for scoring
    #[error("degenerate training distribution: {0}")]
    DegenerateDistribution(String),
}

pub type AnalyticsResult<T> = std::result::Result<T, AnalyticsError>;
