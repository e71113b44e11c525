//! Resource usage forecasting

mod regression;
mod resource;
mod summary;

pub use regression::{linear_regression, HoltTrend, LinearFit, LinearTrend, TrendFit};
pub use resource::{
    ForecastMethod, PredictorConfig, PredictorState, ResourcePredictor, DEFAULT_WINDOW_SIZE,
    MIN_SAMPLES, STABLE_SLOPE,
};
pub use summary::{summarize, MetricSummary, UsageLevel, UsageSummary, SUMMARY_WINDOW};

/// Trait for trend fitting implementations
pub trait TrendModel: Send + Sync {
    /// Short identifier reported with each prediction
    fn name(&self) -> &'static str;

    /// Fit a trend over `values`, oldest first
    ///
    /// Returns `None` for an empty window.
    fn fit(&self, values: &[f64]) -> Option<TrendFit>;
}
