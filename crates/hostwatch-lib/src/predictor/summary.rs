//! Recent usage summary
//!
//! Condenses the last few samples of each metric into a mean, a usage
//! level and a coarse direction for display next to the forecasts.

use crate::history::AlignedHistory;
use crate::models::{is_valid_percent, MetricKind, TrendDirection};
use serde::{Deserialize, Serialize};

/// Samples averaged for the summary
pub const SUMMARY_WINDOW: usize = 10;

/// Usage above this level is moderate
const MODERATE_USAGE: f64 = 60.0;

/// Usage above this level is high
const HIGH_USAGE: f64 = 80.0;

/// Usage level classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageLevel {
    Normal,
    Moderate,
    High,
}

impl UsageLevel {
    pub fn classify(percent: f64) -> Self {
        if percent > HIGH_USAGE {
            UsageLevel::High
        } else if percent > MODERATE_USAGE {
            UsageLevel::Moderate
        } else {
            UsageLevel::Normal
        }
    }
}

impl std::fmt::Display for UsageLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UsageLevel::Normal => write!(f, "normal"),
            UsageLevel::Moderate => write!(f, "moderate"),
            UsageLevel::High => write!(f, "high"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub metric: MetricKind,
    pub mean: f64,
    pub level: UsageLevel,
    pub direction: TrendDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub cpu: MetricSummary,
    pub memory: MetricSummary,
    pub disk: MetricSummary,
}

/// Summarize the most recent samples of each metric
///
/// Returns `None` when any metric has no valid reading in the window.
pub fn summarize(history: &AlignedHistory<'_>) -> Option<UsageSummary> {
    let window = history.tail(SUMMARY_WINDOW);
    let full_window = window.len() >= SUMMARY_WINDOW;

    let [cpu, memory, disk] =
        MetricKind::ALL.map(|metric| summarize_metric(metric, window.metric(metric), full_window));

    Some(UsageSummary {
        cpu: cpu?,
        memory: memory?,
        disk: disk?,
    })
}

fn summarize_metric(
    metric: MetricKind,
    values: &[f64],
    full_window: bool,
) -> Option<MetricSummary> {
    let valid: Vec<f64> = values.iter().copied().filter(|v| is_valid_percent(*v)).collect();
    let (first, last) = (*valid.first()?, *valid.last()?);
    let mean = valid.iter().sum::<f64>() / valid.len() as f64;

    let direction = if !full_window || last == first {
        TrendDirection::Stable
    } else if last > first {
        TrendDirection::Increasing
    } else {
        TrendDirection::Decreasing
    };

    Some(MetricSummary {
        metric,
        mean,
        level: UsageLevel::classify(mean),
        direction,
    })
}
