//! Core data models shared by the collector, the analytics core and the API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lower bound of a valid percentage reading
pub const PERCENT_MIN: f64 = 0.0;

/// Upper bound of a valid percentage reading
pub const PERCENT_MAX: f64 = 100.0;

/// The three host metrics tracked by the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Cpu,
    Memory,
    Disk,
}

impl MetricKind {
    pub const ALL: [MetricKind; 3] = [MetricKind::Cpu, MetricKind::Memory, MetricKind::Disk];

    /// Short label used in alert messages
    pub fn short_label(&self) -> &'static str {
        match self {
            MetricKind::Cpu => "CPU",
            MetricKind::Memory => "MEM",
            MetricKind::Disk => "DISK",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricKind::Cpu => write!(f, "CPU"),
            MetricKind::Memory => write!(f, "Memory"),
            MetricKind::Disk => write!(f, "Disk"),
        }
    }
}

/// One joint (CPU%, memory%, disk%) reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
}

impl Sample {
    pub fn new(cpu_percent: f64, memory_percent: f64, disk_percent: f64) -> Self {
        Self::at(Utc::now(), cpu_percent, memory_percent, disk_percent)
    }

    pub fn at(
        timestamp: DateTime<Utc>,
        cpu_percent: f64,
        memory_percent: f64,
        disk_percent: f64,
    ) -> Self {
        Self {
            timestamp,
            cpu_percent,
            memory_percent,
            disk_percent,
        }
    }

    pub fn value(&self, metric: MetricKind) -> f64 {
        match metric {
            MetricKind::Cpu => self.cpu_percent,
            MetricKind::Memory => self.memory_percent,
            MetricKind::Disk => self.disk_percent,
        }
    }

    pub fn as_array(&self) -> [f64; 3] {
        [self.cpu_percent, self.memory_percent, self.disk_percent]
    }

    /// True when every field is finite and inside [0, 100]
    pub fn is_valid(&self) -> bool {
        self.as_array().iter().all(|v| is_valid_percent(*v))
    }
}

/// Check a single reading for finiteness and range
pub fn is_valid_percent(value: f64) -> bool {
    value.is_finite() && (PERCENT_MIN..=PERCENT_MAX).contains(&value)
}

/// Clamp a value into the percentage range
pub fn clamp_percent(value: f64) -> f64 {
    value.clamp(PERCENT_MIN, PERCENT_MAX)
}

/// Direction of a metric over the fitted window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrendDirection::Increasing => write!(f, "increasing"),
            TrendDirection::Decreasing => write!(f, "decreasing"),
            TrendDirection::Stable => write!(f, "stable"),
        }
    }
}

/// Forecast for a single horizon
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HorizonForecast {
    /// Ticks ahead of the latest sample
    pub ticks: usize,
    /// Predicted percentage, always within [0, 100]
    pub value: f64,
}

/// Forecast for one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricForecast {
    pub metric: MetricKind,
    /// Last valid observed value
    pub current: f64,
    pub horizons: Vec<HorizonForecast>,
    /// Fitted slope in percentage points per tick
    pub slope: f64,
    /// Goodness of fit (0 when undefined)
    pub r_squared: f64,
    pub trend: TrendDirection,
    /// Number of valid samples the fit used
    pub samples_used: usize,
    /// True when the fit degraded to repeating the last value
    pub fallback: bool,
}

impl MetricForecast {
    /// Forecast for the nearest configured horizon
    pub fn next(&self) -> Option<f64> {
        self.horizons.first().map(|h| h.value)
    }

    /// Forecast for an exact horizon, if configured
    pub fn at(&self, ticks: usize) -> Option<f64> {
        self.horizons
            .iter()
            .find(|h| h.ticks == ticks)
            .map(|h| h.value)
    }
}

/// Output of the resource predictor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub generated_at: DateTime<Utc>,
    pub method: String,
    pub cpu: MetricForecast,
    pub memory: MetricForecast,
    pub disk: MetricForecast,
}

impl PredictionResult {
    pub fn metric(&self, metric: MetricKind) -> &MetricForecast {
        match metric {
            MetricKind::Cpu => &self.cpu,
            MetricKind::Memory => &self.memory,
            MetricKind::Disk => &self.disk,
        }
    }
}

/// Why a detection verdict could not be computed normally
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleDiagnostic {
    /// The latest sample has a non-finite or out-of-range field
    MalformedSample,
    /// The supplied histories were empty
    NoSample,
    /// Scoring produced a non-finite value
    ScoringFailed,
}

impl std::fmt::Display for SampleDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleDiagnostic::MalformedSample => write!(f, "malformed_sample"),
            SampleDiagnostic::NoSample => write!(f, "no_sample"),
            SampleDiagnostic::ScoringFailed => write!(f, "scoring_failed"),
        }
    }
}

/// Verdict for the latest joint sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyResult {
    pub is_anomaly: bool,
    pub cpu: f64,
    pub memory: f64,
    pub disk: f64,
    /// Local wall-clock time of detection, `HH:MM:SS`
    pub detection_time: String,
    pub detected_at: DateTime<Utc>,
    /// Mahalanobis distance from the baseline mean
    pub score: Option<f64>,
    /// Threshold the score was compared against
    pub threshold: f64,
    /// Per-metric z-scores against the regularised baseline
    pub z_scores: Option<[f64; 3]>,
    /// Metric with the largest absolute z-score
    pub dominant_metric: Option<MetricKind>,
    pub diagnostic: Option<SampleDiagnostic>,
}

/// Summary of a completed training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub trained_at: DateTime<Utc>,
    /// Sample counter value recorded for the retrain cadence
    pub sample_count: usize,
    /// Valid joint rows the baseline was fitted on
    pub rows_used: usize,
    /// Rows dropped as malformed
    pub rows_skipped: usize,
    pub mean: [f64; 3],
    pub std_dev: [f64; 3],
    /// True when the full covariance could not be inverted
    pub diagonal_fallback: bool,
}
