//! Joint CPU/memory/disk anomaly detection
//!
//! Learns a Gaussian baseline from a recent training window and flags the
//! latest sample when its Mahalanobis distance exceeds a fixed threshold.
//! The detector is either untrained or trained; retraining replaces the
//! baseline wholesale.

use super::GaussianBaseline;
use crate::error::{AnalyticsError, AnalyticsResult};
use crate::history::AlignedHistory;
use crate::models::{
    is_valid_percent, AnomalyResult, MetricKind, Sample, SampleDiagnostic, TrainingSummary,
};
use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Samples required before the first training run
pub const MIN_TRAINING_SAMPLES: usize = 30;

/// New samples between retraining runs
pub const DEFAULT_RETRAIN_INTERVAL: usize = 60;

/// Most recent samples used for training
pub const DEFAULT_TRAINING_WINDOW: usize = 300;

/// Mahalanobis distance above which a sample is anomalous
///
/// About the 99.9th percentile of a 3-dimensional Gaussian.
pub const DEFAULT_DISTANCE_THRESHOLD: f64 = 4.0;

/// Spread floor per metric in percentage points
pub const DEFAULT_MIN_SPREAD: f64 = 1.0;

/// Fewest valid rows a baseline can be fitted on
const MIN_FIT_ROWS: usize = 2;

/// Configuration for the anomaly detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub min_training_samples: usize,
    pub retrain_interval: usize,
    pub training_window: usize,
    pub distance_threshold: f64,
    pub min_spread: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_training_samples: MIN_TRAINING_SAMPLES,
            retrain_interval: DEFAULT_RETRAIN_INTERVAL,
            training_window: DEFAULT_TRAINING_WINDOW,
            distance_threshold: DEFAULT_DISTANCE_THRESHOLD,
            min_spread: DEFAULT_MIN_SPREAD,
        }
    }
}

/// Trained baseline plus the bookkeeping for the retrain cadence
#[derive(Debug, Clone)]
struct DetectorModel {
    baseline: GaussianBaseline,
    trained_at_count: usize,
}

/// Unsupervised detector over joint (CPU%, memory%, disk%) samples
#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    config: DetectorConfig,
    model: Option<DetectorModel>,
    /// Count passed to the latest `should_train` call
    observed_count: Option<usize>,
    training_runs: u64,
}

impl AnomalyDetector {
    pub fn new(mut config: DetectorConfig) -> Self {
        config.min_training_samples = config.min_training_samples.max(MIN_FIT_ROWS);
        config.retrain_interval = config.retrain_interval.max(1);
        config.training_window = config.training_window.max(config.min_training_samples);

        Self {
            config,
            model: None,
            observed_count: None,
            training_runs: 0,
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn is_trained(&self) -> bool {
        self.model.is_some()
    }

    pub fn training_runs(&self) -> u64 {
        self.training_runs
    }

    /// Decide whether a (re)training run is due
    ///
    /// Depends only on `sample_count` and the count recorded by the last
    /// training run. A count lower than that record is treated as a
    /// restarted counter and triggers training.
    pub fn should_train(&mut self, sample_count: usize) -> bool {
        self.observed_count = Some(sample_count);

        if sample_count < self.config.min_training_samples {
            return false;
        }

        match &self.model {
            None => true,
            Some(model) if sample_count < model.trained_at_count => true,
            Some(model) => sample_count - model.trained_at_count >= self.config.retrain_interval,
        }
    }

    /// Fit a fresh baseline over the most recent training window
    ///
    /// Rows with a malformed field are skipped. On failure the previous
    /// model, if any, stays in place.
    pub fn train(
        &mut self,
        cpu_history: &[f64],
        mem_history: &[f64],
        disk_history: &[f64],
    ) -> AnalyticsResult<TrainingSummary> {
        let window = AlignedHistory::new(cpu_history, mem_history, disk_history)
            .tail(self.config.training_window);

        let rows: Vec<[f64; 3]> = window
            .rows()
            .filter(|row| row.iter().all(|v| is_valid_percent(*v)))
            .collect();
        let rows_skipped = window.len() - rows.len();

        if rows_skipped > 0 {
            debug!(rows_skipped, "Skipped malformed samples from training window");
        }

        let baseline = GaussianBaseline::fit(&rows, self.config.min_spread).ok_or(
            AnalyticsError::InsufficientData {
                available: rows.len(),
                required: MIN_FIT_ROWS,
            },
        )?;

        if baseline.diagonal_fallback() {
            warn!(
                rows = rows.len(),
                "Covariance not invertible, scoring with per-metric spread only"
            );
        }

        // Without a prior should_train() the window length anchors the cadence
        let trained_at_count = self.observed_count.unwrap_or(window.len());

        let summary = TrainingSummary {
            trained_at: Utc::now(),
            sample_count: trained_at_count,
            rows_used: rows.len(),
            rows_skipped,
            mean: baseline.mean(),
            std_dev: baseline.std_dev(),
            diagonal_fallback: baseline.diagonal_fallback(),
        };

        self.model = Some(DetectorModel {
            baseline,
            trained_at_count,
        });
        self.training_runs += 1;

        info!(
            rows = summary.rows_used,
            skipped = summary.rows_skipped,
            sample_count = summary.sample_count,
            "Anomaly baseline trained"
        );

        Ok(summary)
    }

    /// Classify the latest joint sample of the supplied histories
    pub fn detect_anomalies(
        &self,
        cpu_history: &[f64],
        mem_history: &[f64],
        disk_history: &[f64],
    ) -> AnalyticsResult<AnomalyResult> {
        let model = self.model.as_ref().ok_or(AnalyticsError::NotTrainedYet)?;

        let aligned = AlignedHistory::new(cpu_history, mem_history, disk_history);
        match aligned.last_row() {
            Some(row) => Ok(self.score(model, row)),
            None => Ok(self.diagnostic_result([f64::NAN; 3], SampleDiagnostic::NoSample)),
        }
    }

    /// Classify an arbitrary sample against the current baseline
    pub fn evaluate(&self, sample: &Sample) -> AnalyticsResult<AnomalyResult> {
        let model = self.model.as_ref().ok_or(AnalyticsError::NotTrainedYet)?;
        Ok(self.score(model, sample.as_array()))
    }

    fn score(&self, model: &DetectorModel, row: [f64; 3]) -> AnomalyResult {
        let sample = Sample::at(Utc::now(), row[0], row[1], row[2]);
        if !sample.is_valid() {
            debug!(cpu = row[0], memory = row[1], disk = row[2], "Latest sample is malformed");
            return self.diagnostic_result(row, SampleDiagnostic::MalformedSample);
        }

        let score = model.baseline.mahalanobis(&row);
        if !score.is_finite() {
            warn!("Anomaly score is not finite");
            return self.diagnostic_result(row, SampleDiagnostic::ScoringFailed);
        }

        let z_scores = model.baseline.z_scores(&row);
        let dominant_metric = MetricKind::ALL
            .iter()
            .zip(z_scores.iter())
            .max_by(|a, b| {
                a.1.abs()
                    .partial_cmp(&b.1.abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(metric, _)| *metric);

        AnomalyResult {
            is_anomaly: score > self.config.distance_threshold,
            cpu: row[0],
            memory: row[1],
            disk: row[2],
            detection_time: Local::now().format("%H:%M:%S").to_string(),
            detected_at: sample.timestamp,
            score: Some(score),
            threshold: self.config.distance_threshold,
            z_scores: Some(z_scores),
            dominant_metric,
            diagnostic: None,
        }
    }

    fn diagnostic_result(&self, row: [f64; 3], diagnostic: SampleDiagnostic) -> AnomalyResult {
        AnomalyResult {
            is_anomaly: false,
            cpu: row[0],
            memory: row[1],
            disk: row[2],
            detection_time: Local::now().format("%H:%M:%S").to_string(),
            detected_at: Utc::now(),
            score: None,
            threshold: self.config.distance_threshold,
            z_scores: None,
            dominant_metric: None,
            diagnostic: Some(diagnostic),
        }
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}
