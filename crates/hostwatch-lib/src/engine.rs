//! Per-sample analytics pipeline
//!
//! Runs threshold checks, the retrain cadence, anomaly detection,
//! forecasting and the usage summary against the history buffer after
//! each new sample.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::anomaly::{
    AlertConfig, AlertKind, AlertLog, AlertRecord, AnomalyDetector, DetectorConfig,
};
use crate::history::{AlignedHistory, SampleBuffer};
use crate::models::{AnomalyResult, PredictionResult, Sample, TrainingSummary};
use crate::predictor::{summarize, PredictorConfig, ResourcePredictor, UsageSummary};

/// Configuration for the whole analytics pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub predictor: PredictorConfig,
    pub detector: DetectorConfig,
    pub alerts: AlertConfig,
}

/// Everything produced by one analytics tick
#[derive(Debug, Clone, Default)]
pub struct TickOutcome {
    /// Set when the detector was (re)trained this tick
    pub trained: Option<TrainingSummary>,
    /// Verdict on the latest sample; `None` while untrained
    pub anomaly: Option<AnomalyResult>,
    pub prediction: Option<PredictionResult>,
    pub summary: Option<UsageSummary>,
    /// Alerts raised this tick
    pub alerts: Vec<AlertRecord>,
}

impl TickOutcome {
    pub fn threshold_alerts(&self) -> impl Iterator<Item = &AlertRecord> {
        self.alerts
            .iter()
            .filter(|a| a.kind == AlertKind::Threshold)
    }
}

/// Readiness of the published insights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightsStatus {
    /// Not enough history for forecasts yet
    Collecting,
    Ready,
}

/// Latest analytics state published to readers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightsSnapshot {
    pub status: InsightsStatus,
    pub updated_at: DateTime<Utc>,
    pub samples: usize,
    pub total_samples: usize,
    /// Samples needed before forecasts are produced
    pub required_samples: usize,
    pub latest: Option<Sample>,
    pub prediction: Option<PredictionResult>,
    pub anomaly: Option<AnomalyResult>,
    pub summary: Option<UsageSummary>,
    pub detector_trained: bool,
    pub last_training: Option<TrainingSummary>,
}

impl InsightsSnapshot {
    /// Snapshot for an agent that has not processed any sample
    pub fn collecting(required_samples: usize) -> Self {
        Self {
            status: InsightsStatus::Collecting,
            updated_at: Utc::now(),
            samples: 0,
            total_samples: 0,
            required_samples,
            latest: None,
            prediction: None,
            anomaly: None,
            summary: None,
            detector_trained: false,
            last_training: None,
        }
    }
}

/// Predictor, detector and alert log driven from a single owner
pub struct AnalyticsEngine {
    predictor: ResourcePredictor,
    detector: AnomalyDetector,
    alerts: AlertLog,
    last_training: Option<TrainingSummary>,
}

impl AnalyticsEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            predictor: ResourcePredictor::new(config.predictor),
            detector: AnomalyDetector::new(config.detector),
            alerts: AlertLog::new(config.alerts),
            last_training: None,
        }
    }

    pub fn predictor(&self) -> &ResourcePredictor {
        &self.predictor
    }

    pub fn detector(&self) -> &AnomalyDetector {
        &self.detector
    }

    pub fn alerts(&self) -> &AlertLog {
        &self.alerts
    }

    /// Process the newest sample in `buffer`
    ///
    /// Never fails: data conditions surface as empty fields in the outcome.
    pub fn tick(&mut self, buffer: &SampleBuffer) -> TickOutcome {
        let mut outcome = TickOutcome::default();

        if let Some(latest) = buffer.latest() {
            outcome.alerts.extend(self.alerts.check_thresholds(&latest));
        }

        let (cpu, memory, disk) = (
            buffer.cpu_history(),
            buffer.mem_history(),
            buffer.disk_history(),
        );

        if self.detector.should_train(buffer.total_samples()) {
            match self.detector.train(cpu, memory, disk) {
                Ok(summary) => {
                    self.last_training = Some(summary.clone());
                    outcome.trained = Some(summary);
                }
                Err(e) => warn!(error = %e, "Anomaly baseline training skipped"),
            }
        }

        if self.detector.is_trained() {
            match self.detector.detect_anomalies(cpu, memory, disk) {
                Ok(result) => {
                    if let Some(alert) = self.alerts.record_anomaly(&result) {
                        outcome.alerts.push(alert);
                    }
                    outcome.anomaly = Some(result);
                }
                Err(e) => warn!(error = %e, "Anomaly detection failed"),
            }
        }

        outcome.prediction = self.predictor.get_predictions(cpu, memory, disk);
        outcome.summary = summarize(&AlignedHistory::from(buffer));

        debug!(
            samples = buffer.len(),
            trained = outcome.trained.is_some(),
            predicted = outcome.prediction.is_some(),
            alerts = outcome.alerts.len(),
            "Analytics tick complete"
        );

        outcome
    }

    /// Build the published view of the latest tick
    pub fn snapshot(&self, buffer: &SampleBuffer, outcome: &TickOutcome) -> InsightsSnapshot {
        let status = if outcome.prediction.is_some() {
            InsightsStatus::Ready
        } else {
            InsightsStatus::Collecting
        };

        InsightsSnapshot {
            status,
            updated_at: Utc::now(),
            samples: buffer.len(),
            total_samples: buffer.total_samples(),
            required_samples: self.predictor.config().min_samples,
            latest: buffer.latest(),
            prediction: outcome.prediction.clone(),
            anomaly: outcome.anomaly.clone(),
            summary: outcome.summary.clone(),
            detector_trained: self.detector.is_trained(),
            last_training: self.last_training.clone(),
        }
    }
}

impl Default for AnalyticsEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
