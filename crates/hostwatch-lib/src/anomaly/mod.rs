//! Anomaly detection for joint resource usage
//!
//! This module provides:
//! - A Gaussian baseline of normal (CPU, memory, disk) behavior
//! - The trainable detector scoring samples against that baseline
//! - The alert log for threshold breaches and anomalies

mod alerter;
mod baseline;
mod detector;

pub use alerter::{
    AlertConfig, AlertKind, AlertLog, AlertRecord, AlertThresholds, DEFAULT_MAX_ALERTS,
    DEFAULT_MAX_RECENT_ANOMALIES,
};
pub use baseline::GaussianBaseline;
pub use detector::{
    AnomalyDetector, DetectorConfig, DEFAULT_DISTANCE_THRESHOLD, DEFAULT_MIN_SPREAD,
    DEFAULT_RETRAIN_INTERVAL, DEFAULT_TRAINING_WINDOW, MIN_TRAINING_SAMPLES,
};
