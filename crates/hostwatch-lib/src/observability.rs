//! Observability infrastructure for the hostwatch agent
//!
//! Provides:
//! - Prometheus metrics (collection and tick latency, buffer size, analytics counters)
//! - Structured JSON logging with tracing

use prometheus::{
    register_gauge, register_gauge_vec, register_histogram, register_int_counter,
    register_int_gauge, Gauge, GaugeVec, Histogram, IntCounter, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

use crate::anomaly::AlertRecord;
use crate::models::{AnomalyResult, MetricKind, PredictionResult, Sample, TrainingSummary};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<HostwatchMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct HostwatchMetricsInner {
    collection_latency_seconds: Histogram,
    tick_latency_seconds: Histogram,
    buffer_samples: IntGauge,
    usage_percent: GaugeVec,
    samples_collected: IntCounter,
    collection_errors: IntCounter,
    training_runs: IntCounter,
    predictions_generated: IntCounter,
    anomalies_detected: IntCounter,
    threshold_alerts: IntCounter,
    last_anomaly_score: Gauge,
}

impl HostwatchMetricsInner {
    fn new() -> Self {
        Self {
            collection_latency_seconds: register_histogram!(
                "hostwatch_collection_latency_seconds",
                "Time spent reading CPU, memory and disk usage",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register collection_latency_seconds"),

            tick_latency_seconds: register_histogram!(
                "hostwatch_tick_latency_seconds",
                "Time spent running the analytics for one sample",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register tick_latency_seconds"),

            buffer_samples: register_int_gauge!(
                "hostwatch_buffer_samples",
                "Number of samples in the history buffer"
            )
            .expect("Failed to register buffer_samples"),

            usage_percent: register_gauge_vec!(
                "hostwatch_usage_percent",
                "Latest usage reading per metric",
                &["metric"]
            )
            .expect("Failed to register usage_percent"),

            samples_collected: register_int_counter!(
                "hostwatch_samples_collected_total",
                "Total number of samples collected"
            )
            .expect("Failed to register samples_collected"),

            collection_errors: register_int_counter!(
                "hostwatch_collection_errors_total",
                "Total number of failed usage reads"
            )
            .expect("Failed to register collection_errors"),

            training_runs: register_int_counter!(
                "hostwatch_training_runs_total",
                "Total number of anomaly baseline training runs"
            )
            .expect("Failed to register training_runs"),

            predictions_generated: register_int_counter!(
                "hostwatch_predictions_generated_total",
                "Total number of predictions generated"
            )
            .expect("Failed to register predictions_generated"),

            anomalies_detected: register_int_counter!(
                "hostwatch_anomalies_detected_total",
                "Total number of anomalies detected"
            )
            .expect("Failed to register anomalies_detected"),

            threshold_alerts: register_int_counter!(
                "hostwatch_threshold_alerts_total",
                "Total number of threshold alerts raised"
            )
            .expect("Failed to register threshold_alerts"),

            last_anomaly_score: register_gauge!(
                "hostwatch_last_anomaly_score",
                "Mahalanobis distance of the latest scored sample"
            )
            .expect("Failed to register last_anomaly_score"),
        }
    }
}

/// Hostwatch metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct HostwatchMetrics {
    _private: (),
}

impl Default for HostwatchMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl HostwatchMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(HostwatchMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &HostwatchMetricsInner {
        GLOBAL_METRICS.get_or_init(HostwatchMetricsInner::new)
    }

    pub fn observe_collection_latency(&self, duration_secs: f64) {
        self.inner().collection_latency_seconds.observe(duration_secs);
    }

    pub fn observe_tick_latency(&self, duration_secs: f64) {
        self.inner().tick_latency_seconds.observe(duration_secs);
    }

    pub fn set_buffer_samples(&self, items: usize) {
        self.inner().buffer_samples.set(items as i64);
    }

    /// Record a collected sample and publish its readings
    pub fn record_sample(&self, sample: &Sample) {
        let inner = self.inner();
        inner.samples_collected.inc();
        for metric in MetricKind::ALL {
            let label = metric.to_string().to_lowercase();
            inner
                .usage_percent
                .with_label_values(&[label.as_str()])
                .set(sample.value(metric));
        }
    }

    pub fn inc_collection_errors(&self) {
        self.inner().collection_errors.inc();
    }

    pub fn inc_training_runs(&self) {
        self.inner().training_runs.inc();
    }

    pub fn inc_predictions_generated(&self) {
        self.inner().predictions_generated.inc();
    }

    pub fn inc_threshold_alerts(&self) {
        self.inner().threshold_alerts.inc();
    }

    /// Record a scored sample, counting it when anomalous
    pub fn record_anomaly_score(&self, result: &AnomalyResult) {
        if let Some(score) = result.score {
            self.inner().last_anomaly_score.set(score);
        }
        if result.is_anomaly {
            self.inner().anomalies_detected.inc();
        }
    }
}

/// Structured logger for agent events
///
/// Provides consistent JSON-formatted logging for predictions,
/// anomalies, and other significant events.
#[derive(Clone)]
pub struct StructuredLogger {
    host_name: String,
}

impl StructuredLogger {
    pub fn new(host_name: impl Into<String>) -> Self {
        Self {
            host_name: host_name.into(),
        }
    }

    /// Log a prediction generation event
    pub fn log_prediction(&self, prediction: &PredictionResult) {
        info!(
            event = "prediction_generated",
            host = %self.host_name,
            method = %prediction.method,
            cpu_next = ?prediction.cpu.next(),
            cpu_trend = %prediction.cpu.trend,
            memory_next = ?prediction.memory.next(),
            memory_trend = %prediction.memory.trend,
            disk_next = ?prediction.disk.next(),
            disk_trend = %prediction.disk.trend,
            "Generated resource prediction"
        );
    }

    /// Log a completed training run
    pub fn log_model_trained(&self, summary: &TrainingSummary) {
        info!(
            event = "model_trained",
            host = %self.host_name,
            sample_count = summary.sample_count,
            rows_used = summary.rows_used,
            rows_skipped = summary.rows_skipped,
            mean = ?summary.mean,
            std_dev = ?summary.std_dev,
            diagonal_fallback = summary.diagonal_fallback,
            "Anomaly baseline retrained"
        );
    }

    /// Log an anomaly detection event
    pub fn log_anomaly(&self, result: &AnomalyResult) {
        warn!(
            event = "anomaly_detected",
            host = %self.host_name,
            cpu = result.cpu,
            memory = result.memory,
            disk = result.disk,
            score = ?result.score,
            threshold = result.threshold,
            dominant_metric = ?result.dominant_metric,
            detection_time = %result.detection_time,
            "Anomalous resource usage detected"
        );
    }

    /// Log a threshold breach
    pub fn log_threshold_alert(&self, alert: &AlertRecord) {
        warn!(
            event = "threshold_alert",
            host = %self.host_name,
            metric = ?alert.metric,
            value = ?alert.value,
            notify = alert.notify,
            message = %alert.message,
            "Usage threshold exceeded"
        );
    }

    /// Log agent startup
    pub fn log_startup(&self, version: &str, sample_interval_ms: u64) {
        info!(
            event = "agent_started",
            host = %self.host_name,
            agent_version = %version,
            sample_interval_ms = sample_interval_ms,
            "Hostwatch agent started"
        );
    }

    /// Log agent shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            host = %self.host_name,
            reason = %reason,
            "Hostwatch agent shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_handles_share_registry() {
        let metrics = HostwatchMetrics::new();
        let other = metrics.clone();

        metrics.observe_collection_latency(0.001);
        metrics.observe_tick_latency(0.002);
        metrics.set_buffer_samples(10);
        metrics.record_sample(&Sample::new(10.0, 20.0, 30.0));
        other.inc_collection_errors();
        other.inc_training_runs();
        other.inc_predictions_generated();
        other.inc_threshold_alerts();

        let families = prometheus::gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "hostwatch_samples_collected_total"));
        assert!(families
            .iter()
            .any(|f| f.get_name() == "hostwatch_usage_percent"));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("test-host");
        assert_eq!(logger.host_name, "test-host");
    }
}
