//! Analytics task and the shared state it publishes
//!
//! The task owns the history buffer and the analytics engine. After every
//! sample it publishes a fresh insights snapshot and the alert log for the
//! HTTP handlers to read.

use hostwatch_lib::anomaly::AlertRecord;
use hostwatch_lib::health::{components, HealthRegistry};
use hostwatch_lib::{
    AnalyticsEngine, AnomalyResult, HostwatchMetrics, InsightsSnapshot, Sample, SampleBuffer,
    StructuredLogger, TickOutcome,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, info};

use crate::config::AgentConfig;

/// Log every Nth prediction; one per minute at the default cadence
const PREDICTION_LOG_EVERY: u64 = 60;

/// Alert log view served by the API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertsView {
    /// Newest first
    pub alerts: Vec<AlertRecord>,
    /// Newest first
    pub recent_anomalies: Vec<AnomalyResult>,
    pub total_alerts: u64,
}

struct StoreInner {
    snapshot: InsightsSnapshot,
    alerts: AlertsView,
}

/// Latest published analytics state
#[derive(Clone)]
pub struct InsightsStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl InsightsStore {
    pub fn new(required_samples: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreInner {
                snapshot: InsightsSnapshot::collecting(required_samples),
                alerts: AlertsView::default(),
            })),
        }
    }

    pub async fn snapshot(&self) -> InsightsSnapshot {
        self.inner.read().await.snapshot.clone()
    }

    /// Alert log limited to the `limit` newest alerts
    pub async fn alerts(&self, limit: usize) -> AlertsView {
        let inner = self.inner.read().await;
        AlertsView {
            alerts: inner.alerts.alerts.iter().take(limit).cloned().collect(),
            recent_anomalies: inner.alerts.recent_anomalies.clone(),
            total_alerts: inner.alerts.total_alerts,
        }
    }

    async fn publish(&self, snapshot: InsightsSnapshot, alerts: Option<AlertsView>) {
        let mut inner = self.inner.write().await;
        inner.snapshot = snapshot;
        if let Some(alerts) = alerts {
            inner.alerts = alerts;
        }
    }
}

/// Owner of the buffer and engine, fed by the collection loop
pub struct AnalyticsTask {
    engine: AnalyticsEngine,
    buffer: SampleBuffer,
    store: InsightsStore,
    health: HealthRegistry,
    metrics: HostwatchMetrics,
    logger: StructuredLogger,
    predictions: u64,
    predictor_ready: bool,
    detector_ready: bool,
}

impl AnalyticsTask {
    pub fn new(
        config: &AgentConfig,
        store: InsightsStore,
        health: HealthRegistry,
        metrics: HostwatchMetrics,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            engine: AnalyticsEngine::new(config.engine_config()),
            buffer: SampleBuffer::new(config.max_history),
            store,
            health,
            metrics,
            logger,
            predictions: 0,
            predictor_ready: false,
            detector_ready: false,
        }
    }

    /// Process samples until shutdown or until the collection loop stops
    pub async fn run(
        mut self,
        mut samples: mpsc::Receiver<Sample>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        info!(capacity = self.buffer.capacity(), "Starting analytics task");

        loop {
            tokio::select! {
                sample = samples.recv() => match sample {
                    Some(sample) => {
                        self.process(sample).await;
                    }
                    None => {
                        info!("Sample channel closed, stopping analytics task");
                        break;
                    }
                },
                _ = shutdown.recv() => {
                    info!("Shutting down analytics task");
                    break;
                }
            }
        }
    }

    /// Run one analytics tick for `sample` and publish the result
    pub async fn process(&mut self, sample: Sample) -> TickOutcome {
        let start = Instant::now();

        self.buffer.push(sample);
        let outcome = self.engine.tick(&self.buffer);

        self.metrics.observe_tick_latency(start.elapsed().as_secs_f64());
        self.metrics.set_buffer_samples(self.buffer.len());
        self.report(&outcome).await;

        let alerts = (!outcome.alerts.is_empty()).then(|| AlertsView {
            alerts: self.engine.alerts().recent(usize::MAX),
            recent_anomalies: self.engine.alerts().recent_anomalies(),
            total_alerts: self.engine.alerts().total_alerts(),
        });
        let snapshot = self.engine.snapshot(&self.buffer, &outcome);
        self.store.publish(snapshot, alerts).await;

        outcome
    }

    async fn report(&mut self, outcome: &TickOutcome) {
        if let Some(summary) = &outcome.trained {
            self.metrics.inc_training_runs();
            self.logger.log_model_trained(summary);
        }

        if let Some(result) = &outcome.anomaly {
            self.metrics.record_anomaly_score(result);
            if result.is_anomaly {
                self.logger.log_anomaly(result);
            }
        }

        for alert in outcome.threshold_alerts() {
            self.metrics.inc_threshold_alerts();
            self.logger.log_threshold_alert(alert);
        }

        if let Some(prediction) = &outcome.prediction {
            self.metrics.inc_predictions_generated();
            if self.predictions % PREDICTION_LOG_EVERY == 0 {
                self.logger.log_prediction(prediction);
            }
            self.predictions += 1;
        }

        let predictor_ready = outcome.prediction.is_some();
        if predictor_ready != self.predictor_ready {
            self.predictor_ready = predictor_ready;
            if predictor_ready {
                self.health.set_healthy(components::PREDICTOR).await;
            } else {
                self.health
                    .set_degraded(components::PREDICTOR, "Collecting data for predictions")
                    .await;
            }
        }

        let detector_ready = self.engine.detector().is_trained();
        if detector_ready && !self.detector_ready {
            self.detector_ready = true;
            self.health.set_healthy(components::DETECTOR).await;
        }

        debug!(samples = self.buffer.len(), "Published insights");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostwatch_lib::anomaly::AlertKind;
    use hostwatch_lib::health::ComponentStatus;
    use hostwatch_lib::InsightsStatus;
    use std::time::Duration;

    async fn new_task() -> (AnalyticsTask, InsightsStore, HealthRegistry) {
        let config = AgentConfig::default();
        let store = InsightsStore::new(config.predictor.min_samples);
        let health = HealthRegistry::new();
        health
            .set_degraded(components::DETECTOR, "Collecting training data")
            .await;

        let task = AnalyticsTask::new(
            &config,
            store.clone(),
            health.clone(),
            HostwatchMetrics::new(),
            StructuredLogger::new("test-host"),
        );
        (task, store, health)
    }

    #[tokio::test]
    async fn test_store_starts_collecting() {
        let store = InsightsStore::new(10);

        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.status, InsightsStatus::Collecting);
        assert!(store.alerts(10).await.alerts.is_empty());
    }

    #[tokio::test]
    async fn test_process_publishes_snapshot() {
        let (mut task, store, health) = new_task().await;

        for _ in 0..9 {
            task.process(Sample::new(20.0, 30.0, 40.0)).await;
        }
        assert_eq!(store.snapshot().await.status, InsightsStatus::Collecting);
        assert_eq!(store.snapshot().await.samples, 9);

        task.process(Sample::new(20.0, 30.0, 40.0)).await;
        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.status, InsightsStatus::Ready);
        assert!(snapshot.prediction.is_some());

        let predictor = &health.health().await.components[components::PREDICTOR];
        assert_eq!(predictor.status, ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_detector_becomes_healthy_after_training() {
        let (mut task, store, health) = new_task().await;

        for _ in 0..30 {
            task.process(Sample::new(20.0, 30.0, 40.0)).await;
        }

        assert!(store.snapshot().await.detector_trained);
        let detector = &health.health().await.components[components::DETECTOR];
        assert_eq!(detector.status, ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_alerts_are_published_newest_first() {
        let (mut task, store, _) = new_task().await;

        task.process(Sample::new(85.0, 30.0, 40.0)).await;
        task.process(Sample::new(20.0, 30.0, 95.0)).await;

        let view = store.alerts(10).await;
        assert_eq!(view.total_alerts, 2);
        assert_eq!(view.alerts[0].kind, AlertKind::Threshold);
        assert!(view.alerts[0].message.contains("Disk usage at 95.0%"));
        assert!(view.alerts[1].message.contains("CPU usage at 85.0%"));

        assert_eq!(store.alerts(1).await.alerts.len(), 1);
    }

    #[tokio::test]
    async fn test_run_stops_when_channel_closes() {
        let (task, store, _) = new_task().await;
        let (tx, rx) = mpsc::channel(16);
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handle = tokio::spawn(task.run(rx, shutdown_rx));
        tx.send(Sample::new(10.0, 10.0, 10.0)).await.unwrap();
        drop(tx);

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(store.snapshot().await.total_samples, 1);
    }
}
