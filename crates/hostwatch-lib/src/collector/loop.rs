//! Sample collection loop
//!
//! Periodically samples the host at a fixed cadence and forwards each
//! sample over a channel. Read failures are counted and reported through
//! health and metrics; they never stop the loop.

use super::HostCollector;
use crate::health::{components, HealthRegistry};
use crate::models::Sample;
use crate::observability::HostwatchMetrics;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Consecutive failures after which the collector is reported unhealthy
const UNHEALTHY_AFTER_FAILURES: u32 = 5;

/// Configuration for the sample collection loop
#[derive(Debug, Clone)]
pub struct CollectionConfig {
    /// Sampling interval (default: 1 second)
    pub interval: Duration,
    /// Channel buffer size for collected samples
    pub buffer_size: usize,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            buffer_size: 1000,
        }
    }
}

/// Loop that samples the host on every tick
pub struct CollectionLoop {
    collector: Arc<dyn HostCollector>,
    config: CollectionConfig,
    sample_tx: mpsc::Sender<Sample>,
    health: Option<HealthRegistry>,
    metrics: Option<HostwatchMetrics>,
    consecutive_failures: u32,
}

impl CollectionLoop {
    pub fn new(
        collector: Arc<dyn HostCollector>,
        config: CollectionConfig,
    ) -> (Self, mpsc::Receiver<Sample>) {
        let (sample_tx, sample_rx) = mpsc::channel(config.buffer_size.max(1));

        let loop_instance = Self {
            collector,
            config,
            sample_tx,
            health: None,
            metrics: None,
            consecutive_failures: 0,
        };

        (loop_instance, sample_rx)
    }

    /// Run until shutdown is signalled or the receiver is dropped
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_ms = self.config.interval.as_millis() as u64,
            collector = self.collector.name(),
            "Starting sample collection loop"
        );

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut collection_count = 0u64;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !self.collect_once().await {
                        info!("Sample receiver closed, stopping collection loop");
                        break;
                    }

                    collection_count += 1;
                    if collection_count % 60 == 0 {
                        debug!(
                            collected = collection_count,
                            failures = self.consecutive_failures,
                            "Collection progress"
                        );
                    }
                }
                _ = shutdown.recv() => {
                    info!("Shutting down sample collection loop");
                    break;
                }
            }
        }
    }

    /// Take and forward one sample
    ///
    /// Returns false once the receiving side has gone away.
    async fn collect_once(&mut self) -> bool {
        let start = Instant::now();
        let result = self.collector.collect().await;

        if let Some(metrics) = &self.metrics {
            metrics.observe_collection_latency(start.elapsed().as_secs_f64());
        }

        match result {
            Ok(sample) => {
                if self.consecutive_failures > 0 {
                    info!(
                        failures = self.consecutive_failures,
                        "Host sampling recovered"
                    );
                    self.consecutive_failures = 0;
                    if let Some(health) = &self.health {
                        health.set_healthy(components::COLLECTOR).await;
                    }
                }

                if let Some(metrics) = &self.metrics {
                    metrics.record_sample(&sample);
                }

                if let Err(e) = self.sample_tx.send(sample).await {
                    warn!(error = %e, "Failed to send sample to channel");
                    return false;
                }
            }
            Err(e) => {
                self.consecutive_failures += 1;
                warn!(
                    error = %e,
                    failures = self.consecutive_failures,
                    "Failed to sample host usage"
                );

                if let Some(metrics) = &self.metrics {
                    metrics.inc_collection_errors();
                }
                if let Some(health) = &self.health {
                    let message = format!(
                        "{} consecutive read failures: {}",
                        self.consecutive_failures, e
                    );
                    if self.consecutive_failures >= UNHEALTHY_AFTER_FAILURES {
                        health.set_unhealthy(components::COLLECTOR, message).await;
                    } else {
                        health.set_degraded(components::COLLECTOR, message).await;
                    }
                }
            }
        }

        true
    }
}

/// Builder for creating the collection loop
pub struct CollectionLoopBuilder {
    collector: Option<Arc<dyn HostCollector>>,
    config: CollectionConfig,
    health: Option<HealthRegistry>,
    metrics: Option<HostwatchMetrics>,
}

impl CollectionLoopBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            collector: None,
            config: CollectionConfig::default(),
            health: None,
            metrics: None,
        }
    }

    pub fn collector(mut self, collector: Arc<dyn HostCollector>) -> Self {
        self.collector = Some(collector);
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    pub fn buffer_size(mut self, size: usize) -> Self {
        self.config.buffer_size = size;
        self
    }

    /// Report collector health into `registry`
    pub fn health(mut self, registry: HealthRegistry) -> Self {
        self.health = Some(registry);
        self
    }

    pub fn metrics(mut self, metrics: HostwatchMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> Result<(CollectionLoop, mpsc::Receiver<Sample>)> {
        let collector = self
            .collector
            .ok_or_else(|| anyhow::anyhow!("Collector is required"))?;

        if self.config.interval.is_zero() {
            anyhow::bail!("Collection interval must be greater than zero");
        }

        let (mut collection_loop, rx) = CollectionLoop::new(collector, self.config);
        collection_loop.health = self.health;
        collection_loop.metrics = self.metrics;

        Ok((collection_loop, rx))
    }
}

impl Default for CollectionLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::ComponentStatus;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Collector that fails on the call indices in `failing`
    struct MockCollector {
        call_count: AtomicUsize,
        failing: Vec<usize>,
    }

    impl MockCollector {
        fn new() -> Self {
            Self::failing_on(vec![])
        }

        fn failing_on(failing: Vec<usize>) -> Self {
            Self {
                call_count: AtomicUsize::new(0),
                failing,
            }
        }
    }

    #[async_trait]
    impl HostCollector for MockCollector {
        async fn collect(&self) -> Result<Sample> {
            let call = self.call_count.fetch_add(1, Ordering::SeqCst);
            if self.failing.contains(&call) {
                anyhow::bail!("simulated read failure");
            }
            Ok(Sample::new(10.0 + call as f64, 50.0, 70.0))
        }

        fn name(&self) -> &'static str {
            "mock"
        }
    }

    #[test]
    fn test_collection_config_default() {
        let config = CollectionConfig::default();
        assert_eq!(config.interval, Duration::from_secs(1));
        assert_eq!(config.buffer_size, 1000);
    }

    #[tokio::test]
    async fn test_builder_requires_collector() {
        assert!(CollectionLoopBuilder::new().build().is_err());

        let result = CollectionLoopBuilder::new()
            .collector(Arc::new(MockCollector::new()))
            .interval(Duration::from_millis(500))
            .build();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_builder_rejects_zero_interval() {
        let result = CollectionLoopBuilder::new()
            .collector(Arc::new(MockCollector::new()))
            .interval(Duration::ZERO)
            .build();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_collect_once_forwards_sample() {
        let (mut collection_loop, mut rx) =
            CollectionLoop::new(Arc::new(MockCollector::new()), CollectionConfig::default());

        assert!(collection_loop.collect_once().await);

        let sample = rx.try_recv().unwrap();
        assert_eq!(sample.cpu_percent, 10.0);
        assert_eq!(sample.disk_percent, 70.0);
    }

    #[tokio::test]
    async fn test_failures_degrade_then_recover() {
        let health = HealthRegistry::new();
        health.register(components::COLLECTOR).await;

        let (mut collection_loop, mut rx) = CollectionLoopBuilder::new()
            .collector(Arc::new(MockCollector::failing_on(vec![0])))
            .health(health.clone())
            .build()
            .unwrap();

        assert!(collection_loop.collect_once().await);
        assert!(rx.try_recv().is_err());
        let status = health.health().await.components[components::COLLECTOR].status;
        assert_eq!(status, ComponentStatus::Degraded);

        assert!(collection_loop.collect_once().await);
        assert!(rx.try_recv().is_ok());
        let status = health.health().await.components[components::COLLECTOR].status;
        assert_eq!(status, ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_repeated_failures_are_unhealthy() {
        let health = HealthRegistry::new();
        let (mut collection_loop, _rx) = CollectionLoopBuilder::new()
            .collector(Arc::new(MockCollector::failing_on((0..10).collect())))
            .health(health.clone())
            .build()
            .unwrap();

        for _ in 0..UNHEALTHY_AFTER_FAILURES {
            assert!(collection_loop.collect_once().await);
        }

        let status = health.health().await.components[components::COLLECTOR].status;
        assert_eq!(status, ComponentStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_closed_receiver_stops_collection() {
        let (mut collection_loop, rx) =
            CollectionLoop::new(Arc::new(MockCollector::new()), CollectionConfig::default());
        drop(rx);

        assert!(!collection_loop.collect_once().await);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let (collection_loop, mut rx) = CollectionLoopBuilder::new()
            .collector(Arc::new(MockCollector::new()))
            .interval(Duration::from_millis(10))
            .build()
            .unwrap();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handle = tokio::spawn(collection_loop.run(shutdown_rx));

        let first = rx.recv().await.unwrap();
        assert_eq!(first.cpu_percent, 10.0);

        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
