//! Alert log for threshold breaches and detected anomalies
//!
//! Handles:
//! - Static threshold checks per metric
//! - Formatting of alert messages
//! - Bounded alert and recent-anomaly history
//! - Notification cooldown: only the first alert inside the window is
//!   flagged for notification

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{AnomalyResult, MetricKind, Sample};

/// Alerts kept in the log
pub const DEFAULT_MAX_ALERTS: usize = 100;

/// Anomalies kept in the recent list
pub const DEFAULT_MAX_RECENT_ANOMALIES: usize = 20;

/// Notification cooldown (1 minute)
const DEFAULT_NOTIFY_COOLDOWN_SECS: u64 = 60;

/// Usage thresholds per metric, in percent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    pub cpu: f64,
    pub memory: f64,
    pub disk: f64,
}

impl AlertThresholds {
    pub fn for_metric(&self, metric: MetricKind) -> f64 {
        match metric {
            MetricKind::Cpu => self.cpu,
            MetricKind::Memory => self.memory,
            MetricKind::Disk => self.disk,
        }
    }
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            cpu: 80.0,
            memory: 80.0,
            disk: 90.0,
        }
    }
}

/// Alert log configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub thresholds: AlertThresholds,
    pub max_alerts: usize,
    pub max_recent_anomalies: usize,
    pub notify_cooldown_secs: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            thresholds: AlertThresholds::default(),
            max_alerts: DEFAULT_MAX_ALERTS,
            max_recent_anomalies: DEFAULT_MAX_RECENT_ANOMALIES,
            notify_cooldown_secs: DEFAULT_NOTIFY_COOLDOWN_SECS,
        }
    }
}

/// Alert classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Threshold,
    Anomaly,
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertKind::Threshold => write!(f, "threshold"),
            AlertKind::Anomaly => write!(f, "anomaly"),
        }
    }
}

/// A single logged alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub timestamp: DateTime<Utc>,
    pub kind: AlertKind,
    /// Metric that crossed its threshold; `None` for joint anomalies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<MetricKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    pub message: String,
    /// First alert of its cooldown window
    pub notify: bool,
}

/// Bounded alert history with notification cooldown
#[derive(Debug, Clone)]
pub struct AlertLog {
    config: AlertConfig,
    alerts: VecDeque<AlertRecord>,
    recent_anomalies: VecDeque<AnomalyResult>,
    last_notified: Option<DateTime<Utc>>,
    total_alerts: u64,
}

impl AlertLog {
    pub fn new(config: AlertConfig) -> Self {
        Self {
            alerts: VecDeque::with_capacity(config.max_alerts),
            recent_anomalies: VecDeque::with_capacity(config.max_recent_anomalies),
            config,
            last_notified: None,
            total_alerts: 0,
        }
    }

    pub fn config(&self) -> &AlertConfig {
        &self.config
    }

    /// Alerts logged since startup, including evicted ones
    pub fn total_alerts(&self) -> u64 {
        self.total_alerts
    }

    /// Check every metric of `sample` against its threshold
    ///
    /// Malformed readings never trigger a threshold alert.
    pub fn check_thresholds(&mut self, sample: &Sample) -> Vec<AlertRecord> {
        let clock = sample
            .timestamp
            .with_timezone(&Local)
            .format("%H:%M:%S")
            .to_string();

        MetricKind::ALL
            .iter()
            .filter_map(|&metric| {
                let value = sample.value(metric);
                let threshold = self.config.thresholds.for_metric(metric);
                if !value.is_finite() || value <= threshold {
                    return None;
                }

                let message = format!(
                    "[{}] WARNING: {} usage at {:.1}% exceeded threshold ({}%)",
                    clock, metric, value, threshold
                );
                Some(self.push(
                    AlertKind::Threshold,
                    sample.timestamp,
                    Some(metric),
                    Some(value),
                    message,
                ))
            })
            .collect()
    }

    /// Log an anomaly verdict
    ///
    /// Returns `None` for verdicts that are not anomalies.
    pub fn record_anomaly(&mut self, result: &AnomalyResult) -> Option<AlertRecord> {
        if !result.is_anomaly {
            return None;
        }

        if self.recent_anomalies.len() >= self.config.max_recent_anomalies {
            self.recent_anomalies.pop_front();
        }
        self.recent_anomalies.push_back(result.clone());

        let message = format!(
            "[{}] ANOMALY DETECTED: {} {:.1}%, {} {:.1}%, {} {:.1}%",
            result.detection_time,
            MetricKind::Cpu.short_label(),
            result.cpu,
            MetricKind::Memory.short_label(),
            result.memory,
            MetricKind::Disk.short_label(),
            result.disk
        );

        Some(self.push(
            AlertKind::Anomaly,
            result.detected_at,
            result.dominant_metric,
            result.score,
            message,
        ))
    }

    /// Most recent alerts, newest first
    pub fn recent(&self, limit: usize) -> Vec<AlertRecord> {
        self.alerts.iter().rev().take(limit).cloned().collect()
    }

    /// Most recent anomalies, newest first
    pub fn recent_anomalies(&self) -> Vec<AnomalyResult> {
        self.recent_anomalies.iter().rev().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    fn push(
        &mut self,
        kind: AlertKind,
        timestamp: DateTime<Utc>,
        metric: Option<MetricKind>,
        value: Option<f64>,
        message: String,
    ) -> AlertRecord {
        let record = AlertRecord {
            timestamp,
            kind,
            metric,
            value,
            message,
            notify: self.should_notify(timestamp),
        };

        if record.notify {
            self.last_notified = Some(timestamp);
        }

        if self.alerts.len() >= self.config.max_alerts {
            self.alerts.pop_front();
        }
        self.alerts.push_back(record.clone());
        self.total_alerts += 1;

        record
    }

    fn should_notify(&self, timestamp: DateTime<Utc>) -> bool {
        // Oversized cooldowns saturate
        let cooldown = i64::try_from(self.config.notify_cooldown_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);
        match self.last_notified {
            Some(last) => timestamp - last >= cooldown,
            None => true,
        }
    }
}

impl Default for AlertLog {
    fn default() -> Self {
        Self::new(AlertConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn anomaly(cpu: f64, memory: f64, disk: f64, secs: i64) -> AnomalyResult {
        AnomalyResult {
            is_anomaly: true,
            cpu,
            memory,
            disk,
            detection_time: "12:34:56".to_string(),
            detected_at: at(secs),
            score: Some(9.5),
            threshold: 4.0,
            z_scores: Some([9.0, 0.1, 0.2]),
            dominant_metric: Some(MetricKind::Cpu),
            diagnostic: None,
        }
    }

    #[test]
    fn test_threshold_alert_message() {
        let mut log = AlertLog::default();
        let sample = Sample::at(at(0), 91.2, 50.0, 40.0);

        let alerts = log.check_thresholds(&sample);

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::Threshold);
        assert_eq!(alerts[0].metric, Some(MetricKind::Cpu));
        assert!(alerts[0].message.starts_with('['));
        assert!(alerts[0]
            .message
            .ends_with("WARNING: CPU usage at 91.2% exceeded threshold (80%)"));
    }

    #[test]
    fn test_thresholds_are_exclusive() {
        let mut log = AlertLog::default();

        assert!(log.check_thresholds(&Sample::at(at(0), 80.0, 80.0, 90.0)).is_empty());
        assert_eq!(log.check_thresholds(&Sample::at(at(1), 85.0, 85.0, 95.0)).len(), 3);
        assert!(log.check_thresholds(&Sample::at(at(2), f64::NAN, 10.0, 10.0)).is_empty());
    }

    #[test]
    fn test_anomaly_alert_message() {
        let mut log = AlertLog::default();

        let alert = log.record_anomaly(&anomaly(99.0, 30.0, 40.0, 0)).unwrap();

        assert_eq!(
            alert.message,
            "[12:34:56] ANOMALY DETECTED: CPU 99.0%, MEM 30.0%, DISK 40.0%"
        );
        assert_eq!(log.recent_anomalies().len(), 1);
    }

    #[test]
    fn test_normal_verdict_is_not_logged() {
        let mut log = AlertLog::default();
        let mut normal = anomaly(20.0, 30.0, 40.0, 0);
        normal.is_anomaly = false;

        assert!(log.record_anomaly(&normal).is_none());
        assert!(log.is_empty());
        assert!(log.recent_anomalies().is_empty());
    }

    #[test]
    fn test_notify_cooldown() {
        let mut log = AlertLog::default();

        let first = log.record_anomaly(&anomaly(99.0, 30.0, 40.0, 0)).unwrap();
        let second = log.check_thresholds(&Sample::at(at(30), 95.0, 10.0, 10.0));
        let third = log.record_anomaly(&anomaly(98.0, 30.0, 40.0, 60)).unwrap();

        assert!(first.notify);
        assert!(!second[0].notify);
        assert!(third.notify);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_oversized_cooldown_saturates() {
        for secs in [10_000_000_000_000_000, u64::MAX] {
            let mut log = AlertLog::new(AlertConfig {
                notify_cooldown_secs: secs,
                ..Default::default()
            });

            let first = log.check_thresholds(&Sample::at(at(0), 95.0, 10.0, 10.0));
            let second = log.check_thresholds(&Sample::at(at(3600), 95.0, 10.0, 10.0));

            assert!(first[0].notify);
            assert!(!second[0].notify);
        }
    }

    #[test]
    fn test_log_is_bounded() {
        let config = AlertConfig {
            max_alerts: 5,
            max_recent_anomalies: 2,
            ..Default::default()
        };
        let mut log = AlertLog::new(config);

        for i in 0..8 {
            log.record_anomaly(&anomaly(90.0 + i as f64, 30.0, 40.0, i)).unwrap();
        }

        assert_eq!(log.len(), 5);
        assert_eq!(log.total_alerts(), 8);

        let recent = log.recent_anomalies();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].cpu, 97.0);
        assert_eq!(recent[1].cpu, 96.0);

        let newest = log.recent(2);
        assert_eq!(newest.len(), 2);
        assert!(newest[0].message.contains("CPU 97.0%"));
    }
}
