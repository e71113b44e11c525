//! Agent configuration
//!
//! Read from an optional `hostwatch.toml` and `HOSTWATCH_*` environment
//! variables. Nested sections use `__` as separator, e.g.
//! `HOSTWATCH_DETECTOR__DISTANCE_THRESHOLD=3.5`.

use anyhow::{Context, Result};
use hostwatch_lib::anomaly::{AlertConfig, DetectorConfig};
use hostwatch_lib::history::DEFAULT_MAX_HISTORY;
use hostwatch_lib::predictor::PredictorConfig;
use hostwatch_lib::EngineConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Config file looked up in the working directory
const DEFAULT_CONFIG_FILE: &str = "hostwatch";

const ENV_PREFIX: &str = "HOSTWATCH";

/// Longest accepted notification cooldown (one week)
const MAX_NOTIFY_COOLDOWN_SECS: u64 = 7 * 24 * 60 * 60;

/// Agent configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Host name reported in logs
    pub host_name: String,

    /// API server port for health/metrics/insights
    pub api_port: u16,

    /// Sampling interval in milliseconds
    pub sample_interval_ms: u64,

    /// Samples kept in the history buffer
    pub max_history: usize,

    /// Mount point whose filesystem is reported as disk usage
    pub disk_mount: PathBuf,

    /// procfs root
    pub proc_path: PathBuf,

    pub predictor: PredictorConfig,
    pub detector: DetectorConfig,
    pub alerts: AlertConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            host_name: default_host_name(),
            api_port: 8080,
            sample_interval_ms: 1000,
            max_history: DEFAULT_MAX_HISTORY,
            disk_mount: PathBuf::from("/"),
            proc_path: PathBuf::from("/proc"),
            predictor: PredictorConfig::default(),
            detector: DetectorConfig::default(),
            alerts: AlertConfig::default(),
        }
    }
}

fn default_host_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}

impl AgentConfig {
    /// Load configuration, falling back to defaults when it cannot be read
    pub fn load() -> Self {
        match Self::load_from(Path::new(DEFAULT_CONFIG_FILE)) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "Failed to load configuration, using defaults");
                Self::default()
            }
        }
    }

    /// Load from `file` (extension optional, file may be absent) and the environment
    pub fn load_from(file: &Path) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from(file).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .context("Failed to read configuration sources")?;

        let config: Self = config
            .try_deserialize()
            .context("Invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.sample_interval_ms == 0 {
            anyhow::bail!("sample_interval_ms must be greater than zero");
        }
        if self.max_history == 0 {
            anyhow::bail!("max_history must be greater than zero");
        }
        let threshold = self.detector.distance_threshold;
        if !threshold.is_finite() || threshold <= 0.0 {
            anyhow::bail!("detector.distance_threshold must be positive");
        }
        let min_spread = self.detector.min_spread;
        if !min_spread.is_finite() || min_spread < 0.0 {
            anyhow::bail!("detector.min_spread must be a finite, non-negative number");
        }
        let thresholds = &self.alerts.thresholds;
        for (name, threshold) in [
            ("cpu", thresholds.cpu),
            ("memory", thresholds.memory),
            ("disk", thresholds.disk),
        ] {
            if !(0.0..=100.0).contains(&threshold) {
                anyhow::bail!("alerts.thresholds.{} must be within 0..=100", name);
            }
        }
        if self.alerts.notify_cooldown_secs > MAX_NOTIFY_COOLDOWN_SECS {
            anyhow::bail!(
                "alerts.notify_cooldown_secs must not exceed {}",
                MAX_NOTIFY_COOLDOWN_SECS
            );
        }
        Ok(())
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            predictor: self.predictor.clone(),
            detector: self.detector.clone(),
            alerts: self.alerts.clone(),
        }
    }
}
