//! Rolling-window resource predictor
//!
//! Fits an independent trend per metric over the most recent window of
//! the history buffer and extrapolates it to the configured horizons.
//! Every call is a pure function of its input sequences; the cached last
//! result only short-circuits identical windows.

use super::{HoltTrend, LinearTrend, TrendFit, TrendModel};
use crate::history::AlignedHistory;
use crate::models::{
    clamp_percent, is_valid_percent, HorizonForecast, MetricForecast, MetricKind,
    PredictionResult, TrendDirection,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tracing::{debug, warn};

/// Minimum number of samples required before forecasting
pub const MIN_SAMPLES: usize = 10;

/// Default fit window (one minute at 1 Hz)
pub const DEFAULT_WINDOW_SIZE: usize = 60;

/// Slope magnitude (points per tick) below which a metric counts as stable
pub const STABLE_SLOPE: f64 = 0.05;

/// Trend fitting method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastMethod {
    /// Ordinary least squares
    #[default]
    Linear,
    /// Double exponential smoothing
    Holt,
}

/// Configuration for the resource predictor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    /// Samples required before any forecast is produced
    pub min_samples: usize,
    /// Most recent samples used for each fit
    pub window_size: usize,
    /// Ticks ahead to forecast, in ascending order
    pub horizons: Vec<usize>,
    pub method: ForecastMethod,
    /// Slope magnitude below which a metric counts as stable
    pub stable_slope: f64,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            min_samples: MIN_SAMPLES,
            window_size: DEFAULT_WINDOW_SIZE,
            horizons: vec![1, 5, 15],
            method: ForecastMethod::Linear,
            stable_slope: STABLE_SLOPE,
        }
    }
}

/// Cached state of the last fit
#[derive(Debug, Default)]
pub struct PredictorState {
    /// Last fitted coefficients, in cpu/memory/disk order
    pub last_fits: Option<[TrendFit; 3]>,
    last_fingerprint: Option<u64>,
    last_prediction: Option<PredictionResult>,
    /// Fits actually computed (cache hits excluded)
    pub fits_computed: u64,
    pub cache_hits: u64,
}

/// Short-horizon forecaster for CPU, memory and disk usage
pub struct ResourcePredictor {
    config: PredictorConfig,
    model: Box<dyn TrendModel>,
    state: PredictorState,
}

impl ResourcePredictor {
    pub fn new(config: PredictorConfig) -> Self {
        let model: Box<dyn TrendModel> = match config.method {
            ForecastMethod::Linear => Box::new(LinearTrend),
            ForecastMethod::Holt => Box::new(HoltTrend::default()),
        };
        Self::with_model(config, model)
    }

    /// Create a predictor with a custom trend model
    pub fn with_model(mut config: PredictorConfig, model: Box<dyn TrendModel>) -> Self {
        config.min_samples = config.min_samples.max(1);
        config.window_size = config.window_size.max(config.min_samples);
        config.horizons.sort_unstable();
        config.horizons.dedup();
        if config.horizons.is_empty() {
            config.horizons.push(1);
        }

        Self {
            config,
            model,
            state: PredictorState::default(),
        }
    }

    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    pub fn state(&self) -> &PredictorState {
        &self.state
    }

    /// Check if enough aligned history exists to forecast
    pub fn has_sufficient_data(&self, cpu: &[f64], memory: &[f64], disk: &[f64]) -> bool {
        AlignedHistory::new(cpu, memory, disk).len() >= self.config.min_samples
    }

    /// Forecast each metric at every configured horizon
    ///
    /// Returns `None` while history is shorter than the minimum, or when a
    /// metric has no valid reading inside the fit window.
    pub fn get_predictions(
        &mut self,
        cpu_history: &[f64],
        mem_history: &[f64],
        disk_history: &[f64],
    ) -> Option<PredictionResult> {
        let aligned = AlignedHistory::new(cpu_history, mem_history, disk_history);
        if aligned.len() < self.config.min_samples {
            debug!(
                samples = aligned.len(),
                required = self.config.min_samples,
                "Collecting data for predictions"
            );
            return None;
        }

        let window = aligned.tail(self.config.window_size);
        let series: [Vec<f64>; 3] =
            MetricKind::ALL.map(|metric| valid_values(window.metric(metric)));

        if let Some(metric) = MetricKind::ALL
            .iter()
            .zip(series.iter())
            .find(|(_, values)| values.is_empty())
            .map(|(metric, _)| *metric)
        {
            debug!(%metric, "No valid readings in prediction window");
            return None;
        }

        let fingerprint = fingerprint(&series);
        if self.state.last_fingerprint == Some(fingerprint) {
            if let Some(cached) = &self.state.last_prediction {
                self.state.cache_hits += 1;
                return Some(cached.clone());
            }
        }

        let [cpu, memory, disk] =
            [0, 1, 2].map(|i| self.forecast_metric(MetricKind::ALL[i], &series[i]));

        self.state.last_fits = Some([cpu.1, memory.1, disk.1]);
        self.state.fits_computed += 1;

        let result = PredictionResult {
            generated_at: Utc::now(),
            method: self.model.name().to_string(),
            cpu: cpu.0,
            memory: memory.0,
            disk: disk.0,
        };

        self.state.last_fingerprint = Some(fingerprint);
        self.state.last_prediction = Some(result.clone());

        Some(result)
    }

    /// Fit and extrapolate a single metric, degrading to the last value
    fn forecast_metric(&self, metric: MetricKind, values: &[f64]) -> (MetricForecast, TrendFit) {
        // Callers guarantee at least one valid value
        let current = values.last().copied().unwrap_or_default();

        let (fit, fallback) = match self.model.fit(values) {
            Some(fit) if fit.is_finite() => (fit, false),
            _ => {
                warn!(%metric, samples = values.len(), "Trend fit failed, repeating last value");
                (TrendFit::constant(current), true)
            }
        };

        let mut fallback = fallback;
        let horizons = self
            .config
            .horizons
            .iter()
            .map(|&ticks| {
                let raw = fit.forecast(ticks);
                let value = if raw.is_finite() {
                    clamp_percent(raw)
                } else {
                    fallback = true;
                    current
                };
                HorizonForecast { ticks, value }
            })
            .collect();

        let trend = if fit.slope.abs() < self.config.stable_slope {
            TrendDirection::Stable
        } else if fit.slope > 0.0 {
            TrendDirection::Increasing
        } else {
            TrendDirection::Decreasing
        };

        let forecast = MetricForecast {
            metric,
            current,
            horizons,
            slope: fit.slope,
            r_squared: fit.r_squared,
            trend,
            samples_used: values.len(),
            fallback,
        };

        (forecast, fit)
    }
}

impl Default for ResourcePredictor {
    fn default() -> Self {
        Self::new(PredictorConfig::default())
    }
}

/// Drop non-finite and out-of-range readings, preserving order
fn valid_values(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| is_valid_percent(*v)).collect()
}

fn fingerprint(series: &[Vec<f64>; 3]) -> u64 {
    let mut hasher = DefaultHasher::new();
    for values in series {
        values.len().hash(&mut hasher);
        for value in values {
            value.to_bits().hash(&mut hasher);
        }
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(start: f64, step: f64, count: usize) -> Vec<f64> {
        (0..count).map(|i| start + step * i as f64).collect()
    }

    /// Trend model that always returns the same fit
    struct FixedTrend(Option<TrendFit>);

    impl TrendModel for FixedTrend {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn fit(&self, _values: &[f64]) -> Option<TrendFit> {
            self.0
        }
    }

    fn assert_repeats_last_value(fit: Option<TrendFit>) {
        let mut predictor =
            ResourcePredictor::with_model(PredictorConfig::default(), Box::new(FixedTrend(fit)));
        let cpu = ramp(10.0, 1.0, 10);
        let flat = vec![30.0; 10];

        let result = predictor.get_predictions(&cpu, &flat, &flat).unwrap();

        for (metric, last) in [(MetricKind::Cpu, 19.0), (MetricKind::Memory, 30.0)] {
            let forecast = result.metric(metric);
            assert!(forecast.fallback, "{} did not fall back", metric);
            assert_eq!(forecast.current, last);
            assert_eq!(forecast.horizons.len(), 3);
            for horizon in &forecast.horizons {
                assert_eq!(horizon.value, last);
                assert!((0.0..=100.0).contains(&horizon.value));
            }
        }
    }

    #[test]
    fn test_insufficient_samples() {
        let mut predictor = ResourcePredictor::default();
        let values = vec![50.0; 9];

        assert!(!predictor.has_sufficient_data(&values, &values, &values));
        assert!(predictor.get_predictions(&values, &values, &values).is_none());
    }

    #[test]
    fn test_prediction_at_exact_threshold() {
        let mut predictor = ResourcePredictor::default();
        let values = vec![50.0; MIN_SAMPLES];

        assert!(predictor.get_predictions(&values, &values, &values).is_some());
    }

    #[test]
    fn test_linear_ramp_next_step() {
        let mut predictor = ResourcePredictor::default();
        let cpu = ramp(10.0, 1.0, 10);
        let flat = vec![30.0; 10];

        let result = predictor.get_predictions(&cpu, &flat, &flat).unwrap();
        let next = result.cpu.next().unwrap();

        assert!((next - 20.0).abs() <= 1.0, "next-step forecast was {}", next);
        assert!(next <= 100.0);
        assert_eq!(result.cpu.trend, TrendDirection::Increasing);
        assert_eq!(result.memory.trend, TrendDirection::Stable);
    }

    #[test]
    fn test_forecasts_are_clamped() {
        let mut predictor = ResourcePredictor::default();
        let rising = ramp(60.0, 4.0, 10); // reaches 96, extrapolates past 100
        let falling = ramp(40.0, -4.0, 10); // reaches 4, extrapolates below 0
        let steep = ramp(0.0, 11.0, 10);

        let result = predictor.get_predictions(&rising, &falling, &steep).unwrap();

        for metric in MetricKind::ALL {
            for horizon in &result.metric(metric).horizons {
                assert!(
                    (0.0..=100.0).contains(&horizon.value),
                    "{} forecast out of range: {}",
                    metric,
                    horizon.value
                );
            }
        }
        assert_eq!(result.cpu.at(15), Some(100.0));
        assert_eq!(result.memory.at(15), Some(0.0));
    }

    #[test]
    fn test_zero_variance_predicts_constant() {
        let mut predictor = ResourcePredictor::default();
        let constant = vec![37.5; 30];

        let result = predictor
            .get_predictions(&constant, &constant, &constant)
            .unwrap();

        for horizon in &result.cpu.horizons {
            assert!((horizon.value - 37.5).abs() < 1e-9);
        }
        assert!(!result.cpu.fallback);
        assert_eq!(result.cpu.trend, TrendDirection::Stable);
    }

    #[test]
    fn test_failed_fit_repeats_last_value() {
        assert_repeats_last_value(None);
    }

    #[test]
    fn test_non_finite_fit_repeats_last_value() {
        assert_repeats_last_value(Some(TrendFit {
            level: f64::NAN,
            slope: 1.0,
            r_squared: 0.5,
        }));
    }

    #[test]
    fn test_overflowing_extrapolation_repeats_last_value() {
        assert_repeats_last_value(Some(TrendFit {
            level: f64::MAX,
            slope: f64::MAX,
            r_squared: 1.0,
        }));
    }

    #[test]
    fn test_unequal_lengths_are_truncated() {
        let mut predictor = ResourcePredictor::default();
        let cpu = vec![20.0; 12];
        let memory = vec![30.0; 9];
        let disk = vec![40.0; 15];

        // Common length is 9, below the threshold
        assert!(predictor.get_predictions(&cpu, &memory, &disk).is_none());
    }

    #[test]
    fn test_malformed_samples_do_not_poison_forecast() {
        let mut predictor = ResourcePredictor::default();
        let mut cpu = vec![25.0; 15];
        cpu[5] = f64::NAN;
        cpu[14] = 250.0;
        let flat = vec![10.0; 15];

        let result = predictor.get_predictions(&cpu, &flat, &flat).unwrap();

        assert_eq!(result.cpu.current, 25.0);
        assert_eq!(result.cpu.samples_used, 13);
        assert!(result.cpu.horizons.iter().all(|h| h.value.is_finite()));
    }

    #[test]
    fn test_all_malformed_metric_yields_none() {
        let mut predictor = ResourcePredictor::default();
        let broken = vec![f64::INFINITY; 12];
        let flat = vec![10.0; 12];

        assert!(predictor.get_predictions(&flat, &broken, &flat).is_none());
    }

    #[test]
    fn test_window_limits_fit() {
        let config = PredictorConfig {
            window_size: 20,
            ..Default::default()
        };
        let mut predictor = ResourcePredictor::new(config);

        // Old ramp followed by a flat plateau; only the plateau is in the window
        let mut cpu = ramp(0.0, 2.0, 40);
        cpu.extend(vec![50.0; 20]);
        let flat = vec![10.0; 60];

        let result = predictor.get_predictions(&cpu, &flat, &flat).unwrap();
        assert_eq!(result.cpu.samples_used, 20);
        assert!((result.cpu.next().unwrap() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_repeated_call_hits_cache() {
        let mut predictor = ResourcePredictor::default();
        let cpu = ramp(10.0, 0.5, 30);
        let flat = vec![10.0; 30];

        let first = predictor.get_predictions(&cpu, &flat, &flat).unwrap();
        let second = predictor.get_predictions(&cpu, &flat, &flat).unwrap();

        assert_eq!(first, second);
        assert_eq!(predictor.state().fits_computed, 1);
        assert_eq!(predictor.state().cache_hits, 1);
        assert!(predictor.state().last_fits.is_some());
    }

    #[test]
    fn test_holt_method() {
        let config = PredictorConfig {
            method: ForecastMethod::Holt,
            ..Default::default()
        };
        let mut predictor = ResourcePredictor::new(config);
        let cpu = ramp(10.0, 1.0, 10);
        let flat = vec![30.0; 10];

        let result = predictor.get_predictions(&cpu, &flat, &flat).unwrap();
        assert_eq!(result.method, "holt");
        assert!((result.cpu.next().unwrap() - 20.0).abs() <= 1.0);
    }

    #[test]
    fn test_horizons_are_normalized() {
        let config = PredictorConfig {
            horizons: vec![15, 1, 5, 5],
            ..Default::default()
        };
        let predictor = ResourcePredictor::new(config);
        assert_eq!(predictor.config().horizons, vec![1, 5, 15]);
    }
}
