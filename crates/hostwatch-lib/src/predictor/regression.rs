//! Trend models used for short-horizon extrapolation
//!
//! Both models reduce a window of values to a level at the last observed
//! tick plus a per-tick slope, so forecasting is a single expression
//! regardless of the fitting method.

use super::TrendModel;

/// Smoothing factor for the level in Holt's method
const HOLT_ALPHA: f64 = 0.5;

/// Smoothing factor for the trend in Holt's method
const HOLT_BETA: f64 = 0.3;

/// Fitted trend for one metric
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendFit {
    /// Fitted value at the last observed tick
    pub level: f64,
    /// Change per tick
    pub slope: f64,
    /// Goodness of fit in [0, 1], 0 when undefined
    pub r_squared: f64,
}

impl TrendFit {
    pub fn constant(value: f64) -> Self {
        Self {
            level: value,
            slope: 0.0,
            r_squared: 0.0,
        }
    }

    /// Extrapolate `horizon` ticks past the last observation
    pub fn forecast(&self, horizon: usize) -> f64 {
        self.level + self.slope * horizon as f64
    }

    pub fn is_finite(&self) -> bool {
        self.level.is_finite() && self.slope.is_finite() && self.r_squared.is_finite()
    }
}

/// Ordinary least squares over tick indices
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearTrend;

impl TrendModel for LinearTrend {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn fit(&self, values: &[f64]) -> Option<TrendFit> {
        let fit = linear_regression(values)?;
        let last_x = (values.len() - 1) as f64;
        Some(TrendFit {
            level: fit.intercept + fit.slope * last_x,
            slope: fit.slope,
            r_squared: fit.r_squared,
        })
    }
}

/// Holt's double exponential smoothing
#[derive(Debug, Clone, Copy)]
pub struct HoltTrend {
    pub alpha: f64,
    pub beta: f64,
}

impl Default for HoltTrend {
    fn default() -> Self {
        Self {
            alpha: HOLT_ALPHA,
            beta: HOLT_BETA,
        }
    }
}

impl TrendModel for HoltTrend {
    fn name(&self) -> &'static str {
        "holt"
    }

    fn fit(&self, values: &[f64]) -> Option<TrendFit> {
        let first = *values.first()?;
        if values.len() == 1 {
            return Some(TrendFit::constant(first));
        }

        let mut level = first;
        let mut trend = values[1] - values[0];
        let mut sse = 0.0;

        for &value in &values[1..] {
            let predicted = level + trend;
            sse += (value - predicted).powi(2);

            let prev_level = level;
            level = self.alpha * value + (1.0 - self.alpha) * (level + trend);
            trend = self.beta * (level - prev_level) + (1.0 - self.beta) * trend;
        }

        let ss_tot = total_sum_of_squares(values);
        let r_squared = if ss_tot < f64::EPSILON {
            0.0
        } else {
            (1.0 - sse / ss_tot).clamp(0.0, 1.0)
        };

        Some(TrendFit {
            level,
            slope: trend,
            r_squared,
        })
    }
}

/// Result of a least-squares line fit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

/// Fit `y = intercept + slope * x` with `x = 0..n`
///
/// A single value, or a zero-variance window, yields slope 0 and the mean
/// as intercept. Returns `None` only for an empty slice.
pub fn linear_regression(values: &[f64]) -> Option<LinearFit> {
    if values.is_empty() {
        return None;
    }

    let n = values.len() as f64;
    let mean_y = values.iter().sum::<f64>() / n;

    let sum_x: f64 = (0..values.len()).map(|i| i as f64).sum();
    let sum_y: f64 = values.iter().sum();
    let sum_xy: f64 = values.iter().enumerate().map(|(i, y)| i as f64 * y).sum();
    let sum_x2: f64 = (0..values.len()).map(|i| (i as f64).powi(2)).sum();

    let denom = n * sum_x2 - sum_x.powi(2);
    if denom.abs() < f64::EPSILON {
        return Some(LinearFit {
            slope: 0.0,
            intercept: mean_y,
            r_squared: 0.0,
        });
    }

    let slope = (n * sum_xy - sum_x * sum_y) / denom;
    let intercept = (sum_y - slope * sum_x) / n;

    let ss_tot = total_sum_of_squares(values);
    let r_squared = if ss_tot < f64::EPSILON {
        0.0
    } else {
        let ss_res: f64 = values
            .iter()
            .enumerate()
            .map(|(i, y)| (y - (intercept + slope * i as f64)).powi(2))
            .sum();
        (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
    };

    Some(LinearFit {
        slope,
        intercept,
        r_squared,
    })
}

fn total_sum_of_squares(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().map(|v| (v - mean).powi(2)).sum()
}
