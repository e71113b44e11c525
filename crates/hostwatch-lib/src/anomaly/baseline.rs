//! Multivariate Gaussian baseline over (CPU%, memory%, disk%)
//!
//! The baseline is the mean vector and the sample covariance of the
//! training rows. A ridge of `min_spread^2` is added to the diagonal, which
//! keeps the matrix positive definite even for constant metrics: a
//! zero-variance metric then flags a deviation only once it exceeds
//! `threshold * min_spread` points.

/// Relative determinant below which the covariance is treated as singular
const SINGULAR_TOLERANCE: f64 = 1e-12;

type Matrix3 = [[f64; 3]; 3];

/// Fitted "normal behavior" distribution
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianBaseline {
    mean: [f64; 3],
    /// Regularised covariance
    covariance: Matrix3,
    /// Inverse of `covariance`, or of its diagonal after a fallback
    precision: Matrix3,
    diagonal_fallback: bool,
    rows: usize,
}

impl GaussianBaseline {
    /// Fit the baseline from valid joint rows
    ///
    /// Returns `None` for fewer than two rows.
    pub fn fit(rows: &[[f64; 3]], min_spread: f64) -> Option<Self> {
        if rows.len() < 2 {
            return None;
        }

        let n = rows.len() as f64;
        let mut mean = [0.0; 3];
        for row in rows {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v;
            }
        }
        for m in mean.iter_mut() {
            *m /= n;
        }

        let mut covariance = [[0.0; 3]; 3];
        for row in rows {
            for i in 0..3 {
                for j in 0..3 {
                    covariance[i][j] += (row[i] - mean[i]) * (row[j] - mean[j]);
                }
            }
        }

        // Sample covariance (Bessel's correction) plus ridge
        let ridge = min_spread.max(f64::EPSILON).powi(2);
        for (i, row) in covariance.iter_mut().enumerate() {
            for value in row.iter_mut() {
                *value /= n - 1.0;
            }
            row[i] += ridge;
        }

        let (precision, diagonal_fallback) = match invert(&covariance) {
            Some(inv) => (inv, false),
            None => (diagonal_inverse(&covariance), true),
        };

        Some(Self {
            mean,
            covariance,
            precision,
            diagonal_fallback,
            rows: rows.len(),
        })
    }

    pub fn mean(&self) -> [f64; 3] {
        self.mean
    }

    /// Regularised standard deviation per metric
    pub fn std_dev(&self) -> [f64; 3] {
        [0, 1, 2].map(|i| self.covariance[i][i].sqrt())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn diagonal_fallback(&self) -> bool {
        self.diagonal_fallback
    }

    /// Mahalanobis distance of `point` from the baseline mean
    pub fn mahalanobis(&self, point: &[f64; 3]) -> f64 {
        let delta = [0, 1, 2].map(|i| point[i] - self.mean[i]);
        let mut squared = 0.0;
        for i in 0..3 {
            for j in 0..3 {
                squared += delta[i] * self.precision[i][j] * delta[j];
            }
        }
        // Rounding can push a near-zero quadratic form slightly negative
        squared.max(0.0).sqrt()
    }

    /// Per-metric z-scores against the regularised spread
    pub fn z_scores(&self, point: &[f64; 3]) -> [f64; 3] {
        let std_dev = self.std_dev();
        [0, 1, 2].map(|i| (point[i] - self.mean[i]) / std_dev[i])
    }
}

fn determinant(m: &Matrix3) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

/// Invert a 3x3 matrix by cofactors
fn invert(m: &Matrix3) -> Option<Matrix3> {
    let det = determinant(m);
    let scale = m[0][0] * m[1][1] * m[2][2];
    if !det.is_finite() || det.abs() <= SINGULAR_TOLERANCE * scale.abs().max(1.0) {
        return None;
    }

    let inv_det = 1.0 / det;
    let inv = [
        [
            (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * inv_det,
            (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv_det,
            (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv_det,
        ],
        [
            (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * inv_det,
            (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv_det,
            (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv_det,
        ],
        [
            (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * inv_det,
            (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv_det,
            (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv_det,
        ],
    ];

    if inv.iter().flatten().all(|v| v.is_finite()) {
        Some(inv)
    } else {
        None
    }
}

fn diagonal_inverse(m: &Matrix3) -> Matrix3 {
    let mut inv = [[0.0; 3]; 3];
    for i in 0..3 {
        // Diagonal always carries the ridge, so it is strictly positive
        inv[i][i] = 1.0 / m[i][i];
    }
    inv
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jittered_rows(count: usize, center: [f64; 3]) -> Vec<[f64; 3]> {
        (0..count)
            .map(|i| {
                let a = ((i * 7) % 5) as f64 * 0.5 - 1.0;
                let b = ((i * 3) % 4) as f64 * 0.5 - 0.75;
                let c = ((i * 11) % 3) as f64 * 0.5 - 0.5;
                [center[0] + a, center[1] + b, center[2] + c]
            })
            .collect()
    }

    #[test]
    fn test_fit_requires_two_rows() {
        assert!(GaussianBaseline::fit(&[], 1.0).is_none());
        assert!(GaussianBaseline::fit(&[[1.0, 2.0, 3.0]], 1.0).is_none());
        assert!(GaussianBaseline::fit(&[[1.0, 2.0, 3.0], [1.0, 2.0, 3.0]], 1.0).is_some());
    }

    #[test]
    fn test_mean_and_spread() {
        let rows = vec![[10.0, 20.0, 30.0], [12.0, 20.0, 30.0]];
        let baseline = GaussianBaseline::fit(&rows, 1.0).unwrap();

        assert_eq!(baseline.mean(), [11.0, 20.0, 30.0]);
        // Sample variance 2.0 plus ridge 1.0
        assert!((baseline.std_dev()[0] - 3.0_f64.sqrt()).abs() < 1e-9);
        assert!((baseline.std_dev()[1] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_constant_rows_are_not_singular() {
        let rows = vec![[10.0, 10.0, 10.0]; 30];
        let baseline = GaussianBaseline::fit(&rows, 1.0).unwrap();

        assert!(!baseline.diagonal_fallback());
        assert_eq!(baseline.mahalanobis(&[10.0, 10.0, 10.0]), 0.0);
        assert!((baseline.mahalanobis(&[13.0, 10.0, 10.0]) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_spread_uses_diagonal_fallback() {
        let rows = vec![[10.0, 10.0, 10.0]; 30];
        let baseline = GaussianBaseline::fit(&rows, 0.0).unwrap();

        assert!(baseline.diagonal_fallback());
        assert_eq!(baseline.mahalanobis(&[10.0, 10.0, 10.0]), 0.0);

        // Perfectly collinear metrics leave the covariance rank one
        let rows: Vec<[f64; 3]> = (0..30).map(|i| [i as f64; 3]).collect();
        let baseline = GaussianBaseline::fit(&rows, 0.0).unwrap();
        let mean = baseline.mean();
        let std_dev = baseline.std_dev();

        assert!(baseline.diagonal_fallback());
        assert_eq!(baseline.mahalanobis(&mean), 0.0);
        let shifted = [mean[0] + std_dev[0], mean[1], mean[2]];
        assert!((baseline.mahalanobis(&shifted) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_distance_grows_with_deviation() {
        let baseline = GaussianBaseline::fit(&jittered_rows(60, [20.0, 30.0, 40.0]), 1.0).unwrap();

        let near = baseline.mahalanobis(&[20.0, 30.0, 40.0]);
        let far = baseline.mahalanobis(&[99.0, 30.0, 40.0]);

        assert!(near < 1.5, "near distance was {}", near);
        assert!(far > 20.0, "far distance was {}", far);
    }

    #[test]
    fn test_correlated_metrics_stay_invertible() {
        // Memory is an exact linear function of CPU
        let rows: Vec<[f64; 3]> = (0..50)
            .map(|i| {
                let cpu = 20.0 + (i % 5) as f64;
                [cpu, 2.0 * cpu, 50.0]
            })
            .collect();
        let baseline = GaussianBaseline::fit(&rows, 1.0).unwrap();

        assert!(!baseline.diagonal_fallback());
        assert!(baseline.mahalanobis(&[22.0, 44.0, 50.0]).is_finite());
    }

    #[test]
    fn test_z_scores() {
        let rows = vec![[10.0, 10.0, 10.0]; 10];
        let baseline = GaussianBaseline::fit(&rows, 2.0).unwrap();
        let z = baseline.z_scores(&[14.0, 10.0, 6.0]);

        assert!((z[0] - 2.0).abs() < 1e-9);
        assert_eq!(z[1], 0.0);
        assert!((z[2] + 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_invert_identity() {
        let identity = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        assert_eq!(invert(&identity), Some(identity));

        let singular = [[1.0, 2.0, 3.0], [2.0, 4.0, 6.0], [1.0, 1.0, 1.0]];
        assert!(invert(&singular).is_none());
    }
}
