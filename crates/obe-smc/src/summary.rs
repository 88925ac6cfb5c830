use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// Central interval holding `mass` of the posterior for one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CredibleInterval {
    /// Probability mass enclosed by the interval.
    pub mass: f64,
    /// Lower edge (weighted quantile at `(1 - mass) / 2`).
    pub low: f64,
    /// Upper edge (weighted quantile at `(1 + mass) / 2`).
    pub high: f64,
}

/// Point estimates derived from the particle cloud.
///
/// Recomputed on demand and handed to clients by value; nothing in the
/// engine reads it back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSummary {
    /// Parameter names in prior order.
    pub names: Vec<String>,
    /// Weighted mean per parameter.
    pub mean: Vec<f64>,
    /// Weighted covariance matrix, row major.
    pub covariance: Vec<Vec<f64>>,
    /// Square root of the covariance diagonal.
    pub std: Vec<f64>,
    /// Central credible interval per parameter.
    pub credible_intervals: Vec<CredibleInterval>,
    /// `1 / sum(w^2)` at the time of the summary.
    pub effective_sample_size: f64,
    /// Number of particles in the cloud.
    pub particles: usize,
}

/// Weighted mean of the particle rows.
pub fn weighted_mean(particles: &[Vec<f64>], weights: &[f64]) -> Vec<f64> {
    let dimension = particles.first().map_or(0, Vec::len);
    let mut mean = vec![0.0; dimension];
    for (row, &w) in particles.iter().zip(weights) {
        for (acc, &x) in mean.iter_mut().zip(row) {
            *acc += w * x;
        }
    }
    mean
}

/// Weighted covariance `sum_i w_i (x_i - mu)(x_i - mu)^T` for normalized weights.
pub fn weighted_covariance(particles: &[Vec<f64>], weights: &[f64]) -> DMatrix<f64> {
    let mean = weighted_mean(particles, weights);
    let dimension = mean.len();
    let mut covariance = DMatrix::<f64>::zeros(dimension, dimension);
    let mut centered = vec![0.0; dimension];
    for (row, &w) in particles.iter().zip(weights) {
        if w == 0.0 {
            continue;
        }
        for (c, (&x, &m)) in centered.iter_mut().zip(row.iter().zip(&mean)) {
            *c = x - m;
        }
        for i in 0..dimension {
            for j in i..dimension {
                covariance[(i, j)] += w * centered[i] * centered[j];
            }
        }
    }
    for i in 0..dimension {
        for j in 0..i {
            covariance[(i, j)] = covariance[(j, i)];
        }
    }
    covariance
}

/// Weighted quantile of `values` at probability `q` in `[0, 1]`.
///
/// Returns the smallest value whose cumulative weight reaches `q`.
pub fn weighted_quantile(values: &[f64], weights: &[f64], q: f64) -> f64 {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    let mut cumulative = 0.0;
    for &idx in &order {
        cumulative += weights[idx];
        if cumulative >= q {
            return values[idx];
        }
    }
    order.last().map_or(f64::NAN, |&idx| values[idx])
}

/// Central credible interval for parameter column `column`.
pub fn credible_interval(
    particles: &[Vec<f64>],
    weights: &[f64],
    column: usize,
    mass: f64,
) -> CredibleInterval {
    let values: Vec<f64> = particles.iter().map(|row| row[column]).collect();
    let tail = (1.0 - mass) / 2.0;
    CredibleInterval {
        mass,
        low: weighted_quantile(&values, weights, tail),
        high: weighted_quantile(&values, weights, 1.0 - tail),
    }
}

/// Converts a square matrix into nested rows for serialization.
pub fn matrix_rows(matrix: &DMatrix<f64>) -> Vec<Vec<f64>> {
    (0..matrix.nrows())
        .map(|i| matrix.row(i).iter().copied().collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covariance_of_two_point_cloud() {
        let particles = vec![vec![0.0, 0.0], vec![2.0, 4.0]];
        let weights = vec![0.5, 0.5];
        assert_eq!(weighted_mean(&particles, &weights), vec![1.0, 2.0]);
        let cov = weighted_covariance(&particles, &weights);
        assert!((cov[(0, 0)] - 1.0).abs() < 1e-12);
        assert!((cov[(1, 1)] - 4.0).abs() < 1e-12);
        assert!((cov[(0, 1)] - 2.0).abs() < 1e-12);
        assert_eq!(cov[(0, 1)], cov[(1, 0)]);
    }

    #[test]
    fn quantile_respects_weights() {
        let values = [1.0, 2.0, 3.0];
        let weights = [0.1, 0.1, 0.8];
        assert_eq!(weighted_quantile(&values, &weights, 0.05), 1.0);
        assert_eq!(weighted_quantile(&values, &weights, 0.5), 3.0);
    }
}
