//! Long-only maximum-Sharpe portfolio weights.
//!
//! Projected gradient ascent on the Sharpe ratio over the probability
//! simplex (weights in [0, 1] summing to 1), with Armijo backtracking.
//! Starts from equal weights.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

const ARMIJO_FRACTION: f64 = 1e-4;
const MAX_STEP: f64 = 1e3;
const MIN_VARIANCE: f64 = 1e-18;

#[derive(Debug, Clone, Copy)]
pub struct OptimizerSettings {
    pub max_iterations: usize,
    /// Stop once the projected gradient step moves no weight by more than this
    pub tolerance: f64,
    /// Step halvings tried per iteration before giving up
    pub max_backtracks: usize,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            max_iterations: 5000,
            tolerance: 1e-10,
            max_backtracks: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    /// Always feasible: non-negative and summing to 1 (empty for no assets)
    pub weights: Vec<f64>,
    pub sharpe_ratio: f64,
    pub iterations: usize,
    /// False when the iteration cap was hit, the line search stalled away from
    /// the optimum, or the problem was degenerate; `weights` then holds the
    /// best feasible point reached.
    pub converged: bool,
}

pub fn optimize(expected_returns: &DVector<f64>, covariance: &DMatrix<f64>, risk_free_rate: f64) -> OptimizationResult {
    optimize_with(expected_returns, covariance, risk_free_rate, OptimizerSettings::default())
}

pub fn optimize_with(
    expected_returns: &DVector<f64>,
    covariance: &DMatrix<f64>,
    risk_free_rate: f64,
    settings: OptimizerSettings,
) -> OptimizationResult {
    let n = expected_returns.len();
    let sharpe = |w: &DVector<f64>| portfolio_sharpe(w, expected_returns, covariance, risk_free_rate);

    if n == 0 {
        return OptimizationResult {
            weights: Vec::new(),
            sharpe_ratio: f64::NAN,
            iterations: 0,
            converged: true,
        };
    }

    let mut weights = DVector::from_element(n, 1.0 / n as f64);
    let mut current = sharpe(&weights);

    if n == 1 {
        return OptimizationResult {
            weights: vec![1.0],
            sharpe_ratio: current,
            iterations: 0,
            converged: true,
        };
    }

    if !current.is_finite() {
        tracing::warn!("Sharpe ratio undefined at equal weights; skipping optimization");
        return finish(weights, current, 0, false);
    }

    let mut step = 1.0;
    for iteration in 1..=settings.max_iterations {
        let gradient = match sharpe_gradient(&weights, expected_returns, covariance, risk_free_rate) {
            Some(g) => g,
            None => {
                tracing::warn!("Portfolio variance vanished during optimization");
                return finish(weights, current, iteration - 1, false);
            }
        };

        let stationarity = (project_onto_simplex(&(&weights + &gradient)) - &weights).amax();
        if stationarity <= settings.tolerance {
            return finish(weights, current, iteration - 1, true);
        }

        let mut t = step;
        let mut accepted = None;
        for _ in 0..settings.max_backtracks {
            let candidate = project_onto_simplex(&(&weights + &gradient * t));
            let value = sharpe(&candidate);
            let ascent = gradient.dot(&(&candidate - &weights));
            if value.is_finite() && value >= current + ARMIJO_FRACTION * ascent {
                accepted = Some((candidate, value));
                break;
            }
            t *= 0.5;
        }

        match accepted {
            Some((candidate, value)) => {
                weights = candidate;
                current = value;
                step = (t * 2.0).min(MAX_STEP);
            }
            // Stalled: converged only if nearly stationary
            None => {
                let converged = stationarity <= settings.tolerance.sqrt();
                if !converged {
                    tracing::warn!(
                        "Sharpe optimizer line search stalled {:.2e} from stationarity",
                        stationarity
                    );
                }
                return finish(weights, current, iteration, converged);
            }
        }
    }

    tracing::warn!(
        "Sharpe optimizer hit the {} iteration cap without converging",
        settings.max_iterations
    );
    finish(weights, current, settings.max_iterations, false)
}

fn finish(weights: DVector<f64>, sharpe_ratio: f64, iterations: usize, converged: bool) -> OptimizationResult {
    tracing::debug!(
        "Optimizer finished after {} iterations (converged: {}, sharpe: {:.4})",
        iterations,
        converged,
        sharpe_ratio
    );
    OptimizationResult {
        weights: weights.iter().copied().collect(),
        sharpe_ratio,
        iterations,
        converged,
    }
}

/// (w'mu - rf) / sqrt(w'Sigma w)
pub fn portfolio_sharpe(
    weights: &DVector<f64>,
    expected_returns: &DVector<f64>,
    covariance: &DMatrix<f64>,
    risk_free_rate: f64,
) -> f64 {
    let excess = weights.dot(expected_returns) - risk_free_rate;
    let variance = weights.dot(&(covariance * weights));
    excess / variance.max(0.0).sqrt()
}

/// d/dw of the Sharpe ratio: mu/sigma - (w'mu - rf) * Sigma w / sigma^3.
fn sharpe_gradient(
    weights: &DVector<f64>,
    expected_returns: &DVector<f64>,
    covariance: &DMatrix<f64>,
    risk_free_rate: f64,
) -> Option<DVector<f64>> {
    let sigma_w = covariance * weights;
    let variance = weights.dot(&sigma_w);
    if !(variance > MIN_VARIANCE) {
        return None;
    }
    let sigma = variance.sqrt();
    let excess = weights.dot(expected_returns) - risk_free_rate;
    let gradient = expected_returns / sigma - sigma_w * (excess / (variance * sigma));
    if gradient.iter().all(|g| g.is_finite()) {
        Some(gradient)
    } else {
        None
    }
}

/// Euclidean projection onto {w : w >= 0, sum(w) = 1} (Duchi et al., 2008).
pub fn project_onto_simplex(v: &DVector<f64>) -> DVector<f64> {
    let mut sorted: Vec<f64> = v.iter().copied().collect();
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(Ordering::Equal));

    let mut cumulative = 0.0;
    let mut theta = 0.0;
    for (j, &u) in sorted.iter().enumerate() {
        cumulative += u;
        let candidate = (cumulative - 1.0) / (j + 1) as f64;
        if u - candidate > 0.0 {
            theta = candidate;
        }
    }

    v.map(|x| (x - theta).clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_feasible(weights: &[f64]) {
        let total: f64 = weights.iter().sum();
        assert!((total - 1.0).abs() < 1e-6, "weights sum to {}", total);
        for &w in weights {
            assert!((0.0..=1.0).contains(&w), "weight {} out of bounds", w);
        }
    }

    #[test]
    fn test_projection_onto_simplex() {
        let inside = DVector::from_vec(vec![0.2, 0.3, 0.5]);
        let projected = project_onto_simplex(&inside);
        for i in 0..3 {
            assert_relative_eq!(projected[i], inside[i], epsilon = 1e-12);
        }

        let corner = project_onto_simplex(&DVector::from_vec(vec![2.0, 0.0, -1.0]));
        assert_eq!(corner.as_slice(), &[1.0, 0.0, 0.0]);

        let flat = project_onto_simplex(&DVector::from_vec(vec![0.5, 0.5, 0.5]));
        for w in flat.iter() {
            assert_relative_eq!(*w, 1.0 / 3.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_two_uncorrelated_assets_reach_tangency_portfolio() {
        let mu = DVector::from_vec(vec![0.10, 0.20]);
        let cov = DMatrix::from_row_slice(2, 2, &[0.04, 0.0, 0.0, 0.09]);
        let result = optimize(&mu, &cov, 0.03);

        // w_i proportional to (mu_i - rf) / sigma_i^2
        let raw = [0.07 / 0.04, 0.17 / 0.09];
        let total = raw[0] + raw[1];
        assert!(result.converged);
        assert_relative_eq!(result.weights[0], raw[0] / total, epsilon = 1e-4);
        assert_relative_eq!(result.weights[1], raw[1] / total, epsilon = 1e-4);
        assert_feasible(&result.weights);
    }

    #[test]
    fn test_asset_below_risk_free_rate_is_excluded() {
        let mu = DVector::from_vec(vec![0.01, 0.12]);
        let cov = DMatrix::from_row_slice(2, 2, &[0.04, 0.0, 0.0, 0.04]);
        let result = optimize(&mu, &cov, 0.03);

        assert!(result.converged);
        assert!(result.weights[0] < 1e-6);
        assert!(result.weights[1] > 1.0 - 1e-6);
        assert_relative_eq!(result.sharpe_ratio, 0.09 / 0.2, epsilon = 1e-6);
    }

    #[test]
    fn test_correlated_assets_beat_equal_and_single_asset_portfolios() {
        let mu = DVector::from_vec(vec![0.08, 0.15, 0.11, 0.05]);
        let cov = DMatrix::from_row_slice(
            4,
            4,
            &[
                0.0400, 0.0100, 0.0000, 0.0050,
                0.0100, 0.0900, 0.0200, 0.0000,
                0.0000, 0.0200, 0.0625, 0.0100,
                0.0050, 0.0000, 0.0100, 0.0225,
            ],
        );
        let rf = 0.03;
        let result = optimize(&mu, &cov, rf);

        assert_feasible(&result.weights);
        assert!(result.converged);

        let equal = DVector::from_element(4, 0.25);
        assert!(result.sharpe_ratio >= portfolio_sharpe(&equal, &mu, &cov, rf) - 1e-9);
        for i in 0..4 {
            let mut single = DVector::zeros(4);
            single[i] = 1.0;
            assert!(result.sharpe_ratio >= portfolio_sharpe(&single, &mu, &cov, rf) - 1e-9);
        }

        let w = DVector::from_vec(result.weights.clone());
        assert_relative_eq!(result.sharpe_ratio, portfolio_sharpe(&w, &mu, &cov, rf), epsilon = 1e-12);
    }

    #[test]
    fn test_single_asset_gets_full_weight() {
        let mu = DVector::from_vec(vec![0.07]);
        let cov = DMatrix::from_row_slice(1, 1, &[0.04]);
        let result = optimize(&mu, &cov, 0.03);
        assert_eq!(result.weights, vec![1.0]);
        assert_relative_eq!(result.sharpe_ratio, 0.2, epsilon = 1e-12);
        assert!(result.converged);
    }

    #[test]
    fn test_no_assets() {
        let result = optimize(&DVector::zeros(0), &DMatrix::zeros(0, 0), 0.03);
        assert!(result.weights.is_empty());
    }

    #[test]
    fn test_zero_volatility_asset_keeps_weights_feasible() {
        // Second asset never moves: its Sharpe ratio is undefined
        let mu = DVector::from_vec(vec![0.0, 0.0]);
        let cov = DMatrix::from_row_slice(2, 2, &[0.025, 0.0, 0.0, 0.0]);
        let result = optimize(&mu, &cov, 0.03);

        assert_feasible(&result.weights);
        assert!(result.sharpe_ratio.is_finite());
        assert!(result.weights[0] > 0.99);
    }

    #[test]
    fn test_degenerate_covariance_returns_equal_weights() {
        let mu = DVector::from_vec(vec![0.05, 0.06, 0.07]);
        let cov = DMatrix::zeros(3, 3);
        let result = optimize(&mu, &cov, 0.03);

        assert!(!result.converged);
        assert_eq!(result.iterations, 0);
        assert_feasible(&result.weights);
        for w in &result.weights {
            assert_relative_eq!(*w, 1.0 / 3.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_stalled_line_search_far_from_optimum_is_not_converged() {
        let mu = DVector::from_vec(vec![0.10, 0.20]);
        let cov = DMatrix::from_row_slice(2, 2, &[0.04, 0.0, 0.0, 0.09]);
        let settings = OptimizerSettings {
            max_backtracks: 0,
            ..OptimizerSettings::default()
        };
        let result = optimize_with(&mu, &cov, 0.03, settings);

        assert!(!result.converged);
        assert_eq!(result.iterations, 1);
        assert_eq!(result.weights, vec![0.5, 0.5]);
    }

    #[test]
    fn test_iteration_cap_reports_not_converged() {
        let mu = DVector::from_vec(vec![0.10, 0.20]);
        let cov = DMatrix::from_row_slice(2, 2, &[0.04, 0.0, 0.0, 0.09]);
        let settings = OptimizerSettings {
            max_iterations: 1,
            tolerance: 0.0,
            ..OptimizerSettings::default()
        };
        let result = optimize_with(&mu, &cov, 0.03, settings);
        assert!(!result.converged);
        assert_eq!(result.iterations, 1);
        assert_feasible(&result.weights);
    }
}
