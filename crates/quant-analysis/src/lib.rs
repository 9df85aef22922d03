use analysis_core::{AnalysisError, PricePanel};
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

pub mod optimizer;

pub use optimizer::{optimize, optimize_with, project_onto_simplex, OptimizationResult, OptimizerSettings};

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Per-symbol risk/return figures. Fractions, not percentages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolStats {
    pub symbol: String,
    pub annual_return: f64,
    pub annual_volatility: f64,
    /// Non-finite when volatility is zero
    pub sharpe_ratio: f64,
    /// Most negative peak-to-trough decline, always <= 0
    pub max_drawdown: f64,
    pub beta: f64,
}

/// Figures for a caller-weighted portfolio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioStats {
    pub expected_return: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
}

/// Everything derived from one price panel.
#[derive(Debug, Clone)]
pub struct RiskReport {
    /// Per requested symbol, in request order (repeats kept)
    pub stats: Vec<SymbolStats>,
    /// Annualized mean daily returns, aligned with `stats`
    pub expected_returns: DVector<f64>,
    /// Annualized sample covariance of daily returns; benchmark excluded
    pub covariance: DMatrix<f64>,
    /// Number of daily returns each figure is computed from
    pub observations: usize,
}

pub struct QuantAnalysisEngine {
    risk_free_rate: f64,
}

impl QuantAnalysisEngine {
    pub fn new(risk_free_rate: f64) -> Self {
        Self { risk_free_rate }
    }

    pub fn risk_free_rate(&self) -> f64 {
        self.risk_free_rate
    }

    /// Compute per-symbol statistics and the annualized covariance matrix.
    pub fn compute(
        &self,
        panel: &PricePanel,
        symbols: &[String],
        benchmark: &str,
    ) -> Result<RiskReport, AnalysisError> {
        if panel.len() < 3 {
            return Err(AnalysisError::InsufficientData(format!(
                "need at least 3 aligned prices, have {}",
                panel.len()
            )));
        }

        let column = |symbol: &str| {
            panel.column(symbol).ok_or_else(|| {
                AnalysisError::DataUnavailable(format!("{} missing from price panel", symbol))
            })
        };

        let benchmark_returns = calculate_returns(column(benchmark)?);
        let rf = self.risk_free_rate;

        let per_symbol: Vec<(SymbolStats, Vec<f64>)> = symbols
            .par_iter()
            .map(|symbol| -> Result<(SymbolStats, Vec<f64>), AnalysisError> {
                let prices = column(symbol.as_str())?;
                let returns = calculate_returns(prices);
                let annual_return = annualized_return(&returns);
                let annual_volatility = annualized_volatility(&returns);
                let stats = SymbolStats {
                    symbol: symbol.clone(),
                    annual_return,
                    annual_volatility,
                    sharpe_ratio: sharpe_ratio(annual_return, annual_volatility, rf),
                    max_drawdown: max_drawdown(prices),
                    beta: beta(&returns, &benchmark_returns),
                };
                Ok((stats, returns))
            })
            .collect::<Result<_, _>>()?;

        let (stats, returns): (Vec<SymbolStats>, Vec<Vec<f64>>) = per_symbol.into_iter().unzip();

        for s in stats.iter().filter(|s| !s.sharpe_ratio.is_finite()) {
            tracing::warn!(
                "{} has zero volatility over the window; Sharpe ratio is undefined",
                s.symbol
            );
        }

        let expected_returns = DVector::from_iterator(stats.len(), stats.iter().map(|s| s.annual_return));
        let covariance = annualized_covariance(&returns);

        Ok(RiskReport {
            stats,
            expected_returns,
            covariance,
            observations: benchmark_returns.len(),
        })
    }

    /// Return, volatility and Sharpe of a portfolio held at `weights`.
    ///
    /// Weights are taken as given; they need not sum to one.
    pub fn portfolio_stats(&self, report: &RiskReport, weights: &[f64]) -> Result<PortfolioStats, AnalysisError> {
        let n = report.expected_returns.len();
        if weights.len() != n {
            return Err(AnalysisError::InvalidInput(format!(
                "{} weights for {} symbols",
                weights.len(),
                n
            )));
        }

        let w = DVector::from_column_slice(weights);
        let expected_return = w.dot(&report.expected_returns);
        let variance = w.dot(&(&report.covariance * &w));
        let volatility = variance.max(0.0).sqrt();

        Ok(PortfolioStats {
            expected_return,
            volatility,
            sharpe_ratio: sharpe_ratio(expected_return, volatility, self.risk_free_rate),
        })
    }

    /// Maximum-Sharpe long-only weights for the symbols in `report`.
    pub fn optimize(&self, report: &RiskReport) -> OptimizationResult {
        optimize(&report.expected_returns, &report.covariance, self.risk_free_rate)
    }
}

impl Default for QuantAnalysisEngine {
    fn default() -> Self {
        Self::new(analysis_core::DEFAULT_RISK_FREE_RATE)
    }
}

/// Simple daily returns; one element shorter than `prices`.
pub fn calculate_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect()
}

pub fn annualized_return(returns: &[f64]) -> f64 {
    returns.mean() * TRADING_DAYS_PER_YEAR
}

/// Sample standard deviation (n - 1) scaled by sqrt(252).
pub fn annualized_volatility(returns: &[f64]) -> f64 {
    returns.std_dev() * TRADING_DAYS_PER_YEAR.sqrt()
}

/// (return - rf) / volatility. Zero volatility gives inf or NaN, never a panic.
pub fn sharpe_ratio(annual_return: f64, annual_volatility: f64, risk_free_rate: f64) -> f64 {
    (annual_return - risk_free_rate) / annual_volatility
}

/// Drawdown from the running peak at each point; 0 at every new high.
pub fn drawdown_series(prices: &[f64]) -> Vec<f64> {
    let mut peak = f64::NEG_INFINITY;
    prices
        .iter()
        .map(|&price| {
            peak = peak.max(price);
            (price - peak) / peak
        })
        .collect()
}

/// Most negative drawdown; 0 for an empty or never-declining series.
pub fn max_drawdown(prices: &[f64]) -> f64 {
    drawdown_series(prices).into_iter().fold(0.0, f64::min)
}

/// Sensitivity to the benchmark: sample covariance over the benchmark's
/// population variance.
pub fn beta(returns: &[f64], benchmark_returns: &[f64]) -> f64 {
    let n = returns.len().min(benchmark_returns.len());
    let stock = &returns[returns.len() - n..];
    let bench = &benchmark_returns[benchmark_returns.len() - n..];
    stock.covariance(bench) / bench.population_variance()
}

/// Annualized sample covariance matrix of equally long return series.
pub fn annualized_covariance(returns: &[Vec<f64>]) -> DMatrix<f64> {
    let n = returns.len();
    let mut cov = DMatrix::zeros(n, n);
    for i in 0..n {
        for j in i..n {
            let value = returns[i].as_slice().covariance(returns[j].as_slice()) * TRADING_DAYS_PER_YEAR;
            cov[(i, j)] = value;
            cov[(j, i)] = value;
        }
    }
    cov
}
