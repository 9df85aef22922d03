use analysis_core::{
    AnalysisConfig, AnalysisError, FundamentalsProvider, FundamentalsRecord, MarketDataProvider, Signal,
};
use chrono::NaiveDate;
use fmp_client::FmpClient;
use fundamental_analysis::FundamentalAnalysisEngine;
use futures_util::future::join_all;
use polygon_client::PolygonClient;
use quant_analysis::{OptimizationResult, PortfolioStats, QuantAnalysisEngine, RiskReport};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub mod input;
pub use input::PortfolioInput;

/// One line of the summary table. Percent fields are already scaled by 100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub symbol: String,
    pub annual_return_pct: f64,
    pub annual_volatility_pct: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown_pct: f64,
    pub beta: f64,
    /// Weight assigned by the max-Sharpe optimizer, as a fraction
    pub optimal_weight: f64,
    /// `None` when no fundamentals record exists for the symbol
    pub signal: Option<Signal>,
}

impl SummaryRow {
    pub fn signal_label(&self) -> &'static str {
        self.signal.map(|s| s.as_str()).unwrap_or("N/A")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// In ticker order, one row per ticker occurrence
    pub summary: Vec<SummaryRow>,
    /// Aligned with `summary`
    pub fundamentals: Vec<Option<FundamentalsRecord>>,
    /// Caller-weighted portfolio figures
    pub portfolio: PortfolioStats,
    pub optimization: OptimizationResult,
    pub benchmark: String,
    pub start_date: NaiveDate,
    /// Daily returns behind every statistic
    pub observations: usize,
}

impl AnalysisReport {
    /// The `(summary, fundamentals)` pair a presentation layer renders.
    pub fn into_parts(self) -> (Vec<SummaryRow>, Vec<Option<FundamentalsRecord>>) {
        (self.summary, self.fundamentals)
    }
}

/// Runs the whole pipeline for one portfolio: prices, risk statistics,
/// optimization, then fundamentals per symbol.
pub struct PortfolioAnalyzer {
    market_data: Arc<dyn MarketDataProvider>,
    fundamentals: Arc<dyn FundamentalsProvider>,
    quant_analyzer: QuantAnalysisEngine,
    fundamental_analyzer: FundamentalAnalysisEngine,
    benchmark: String,
    start_date: NaiveDate,
}

impl PortfolioAnalyzer {
    pub fn new(config: &AnalysisConfig) -> Self {
        let polygon = PolygonClient::new(config.polygon_api_key.clone(), config.polygon_rate_limit);
        let fmp = FmpClient::from_config(config);
        Self::with_providers(config, Arc::new(polygon), Arc::new(fmp))
    }

    pub fn with_providers(
        config: &AnalysisConfig,
        market_data: Arc<dyn MarketDataProvider>,
        fundamentals: Arc<dyn FundamentalsProvider>,
    ) -> Self {
        Self {
            market_data,
            fundamentals,
            quant_analyzer: QuantAnalysisEngine::new(config.risk_free_rate),
            fundamental_analyzer: FundamentalAnalysisEngine::new(),
            benchmark: config.benchmark.clone(),
            start_date: config.start_date,
        }
    }

    /// Analyze comma-separated tickers with comma-separated percentage weights.
    pub async fn run_analysis(&self, tickers: &str, weights: &str) -> Result<AnalysisReport, AnalysisError> {
        let input = PortfolioInput::parse(tickers, weights)?;
        self.analyze(&input).await
    }

    pub async fn analyze(&self, input: &PortfolioInput) -> Result<AnalysisReport, AnalysisError> {
        tracing::info!(
            "Starting portfolio analysis for {} (benchmark: {}, since {})",
            input.symbols().join(","),
            self.benchmark,
            self.start_date
        );

        let panel = self
            .market_data
            .fetch_price_panel(input.symbols(), &self.benchmark, self.start_date)
            .await?;

        let risk = self.quant_analyzer.compute(&panel, input.symbols(), &self.benchmark)?;
        let portfolio = self.quant_analyzer.portfolio_stats(&risk, input.weights())?;
        tracing::info!(
            "Portfolio: return {:.2}%, volatility {:.2}%, Sharpe {:.3}",
            portfolio.expected_return * 100.0,
            portfolio.volatility * 100.0,
            portfolio.sharpe_ratio
        );

        let optimization = self.quant_analyzer.optimize(&risk);
        tracing::info!(
            "Optimizer: Sharpe {:.3} after {} iterations (converged: {})",
            optimization.sharpe_ratio,
            optimization.iterations,
            optimization.converged
        );

        let fundamentals = self.fetch_fundamentals(input.symbols()).await;
        let summary = build_summary(&risk, &optimization, &fundamentals);

        Ok(AnalysisReport {
            summary,
            fundamentals,
            portfolio,
            optimization,
            benchmark: self.benchmark.clone(),
            start_date: self.start_date,
            observations: risk.observations,
        })
    }

    /// Score every symbol concurrently, keeping ticker order. A failed
    /// provider call only blanks that symbol's record.
    async fn fetch_fundamentals(&self, symbols: &[String]) -> Vec<Option<FundamentalsRecord>> {
        let tasks = symbols.iter().map(|symbol| async move {
            let (ratios, zscore) = tokio::join!(
                self.fundamentals.fetch_ratios(symbol),
                self.fundamentals.fetch_zscore(symbol)
            );

            let ratios = match ratios {
                Ok(ratios) => ratios,
                Err(e) => {
                    tracing::warn!("Failed to fetch ratios for {}: {}", symbol, e);
                    return None;
                }
            };
            let zscore = match zscore {
                Ok(zscore) => zscore,
                Err(e) => {
                    tracing::warn!("Failed to fetch Altman Z-score for {}: {}", symbol, e);
                    return None;
                }
            };

            if ratios.is_none() {
                tracing::warn!("No fundamentals data for {}", symbol);
            }
            self.fundamental_analyzer.score(symbol, ratios.as_ref(), zscore.as_ref())
        });

        join_all(tasks).await
    }
}

fn build_summary(
    risk: &RiskReport,
    optimization: &OptimizationResult,
    fundamentals: &[Option<FundamentalsRecord>],
) -> Vec<SummaryRow> {
    risk.stats
        .iter()
        .zip(&optimization.weights)
        .zip(fundamentals)
        .map(|((stats, &weight), record)| SummaryRow {
            symbol: stats.symbol.clone(),
            annual_return_pct: stats.annual_return * 100.0,
            annual_volatility_pct: stats.annual_volatility * 100.0,
            sharpe_ratio: stats.sharpe_ratio,
            max_drawdown_pct: stats.max_drawdown * 100.0,
            beta: stats.beta,
            optimal_weight: weight,
            signal: record.as_ref().map(|r| r.signal),
        })
        .collect()
}
