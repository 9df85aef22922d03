use analysis_core::{Criterion, CriterionResult, FundamentalsRecord, RatiosRecord, Signal};
use serde_json::Value;

const MIN_ROIC: f64 = 0.08;
const MIN_EBIT_MARGIN: f64 = 0.15;
const MIN_ALTMAN_Z: f64 = 3.0;
const MIN_QUICK_RATIO: f64 = 1.0;
const MIN_INTEREST_COVERAGE: f64 = 3.0;
const MAX_DEBT_TO_EQUITY: f64 = 1.5;

/// Six-rule quality screen over trailing-twelve-month ratios.
pub struct FundamentalAnalysisEngine;

impl FundamentalAnalysisEngine {
    pub fn new() -> Self {
        Self
    }

    /// Score one symbol. `None` when there is no ratios record, the record
    /// carries none of the ratios, or a metric cannot be read as a number.
    ///
    /// Missing metrics count as 0.0, so an absent Altman Z-score fails its
    /// check rather than hiding the record.
    pub fn score(
        &self,
        symbol: &str,
        ratios: Option<&RatiosRecord>,
        zscore: Option<&Value>,
    ) -> Option<FundamentalsRecord> {
        let ratios = ratios.filter(|r| !r.is_empty())?;

        let metric = |name: &str, value: Option<&Value>| {
            let coerced = coerce_metric(value);
            if coerced.is_none() {
                tracing::warn!("{}: {} is not numeric ({:?}); skipping fundamentals", symbol, name, value);
            }
            coerced
        };

        let roic = metric("ROIC", ratios.return_on_capital_employed.as_ref())?;
        let ebit_margin = metric("EBIT margin", ratios.operating_profit_margin.as_ref())?;
        let altman_z = metric("Altman Z", zscore)?;
        let quick_ratio = metric("quick ratio", ratios.quick_ratio.as_ref())?;
        let interest_coverage = metric("interest coverage", ratios.interest_coverage.as_ref())?;
        let debt_to_equity = metric("debt to equity", ratios.debt_equity_ratio.as_ref())?;

        let criteria: Vec<CriterionResult> = Criterion::ALL
            .iter()
            .map(|&criterion| {
                let passed = match criterion {
                    Criterion::Roic => roic > MIN_ROIC,
                    Criterion::EbitMargin => ebit_margin > MIN_EBIT_MARGIN,
                    Criterion::AltmanZ => altman_z > MIN_ALTMAN_Z,
                    Criterion::QuickRatio => quick_ratio > MIN_QUICK_RATIO,
                    Criterion::InterestCoverage => interest_coverage > MIN_INTEREST_COVERAGE,
                    Criterion::DebtToEquity => debt_to_equity < MAX_DEBT_TO_EQUITY,
                };
                CriterionResult { criterion, passed }
            })
            .collect();

        let score = criteria.iter().filter(|c| c.passed).count() as u8;
        let signal = Signal::from_score(score);
        tracing::debug!("{} fundamentals score {}/6 -> {}", symbol, score, signal);

        Some(FundamentalsRecord {
            symbol: symbol.to_string(),
            roic,
            ebit_margin,
            altman_z,
            quick_ratio,
            interest_coverage,
            debt_to_equity,
            criteria,
            score,
            signal,
        })
    }
}

impl Default for FundamentalAnalysisEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Read a provider metric as a number.
///
/// Missing, null and empty-string values become 0.0. Booleans become 1.0 or
/// 0.0. Returns `None` for anything else that does not parse as a float,
/// including whitespace-only strings.
pub fn coerce_metric(value: Option<&Value>) -> Option<f64> {
    match value {
        None | Some(Value::Null) => Some(0.0),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::Bool(b)) => Some(if *b { 1.0 } else { 0.0 }),
        Some(Value::String(s)) if s.is_empty() => Some(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => None,
    }
}
