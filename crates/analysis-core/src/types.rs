use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Daily bar, reduced to the split-adjusted close
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
}

/// Raw trailing-twelve-month ratios as returned by the fundamentals provider.
///
/// Values are kept as raw JSON because the provider mixes numbers, numeric
/// strings, empty strings and nulls.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RatiosRecord {
    #[serde(rename = "returnOnCapitalEmployedTTM", default)]
    pub return_on_capital_employed: Option<serde_json::Value>,
    #[serde(rename = "operatingProfitMarginTTM", default)]
    pub operating_profit_margin: Option<serde_json::Value>,
    #[serde(rename = "quickRatioTTM", default)]
    pub quick_ratio: Option<serde_json::Value>,
    #[serde(rename = "interestCoverageTTM", default)]
    pub interest_coverage: Option<serde_json::Value>,
    #[serde(rename = "debtEquityRatioTTM", default)]
    pub debt_equity_ratio: Option<serde_json::Value>,
}

impl RatiosRecord {
    /// True when the provider sent a record without any of the ratios used
    /// for scoring, e.g. `[{}]`.
    pub fn is_empty(&self) -> bool {
        self.return_on_capital_employed.is_none()
            && self.operating_profit_margin.is_none()
            && self.quick_ratio.is_none()
            && self.interest_coverage.is_none()
            && self.debt_equity_ratio.is_none()
    }
}

/// One of the six fixed fundamentals checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    Roic,
    EbitMargin,
    AltmanZ,
    QuickRatio,
    InterestCoverage,
    DebtToEquity,
}

impl Criterion {
    /// Evaluation and display order.
    pub const ALL: [Criterion; 6] = [
        Criterion::Roic,
        Criterion::EbitMargin,
        Criterion::AltmanZ,
        Criterion::QuickRatio,
        Criterion::InterestCoverage,
        Criterion::DebtToEquity,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Criterion::Roic => "ROIC > 8%",
            Criterion::EbitMargin => "EBIT Margin > 15%",
            Criterion::AltmanZ => "Altman Z > 3",
            Criterion::QuickRatio => "Quick Ratio > 1",
            Criterion::InterestCoverage => "Interest Coverage > 3",
            Criterion::DebtToEquity => "Debt to Equity < 1.5",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriterionResult {
    pub criterion: Criterion,
    pub passed: bool,
}

/// Discrete fundamentals signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Buy,
    Hold,
    Sell,
}

impl Signal {
    /// Map a criteria count to a signal. First match wins: 5+ BUY, 3+ HOLD, else SELL.
    pub fn from_score(score: u8) -> Self {
        match score {
            s if s >= 5 => Signal::Buy,
            s if s >= 3 => Signal::Hold,
            _ => Signal::Sell,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Buy => "BUY",
            Signal::Hold => "HOLD",
            Signal::Sell => "SELL",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scored fundamentals for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundamentalsRecord {
    pub symbol: String,
    pub roic: f64,
    pub ebit_margin: f64,
    pub altman_z: f64,
    pub quick_ratio: f64,
    pub interest_coverage: f64,
    pub debt_to_equity: f64,
    /// Always six entries, in [`Criterion::ALL`] order.
    pub criteria: Vec<CriterionResult>,
    pub score: u8,
    pub signal: Signal,
}

impl FundamentalsRecord {
    pub fn passed(&self, criterion: Criterion) -> bool {
        self.criteria
            .iter()
            .any(|c| c.criterion == criterion && c.passed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_from_score_boundaries() {
        assert_eq!(Signal::from_score(6), Signal::Buy);
        assert_eq!(Signal::from_score(5), Signal::Buy);
        assert_eq!(Signal::from_score(4), Signal::Hold);
        assert_eq!(Signal::from_score(3), Signal::Hold);
        assert_eq!(Signal::from_score(2), Signal::Sell);
        assert_eq!(Signal::from_score(0), Signal::Sell);
    }

    #[test]
    fn test_signal_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Signal::Hold).unwrap(), "\"HOLD\"");
        assert_eq!(Signal::Buy.to_string(), "BUY");
    }

    #[test]
    fn test_ratios_record_reads_provider_field_names() {
        let json = r#"{
            "returnOnCapitalEmployedTTM": 0.12,
            "operatingProfitMarginTTM": "0.2",
            "quickRatioTTM": null,
            "debtEquityRatioTTM": ""
        }"#;
        let record: RatiosRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.return_on_capital_employed, Some(serde_json::json!(0.12)));
        assert_eq!(record.operating_profit_margin, Some(serde_json::json!("0.2")));
        assert!(record.quick_ratio.is_none());
        assert!(record.interest_coverage.is_none());
        assert_eq!(record.debt_equity_ratio, Some(serde_json::json!("")));
        assert!(!record.is_empty());
    }

    #[test]
    fn test_ratios_record_without_known_fields_is_empty() {
        let record: RatiosRecord = serde_json::from_str(r#"{"symbol": "ACME"}"#).unwrap();
        assert!(record.is_empty());
        assert!(RatiosRecord::default().is_empty());

        let record: RatiosRecord =
            serde_json::from_str(r#"{"quickRatioTTM": 0, "debtEquityRatioTTM": null}"#).unwrap();
        assert!(!record.is_empty());
    }
}
