use async_trait::async_trait;
use chrono::NaiveDate;
use crate::{AnalysisError, PricePanel, RatiosRecord};

/// Source of historical daily closes for a set of symbols plus a benchmark.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Fetch an aligned panel covering `symbols ∪ {benchmark}` from `start` to today.
    ///
    /// Any symbol the provider cannot serve fails the whole request with
    /// [`AnalysisError::DataUnavailable`].
    async fn fetch_price_panel(
        &self,
        symbols: &[String],
        benchmark: &str,
        start: NaiveDate,
    ) -> Result<PricePanel, AnalysisError>;
}

/// Source of trailing-twelve-month ratios and the Altman Z-score.
///
/// `Ok(None)` means the provider has no record for the symbol, which is an
/// expected outcome. `Err` is reserved for transport or payload failures.
#[async_trait]
pub trait FundamentalsProvider: Send + Sync {
    async fn fetch_ratios(&self, symbol: &str) -> Result<Option<RatiosRecord>, AnalysisError>;

    async fn fetch_zscore(&self, symbol: &str) -> Result<Option<serde_json::Value>, AnalysisError>;
}
