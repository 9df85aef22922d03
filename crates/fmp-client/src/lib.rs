//! Client for the FinancialModelingPrep ratios endpoints.
//!
//! Missing data is normal for this provider: any non-2xx status or an empty
//! array yields `Ok(None)`. Only transport failures and payloads that are not
//! JSON arrays surface as errors.

use analysis_core::{AnalysisConfig, AnalysisError, FundamentalsProvider, RatiosRecord};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

#[derive(Clone)]
pub struct FmpClient {
    api_key: String,
    base_url: String,
    client: Client,
}

impl FmpClient {
    pub fn new(api_key: String, base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(config.fmp_api_key.clone(), config.fmp_base_url.clone())
    }

    /// GET `{base_url}/{path}` and return the first element of the JSON array body.
    async fn get_first_record(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<Value>, AnalysisError> {
        let url = format!("{}/{}", self.base_url, path);

        let response = self
            .client
            .get(&url)
            .query(query)
            .query(&[("apikey", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| AnalysisError::ApiError(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!("FMP {} returned HTTP {}", path, status.as_u16());
            return Ok(None);
        }

        let body = response
            .text()
            .await
            .map_err(|e| AnalysisError::ApiError(e.without_url().to_string()))?;

        first_record(&body)
    }

    /// Trailing-twelve-month ratios for a symbol
    pub async fn get_ratios_ttm(&self, symbol: &str) -> Result<Option<RatiosRecord>, AnalysisError> {
        let path = format!("ratios-ttm/{}", symbol);
        match self.get_first_record(&path, &[]).await? {
            Some(record) => {
                let ratios = parse_ratios(record)?;
                if ratios.is_empty() {
                    tracing::debug!("FMP ratios record for {} has no scoring fields", symbol);
                    Ok(None)
                } else {
                    Ok(Some(ratios))
                }
            }
            None => Ok(None),
        }
    }

    /// Altman Z-score from the latest annual ratios record, raw as served.
    pub async fn get_altman_zscore(&self, symbol: &str) -> Result<Option<Value>, AnalysisError> {
        let path = format!("ratios/{}", symbol);
        let record = self.get_first_record(&path, &[("limit", "1")]).await?;
        Ok(record.and_then(altman_zscore))
    }
}

#[async_trait]
impl FundamentalsProvider for FmpClient {
    async fn fetch_ratios(&self, symbol: &str) -> Result<Option<RatiosRecord>, AnalysisError> {
        self.get_ratios_ttm(symbol).await
    }

    async fn fetch_zscore(&self, symbol: &str) -> Result<Option<Value>, AnalysisError> {
        self.get_altman_zscore(symbol).await
    }
}

/// First element of a JSON array body. Blank bodies, empty arrays and an
/// empty first object have no record.
pub fn first_record(body: &str) -> Result<Option<Value>, AnalysisError> {
    if body.trim().is_empty() {
        return Ok(None);
    }

    let payload: Value = serde_json::from_str(body)
        .map_err(|e| AnalysisError::ApiError(format!("malformed FMP payload: {}", e)))?;

    match payload {
        Value::Array(items) => Ok(items
            .into_iter()
            .next()
            .filter(|item| !matches!(item, Value::Object(fields) if fields.is_empty()))),
        other => Err(AnalysisError::ApiError(format!(
            "expected a JSON array from FMP, got {}",
            truncate(&other.to_string(), 120)
        ))),
    }
}

fn parse_ratios(record: Value) -> Result<RatiosRecord, AnalysisError> {
    serde_json::from_value(record)
        .map_err(|e| AnalysisError::ApiError(format!("unexpected ratios record: {}", e)))
}

fn altman_zscore(record: Value) -> Option<Value> {
    record.get("altmanZScore").cloned().filter(|v| !v.is_null())
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
