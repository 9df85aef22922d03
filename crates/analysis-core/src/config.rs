use chrono::NaiveDate;
use crate::AnalysisError;

pub const DEFAULT_FMP_BASE_URL: &str = "https://financialmodelingprep.com/api/v3";
/// S&P 500 tracker used as the beta benchmark.
pub const DEFAULT_BENCHMARK: &str = "SPY";
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.03;
/// Polygon Starter plan allowance. Free tier users should set POLYGON_RATE_LIMIT=5.
pub const DEFAULT_POLYGON_RATE_LIMIT: usize = 500;

pub fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default()
}

/// Process-wide settings, read once at startup and injected into the gateways.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub polygon_api_key: String,
    /// Requests per minute
    pub polygon_rate_limit: usize,
    /// An empty key is allowed; every fundamentals request then comes back empty.
    pub fmp_api_key: String,
    pub fmp_base_url: String,
    pub benchmark: String,
    pub start_date: NaiveDate,
    pub risk_free_rate: f64,
}

impl AnalysisConfig {
    pub fn new(polygon_api_key: impl Into<String>, fmp_api_key: impl Into<String>) -> Self {
        Self {
            polygon_api_key: polygon_api_key.into(),
            polygon_rate_limit: DEFAULT_POLYGON_RATE_LIMIT,
            fmp_api_key: fmp_api_key.into(),
            fmp_base_url: DEFAULT_FMP_BASE_URL.to_string(),
            benchmark: DEFAULT_BENCHMARK.to_string(),
            start_date: default_start_date(),
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
        }
    }

    pub fn from_env() -> Result<Self, AnalysisError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AnalysisError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let polygon_api_key = get("POLYGON_API_KEY").ok_or_else(|| {
            AnalysisError::Configuration("POLYGON_API_KEY must be set".to_string())
        })?;

        let fmp_api_key = get("FMP_API_KEY").unwrap_or_else(|| {
            tracing::warn!("FMP_API_KEY is not set; fundamentals will be unavailable");
            String::new()
        });

        let mut config = Self::new(polygon_api_key, fmp_api_key);

        if let Some(raw) = get("POLYGON_RATE_LIMIT") {
            config.polygon_rate_limit = raw
                .parse::<usize>()
                .ok()
                .filter(|&n| n > 0)
                .ok_or_else(|| {
                    AnalysisError::Configuration(format!("invalid POLYGON_RATE_LIMIT: {}", raw))
                })?;
        }
        if let Some(url) = get("FMP_BASE_URL") {
            config.fmp_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(benchmark) = get("BENCHMARK_SYMBOL") {
            config.benchmark = benchmark.to_uppercase();
        }
        if let Some(raw) = get("ANALYSIS_START_DATE") {
            config.start_date = NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|e| {
                AnalysisError::Configuration(format!("invalid ANALYSIS_START_DATE {}: {}", raw, e))
            })?;
        }
        if let Some(raw) = get("RISK_FREE_RATE") {
            config.risk_free_rate = raw
                .parse::<f64>()
                .ok()
                .filter(|r| r.is_finite())
                .ok_or_else(|| {
                    AnalysisError::Configuration(format!("invalid RISK_FREE_RATE: {}", raw))
                })?;
        }

        Ok(config)
    }
}
