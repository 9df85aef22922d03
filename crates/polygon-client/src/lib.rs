use analysis_core::{requested_columns, AnalysisError, Bar, MarketDataProvider, PricePanel};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use futures_util::future::try_join_all;
use reqwest::Client;
use serde::Deserialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

const BASE_URL: &str = "https://api.polygon.io";
/// Upper bound Polygon accepts for one aggregates page; covers decades of daily bars.
const MAX_AGGREGATE_RESULTS: &str = "50000";

/// Sliding-window rate limiter: at most `max_requests` per `window` duration.
#[derive(Clone)]
struct RateLimiter {
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            timestamps: Arc::new(Mutex::new(VecDeque::new())),
            max_requests: max_requests.max(1),
            window,
        }
    }

    async fn acquire(&self) {
        loop {
            let mut ts = self.timestamps.lock().await;
            let now = Instant::now();

            // Remove timestamps outside the window
            while let Some(&front) = ts.front() {
                if now.duration_since(front) >= self.window {
                    ts.pop_front();
                } else {
                    break;
                }
            }

            if ts.len() < self.max_requests {
                ts.push_back(now);
                return;
            }

            // Wait until the oldest request falls out of the window
            let oldest = match ts.front() {
                Some(&t) => t,
                None => continue,
            };
            let sleep_dur = (oldest + self.window).saturating_duration_since(now)
                + Duration::from_millis(50);
            drop(ts);
            tracing::debug!("Rate limiter: waiting {:.1}s for Polygon API slot", sleep_dur.as_secs_f64());
            tokio::time::sleep(sleep_dur).await;
        }
    }
}

#[derive(Clone)]
pub struct PolygonClient {
    api_key: String,
    base_url: String,
    client: Client,
    rate_limiter: RateLimiter,
}

impl PolygonClient {
    /// `rate_limit` is the number of requests allowed per minute.
    pub fn new(api_key: String, rate_limit: usize) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(90))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            api_key,
            base_url: BASE_URL.to_string(),
            client,
            rate_limiter: RateLimiter::new(rate_limit, Duration::from_secs(60)),
        }
    }

    /// Point the client at a different host (proxies, recorded fixtures).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Send a request with rate limiting and automatic 429 retry.
    ///
    /// Errors never carry the request URL, which holds the API key.
    async fn send_request(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, AnalysisError> {
        let request = builder.build().map_err(redact)?;

        for attempt in 0..3u32 {
            self.rate_limiter.acquire().await;
            let req_clone = request.try_clone()
                .ok_or_else(|| AnalysisError::ApiError("Cannot clone request".to_string()))?;
            let response = self.client.execute(req_clone).await.map_err(redact)?;

            if response.status().as_u16() != 429 {
                return Ok(response);
            }

            let wait_secs = 15u64;
            tracing::warn!("Polygon 429 rate limited, waiting {}s before retry {}/3", wait_secs, attempt + 1);
            tokio::time::sleep(Duration::from_secs(wait_secs)).await;
        }

        Err(AnalysisError::ApiError("Rate limited by Polygon after 3 retries".to_string()))
    }

    /// Get split-adjusted aggregates (bars) for a symbol between two dates, inclusive.
    pub async fn get_aggregates(
        &self,
        symbol: &str,
        multiplier: u32,
        timespan: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Bar>, AnalysisError> {
        let url = format!(
            "{}/v2/aggs/ticker/{}/range/{}/{}/{}/{}",
            self.base_url,
            symbol,
            multiplier,
            timespan,
            from.format("%Y-%m-%d"),
            to.format("%Y-%m-%d")
        );

        let response = self.send_request(
            self.client.get(&url).query(&[
                ("apiKey", self.api_key.as_str()),
                ("adjusted", "true"),
                ("sort", "asc"),
                ("limit", MAX_AGGREGATE_RESULTS),
            ])
        ).await?;

        if !response.status().is_success() {
            return Err(AnalysisError::ApiError(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let agg_response: AggregateResponse = response.json().await.map_err(redact)?;

        Ok(agg_response.into_bars())
    }

    /// Daily closing prices keyed by trading date.
    pub async fn get_daily_closes(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<(NaiveDate, f64)>, AnalysisError> {
        let bars = self.get_aggregates(symbol, 1, "day", from, to).await?;
        Ok(daily_closes(&bars))
    }
}

#[async_trait]
impl MarketDataProvider for PolygonClient {
    async fn fetch_price_panel(
        &self,
        symbols: &[String],
        benchmark: &str,
        start: NaiveDate,
    ) -> Result<PricePanel, AnalysisError> {
        let columns = requested_columns(symbols, benchmark);
        let end = Utc::now().date_naive();
        tracing::info!(
            "Fetching daily closes for {} symbols from {} to {}",
            columns.len(),
            start,
            end
        );

        let fetches = columns.iter().map(|symbol| async move {
            let closes = self
                .get_daily_closes(symbol, start, end)
                .await
                .map_err(|e| AnalysisError::DataUnavailable(format!("{}: {}", symbol, e)))?;
            if closes.is_empty() {
                return Err(AnalysisError::DataUnavailable(format!(
                    "no price history returned for {}",
                    symbol
                )));
            }
            tracing::debug!("Fetched {} daily closes for {}", closes.len(), symbol);
            Ok::<_, AnalysisError>((symbol.clone(), closes))
        });

        let series = try_join_all(fetches).await?;
        let panel = PricePanel::align(series);
        if panel.is_empty() {
            return Err(AnalysisError::DataUnavailable(format!(
                "no common trading dates across {}",
                columns.join(", ")
            )));
        }

        tracing::info!("Aligned price panel: {} dates x {} symbols", panel.len(), columns.len());
        Ok(panel)
    }
}

fn redact(e: reqwest::Error) -> AnalysisError {
    AnalysisError::ApiError(e.without_url().to_string())
}

/// Collapse bars to one close per UTC calendar date.
///
/// Polygon stamps daily bars at the session's midnight in New York, which
/// falls on the same UTC date.
pub fn daily_closes(bars: &[Bar]) -> Vec<(NaiveDate, f64)> {
    bars.iter()
        .map(|bar| (bar.timestamp.date_naive(), bar.close))
        .collect()
}

// Response structures
#[derive(Debug, Deserialize)]
struct AggregateResponse {
    #[serde(default)]
    results: Vec<AggregateResult>,
}

#[derive(Debug, Deserialize)]
struct AggregateResult {
    t: i64, // timestamp
    c: f64, // close
}

impl AggregateResponse {
    fn into_bars(self) -> Vec<Bar> {
        self.results
            .into_iter()
            .filter_map(|r| {
                let timestamp = DateTime::from_timestamp_millis(r.t)?;
                Some(Bar { timestamp, close: r.c })
            })
            .collect()
    }
}
