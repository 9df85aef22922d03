use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use crate::AnalysisError;

/// Columns to request for an analysis: the symbols in order, then the
/// benchmark, each name kept once.
pub fn requested_columns(symbols: &[String], benchmark: &str) -> Vec<String> {
    let mut columns: Vec<String> = Vec::with_capacity(symbols.len() + 1);
    for symbol in symbols.iter().map(String::as_str).chain(std::iter::once(benchmark)) {
        if !columns.iter().any(|c| c == symbol) {
            columns.push(symbol.to_string());
        }
    }
    columns
}

/// Date-indexed table of closing prices, one column per symbol.
///
/// Every row has a finite price in every column; dates are strictly ascending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePanel {
    dates: Vec<NaiveDate>,
    symbols: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl PricePanel {
    /// Build a panel from columns that are already aligned on `dates`.
    pub fn new(
        dates: Vec<NaiveDate>,
        symbols: Vec<String>,
        columns: Vec<Vec<f64>>,
    ) -> Result<Self, AnalysisError> {
        if symbols.len() != columns.len() {
            return Err(AnalysisError::InvalidInput(format!(
                "{} symbols but {} price columns",
                symbols.len(),
                columns.len()
            )));
        }
        if let Some((symbol, col)) = symbols
            .iter()
            .zip(&columns)
            .find(|(_, col)| col.len() != dates.len())
        {
            return Err(AnalysisError::InvalidInput(format!(
                "column {} has {} prices for {} dates",
                symbol,
                col.len(),
                dates.len()
            )));
        }
        if dates.windows(2).any(|w| w[0] >= w[1]) {
            return Err(AnalysisError::InvalidInput(
                "panel dates must be strictly ascending".to_string(),
            ));
        }
        Ok(Self { dates, symbols, columns })
    }

    /// Align per-symbol series on their common trading dates.
    ///
    /// A date survives only if every series has a finite price for it. There
    /// is no forward or backward filling. Repeated symbols keep their first
    /// series; repeated dates within a series keep the last price.
    pub fn align(series: Vec<(String, Vec<(NaiveDate, f64)>)>) -> Self {
        let mut symbols: Vec<String> = Vec::with_capacity(series.len());
        let mut kept: Vec<Vec<(NaiveDate, f64)>> = Vec::with_capacity(series.len());
        for (symbol, points) in series {
            if symbols.contains(&symbol) {
                tracing::debug!("Ignoring repeated series for {}", symbol);
                continue;
            }
            symbols.push(symbol);
            kept.push(points);
        }

        let width = symbols.len();
        let mut rows: BTreeMap<NaiveDate, Vec<Option<f64>>> = BTreeMap::new();
        for (col, points) in kept.into_iter().enumerate() {
            for (date, price) in points {
                let row = rows.entry(date).or_insert_with(|| vec![None; width]);
                row[col] = if price.is_finite() { Some(price) } else { None };
            }
        }

        let mut dates = Vec::with_capacity(rows.len());
        let mut columns: Vec<Vec<f64>> = vec![Vec::with_capacity(rows.len()); width];
        let mut dropped = 0usize;
        for (date, row) in rows {
            if row.iter().any(Option::is_none) {
                dropped += 1;
                continue;
            }
            dates.push(date);
            for (col, price) in row.into_iter().flatten().enumerate() {
                columns[col].push(price);
            }
        }

        if dropped > 0 {
            tracing::debug!("Dropped {} dates with incomplete prices", dropped);
        }

        Self { dates, symbols, columns }
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Number of aligned dates
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn column(&self, symbol: &str) -> Option<&[f64]> {
        self.symbols
            .iter()
            .position(|s| s == symbol)
            .map(|idx| self.columns[idx].as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn test_requested_columns_dedups_and_appends_benchmark() {
        let symbols = vec!["AAPL".to_string(), "MSFT".to_string(), "AAPL".to_string()];
        assert_eq!(requested_columns(&symbols, "SPY"), vec!["AAPL", "MSFT", "SPY"]);
        assert_eq!(requested_columns(&["SPY".to_string()], "SPY"), vec!["SPY"]);
    }

    #[test]
    fn test_align_keeps_only_common_dates() {
        let panel = PricePanel::align(vec![
            ("AAA".to_string(), vec![(day(2), 10.0), (day(3), 11.0), (day(4), 12.0)]),
            ("SPY".to_string(), vec![(day(3), 400.0), (day(4), 401.0), (day(5), 402.0)]),
        ]);

        assert_eq!(panel.dates(), &[day(3), day(4)]);
        assert_eq!(panel.column("AAA").unwrap(), &[11.0, 12.0]);
        assert_eq!(panel.column("SPY").unwrap(), &[400.0, 401.0]);
        assert!(panel.column("MSFT").is_none());
    }

    #[test]
    fn test_align_drops_non_finite_prices_and_sorts_dates() {
        let panel = PricePanel::align(vec![
            ("AAA".to_string(), vec![(day(4), 12.0), (day(2), 10.0), (day(3), f64::NAN)]),
            ("SPY".to_string(), vec![(day(2), 400.0), (day(3), 401.0), (day(4), 402.0)]),
        ]);

        assert_eq!(panel.dates(), &[day(2), day(4)]);
        assert_eq!(panel.column("AAA").unwrap(), &[10.0, 12.0]);
    }

    #[test]
    fn test_align_without_overlap_is_empty() {
        let panel = PricePanel::align(vec![
            ("AAA".to_string(), vec![(day(2), 10.0)]),
            ("SPY".to_string(), vec![(day(3), 400.0)]),
        ]);
        assert!(panel.is_empty());
        assert_eq!(panel.symbols().len(), 2);
    }

    #[test]
    fn test_new_rejects_ragged_columns() {
        let result = PricePanel::new(
            vec![day(2), day(3)],
            vec!["AAA".to_string()],
            vec![vec![1.0]],
        );
        assert!(matches!(result, Err(AnalysisError::InvalidInput(_))));
    }
}
