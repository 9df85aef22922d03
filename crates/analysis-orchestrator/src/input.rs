use analysis_core::AnalysisError;
use serde::{Deserialize, Serialize};

/// Validated ticker list with positionally aligned weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioInput {
    symbols: Vec<String>,
    /// Fractions of the portfolio; not required to sum to one
    weights: Vec<f64>,
}

impl PortfolioInput {
    pub fn new(symbols: Vec<String>, weights: Vec<f64>) -> Result<Self, AnalysisError> {
        if symbols.is_empty() {
            return Err(AnalysisError::InvalidInput("no tickers given".to_string()));
        }
        if symbols.len() != weights.len() {
            return Err(AnalysisError::InvalidInput(format!(
                "got {} tickers but {} weights",
                symbols.len(),
                weights.len()
            )));
        }
        if let Some(w) = weights.iter().find(|w| !w.is_finite()) {
            return Err(AnalysisError::InvalidInput(format!("weight {} is not a finite number", w)));
        }
        Ok(Self { symbols, weights })
    }

    /// Parse comma-separated tickers and percentage weights, e.g. `"AAPL, msft"`
    /// and `"60,40"`.
    pub fn parse(tickers: &str, weights: &str) -> Result<Self, AnalysisError> {
        let symbols = split_tokens(tickers, "ticker")?
            .into_iter()
            .map(str::to_uppercase)
            .collect();

        let weights = split_tokens(weights, "weight")?
            .into_iter()
            .map(|token| {
                token
                    .parse::<f64>()
                    .map(|pct| pct / 100.0)
                    .map_err(|_| AnalysisError::InvalidInput(format!("weight {:?} is not a number", token)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(symbols, weights)
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

fn split_tokens<'a>(csv: &'a str, what: &str) -> Result<Vec<&'a str>, AnalysisError> {
    if csv.trim().is_empty() {
        return Err(AnalysisError::InvalidInput(format!("no {}s given", what)));
    }
    csv.split(',')
        .map(str::trim)
        .enumerate()
        .map(|(idx, token)| {
            if token.is_empty() {
                Err(AnalysisError::InvalidInput(format!("empty {} at position {}", what, idx + 1)))
            } else {
                Ok(token)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_tickers_and_weights() {
        let input = PortfolioInput::parse(" aapl,MSFT , Googl", "50, 30,20").unwrap();
        assert_eq!(input.symbols(), &["AAPL", "MSFT", "GOOGL"]);
        assert_eq!(input.weights(), &[0.5, 0.3, 0.2]);
        assert_eq!(input.len(), 3);
    }

    #[test]
    fn test_weights_need_not_sum_to_one() {
        let input = PortfolioInput::parse("AAPL,MSFT", "10,10").unwrap();
        assert_eq!(input.weights(), &[0.1, 0.1]);
    }

    #[test]
    fn test_duplicates_are_kept() {
        let input = PortfolioInput::parse("AAPL,aapl", "50,50").unwrap();
        assert_eq!(input.symbols(), &["AAPL", "AAPL"]);
    }

    #[test]
    fn test_invalid_inputs() {
        for (tickers, weights) in [
            ("", "100"),
            ("AAPL", ""),
            ("AAPL,,MSFT", "50,0,50"),
            ("AAPL,MSFT", "50"),
            ("AAPL", "fifty"),
            ("AAPL", "inf"),
        ] {
            let result = PortfolioInput::parse(tickers, weights);
            assert!(
                matches!(result, Err(AnalysisError::InvalidInput(_))),
                "{:?} / {:?}",
                tickers,
                weights
            );
        }
    }
}
