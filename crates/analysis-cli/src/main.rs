//! analysis-cli: risk statistics, max-Sharpe weights and fundamentals signals
//! for a portfolio.
//!
//! Usage:
//!   cargo run -p analysis-cli -- --tickers AAPL,MSFT,GOOGL --weights 40,30,30
//!   cargo run -p analysis-cli -- --tickers AAPL,MSFT --weights 50,50 --json

use analysis_core::AnalysisConfig;
use analysis_orchestrator::{AnalysisReport, PortfolioAnalyzer};

struct CliArgs {
    tickers: String,
    weights: String,
    json: bool,
}

fn parse_args(args: &[String]) -> Option<CliArgs> {
    let value_of = |flag: &str| {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .filter(|v| !v.starts_with("--"))
            .cloned()
    };

    Some(CliArgs {
        tickers: value_of("--tickers")?,
        weights: value_of("--weights")?,
        json: args.iter().any(|a| a == "--json"),
    })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  analysis-cli --tickers AAPL,MSFT --weights 50,50 [--json]");
    eprintln!();
    eprintln!("Weights are percentages, one per ticker.");
    eprintln!("Environment: POLYGON_API_KEY (required), FMP_API_KEY, BENCHMARK_SYMBOL,");
    eprintln!("             ANALYSIS_START_DATE, RISK_FREE_RATE, POLYGON_RATE_LIMIT, FMP_BASE_URL");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "analysis_cli=info,analysis_orchestrator=info,polygon_client=warn".into()
            }),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let cli = match parse_args(&args) {
        Some(cli) => cli,
        None => {
            print_usage();
            std::process::exit(1);
        }
    };

    let config = AnalysisConfig::from_env()?;
    tracing::info!(
        "analysis-cli: tickers={}, weights={}, benchmark={}",
        cli.tickers,
        cli.weights,
        config.benchmark
    );

    let analyzer = PortfolioAnalyzer::new(&config);
    let report = match analyzer.run_analysis(&cli.tickers, &cli.weights).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Portfolio analysis failed: {}", e);
            return Err(e.into());
        }
    };
    tracing::info!(
        "Analysis complete: {} symbols over {} daily returns",
        report.summary.len(),
        report.observations
    );

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(())
}

fn print_report(report: &AnalysisReport) {
    println!(
        "Benchmark {} since {} ({} daily returns)",
        report.benchmark, report.start_date, report.observations
    );
    println!();
    println!(
        "{:<8} {:>10} {:>10} {:>8} {:>10} {:>7} {:>9} {:>7}",
        "Symbol", "Return %", "Vol %", "Sharpe", "MaxDD %", "Beta", "Weight %", "Signal"
    );
    for row in &report.summary {
        println!(
            "{:<8} {:>10.2} {:>10.2} {:>8.3} {:>10.2} {:>7.3} {:>9.2} {:>7}",
            row.symbol,
            row.annual_return_pct,
            row.annual_volatility_pct,
            row.sharpe_ratio,
            row.max_drawdown_pct,
            row.beta,
            row.optimal_weight * 100.0,
            row.signal_label()
        );
    }

    println!();
    println!(
        "Portfolio (your weights): return {:.2}%, volatility {:.2}%, Sharpe {:.3}",
        report.portfolio.expected_return * 100.0,
        report.portfolio.volatility * 100.0,
        report.portfolio.sharpe_ratio
    );
    let status = if report.optimization.converged { "converged" } else { "did not converge" };
    println!(
        "Optimizer: Sharpe {:.3}, {} after {} iterations",
        report.optimization.sharpe_ratio, status, report.optimization.iterations
    );

    println!();
    for (row, record) in report.summary.iter().zip(&report.fundamentals) {
        match record {
            Some(record) => {
                println!("{}: {} ({}/6)", record.symbol, record.signal, record.score);
                for c in &record.criteria {
                    println!("  [{}] {}", if c.passed { "x" } else { " " }, c.criterion.label());
                }
            }
            None => println!("{}: no fundamentals data available", row.symbol),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("analysis-cli")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_parse_args() {
        let cli = parse_args(&args(&["--tickers", "AAPL,MSFT", "--weights", "60,40", "--json"])).unwrap();
        assert_eq!(cli.tickers, "AAPL,MSFT");
        assert_eq!(cli.weights, "60,40");
        assert!(cli.json);

        let cli = parse_args(&args(&["--weights", "100", "--tickers", "SPY"])).unwrap();
        assert_eq!(cli.tickers, "SPY");
        assert!(!cli.json);
    }

    #[test]
    fn test_parse_args_requires_both_lists() {
        assert!(parse_args(&args(&["--tickers", "AAPL"])).is_none());
        assert!(parse_args(&args(&["--tickers", "--weights", "100"])).is_none());
        assert!(parse_args(&args(&[])).is_none());
    }
}
