//! rhymewatch: score recent news headlines for a ticker and call tomorrow's
//! price direction.
//!
//! Usage:
//!   cargo run -p rhymewatch -- --symbol AAPL
//!   cargo run -p rhymewatch -- --symbol MSFT --days 30 --pretty
//!
//! The report is written to stdout as JSON; logs go to stderr.

mod config;

use std::sync::Arc;

use analysis_orchestrator::{AnalysisPipeline, DEFAULT_LOOKBACK_DAYS};
use anyhow::Context;
use config::AppConfig;
use market_data::YahooFinanceClient;
use news_aggregator::HeadlineAggregator;
use sentiment_analysis::SharedScorer;

#[derive(Debug, PartialEq)]
struct CliArgs {
    symbol: String,
    days: u32,
    pretty: bool,
}

fn usage() -> String {
    format!(
        "usage: rhymewatch --symbol <TICKER> [--days <1-365, default {}>] [--pretty]",
        DEFAULT_LOOKBACK_DAYS
    )
}

fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a String> {
    args.iter().position(|a| a == flag).and_then(|i| args.get(i + 1))
}

fn parse_args(args: &[String]) -> anyhow::Result<CliArgs> {
    let symbol = value_after(args, "--symbol")
        .filter(|s| !s.starts_with("--"))
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("missing --symbol\n{}", usage()))?;

    let days = match value_after(args, "--days") {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("--days expects a number, got '{}'", raw))?,
        None if args.iter().any(|a| a == "--days") => {
            anyhow::bail!("--days needs a value\n{}", usage())
        }
        None => DEFAULT_LOOKBACK_DAYS,
    };

    Ok(CliArgs {
        symbol,
        days,
        pretty: args.iter().any(|a| a == "--pretty"),
    })
}

fn init_tracing() {
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "rhymewatch=info,analysis_orchestrator=info,ml_engine=info,news_sources=warn".into()
    });

    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("{}", usage());
        return Ok(());
    }
    let cli = parse_args(&args)?;
    let config = AppConfig::from_env()?;

    tracing::info!(
        "Configured: policy {:?}, scorer {:?}, {} trees",
        config.aggregation_policy,
        config.scorer_backend(),
        config.forest_trees
    );

    let aggregator =
        HeadlineAggregator::with_default_sources(&config.news_sources(), config.aggregator());
    let scorer = Arc::new(SharedScorer::from_backend(config.scorer_backend()));
    let prices = Arc::new(YahooFinanceClient::new(config.source_timeout()));
    let pipeline = AnalysisPipeline::new(aggregator, scorer, prices, config.pipeline()?);

    let report = pipeline.analyze(&cli.symbol, cli.days).await?;

    let json = if cli.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{}", json);

    if !report.has_headlines() {
        eprintln!(
            "No news found for {} in the last {} days",
            report.symbol, cli.days
        );
        std::process::exit(1);
    }
    for notice in &report.notices {
        tracing::warn!("{}", notice);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_args_defaults() {
        let cli = parse_args(&args(&["--symbol", "aapl"])).unwrap();
        assert_eq!(
            cli,
            CliArgs {
                symbol: "aapl".to_string(),
                days: DEFAULT_LOOKBACK_DAYS,
                pretty: false,
            }
        );
    }

    #[test]
    fn test_parse_args_all_flags() {
        let cli = parse_args(&args(&["--pretty", "--days", "30", "--symbol", "MSFT"])).unwrap();
        assert_eq!(cli.symbol, "MSFT");
        assert_eq!(cli.days, 30);
        assert!(cli.pretty);
    }

    #[test]
    fn test_parse_args_errors() {
        assert!(parse_args(&args(&[])).is_err());
        assert!(parse_args(&args(&["--symbol"])).is_err());
        assert!(parse_args(&args(&["--symbol", "--pretty"])).is_err());
        assert!(parse_args(&args(&["--symbol", "AAPL", "--days", "many"])).is_err());
        assert!(parse_args(&args(&["--symbol", "AAPL", "--days"])).is_err());
        assert!(parse_args(&args(&["--symbol", "AAPL", "--days", "-5"])).is_err());
    }
}
