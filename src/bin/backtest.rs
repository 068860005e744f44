//! Replay a CSV candle history through the prediction engine and print a
//! performance report.

use anyhow::{Context, Result};
use candlecast::application::backtest::{BacktestConfig, BacktestResult};
use candlecast::application::engine::PredictionEngine;
use candlecast::config::EngineConfig;
use candlecast::domain::candle::Candle;
use candlecast::infrastructure::persistence::FileStore;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about = "Backtest the candlecast prediction engine over historical candles")]
struct Cli {
    /// CSV file with timestamp,open,high,low,close,volume columns
    #[arg(long)]
    candles: PathBuf,

    /// Bars to look ahead when scoring a prediction
    #[arg(long, default_value_t = 5)]
    horizon: usize,

    /// Percent return at or above which a LONG call counts as correct
    #[arg(long, default_value_t = 0.5)]
    profit_threshold: f64,

    /// Percent return at or below which a SHORT call counts as correct
    #[arg(long, default_value_t = -0.5, allow_hyphen_values = true)]
    loss_threshold: f64,

    /// Directory for persisted engine state (omit to run without persistence)
    #[arg(long)]
    state_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let candles = load_candles(&cli.candles)?;
    anyhow::ensure!(!candles.is_empty(), "no candles in {:?}", cli.candles);

    let config = EngineConfig::from_env()?;
    let engine = match &cli.state_dir {
        Some(dir) => PredictionEngine::with_store(config, Arc::new(FileStore::new(dir.clone())?)),
        None => PredictionEngine::new(config),
    };

    let backtest_config = BacktestConfig {
        horizon: cli.horizon,
        profit_threshold_pct: cli.profit_threshold,
        loss_threshold_pct: cli.loss_threshold,
        ..BacktestConfig::default()
    };
    let result = engine.run_backtest(&candles, Some(backtest_config));
    print_report(&result, candles.len());
    Ok(())
}

fn load_candles(path: &Path) -> Result<Vec<Candle>> {
    let mut reader =
        csv::Reader::from_path(path).with_context(|| format!("Failed to open {:?}", path))?;
    let mut candles = Vec::new();
    for row in reader.deserialize() {
        let candle: Candle = row.context("Failed to parse candle row")?;
        candles.push(candle);
    }
    Ok(candles)
}

fn print_report(result: &BacktestResult, bars: usize) {
    println!("{}", "=".repeat(72));
    println!("BACKTEST REPORT");
    println!("{}", "=".repeat(72));
    println!("Bars:            {}", bars);
    println!("Evaluated:       {}", result.total_evaluated);
    println!("Accuracy:        {:.2}%", result.accuracy * 100.0);
    println!("Win Rate:        {:.2}%", result.win_rate * 100.0);
    println!(
        "Avg Win / Loss:  {:+.2}% / -{:.2}%",
        result.avg_win_pct, result.avg_loss_pct
    );
    if result.profit_factor.is_finite() {
        println!("Profit Factor:   {:.2}", result.profit_factor);
    } else {
        println!("Profit Factor:   inf (no losing steps)");
    }
    println!("Sharpe (ann.):   {:.2}", result.sharpe_ratio);
    println!("Max Drawdown:    {:.2}%", result.max_drawdown_pct);
    println!("Final Equity:    {:+.2}%", result.final_equity_pct);
    println!("{}", "-".repeat(72));
    for (label, breakdown) in [
        ("LONG", &result.long),
        ("SHORT", &result.short),
        ("NEUTRAL", &result.neutral),
    ] {
        println!(
            "{:<8} count {:>5}  correct {:>5}  accuracy {:>6.2}%",
            label,
            breakdown.count,
            breakdown.correct,
            breakdown.accuracy * 100.0
        );
    }
    println!("{}", "=".repeat(72));
}
