use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use strategy_engine::{
    write_trades_csv, BacktestEngine, BacktestParameters, BacktestResult, FileDataSource,
    IndicatorPrepass, MarketDataSource, StrategyConfig, SyntheticDataSource,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
    Csv,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PrepassMode {
    /// Only the indicators the strategy references
    Referenced,
    /// SMA 5/20/60, RSI 14, MACD 12/26/9, BB 20/2
    Standard,
}

#[derive(Parser, Debug)]
#[command(name = "strategy-backtest")]
#[command(version = "0.1.0")]
#[command(about = "Backtest a condition-tree strategy with optional DCA", long_about = None)]
struct Args {
    /// Strategy JSON file (buy_conditions, sell_conditions, dca_config)
    #[arg(short, long)]
    strategy: PathBuf,

    /// Data file path (CSV/JSON). If not provided, uses synthetic data.
    #[arg(short = 'f', long)]
    data_file: Option<PathBuf>,

    /// Ticker recorded on trades
    #[arg(short, long, default_value = "SPY")]
    ticker: String,

    /// Initial capital
    #[arg(short, long, default_value = "10000000")]
    capital: f64,

    /// Lookback period (5d, 6mo, 1y, ytd, max)
    #[arg(long, default_value = "1y")]
    period: String,

    /// Number of days of synthetic data
    #[arg(short, long, default_value = "365")]
    days: usize,

    /// Initial price for synthetic data
    #[arg(long, default_value = "100.0")]
    initial_price: f64,

    /// Seed for synthetic data
    #[arg(long)]
    seed: Option<u64>,

    /// Indicator pre-pass
    #[arg(long, value_enum, default_value_t = PrepassMode::Referenced)]
    prepass: PrepassMode,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
    output: OutputFormat,

    /// Pretty print JSON output
    #[arg(long)]
    pretty: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("strategy_engine=info,strategy_backtest=info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args = Args::parse();

    let strategy = StrategyConfig::from_json_file(&args.strategy)
        .with_context(|| format!("loading strategy {}", args.strategy.display()))?;

    let prepass = match args.prepass {
        PrepassMode::Referenced => IndicatorPrepass::Referenced,
        PrepassMode::Standard => IndicatorPrepass::Standard,
    };
    let params = BacktestParameters {
        ticker: args.ticker.clone(),
        initial_capital: args.capital,
        period: args.period.clone(),
        prepass,
        ..Default::default()
    };

    let source: Box<dyn MarketDataSource> = match &args.data_file {
        Some(path) => {
            info!(path = %path.display(), "loading bars from file");
            Box::new(FileDataSource::new(path))
        }
        None => {
            info!(
                days = args.days,
                initial_price = args.initial_price,
                seed = ?args.seed,
                "generating synthetic bars"
            );
            let source = SyntheticDataSource::new(args.days, args.initial_price);
            Box::new(match args.seed {
                Some(seed) => source.with_seed(seed),
                None => source,
            })
        }
    };

    let engine = BacktestEngine::new(params);
    let result = engine.run_from_source(&strategy, source.as_ref())?;

    info!(
        trades = result.trades.len(),
        total_return = result.metrics.total_return,
        "backtest complete"
    );

    match args.output {
        OutputFormat::Json => {
            let json = if args.pretty {
                serde_json::to_string_pretty(&result)?
            } else {
                serde_json::to_string(&result)?
            };
            println!("{}", json);
        }
        OutputFormat::Text => print_text_report(&result),
        OutputFormat::Csv => write_trades_csv(&result.trades, io::stdout().lock())?,
    }

    Ok(())
}

fn print_text_report(result: &BacktestResult) {
    println!();
    println!("================================================================");
    println!("  BACKTEST REPORT - {}", result.ticker);
    println!("================================================================");
    println!();
    println!("  Period: {} to {}", result.start_date, result.end_date);
    println!("  Bars:   {}", result.equity_curve.len());
    println!();
    println!("----------------------------------------------------------------");
    println!("  CAPITAL");
    println!("----------------------------------------------------------------");
    println!("  Initial Capital:  {:>16.2}", result.initial_capital);
    println!("  Final Equity:     {:>16.2}", result.final_equity);
    println!("  Total Return:     {:>15.2}%", result.metrics.total_return);
    println!("  Max Drawdown:     {:>15.2}%", result.metrics.mdd);
    println!();
    println!("----------------------------------------------------------------");
    println!("  TRADE STATISTICS");
    println!("----------------------------------------------------------------");
    println!("  Round Trips:      {:>16}", result.metrics.trade_count);
    println!("  Win Rate:         {:>15.1}%", result.metrics.win_rate);
    println!("  Profit Factor:    {:>16.3}", result.metrics.profit_factor);
    println!();
    println!("================================================================");

    if !result.trades.is_empty() {
        println!();
        println!("  RECENT TRADES (last 5)");
        println!("----------------------------------------------------------------");
        for trade in result.trades.iter().rev().take(5) {
            let pnl = trade
                .pnl
                .map(|p| format!("P&L: {:+.2}", p))
                .unwrap_or_default();
            println!(
                "  {} | {:<11} | {:>8} @ {:>10.2} | {}",
                trade.date.format("%Y-%m-%d"),
                trade.trade_type.as_str(),
                trade.quantity,
                trade.price,
                pnl
            );
        }
        println!();
    }
}
