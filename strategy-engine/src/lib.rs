pub mod data;
pub mod dca;
pub mod engine;
pub mod export;
pub mod indicators;
pub mod metrics;
pub mod portfolio;
pub mod reconcile;
pub mod signals;

pub use data::{
    load_file, validate_bars, FileDataSource, MarketDataSource, StaticDataSource,
    SyntheticDataSource,
};
pub use dca::DcaSchedule;
pub use engine::{BacktestEngine, Simulation};
pub use export::{export_trades_csv, trades_to_csv_string, write_trades_csv};
pub use indicators::IndicatorFrame;
pub use metrics::MetricsCalculator;
pub use portfolio::Portfolio;
pub use reconcile::TradeReconciler;
pub use signals::{ConditionEvaluator, SignalGenerator, SignalSeries};

// Re-export common types
pub use common::{
    BacktestError, BacktestParameters, BacktestResult, Bar, DcaConfig, DcaInterval, EquityPoint,
    IndicatorPrepass, IndicatorSpec, LogicNode, PerformanceMetrics, Result, StrategyConfig,
    TradeRecord, TradeType,
};
