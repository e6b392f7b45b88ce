use std::time::Instant;

use common::{
    BacktestParameters, BacktestResult, Bar, EquityPoint, IndicatorPrepass, IndicatorSpec,
    Result, StrategyConfig, TradeRecord, TradeType,
};
use rayon::prelude::*;
use tracing::debug;

use crate::data::{validate_bars, MarketDataSource};
use crate::dca::DcaSchedule;
use crate::indicators::IndicatorFrame;
use crate::metrics::MetricsCalculator;
use crate::portfolio::Portfolio;
use crate::reconcile::TradeReconciler;
use crate::signals::{SignalGenerator, SignalSeries};

/// Share of available cash committed by a signal-driven buy
pub const SIGNAL_INVEST_FRACTION: f64 = 0.99;

/// Raw output of the bar-by-bar simulation, before P&L reconciliation
#[derive(Debug, Clone, PartialEq)]
pub struct Simulation {
    pub trades: Vec<TradeRecord>,
    pub equity_curve: Vec<EquityPoint>,
}

/// Strategy backtest engine.
///
/// A run is a pure function of (bars, strategy, parameters): all mutable state
/// lives inside the call, so one engine can serve concurrent runs.
pub struct BacktestEngine {
    params: BacktestParameters,
}

impl BacktestEngine {
    pub fn new(params: BacktestParameters) -> Self {
        Self { params }
    }

    /// Fetch bars for the configured ticker, then run
    pub fn run_from_source(
        &self,
        strategy: &StrategyConfig,
        source: &dyn MarketDataSource,
    ) -> Result<BacktestResult> {
        let bars = source.fetch_ohlcv(
            &self.params.ticker,
            &self.params.period,
            &self.params.interval,
        )?;
        self.run(strategy, &bars)
    }

    /// Run backtest on provided bar data
    pub fn run(&self, strategy: &StrategyConfig, bars: &[Bar]) -> Result<BacktestResult> {
        let start_time = Instant::now();

        self.params.validate()?;
        strategy.validate()?;
        validate_bars(&self.params.ticker, bars)?;

        let frame = self.prepare(strategy, bars)?;
        let signals = SignalGenerator::new(strategy).generate(&frame)?;
        let simulation = self.simulate(&frame, &signals, strategy)?;

        let mut trades = simulation.trades;
        TradeReconciler::reconcile(&mut trades)?;

        let metrics = MetricsCalculator::calculate(
            &simulation.equity_curve,
            &trades,
            self.params.initial_capital,
        );

        // prepare() guarantees at least one bar
        let first = &frame.bars()[0];
        let last = &frame.bars()[frame.len() - 1];
        let final_equity = simulation
            .equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(self.params.initial_capital);

        debug!(
            ticker = %self.params.ticker,
            bars = frame.len(),
            trades = trades.len(),
            round_trips = metrics.trade_count,
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "backtest finished"
        );

        Ok(BacktestResult {
            ticker: self.params.ticker.clone(),
            initial_capital: self.params.initial_capital,
            final_equity,
            metrics,
            trades,
            equity_curve: simulation.equity_curve,
            start_date: first.timestamp.date_naive(),
            end_date: last.timestamp.date_naive(),
        })
    }

    /// Run several strategies over the same bars in parallel
    pub fn run_many(
        &self,
        strategies: &[StrategyConfig],
        bars: &[Bar],
    ) -> Vec<Result<BacktestResult>> {
        strategies
            .par_iter()
            .map(|strategy| self.run(strategy, bars))
            .collect()
    }

    /// Indicator pre-pass: compute the configured indicators, then trim warm-up bars
    pub fn prepare(&self, strategy: &StrategyConfig, bars: &[Bar]) -> Result<IndicatorFrame> {
        let specs: Vec<IndicatorSpec> = match &self.params.prepass {
            IndicatorPrepass::Referenced => strategy.referenced_indicators(),
            IndicatorPrepass::Standard => IndicatorPrepass::standard_set(),
            IndicatorPrepass::Explicit(specs) => specs.clone(),
        };

        let frame = IndicatorFrame::compute(bars, &specs)?;
        let columns = frame.column_names();
        frame.trim_warmup(&columns)
    }

    /// Walk the bars in order: DCA purchase, then signal trade, then mark equity.
    pub fn simulate(
        &self,
        frame: &IndicatorFrame,
        signals: &SignalSeries,
        strategy: &StrategyConfig,
    ) -> Result<Simulation> {
        let mut portfolio = Portfolio::new(&self.params.ticker, self.params.initial_capital);
        let mut dca = DcaSchedule::new(&strategy.dca_config);
        let mut equity_curve = Vec::with_capacity(frame.len());

        for (i, bar) in frame.bars().iter().enumerate() {
            let price = bar.close;

            if dca.starts_new_period(bar.timestamp) && portfolio.cash() >= dca.amount() {
                let quantity = Portfolio::quantity_for(dca.amount(), price)?;
                if quantity > 0 {
                    portfolio.buy(quantity, price, bar.timestamp, TradeType::BuyDca)?;
                }
            }

            // A buy signal takes the bar even when it cannot be filled
            if signals.buy[i] {
                if portfolio.cash() > price {
                    let invest = portfolio.cash() * SIGNAL_INVEST_FRACTION;
                    let quantity = Portfolio::quantity_for(invest, price)?;
                    if quantity > 0 {
                        portfolio.buy(quantity, price, bar.timestamp, TradeType::BuySignal)?;
                    }
                }
            } else if signals.sell[i] {
                portfolio.sell_all(price, bar.timestamp);
            }

            equity_curve.push(EquityPoint {
                date: bar.timestamp,
                equity: portfolio.equity(price),
            });
        }

        Ok(Simulation {
            trades: portfolio.into_trades(),
            equity_curve,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone, Utc};
    use common::{
        BacktestError, Condition, Connector, DcaConfig, DcaInterval, IndicatorSpec, LogicNode,
        Operator,
    };

    fn generate_test_bars(n: usize, base_price: f64) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                let price = base_price + (i as f64 * 0.3).sin() * 5.0;
                Bar::new(
                    start + Duration::days(i as i64),
                    price,
                    price + 0.5,
                    price - 0.5,
                    price,
                    1_000_000,
                )
            })
            .collect()
    }

    fn price_cross_strategy() -> StrategyConfig {
        StrategyConfig::new(
            LogicNode::all(vec![Condition::versus(
                IndicatorSpec::price(),
                Operator::CrossUp,
                IndicatorSpec::sma(5),
            )]),
            Some(LogicNode::all(vec![Condition::versus(
                IndicatorSpec::price(),
                Operator::CrossDown,
                IndicatorSpec::sma(5),
            )])),
        )
    }

    fn engine(capital: f64) -> BacktestEngine {
        BacktestEngine::new(BacktestParameters::default().with_capital(capital))
    }

    #[test]
    fn test_backtest_runs() {
        let bars = generate_test_bars(100, 50.0);
        let result = engine(10_000.0).run(&price_cross_strategy(), &bars).unwrap();

        assert_eq!(result.initial_capital, 10_000.0);
        // SMA(5) warm-up drops four bars
        assert_eq!(result.equity_curve.len(), 96);
        assert_eq!(result.start_date, bars[4].timestamp.date_naive());
        assert!(result.metrics.trade_count > 0);
    }

    #[test]
    fn test_backtest_insufficient_data() {
        let bars = generate_test_bars(3, 50.0);
        let err = engine(10_000.0)
            .run(&price_cross_strategy(), &bars)
            .unwrap_err();
        assert!(matches!(err, BacktestError::InsufficientData { .. }));
    }

    #[test]
    fn test_backtest_no_bars() {
        let err = engine(10_000.0).run(&price_cross_strategy(), &[]).unwrap_err();
        assert!(matches!(err, BacktestError::DataUnavailable { .. }));
    }

    #[test]
    fn test_invalid_capital_rejected() {
        let bars = generate_test_bars(10, 50.0);
        let err = engine(-1.0).run(&price_cross_strategy(), &bars).unwrap_err();
        assert!(matches!(err, BacktestError::InvalidParameter(_)));
    }

    #[test]
    fn test_buy_dominates_sell_on_same_bar() {
        let bars = generate_test_bars(3, 100.0);
        let always = LogicNode::new(Connector::And, vec![]);
        let strategy = StrategyConfig::new(always.clone(), Some(always));

        let result = engine(1_000_000.0).run(&strategy, &bars).unwrap();

        assert!(result
            .trades
            .iter()
            .all(|t| t.trade_type == TradeType::BuySignal));
        assert_eq!(result.metrics.trade_count, 0);
    }

    #[test]
    fn test_unfilled_buy_signal_still_blocks_sell() {
        let bars = generate_test_bars(4, 100.0);
        let strategy = StrategyConfig::new(
            LogicNode::new(Connector::And, vec![]),
            Some(LogicNode::new(Connector::And, vec![])),
        );

        // capital below one share: buy never fills, sell never considered
        let result = engine(50.0).run(&strategy, &bars).unwrap();
        assert!(result.trades.is_empty());
        assert!(result.equity_curve.iter().all(|p| p.equity == 50.0));
    }

    #[test]
    fn test_signal_buy_uses_ninety_nine_percent() {
        let bars = generate_test_bars(1, 100.0);
        let strategy = StrategyConfig::new(LogicNode::new(Connector::And, vec![]), None);

        let result = engine(10_000.0).run(&strategy, &bars).unwrap();
        let buy = &result.trades[0];
        // 9900 / 100 = 99 shares
        assert_eq!(buy.quantity, 99);
        assert_relative_eq!(buy.balance, 100.0, epsilon = 1e-9);
        assert_relative_eq!(result.final_equity, 10_000.0, epsilon = 1e-9);
    }

    #[test]
    fn test_dca_fills_before_signal_buy_on_same_bar() {
        let bars = generate_test_bars(1, 100.0);
        let strategy = StrategyConfig::new(LogicNode::new(Connector::And, vec![]), None)
            .with_dca(DcaConfig::every(DcaInterval::Monthly, 1_000.0));

        let result = engine(10_000.0).run(&strategy, &bars).unwrap();

        let types: Vec<TradeType> = result.trades.iter().map(|t| t.trade_type).collect();
        assert_eq!(types, vec![TradeType::BuyDca, TradeType::BuySignal]);

        let dca = &result.trades[0];
        assert_eq!(dca.quantity, 10);
        assert_relative_eq!(dca.balance, 9_000.0, epsilon = 1e-9);

        // signal buy is sized from the cash left after the DCA purchase
        let expected = (SIGNAL_INVEST_FRACTION * (10_000.0 - dca.amount) / 100.0).floor() as u64;
        assert_eq!(result.trades[1].quantity, expected);
        assert_eq!(expected, 89);
    }

    #[test]
    fn test_unrepresentable_share_count_is_an_error() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let bars: Vec<Bar> = (0..2)
            .map(|i| Bar::new(start + Duration::days(i), 1.0, 1.0, 1.0, 1.0, 1))
            .collect();
        let strategy = StrategyConfig::new(LogicNode::new(Connector::And, vec![]), None);

        let err = engine(1e25).run(&strategy, &bars).unwrap_err();
        assert!(matches!(err, BacktestError::InvalidParameter(_)));
    }

    #[test]
    fn test_dca_skipped_when_cash_short_but_period_consumed() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let bars: Vec<Bar> = (0..3)
            .map(|i| Bar::new(start + Duration::days(i), 10.0, 10.0, 10.0, 10.0, 1))
            .collect();
        let strategy = StrategyConfig::new(
            LogicNode::all(vec![Condition::against(IndicatorSpec::price(), Operator::Gt, 1e9)]),
            None,
        )
        .with_dca(DcaConfig::every(DcaInterval::Monthly, 500.0));

        let result = engine(100.0).run(&strategy, &bars).unwrap();
        assert!(result.trades.is_empty());
    }

    #[test]
    fn test_open_position_marked_to_market() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let closes = [10.0, 12.0, 15.0];
        let bars: Vec<Bar> = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar::new(start + Duration::days(i as i64), c, c, c, c, 1))
            .collect();
        let strategy = StrategyConfig::new(
            LogicNode::all(vec![Condition::against(IndicatorSpec::price(), Operator::Lt, 11.0)]),
            None,
        );

        let result = engine(1_000.0).run(&strategy, &bars).unwrap();
        // 99 shares at 10, cash 10, marked at 15
        assert_relative_eq!(result.final_equity, 10.0 + 99.0 * 15.0, epsilon = 1e-9);
        assert_eq!(result.metrics.trade_count, 0);
        assert_relative_eq!(result.metrics.total_return, 49.5, epsilon = 1e-9);
    }

    #[test]
    fn test_run_many_matches_sequential_runs() {
        let bars = generate_test_bars(60, 50.0);
        let strategies = vec![
            price_cross_strategy(),
            StrategyConfig::new(LogicNode::new(Connector::And, vec![]), None),
        ];
        let engine = engine(25_000.0);

        let parallel = engine.run_many(&strategies, &bars);
        for (strategy, result) in strategies.iter().zip(parallel) {
            assert_eq!(result.unwrap(), engine.run(strategy, &bars).unwrap());
        }
    }

    #[test]
    fn test_standard_prepass_trims_on_slowest_indicator() {
        let bars = generate_test_bars(80, 50.0);
        let engine = BacktestEngine::new(
            BacktestParameters::default()
                .with_capital(10_000.0)
                .with_prepass(IndicatorPrepass::Standard),
        );

        let frame = engine.prepare(&price_cross_strategy(), &bars).unwrap();
        // SMA(60) is defined from bar 59
        assert_eq!(frame.len(), 21);
    }
}
