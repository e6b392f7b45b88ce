use common::{EquityPoint, PerformanceMetrics, TradeRecord, TradeType};

/// Reported instead of an infinite profit factor when there are wins but no losses
pub const PROFIT_FACTOR_SENTINEL: f64 = 999.0;

/// Calculate performance metrics from equity curve and reconciled trades
pub struct MetricsCalculator;

impl MetricsCalculator {
    /// Calculate all performance metrics
    pub fn calculate(
        equity_curve: &[EquityPoint],
        trades: &[TradeRecord],
        initial_capital: f64,
    ) -> PerformanceMetrics {
        let final_equity = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(initial_capital);

        let realized: Vec<f64> = trades
            .iter()
            .filter(|t| t.trade_type == TradeType::SellSignal)
            .map(|t| t.pnl.unwrap_or(0.0))
            .collect();

        PerformanceMetrics {
            total_return: Self::total_return_pct(initial_capital, final_equity),
            mdd: Self::max_drawdown_pct(equity_curve),
            win_rate: Self::win_rate_pct(&realized),
            profit_factor: Self::profit_factor(&realized),
            trade_count: realized.len() as u32,
        }
    }

    pub fn total_return_pct(initial_capital: f64, final_equity: f64) -> f64 {
        if initial_capital == 0.0 {
            return 0.0;
        }
        (final_equity - initial_capital) / initial_capital * 100.0
    }

    /// Most negative decline from the running peak, in percent (zero or negative)
    pub fn max_drawdown_pct(equity_curve: &[EquityPoint]) -> f64 {
        let Some(first) = equity_curve.first() else {
            return 0.0;
        };

        let mut running_max = first.equity;
        let mut max_drawdown: f64 = 0.0;

        for point in equity_curve {
            running_max = running_max.max(point.equity);
            if running_max > 0.0 {
                let drawdown = (point.equity - running_max) / running_max;
                max_drawdown = max_drawdown.min(drawdown);
            }
        }

        max_drawdown * 100.0
    }

    pub fn win_rate_pct(realized: &[f64]) -> f64 {
        if realized.is_empty() {
            return 0.0;
        }
        let wins = realized.iter().filter(|&&p| p > 0.0).count();
        wins as f64 / realized.len() as f64 * 100.0
    }

    /// Gross profit over gross loss; a sell at exactly zero counts on the loss side.
    pub fn profit_factor(realized: &[f64]) -> f64 {
        let gross_profit: f64 = realized.iter().filter(|&&p| p > 0.0).sum();
        let gross_loss: f64 = realized.iter().filter(|&&p| p <= 0.0).sum::<f64>().abs();

        if gross_loss > 0.0 {
            gross_profit / gross_loss
        } else if gross_profit > 0.0 {
            PROFIT_FACTOR_SENTINEL
        } else {
            0.0
        }
    }
}
