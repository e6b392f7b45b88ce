use common::{BacktestError, Result, TradeRecord};

/// Assigns realized P&L to sell records using weighted-average cost basis
pub struct TradeReconciler;

impl TradeReconciler {
    /// Replay the raw trade log in order, filling `pnl` and `pnl_percent` on sells.
    ///
    /// A sell against an empty running position realizes zero.
    pub fn reconcile(trades: &mut [TradeRecord]) -> Result<()> {
        let mut running_qty: u64 = 0;
        let mut running_cost = 0.0;

        for trade in trades.iter_mut() {
            if trade.trade_type.is_buy() {
                running_qty = running_qty.checked_add(trade.quantity).ok_or_else(|| {
                    BacktestError::InvalidParameter(format!(
                        "running position of {} + {} shares exceeds the representable share count",
                        running_qty, trade.quantity
                    ))
                })?;
                running_cost += trade.amount;
                continue;
            }

            if running_qty == 0 {
                trade.pnl = Some(0.0);
                trade.pnl_percent = Some(0.0);
                continue;
            }

            let sell_qty = trade.quantity.min(running_qty);
            let avg_cost = running_cost / running_qty as f64;
            let cost_removed = avg_cost * sell_qty as f64;
            let pnl = trade.amount - cost_removed;

            trade.pnl = Some(pnl);
            trade.pnl_percent = Some(if cost_removed != 0.0 {
                pnl / cost_removed * 100.0
            } else {
                0.0
            });

            running_qty -= sell_qty;
            running_cost = if running_qty == 0 {
                0.0
            } else {
                running_cost - cost_removed
            };
        }
        Ok(())
    }
}
