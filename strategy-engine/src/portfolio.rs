use chrono::{DateTime, Utc};
use common::{BacktestError, Result, TradeRecord, TradeType};

/// Cash and single-lot holdings of one backtest run, plus its raw trade log.
///
/// Holdings are whole units and never go negative; buys that would overdraw
/// cash are rejected.
#[derive(Debug)]
pub struct Portfolio {
    ticker: String,
    cash: f64,
    holdings: u64,
    trades: Vec<TradeRecord>,
}

impl Portfolio {
    pub fn new(ticker: &str, initial_capital: f64) -> Self {
        Self {
            ticker: ticker.to_string(),
            cash: initial_capital,
            holdings: 0,
            trades: Vec::new(),
        }
    }

    /// Get current equity (cash + holdings marked at `price`)
    pub fn equity(&self, price: f64) -> f64 {
        self.cash + self.holdings as f64 * price
    }

    /// Get available cash
    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn holdings(&self) -> u64 {
        self.holdings
    }

    pub fn is_flat(&self) -> bool {
        self.holdings == 0
    }

    /// Get the raw trade log
    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    pub fn into_trades(self) -> Vec<TradeRecord> {
        self.trades
    }

    /// Whole units `amount` buys at `price`; the cost never exceeds `amount`.
    ///
    /// Fails when the unit count does not fit in a `u64`.
    pub fn quantity_for(amount: f64, price: f64) -> Result<u64> {
        if price <= 0.0 || amount <= 0.0 {
            return Ok(0);
        }
        let units = (amount / price).floor();
        if !units.is_finite() || units >= u64::MAX as f64 {
            return Err(BacktestError::InvalidParameter(format!(
                "order of {} at price {} exceeds the representable share count",
                amount, price
            )));
        }
        let quantity = units as u64;
        // division can round up across an integer boundary
        if quantity > 0 && quantity as f64 * price > amount {
            Ok(quantity - 1)
        } else {
            Ok(quantity)
        }
    }

    /// Buy `quantity` units at `price` and append the record
    pub fn buy(
        &mut self,
        quantity: u64,
        price: f64,
        timestamp: DateTime<Utc>,
        trade_type: TradeType,
    ) -> Result<&TradeRecord> {
        debug_assert!(trade_type.is_buy());
        let cost = quantity as f64 * price;

        if cost > self.cash {
            return Err(BacktestError::InsufficientCash {
                required: cost,
                available: self.cash,
            });
        }

        let holdings = self.holdings.checked_add(quantity).ok_or_else(|| {
            BacktestError::InvalidParameter(format!(
                "holding {} + {} shares exceeds the representable share count",
                self.holdings, quantity
            ))
        })?;

        self.cash -= cost;
        self.holdings = holdings;

        Ok(self.record(timestamp, trade_type, price, quantity, cost))
    }

    /// Liquidate the whole position at `price`. Returns None when flat.
    pub fn sell_all(&mut self, price: f64, timestamp: DateTime<Utc>) -> Option<&TradeRecord> {
        if self.holdings == 0 {
            return None;
        }

        let quantity = self.holdings;
        let revenue = quantity as f64 * price;
        self.cash += revenue;
        self.holdings = 0;

        Some(self.record(timestamp, TradeType::SellSignal, price, quantity, revenue))
    }

    fn record(
        &mut self,
        date: DateTime<Utc>,
        trade_type: TradeType,
        price: f64,
        quantity: u64,
        amount: f64,
    ) -> &TradeRecord {
        self.trades.push(TradeRecord {
            date,
            ticker: self.ticker.clone(),
            trade_type,
            price,
            quantity,
            amount,
            fees: 0.0,
            balance: self.cash,
            pnl: None,
            pnl_percent: None,
        });
        &self.trades[self.trades.len() - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_portfolio_new() {
        let portfolio = Portfolio::new("SPY", 10000.0);
        assert_eq!(portfolio.equity(50.0), 10000.0);
        assert_eq!(portfolio.cash(), 10000.0);
        assert!(portfolio.is_flat());
    }

    #[test]
    fn test_buy_and_sell_all() {
        let mut portfolio = Portfolio::new("SPY", 10000.0);

        let buy = portfolio.buy(100, 50.0, now(), TradeType::BuySignal).unwrap();
        assert_eq!(buy.amount, 5000.0);
        assert_eq!(buy.balance, 5000.0);
        assert_eq!(buy.fees, 0.0);

        assert_eq!(portfolio.holdings(), 100);
        assert_eq!(portfolio.equity(50.0), 10000.0);
        assert_eq!(portfolio.equity(55.0), 10500.0);

        let sell = portfolio.sell_all(55.0, now()).unwrap();
        assert_eq!(sell.trade_type, TradeType::SellSignal);
        assert_eq!(sell.quantity, 100);
        assert_eq!(sell.amount, 5500.0);
        assert_eq!(sell.balance, 10500.0);
        assert!(sell.pnl.is_none());

        assert!(portfolio.is_flat());
        assert_eq!(portfolio.cash(), 10500.0);
        assert_eq!(portfolio.trades().len(), 2);
    }

    #[test]
    fn test_sell_while_flat_is_noop() {
        let mut portfolio = Portfolio::new("SPY", 1000.0);
        assert!(portfolio.sell_all(10.0, now()).is_none());
        assert!(portfolio.trades().is_empty());
        assert_eq!(portfolio.cash(), 1000.0);
    }

    #[test]
    fn test_insufficient_cash() {
        let mut portfolio = Portfolio::new("SPY", 1000.0);

        let result = portfolio.buy(100, 50.0, now(), TradeType::BuyDca);

        assert!(matches!(result, Err(BacktestError::InsufficientCash { .. })));
        assert_eq!(portfolio.cash(), 1000.0);
        assert!(portfolio.is_flat());
    }

    #[test]
    fn test_quantity_for() {
        assert_eq!(Portfolio::quantity_for(9900.0, 100.0).unwrap(), 99);
        assert_eq!(Portfolio::quantity_for(99.0, 100.0).unwrap(), 0);
        assert_eq!(Portfolio::quantity_for(100.0, 0.0).unwrap(), 0);
    }

    #[test]
    fn test_quantity_for_rejects_unrepresentable_count() {
        assert!(matches!(
            Portfolio::quantity_for(1e25, 1.0),
            Err(BacktestError::InvalidParameter(_))
        ));
        assert!(matches!(
            Portfolio::quantity_for(1.0, 1e-300),
            Err(BacktestError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_holdings_overflow_is_an_error() {
        let mut portfolio = Portfolio::new("SPY", 1.0);
        portfolio.buy(u64::MAX, 0.0, now(), TradeType::BuySignal).unwrap();

        let result = portfolio.buy(1, 0.0, now(), TradeType::BuyDca);

        assert!(matches!(result, Err(BacktestError::InvalidParameter(_))));
        assert_eq!(portfolio.holdings(), u64::MAX);
        assert_eq!(portfolio.trades().len(), 1);
    }
}
