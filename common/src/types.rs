use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV bar data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Bar {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: u64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

/// Kind of an executed order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeType {
    BuySignal,
    SellSignal,
    BuyDca,
}

impl TradeType {
    pub fn is_buy(&self) -> bool {
        matches!(self, TradeType::BuySignal | TradeType::BuyDca)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TradeType::BuySignal => "BUY_SIGNAL",
            TradeType::SellSignal => "SELL_SIGNAL",
            TradeType::BuyDca => "BUY_DCA",
        }
    }
}

/// One executed order in the raw trade log.
///
/// `pnl` and `pnl_percent` stay `None` until the trade reconciler fills them in
/// for sell records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    #[serde(with = "day_format")]
    pub date: DateTime<Utc>,
    pub ticker: String,
    #[serde(rename = "type")]
    pub trade_type: TradeType,
    pub price: f64,
    pub quantity: u64,
    pub amount: f64,
    pub fees: f64,
    /// Cash balance after the order
    pub balance: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pnl: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pnl_percent: Option<f64>,
}

/// Post-trade equity at the close of one simulated bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    #[serde(with = "day_format")]
    pub date: DateTime<Utc>,
    pub equity: f64,
}

/// Performance metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Total return in percent of initial capital
    pub total_return: f64,
    /// Maximum drawdown in percent (zero or negative)
    pub mdd: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    /// Completed round trips (sell events)
    pub trade_count: u32,
}

/// Backtest result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub ticker: String,
    pub initial_capital: f64,
    pub final_equity: f64,
    #[serde(flatten)]
    pub metrics: PerformanceMetrics,
    pub trades: Vec<TradeRecord>,
    pub equity_curve: Vec<EquityPoint>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Serde adapter writing bar timestamps as `YYYY-MM-DD`.
///
/// Reading accepts the same form or a full RFC 3339 timestamp.
pub mod day_format {
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S: Serializer>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&date.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
            return Ok(dt.with_timezone(&Utc));
        }
        let midnight = NaiveDate::parse_from_str(&s, FORMAT)
            .map_err(D::Error::custom)?
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| D::Error::custom(format!("invalid date: {}", s)))?;
        Ok(Utc.from_utc_datetime(&midnight))
    }
}
