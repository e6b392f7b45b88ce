use std::io::Write;
use std::path::Path;

use common::{BacktestError, Result, TradeRecord};

const TRADE_HEADERS: [&str; 8] = [
    "Date", "Ticker", "Type", "Price", "Quantity", "Amount", "Fees", "Balance",
];

/// Write the trade log as CSV
pub fn write_trades_csv<W: Write>(trades: &[TradeRecord], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer
        .write_record(TRADE_HEADERS)
        .map_err(|e| BacktestError::CsvError(e.to_string()))?;

    for trade in trades {
        csv_writer
            .write_record([
                trade.date.format("%Y-%m-%d").to_string(),
                trade.ticker.clone(),
                trade.trade_type.as_str().to_string(),
                trade.price.to_string(),
                trade.quantity.to_string(),
                trade.amount.to_string(),
                trade.fees.to_string(),
                trade.balance.to_string(),
            ])
            .map_err(|e| BacktestError::CsvError(e.to_string()))?;
    }

    csv_writer.flush()?;
    Ok(())
}

pub fn trades_to_csv_string(trades: &[TradeRecord]) -> Result<String> {
    let mut buffer = Vec::new();
    write_trades_csv(trades, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| BacktestError::CsvError(e.to_string()))
}

pub fn export_trades_csv(trades: &[TradeRecord], path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_trades_csv(trades, file)
}
