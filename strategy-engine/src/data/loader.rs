use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use common::{BacktestError, Bar, Result};

/// Column positions of the OHLCV fields in a CSV file
#[derive(Debug, Clone, Copy, PartialEq)]
struct CsvLayout {
    date: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: usize,
}

impl CsvLayout {
    /// Positional layout: timestamp, open, high, low, close, volume
    const POSITIONAL: CsvLayout = CsvLayout {
        date: 0,
        open: 1,
        high: 2,
        low: 3,
        close: 4,
        volume: 5,
    };

    /// Map by header name when every field is present (e.g. Date,Open,High,Low,Close,Adj Close,Volume)
    fn from_headers(headers: &csv::StringRecord) -> Self {
        let find = |names: &[&str]| {
            headers
                .iter()
                .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
        };

        let named = (
            find(&["date", "datetime", "timestamp", "time"]),
            find(&["open"]),
            find(&["high"]),
            find(&["low"]),
            find(&["close"]),
            find(&["volume"]),
        );

        match named {
            (Some(date), Some(open), Some(high), Some(low), Some(close), Some(volume)) => {
                CsvLayout {
                    date,
                    open,
                    high,
                    low,
                    close,
                    volume,
                }
            }
            _ => Self::POSITIONAL,
        }
    }

    fn width(&self) -> usize {
        [self.date, self.open, self.high, self.low, self.close, self.volume]
            .into_iter()
            .max()
            .unwrap_or(0)
            + 1
    }
}

/// Load bars from CSV file
pub fn load_csv(path: &Path) -> Result<Vec<Bar>> {
    let file = File::open(path).map_err(|e| BacktestError::DataLoadError(e.to_string()))?;
    read_csv(BufReader::new(file))
}

/// Parse CSV bars from any reader. Rows too short to hold every field are skipped.
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<Bar>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|e| BacktestError::CsvError(e.to_string()))?
        .clone();
    let layout = CsvLayout::from_headers(&headers);

    let mut bars = Vec::new();

    for result in csv_reader.records() {
        let record = result.map_err(|e| BacktestError::CsvError(e.to_string()))?;

        if record.len() < layout.width() {
            continue;
        }

        let timestamp = parse_timestamp(&record[layout.date])?;
        let open = parse_price(&record[layout.open], "open")?;
        let high = parse_price(&record[layout.high], "high")?;
        let low = parse_price(&record[layout.low], "low")?;
        let close = parse_price(&record[layout.close], "close")?;
        let volume = parse_volume(&record[layout.volume])?;

        bars.push(Bar::new(timestamp, open, high, low, close, volume));
    }

    Ok(bars)
}

/// Load bars from JSON file
pub fn load_json(path: &Path) -> Result<Vec<Bar>> {
    let file = File::open(path).map_err(|e| BacktestError::DataLoadError(e.to_string()))?;
    let reader = BufReader::new(file);
    let bars: Vec<Bar> = serde_json::from_reader(reader)?;
    Ok(bars)
}

fn parse_price(s: &str, field: &str) -> Result<f64> {
    s.trim()
        .parse()
        .map_err(|_| BacktestError::CsvError(format!("Invalid {} price: {}", field, s)))
}

/// Volume may be written as an integer or a float ("1.5e6")
fn parse_volume(s: &str) -> Result<u64> {
    let s = s.trim();
    if let Ok(v) = s.parse::<u64>() {
        return Ok(v);
    }
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Ok(v.round() as u64),
        _ => Err(BacktestError::CsvError(format!("Invalid volume: {}", s))),
    }
}

/// Parse timestamp from various formats
fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();

    // Try ISO 8601 format first
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    let datetime_formats = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y/%m/%d %H:%M:%S"];
    for fmt in &datetime_formats {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&dt));
        }
    }

    let date_formats = ["%Y-%m-%d", "%Y/%m/%d"];
    for fmt in &date_formats {
        if let Ok(date) = chrono::NaiveDate::parse_from_str(s, fmt) {
            if let Some(dt) = date.and_hms_opt(0, 0, 0) {
                return Ok(Utc.from_utc_datetime(&dt));
            }
        }
    }

    // Try Unix timestamp (seconds)
    if let Ok(ts) = s.parse::<i64>() {
        if let Some(dt) = DateTime::from_timestamp(ts, 0) {
            return Ok(dt);
        }
    }

    Err(BacktestError::CsvError(format!(
        "Unable to parse timestamp: {}",
        s
    )))
}
