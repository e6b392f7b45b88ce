pub mod loader;
pub mod synthetic;

pub use loader::{load_csv, load_json};
pub use synthetic::{generate_synthetic_bars, SyntheticDataSource};

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use common::{BacktestError, Bar, Result};
use tracing::debug;

/// Source of daily OHLCV bars for a symbol
pub trait MarketDataSource: Send + Sync {
    /// Bars for `symbol` covering `period` (e.g. "6mo", "1y", "max") at `interval`,
    /// oldest first.
    fn fetch_ohlcv(&self, symbol: &str, period: &str, interval: &str) -> Result<Vec<Bar>>;
}

/// Load bars from file, detecting format from extension
pub fn load_file(path: &Path) -> Result<Vec<Bar>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "csv" => load_csv(path),
        "json" => load_json(path),
        _ => Err(BacktestError::DataLoadError(format!(
            "Unsupported file format: {}",
            ext
        ))),
    }
}

/// Check that bars are usable by the simulator.
///
/// Empty input is reported as unavailable data for `symbol`.
pub fn validate_bars(symbol: &str, bars: &[Bar]) -> Result<()> {
    if bars.is_empty() {
        return Err(BacktestError::DataUnavailable {
            symbol: symbol.to_string(),
        });
    }

    for (i, bar) in bars.iter().enumerate() {
        if !bar.close.is_finite() || bar.close < 0.0 {
            return Err(BacktestError::InvalidBars(format!(
                "bar {} ({}) has invalid close {}",
                i, bar.timestamp, bar.close
            )));
        }
    }

    if let Some(i) = bars
        .windows(2)
        .position(|w| w[1].timestamp <= w[0].timestamp)
    {
        return Err(BacktestError::InvalidBars(format!(
            "timestamps not strictly increasing at bar {} ({})",
            i + 1,
            bars[i + 1].timestamp
        )));
    }

    Ok(())
}

/// Earliest timestamp kept for a lookback `period` ending at `last`.
/// Returns None for "max".
pub fn period_start(period: &str, last: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
    let period = period.trim().to_lowercase();
    if period == "max" {
        return Ok(None);
    }
    if period == "ytd" {
        let start = Utc
            .with_ymd_and_hms(last.year(), 1, 1, 0, 0, 0)
            .single()
            .ok_or_else(|| BacktestError::InvalidParameter(format!("bad ytd for {}", last)))?;
        return Ok(Some(start));
    }

    let split = period
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(period.len());
    let (count, unit) = period.split_at(split);
    let count: i64 = count
        .parse()
        .map_err(|_| BacktestError::InvalidParameter(format!("invalid period: {}", period)))?;

    let days = match unit {
        "d" => count,
        "wk" => count * 7,
        "mo" => count * 30,
        "y" => count * 365,
        _ => {
            return Err(BacktestError::InvalidParameter(format!(
                "invalid period: {}",
                period
            )))
        }
    };

    Ok(Some(last - Duration::days(days)))
}

/// Keep the trailing `period` of `bars`
pub fn filter_period(bars: Vec<Bar>, period: &str) -> Result<Vec<Bar>> {
    let Some(last) = bars.last().map(|b| b.timestamp) else {
        return Ok(bars);
    };
    match period_start(period, last)? {
        Some(start) => Ok(bars.into_iter().filter(|b| b.timestamp > start).collect()),
        None => Ok(bars),
    }
}

fn check_interval(interval: &str) -> Result<()> {
    match interval {
        "1d" => Ok(()),
        other => Err(BacktestError::InvalidParameter(format!(
            "unsupported interval: {} (only 1d bars are supported)",
            other
        ))),
    }
}

/// Bars recorded in a CSV or JSON file
#[derive(Debug, Clone)]
pub struct FileDataSource {
    path: PathBuf,
}

impl FileDataSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MarketDataSource for FileDataSource {
    fn fetch_ohlcv(&self, symbol: &str, period: &str, interval: &str) -> Result<Vec<Bar>> {
        check_interval(interval)?;
        let bars = load_file(&self.path)?;
        debug!(path = %self.path.display(), bars = bars.len(), "loaded bars from file");

        let bars = filter_period(bars, period)?;
        if bars.is_empty() {
            return Err(BacktestError::DataUnavailable {
                symbol: symbol.to_string(),
            });
        }
        Ok(bars)
    }
}

/// In-memory bars keyed by symbol
#[derive(Debug, Clone, Default)]
pub struct StaticDataSource {
    bars: HashMap<String, Vec<Bar>>,
}

impl StaticDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_symbol(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.bars.insert(symbol.to_string(), bars);
        self
    }
}

impl MarketDataSource for StaticDataSource {
    fn fetch_ohlcv(&self, symbol: &str, period: &str, interval: &str) -> Result<Vec<Bar>> {
        check_interval(interval)?;
        let bars = self
            .bars
            .get(symbol)
            .cloned()
            .ok_or_else(|| BacktestError::DataUnavailable {
                symbol: symbol.to_string(),
            })?;

        let bars = filter_period(bars, period)?;
        if bars.is_empty() {
            return Err(BacktestError::DataUnavailable {
                symbol: symbol.to_string(),
            });
        }
        Ok(bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn daily_bars(n: usize) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                let p = 100.0 + i as f64;
                Bar::new(start + Duration::days(i as i64), p, p, p, p, 1000)
            })
            .collect()
    }

    #[test]
    fn test_validate_bars() {
        assert!(validate_bars("SPY", &daily_bars(5)).is_ok());
        assert!(matches!(
            validate_bars("SPY", &[]),
            Err(BacktestError::DataUnavailable { .. })
        ));
    }

    #[test]
    fn test_validate_bars_rejects_unordered() {
        let mut bars = daily_bars(3);
        bars.swap(1, 2);
        assert!(matches!(
            validate_bars("SPY", &bars),
            Err(BacktestError::InvalidBars(_))
        ));
    }

    #[test]
    fn test_validate_bars_rejects_nan_close() {
        let mut bars = daily_bars(3);
        bars[1].close = f64::NAN;
        assert!(matches!(
            validate_bars("SPY", &bars),
            Err(BacktestError::InvalidBars(_))
        ));
    }

    #[test]
    fn test_filter_period() {
        let bars = daily_bars(400);
        assert_eq!(filter_period(bars.clone(), "max").unwrap().len(), 400);
        assert_eq!(filter_period(bars.clone(), "1y").unwrap().len(), 365);
        assert_eq!(filter_period(bars.clone(), "5d").unwrap().len(), 5);
        assert!(filter_period(bars, "1q").is_err());
    }

    #[test]
    fn test_static_source() {
        let source = StaticDataSource::new().with_symbol("QQQ", daily_bars(10));

        assert_eq!(source.fetch_ohlcv("QQQ", "max", "1d").unwrap().len(), 10);
        assert!(matches!(
            source.fetch_ohlcv("SPY", "max", "1d"),
            Err(BacktestError::DataUnavailable { .. })
        ));
        assert!(source.fetch_ohlcv("QQQ", "max", "1h").is_err());
    }

    #[test]
    fn test_load_file_unknown_extension() {
        let err = load_file(Path::new("bars.parquet")).unwrap_err();
        assert!(matches!(err, BacktestError::DataLoadError(_)));
    }
}
