use chrono::{DateTime, Duration, Utc};
use common::{BacktestError, Bar, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{filter_period, MarketDataSource};

/// Generate random-walk daily bars starting at `start`
pub fn generate_synthetic_bars<R: Rng>(
    rng: &mut R,
    days: usize,
    initial_price: f64,
    start: DateTime<Utc>,
) -> Vec<Bar> {
    let mut bars = Vec::with_capacity(days);
    let mut price = initial_price;

    let daily_volatility = 0.02;
    let drift = 0.0003;

    for i in 0..days {
        let date = start + Duration::days(i as i64);

        let random_return: f64 = rng.gen_range(-1.0..1.0);
        let daily_return = drift + daily_volatility * random_return;
        let new_price = price * (1.0 + daily_return);

        let intraday_range = price * rng.gen_range(0.005..0.02);
        let open = price + rng.gen_range(-intraday_range / 2.0..intraday_range / 2.0);
        let close = new_price;

        let high = open.max(close) + rng.gen_range(0.0..intraday_range / 2.0);
        let low = open.min(close) - rng.gen_range(0.0..intraday_range / 2.0);

        // Higher volume on volatile days
        let base_volume = 50_000_000u64;
        let volume_multiplier = 1.0 + daily_return.abs() * 10.0;
        let volume = (base_volume as f64 * volume_multiplier * rng.gen_range(0.8..1.2)) as u64;

        bars.push(Bar::new(date, open, high, low, close, volume));

        price = new_price;
    }

    bars
}

/// Random-walk bars for any symbol; reproducible when seeded
#[derive(Debug, Clone)]
pub struct SyntheticDataSource {
    days: usize,
    initial_price: f64,
    seed: Option<u64>,
    end: DateTime<Utc>,
}

impl SyntheticDataSource {
    pub fn new(days: usize, initial_price: f64) -> Self {
        Self {
            days,
            initial_price,
            seed: None,
            end: Utc::now(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Date of the last generated bar
    pub fn ending_at(mut self, end: DateTime<Utc>) -> Self {
        self.end = end;
        self
    }
}

impl MarketDataSource for SyntheticDataSource {
    fn fetch_ohlcv(&self, symbol: &str, period: &str, _interval: &str) -> Result<Vec<Bar>> {
        if !self.initial_price.is_finite() || self.initial_price <= 0.0 {
            return Err(BacktestError::InvalidParameter(format!(
                "initial price must be positive, got {}",
                self.initial_price
            )));
        }

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let start = self.end - Duration::days(self.days.saturating_sub(1) as i64);
        let bars = generate_synthetic_bars(&mut rng, self.days, self.initial_price, start);

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
    use chrono::TimeZone;

    #[test]
    fn test_generate_synthetic_bars() {
        let mut rng = StdRng::seed_from_u64(7);
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let bars = generate_synthetic_bars(&mut rng, 100, 50.0, start);

        assert_eq!(bars.len(), 100);
        assert_eq!(bars[0].timestamp, start);

        for bar in &bars {
            assert!(bar.high >= bar.low);
            assert!(bar.high >= bar.open);
            assert!(bar.high >= bar.close);
            assert!(bar.low <= bar.open);
            assert!(bar.low <= bar.close);
            assert!(bar.volume > 0);
        }
    }

    #[test]
    fn test_seeded_source_is_reproducible() {
        let end = Utc.with_ymd_and_hms(2024, 6, 30, 0, 0, 0).unwrap();
        let source = SyntheticDataSource::new(120, 100.0).with_seed(42).ending_at(end);

        let a = source.fetch_ohlcv("SPY", "max", "1d").unwrap();
        let b = source.fetch_ohlcv("SPY", "max", "1d").unwrap();

        assert_eq!(a, b);
        assert_eq!(a.len(), 120);
        assert_eq!(a.last().unwrap().timestamp, end);
    }

    #[test]
    fn test_invalid_initial_price() {
        let source = SyntheticDataSource::new(10, 0.0).with_seed(1);
        assert!(matches!(
            source.fetch_ohlcv("SPY", "max", "1d"),
            Err(BacktestError::InvalidParameter(_))
        ));
    }
}
