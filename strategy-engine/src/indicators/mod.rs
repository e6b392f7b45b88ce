pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;

use std::collections::BTreeMap;

pub use bollinger::{calculate_bollinger_bands, BollingerBands};
pub use ema::calculate_ema;
pub use macd::{calculate_macd, Macd};
pub use rsi::calculate_rsi;
pub use sma::{calculate_rolling_std, calculate_sma};

use common::{BacktestError, Bar, Indicator, IndicatorOutput, IndicatorSpec, Result};
use tracing::debug;

/// Price bars plus one named column per computed indicator output.
///
/// Column cells are `None` while an indicator is still warming up.
#[derive(Debug, Clone)]
pub struct IndicatorFrame {
    bars: Vec<Bar>,
    columns: BTreeMap<String, Vec<Option<f64>>>,
}

impl IndicatorFrame {
    /// Compute every requested indicator over `bars`.
    ///
    /// PRICE and VOLUME need no column; duplicate specs are computed once.
    pub fn compute(bars: &[Bar], specs: &[IndicatorSpec]) -> Result<Self> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let mut columns: BTreeMap<String, Vec<Option<f64>>> = BTreeMap::new();

        for spec in specs {
            let indicator = spec.resolve()?;
            let key = indicator.column_name(IndicatorOutput::Line);
            if columns.contains_key(&key) {
                continue;
            }

            match indicator {
                Indicator::Sma { period } => {
                    columns.insert(key, calculate_sma(&closes, period));
                }
                Indicator::Ema { period } => {
                    columns.insert(key, defined(calculate_ema(&closes, period)));
                }
                Indicator::Rsi { period } => {
                    columns.insert(key, calculate_rsi(&closes, period));
                }
                Indicator::Macd { fast, slow, signal } => {
                    let macd = calculate_macd(&closes, fast, slow, signal);
                    columns.insert(key, defined(macd.line));
                    columns.insert(
                        indicator.column_name(IndicatorOutput::Signal),
                        defined(macd.signal),
                    );
                    columns.insert(
                        indicator.column_name(IndicatorOutput::Histogram),
                        defined(macd.histogram),
                    );
                }
                Indicator::Bollinger { period, std_dev } => {
                    let bb = calculate_bollinger_bands(&closes, period, std_dev);
                    columns.insert(indicator.column_name(IndicatorOutput::Upper), bb.upper);
                    columns.insert(indicator.column_name(IndicatorOutput::Middle), bb.middle);
                    columns.insert(indicator.column_name(IndicatorOutput::Lower), bb.lower);
                }
                Indicator::Price | Indicator::Volume => {}
            }
        }

        debug!(
            bars = bars.len(),
            columns = columns.len(),
            "computed indicator columns"
        );

        Ok(Self {
            bars: bars.to_vec(),
            columns,
        })
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns.get(name).map(|c| c.as_slice())
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.keys().cloned().collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume as f64).collect()
    }

    /// Drop every leading bar where any of `used` columns is still undefined.
    ///
    /// Names that are not columns of this frame are ignored. Fails when no bar
    /// has all used columns defined.
    pub fn trim_warmup(self, used: &[String]) -> Result<Self> {
        let used_columns: Vec<&Vec<Option<f64>>> =
            used.iter().filter_map(|name| self.columns.get(name)).collect();

        let first_defined = (0..self.bars.len())
            .find(|&i| used_columns.iter().all(|col| col[i].is_some()));

        let Some(start) = first_defined else {
            let warmup = used_columns
                .iter()
                .map(|col| col.iter().take_while(|v| v.is_none()).count())
                .max()
                .unwrap_or(0);
            return Err(BacktestError::InsufficientData {
                required: warmup + 1,
                actual: self.bars.len(),
            });
        };

        if start > 0 {
            debug!(dropped = start, "trimmed indicator warm-up bars");
        }

        Ok(Self {
            bars: self.bars[start..].to_vec(),
            columns: self
                .columns
                .into_iter()
                .map(|(name, values)| (name, values[start..].to_vec()))
                .collect(),
        })
    }
}

fn defined(values: Vec<f64>) -> Vec<Option<f64>> {
    values.into_iter().map(Some).collect()
}
