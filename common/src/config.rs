use serde::{Deserialize, Serialize};

use crate::error::{BacktestError, Result};
use crate::strategy::IndicatorSpec;

/// Which indicators are computed before signals are evaluated
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "mode", content = "indicators")]
pub enum IndicatorPrepass {
    /// Exactly the indicators the strategy trees reference
    #[default]
    Referenced,
    /// Fixed set: SMA 5/20/60, RSI 14, MACD 12/26/9, BB 20/2
    Standard,
    /// Caller-supplied list
    Explicit(Vec<IndicatorSpec>),
}

impl IndicatorPrepass {
    pub fn standard_set() -> Vec<IndicatorSpec> {
        vec![
            IndicatorSpec::sma(5),
            IndicatorSpec::sma(20),
            IndicatorSpec::sma(60),
            IndicatorSpec::rsi(14),
            IndicatorSpec::macd(12, 26, 9),
            IndicatorSpec::bollinger(20, 2.0),
        ]
    }
}

/// Backtest parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestParameters {
    pub ticker: String,
    pub initial_capital: f64,
    /// Lookback handed to the market data source (e.g. "1y")
    pub period: String,
    /// Bar interval handed to the market data source (e.g. "1d")
    pub interval: String,
    pub prepass: IndicatorPrepass,
}

impl Default for BacktestParameters {
    fn default() -> Self {
        Self {
            ticker: "SPY".to_string(),
            initial_capital: 10_000_000.0,
            period: "1y".to_string(),
            interval: "1d".to_string(),
            prepass: IndicatorPrepass::Referenced,
        }
    }
}

impl BacktestParameters {
    pub fn with_capital(mut self, capital: f64) -> Self {
        self.initial_capital = capital;
        self
    }

    pub fn with_ticker(mut self, ticker: &str) -> Self {
        self.ticker = ticker.to_string();
        self
    }

    pub fn with_prepass(mut self, prepass: IndicatorPrepass) -> Self {
        self.prepass = prepass;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.initial_capital.is_finite() || self.initial_capital <= 0.0 {
            return Err(BacktestError::InvalidParameter(format!(
                "initial capital must be positive, got {}",
                self.initial_capital
            )));
        }
        if self.ticker.trim().is_empty() {
            return Err(BacktestError::InvalidParameter(
                "ticker must not be empty".to_string(),
            ));
        }
        if let IndicatorPrepass::Explicit(specs) = &self.prepass {
            for spec in specs {
                spec.resolve()?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = BacktestParameters::default();
        assert_eq!(params.initial_capital, 10_000_000.0);
        assert_eq!(params.prepass, IndicatorPrepass::Referenced);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_rejects_non_positive_capital() {
        assert!(BacktestParameters::default().with_capital(0.0).validate().is_err());
        assert!(BacktestParameters::default()
            .with_capital(f64::NAN)
            .validate()
            .is_err());
    }

    #[test]
    fn test_partial_params_json() {
        let params: BacktestParameters =
            serde_json::from_str(r#"{"ticker": "QQQ", "prepass": {"mode": "standard"}}"#).unwrap();
        assert_eq!(params.ticker, "QQQ");
        assert_eq!(params.prepass, IndicatorPrepass::Standard);
        assert_eq!(params.initial_capital, 10_000_000.0);
    }

    #[test]
    fn test_standard_set_resolves() {
        for spec in IndicatorPrepass::standard_set() {
            assert!(spec.resolve().is_ok());
        }
    }
}
