//! MACD (Moving Average Convergence Divergence)
//!
//! MACD line = EMA(fast) - EMA(slow)
//! Signal line = EMA(signal) of the MACD line
//! Histogram = MACD line - signal line
//!
//! All three EMAs are seeded at their first input, so every bar is defined.

use super::ema::calculate_ema;

/// MACD result
#[derive(Debug, Clone)]
pub struct Macd {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

pub fn calculate_macd(prices: &[f64], fast: usize, slow: usize, signal_period: usize) -> Macd {
    if prices.is_empty() || fast == 0 || slow == 0 || signal_period == 0 {
        return Macd {
            line: vec![],
            signal: vec![],
            histogram: vec![],
        };
    }

    let ema_fast = calculate_ema(prices, fast);
    let ema_slow = calculate_ema(prices, slow);

    let line: Vec<f64> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| f - s)
        .collect();
    let signal = calculate_ema(&line, signal_period);
    let histogram = line.iter().zip(&signal).map(|(m, s)| m - s).collect();

    Macd {
        line,
        signal,
        histogram,
    }
}
