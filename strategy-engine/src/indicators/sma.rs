/// Calculate Simple Moving Average
///
/// # Arguments
/// * `prices` - Slice of prices
/// * `period` - SMA period
///
/// # Returns
/// Vector of Option<f64>, None for the first `period - 1` bars
pub fn calculate_sma(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = prices.len();
    let mut sma = vec![None; n];

    if n < period || period == 0 {
        return sma;
    }

    // Calculate initial sum
    let mut sum: f64 = prices[..period].iter().sum();
    sma[period - 1] = Some(sum / period as f64);

    // Sliding window for subsequent values
    for i in period..n {
        sum = sum - prices[i - period] + prices[i];
        sma[i] = Some(sum / period as f64);
    }

    sma
}

/// Rolling sample standard deviation (n - 1 denominator)
///
/// Undefined for the first `period - 1` bars and for `period < 2`.
pub fn calculate_rolling_std(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = prices.len();
    let mut std = vec![None; n];

    if n < period || period < 2 {
        return std;
    }

    for i in (period - 1)..n {
        let window = &prices[i + 1 - period..=i];
        let mean: f64 = window.iter().sum::<f64>() / period as f64;
        let variance: f64 =
            window.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (period - 1) as f64;
        std[i] = Some(variance.sqrt());
    }

    std
}
