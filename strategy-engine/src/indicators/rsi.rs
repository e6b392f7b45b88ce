/// Calculate RSI from simple rolling averages of gains and losses
///
/// Gains and losses are averaged over the last `period` close-to-close deltas.
/// When the average loss is zero the relative strength is undefined and RSI is
/// pinned at 100.
///
/// # Arguments
/// * `prices` - Slice of closing prices
/// * `period` - RSI period (typically 14)
///
/// # Returns
/// Vector of RSI values, None for the first `period` bars
pub fn calculate_rsi(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = prices.len();
    let mut rsi = vec![None; n];

    if period == 0 || n < period + 1 {
        return rsi;
    }

    let gains: Vec<f64> = prices.windows(2).map(|w| (w[1] - w[0]).max(0.0)).collect();
    let losses: Vec<f64> = prices.windows(2).map(|w| (w[0] - w[1]).max(0.0)).collect();

    // deltas[j] belongs to bar j + 1
    for i in period..n {
        let start = i - period;
        let avg_gain = gains[start..i].iter().sum::<f64>() / period as f64;
        let avg_loss = losses[start..i].iter().sum::<f64>() / period as f64;
        rsi[i] = Some(rsi_value(avg_gain, avg_loss));
    }

    rsi
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - (100.0 / (1.0 + rs))
}
