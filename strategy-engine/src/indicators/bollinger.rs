use super::sma::{calculate_rolling_std, calculate_sma};

/// Bollinger Bands result
#[derive(Debug, Clone)]
pub struct BollingerBands {
    pub upper: Vec<Option<f64>>,
    pub middle: Vec<Option<f64>>,
    pub lower: Vec<Option<f64>>,
}

/// Calculate Bollinger Bands
///
/// # Arguments
/// * `prices` - Slice of closing prices
/// * `period` - Period for moving average (typically 20)
/// * `std_dev` - Number of sample standard deviations (typically 2.0)
///
/// # Returns
/// BollingerBands struct containing upper, middle (SMA), and lower bands.
/// The first `period - 1` bars are undefined.
pub fn calculate_bollinger_bands(prices: &[f64], period: usize, std_dev: f64) -> BollingerBands {
    let middle = calculate_sma(prices, period);
    let std = calculate_rolling_std(prices, period);

    // A single-bar window has no sample deviation; the band collapses onto the mean.
    let band: Vec<Option<f64>> = if period == 1 {
        middle.iter().map(|m| m.map(|_| 0.0)).collect()
    } else {
        std.iter().map(|s| s.map(|s| s * std_dev)).collect()
    };

    let upper = middle
        .iter()
        .zip(&band)
        .map(|(m, b)| Some((*m)? + (*b)?))
        .collect();
    let lower = middle
        .iter()
        .zip(&band)
        .map(|(m, b)| Some((*m)? - (*b)?))
        .collect();

    BollingerBands {
        upper,
        middle,
        lower,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_bollinger_bands_basic() {
        let prices = vec![
            22.27, 22.19, 22.08, 22.17, 22.18, 22.13, 22.23, 22.43, 22.24, 22.29, 22.15, 22.39,
            22.38, 22.61, 23.36, 24.05, 23.75, 23.83, 23.95, 23.63,
        ];
        let bb = calculate_bollinger_bands(&prices, 20, 2.0);

        assert_eq!(bb.middle.len(), prices.len());
        assert!(bb.middle[18].is_none());

        // The 20th value (index 19) should be valid
        let middle = bb.middle[19].unwrap();
        assert!(bb.upper[19].unwrap() > middle);
        assert!(bb.lower[19].unwrap() < middle);
        assert_relative_eq!(
            bb.upper[19].unwrap() - middle,
            middle - bb.lower[19].unwrap(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_bollinger_width_uses_sample_std() {
        let prices = vec![1.0, 3.0];
        let bb = calculate_bollinger_bands(&prices, 2, 1.0);

        // mean 2, sample std sqrt(2)
        assert_relative_eq!(bb.middle[1].unwrap(), 2.0);
        assert_relative_eq!(bb.upper[1].unwrap(), 2.0 + 2.0_f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(bb.lower[1].unwrap(), 2.0 - 2.0_f64.sqrt(), epsilon = 1e-12);
    }
}
