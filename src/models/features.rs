//! Engineered feature rows for the tree-ensemble model
//!
//! Each row describes one trading day: the previous `LAG_COUNT` prices,
//! two moving averages, a rolling standard deviation, momentum and rate of
//! change. Rolling windows end on the described day itself, so the feature
//! vector for day `t` includes the price at `t`.

use crate::error::{ForecastError, Result};
use statrs::statistics::Statistics;

/// Number of raw lag features
pub const LAG_COUNT: usize = 10;
/// Short moving-average and rolling-deviation window
pub const SHORT_WINDOW: usize = 7;
/// Long moving-average window
pub const LONG_WINDOW: usize = 30;
/// Span for momentum and rate-of-change
pub const MOMENTUM_SPAN: usize = 5;
/// First index with every feature defined
pub const WARMUP: usize = LAG_COUNT + LONG_WINDOW;
/// Total width of a feature row
pub const FEATURE_COUNT: usize = LAG_COUNT + 5;

/// Dense feature rows paired with their same-day target prices.
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    pub rows: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
}

impl FeatureMatrix {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Feature vector for day `t`. Caller guarantees `t >= WARMUP`.
fn feature_row(prices: &[f64], t: usize) -> Vec<f64> {
    let mut row = Vec::with_capacity(FEATURE_COUNT);

    for i in 1..=LAG_COUNT {
        row.push(prices[t - i]);
    }

    let short = &prices[t + 1 - SHORT_WINDOW..=t];
    let long = &prices[t + 1 - LONG_WINDOW..=t];
    row.push(short.iter().copied().mean());
    row.push(long.iter().copied().mean());
    // Sample standard deviation, matching the rolling-deviation convention
    row.push(short.iter().copied().std_dev());

    let momentum = prices[t] - prices[t - MOMENTUM_SPAN];
    row.push(momentum);
    row.push(momentum / prices[t - MOMENTUM_SPAN] * 100.0);

    row
}

/// Build the full training matrix. Days before `WARMUP` are dropped; a
/// series that leaves no usable rows is a fitting failure.
pub fn build_feature_matrix(prices: &[f64]) -> Result<FeatureMatrix> {
    if prices.len() <= WARMUP {
        return Err(ForecastError::FitError(format!(
            "Need more than {} observations to engineer features, got {}",
            WARMUP,
            prices.len()
        )));
    }

    let mut rows = Vec::with_capacity(prices.len() - WARMUP);
    let mut targets = Vec::with_capacity(prices.len() - WARMUP);
    for t in WARMUP..prices.len() {
        rows.push(feature_row(prices, t));
        targets.push(prices[t]);
    }

    Ok(FeatureMatrix { rows, targets })
}

/// Feature vector for the most recent day, used to seed the recursive
/// forecast rollout.
pub fn latest_feature_row(prices: &[f64]) -> Result<Vec<f64>> {
    if prices.len() <= WARMUP {
        return Err(ForecastError::FitError(format!(
            "Need more than {} observations to engineer features, got {}",
            WARMUP,
            prices.len()
        )));
    }
    Ok(feature_row(prices, prices.len() - 1))
}

/// Advance a feature row one step during the rollout: lags shift by one and
/// absorb the newly predicted price. The derived features stay frozen at
/// their last observed values.
pub fn shift_lags(row: &mut [f64], next_price: f64) {
    for i in (1..LAG_COUNT).rev() {
        row[i] = row[i - 1];
    }
    row[0] = next_price;
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn ramp(len: usize) -> Vec<f64> {
        (0..len).map(|i| 100.0 + i as f64).collect()
    }

    #[test]
    fn short_series_yields_no_rows() {
        let prices = ramp(WARMUP);
        assert!(build_feature_matrix(&prices).is_err());
    }

    #[test]
    fn first_usable_row_is_at_warmup() {
        let prices = ramp(WARMUP + 3);
        let matrix = build_feature_matrix(&prices).unwrap();
        assert_eq!(matrix.len(), 3);
        assert_eq!(matrix.targets, vec![140.0, 141.0, 142.0]);
    }

    #[test]
    fn feature_row_layout_on_a_ramp() {
        let prices = ramp(WARMUP + 1);
        let matrix = build_feature_matrix(&prices).unwrap();
        let row = &matrix.rows[0];
        assert_eq!(row.len(), FEATURE_COUNT);

        // Lags count down from the previous day
        assert_approx_eq!(row[0], 139.0);
        assert_approx_eq!(row[9], 130.0);
        // ma_7 over 134..=140, ma_30 over 111..=140
        assert_approx_eq!(row[10], 137.0);
        assert_approx_eq!(row[11], 125.5);
        // Rolling deviation of a unit ramp of length 7
        assert_approx_eq!(row[12], (28.0f64 / 6.0).sqrt(), 1e-9);
        // Momentum and rate of change over a 5-day span
        assert_approx_eq!(row[13], 5.0);
        assert_approx_eq!(row[14], 5.0 / 135.0 * 100.0, 1e-9);
    }

    #[test]
    fn shift_lags_rolls_the_window() {
        let prices = ramp(WARMUP + 1);
        let mut row = latest_feature_row(&prices).unwrap();
        let frozen_ma = row[10];

        shift_lags(&mut row, 200.0);
        assert_approx_eq!(row[0], 200.0);
        assert_approx_eq!(row[1], 139.0);
        assert_approx_eq!(row[9], 131.0);
        assert_approx_eq!(row[10], frozen_ma);
    }
}
