//! Feature and series scalers shared by the models

use crate::error::{ForecastError, Result};

/// Column-wise zero-mean/unit-variance scaler for feature matrices.
///
/// Fit only on the training partition during backtests to avoid leakage.
/// The multi-step rollout refits it on the full history, so the final
/// forecast sees statistics computed over every observation.
#[derive(Debug, Clone)]
pub struct StandardScaler {
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl StandardScaler {
    /// Fit per-column mean and standard deviation (population, ddof = 0).
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self> {
        let n_rows = rows.len();
        if n_rows == 0 {
            return Err(ForecastError::FitError(
                "Cannot fit scaler on zero rows".to_string(),
            ));
        }

        let n_cols = rows[0].len();
        let mut means = vec![0.0; n_cols];
        let mut stds = vec![0.0; n_cols];

        for row in rows {
            for (col, &value) in row.iter().enumerate() {
                means[col] += value;
            }
        }
        for mean in &mut means {
            *mean /= n_rows as f64;
        }

        for row in rows {
            for (col, &value) in row.iter().enumerate() {
                stds[col] += (value - means[col]).powi(2);
            }
        }
        for std in &mut stds {
            *std = (*std / n_rows as f64).sqrt();
            // Constant columns pass through centered only
            if *std < 1e-12 {
                *std = 1.0;
            }
        }

        Ok(Self { means, stds })
    }

    /// Scale a single feature row.
    pub fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.means.iter().zip(self.stds.iter()))
            .map(|(&value, (&mean, &std))| (value - mean) / std)
            .collect()
    }

    /// Scale a batch of feature rows.
    pub fn transform(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        rows.iter().map(|row| self.transform_row(row)).collect()
    }
}

/// Min-max scaler mapping a value series onto [0, 1].
#[derive(Debug, Clone, Copy)]
pub struct MinMaxScaler {
    min: f64,
    max: f64,
}

impl MinMaxScaler {
    /// Fit the observed range of `values`.
    pub fn fit(values: &[f64]) -> Result<Self> {
        if values.is_empty() {
            return Err(ForecastError::FitError(
                "Cannot fit scaler on an empty series".to_string(),
            ));
        }

        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Ok(Self { min, max })
    }

    fn range(&self) -> f64 {
        self.max - self.min
    }

    /// Scale one value into [0, 1]. A constant series maps to 0.
    pub fn transform_one(&self, value: f64) -> f64 {
        if self.range() < 1e-12 {
            0.0
        } else {
            (value - self.min) / self.range()
        }
    }

    /// Scale a series into [0, 1].
    pub fn transform(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|&v| self.transform_one(v)).collect()
    }

    /// Map one scaled value back to the original scale.
    pub fn inverse_one(&self, scaled: f64) -> f64 {
        if self.range() < 1e-12 {
            self.min
        } else {
            scaled * self.range() + self.min
        }
    }

    /// Map scaled values back to the original scale.
    pub fn inverse_transform(&self, scaled: &[f64]) -> Vec<f64> {
        scaled.iter().map(|&v| self.inverse_one(v)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn standard_scaler_centers_and_scales() {
        let rows = vec![vec![1.0, 10.0], vec![3.0, 10.0], vec![5.0, 10.0]];
        let scaler = StandardScaler::fit(&rows).unwrap();
        let scaled = scaler.transform(&rows);

        // First column: mean 3, population std sqrt(8/3)
        assert_approx_eq!(scaled[0][0], (1.0 - 3.0) / (8.0_f64 / 3.0).sqrt(), 1e-12);
        assert_approx_eq!(scaled[1][0], 0.0, 1e-12);
        // Constant column is centered only
        assert_approx_eq!(scaled[2][1], 0.0, 1e-12);
    }

    #[test]
    fn minmax_round_trips() {
        let values = vec![50.0, 75.0, 100.0];
        let scaler = MinMaxScaler::fit(&values).unwrap();
        let scaled = scaler.transform(&values);

        assert_approx_eq!(scaled[0], 0.0);
        assert_approx_eq!(scaled[1], 0.5);
        assert_approx_eq!(scaled[2], 1.0);

        let restored = scaler.inverse_transform(&scaled);
        for (orig, back) in values.iter().zip(restored.iter()) {
            assert_approx_eq!(orig, back, 1e-9);
        }
    }

    #[test]
    fn minmax_handles_constant_series() {
        let scaler = MinMaxScaler::fit(&[7.0, 7.0, 7.0]).unwrap();
        assert_eq!(scaler.transform_one(7.0), 0.0);
        assert_eq!(scaler.inverse_one(0.0), 7.0);
    }
}
