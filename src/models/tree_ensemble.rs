//! Tree-ensemble forecaster over engineered features
//!
//! A bagged forest of regression trees is trained on standardized feature
//! rows. The backtest fits on the leading rows only and scores the held-out
//! tail; forecasting refits on the whole series, then rolls the feature row
//! forward one predicted day at a time with the derived features frozen.

use crate::data::TimeSeries;
use crate::error::{ForecastError, Result};
use crate::models::features::{build_feature_matrix, latest_feature_row, shift_lags};
use crate::models::forest::{ForestConfig, RandomForest};
use crate::models::{Forecast, ForecastingModel, TrainReport};
use crate::scaling::StandardScaler;
use crate::utils::split_index;

/// Configuration for the tree-ensemble variant
#[derive(Debug, Clone, Default)]
pub struct TreeEnsembleConfig {
    /// Underlying forest hyperparameters
    pub forest: ForestConfig,
}

/// Tree-ensemble model variant.
#[derive(Debug)]
pub struct TreeEnsembleModel {
    config: TreeEnsembleConfig,
    scaler: Option<StandardScaler>,
    forest: RandomForest,
}

impl TreeEnsembleModel {
    pub fn new() -> Self {
        Self::with_config(TreeEnsembleConfig::default())
    }

    pub fn with_config(config: TreeEnsembleConfig) -> Self {
        let forest = RandomForest::new(config.forest.clone());
        Self {
            config,
            scaler: None,
            forest,
        }
    }

    /// Fit the scaler and forest on the given rows. The scaler only ever
    /// sees the rows it is fitted on; later rows are transformed with the
    /// stored statistics.
    fn fit_rows(&mut self, rows: &[Vec<f64>], targets: &[f64]) -> Result<()> {
        let scaler = StandardScaler::fit(rows)?;
        let scaled = scaler.transform(rows);

        self.forest = RandomForest::new(self.config.forest.clone());
        self.forest.fit(&scaled, targets)?;
        self.scaler = Some(scaler);
        Ok(())
    }
}

impl Default for TreeEnsembleModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ForecastingModel for TreeEnsembleModel {
    fn name(&self) -> &'static str {
        "Random Forest"
    }

    fn train(&mut self, series: &TimeSeries, test_fraction: f64) -> Result<TrainReport> {
        let prices = series.prices();
        let matrix = build_feature_matrix(&prices)?;

        // Split on engineered rows, not on raw prices
        let split = split_index(matrix.len(), test_fraction)?;
        let (train_rows, test_rows) = matrix.rows.split_at(split);
        let (train_targets, test_targets) = matrix.targets.split_at(split);

        self.fit_rows(train_rows, train_targets)?;

        let scaler = self
            .scaler
            .as_ref()
            .ok_or_else(|| ForecastError::FitError("Scaler missing after fit".to_string()))?;
        let predicted = self.forest.predict(&scaler.transform(test_rows))?;

        Ok(TrainReport {
            actual: test_targets.to_vec(),
            predicted,
        })
    }

    fn predict(&mut self, series: &TimeSeries, horizon: usize) -> Result<Forecast> {
        let prices = series.prices();
        let matrix = build_feature_matrix(&prices)?;
        self.fit_rows(&matrix.rows, &matrix.targets)?;

        let scaler = self
            .scaler
            .as_ref()
            .ok_or_else(|| ForecastError::FitError("Scaler missing after fit".to_string()))?;

        let mut row = latest_feature_row(&prices)?;
        let mut values = Vec::with_capacity(horizon);
        for _ in 0..horizon {
            let next = self.forest.predict_one(&scaler.transform_row(&row))?;
            values.push(next);
            shift_lags(&mut row, next);
        }

        Forecast::new(values, horizon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TimeSeries;
    use chrono::NaiveDate;

    fn small_config() -> TreeEnsembleConfig {
        TreeEnsembleConfig {
            forest: ForestConfig {
                n_trees: 10,
                max_depth: 5,
                ..Default::default()
            },
        }
    }

    fn series(len: usize) -> TimeSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let prices: Vec<f64> = (0..len)
            .map(|i| 100.0 + (i as f64 * 0.4).sin() * 8.0 + i as f64 * 0.05)
            .collect();
        TimeSeries::from_daily_prices(start, &prices).unwrap()
    }

    #[test]
    fn train_reports_the_held_out_tail() {
        let series = series(120);
        let mut model = TreeEnsembleModel::with_config(small_config());

        let report = model.train(&series, 0.2).unwrap();
        // 80 feature rows after warmup, 20% held out
        assert_eq!(report.actual.len(), 16);
        assert_eq!(report.predicted.len(), 16);
    }

    #[test]
    fn predict_rolls_out_the_full_horizon() {
        let series = series(120);
        let mut model = TreeEnsembleModel::with_config(small_config());

        let forecast = model.predict(&series, 10).unwrap();
        assert_eq!(forecast.horizon(), 10);
        assert!(forecast.values().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn short_series_fails_to_train() {
        let series = series(35);
        let mut model = TreeEnsembleModel::with_config(small_config());
        assert!(model.train(&series, 0.2).is_err());
    }
}
