//! Recurrent (LSTM) forecasting variant
//!
//! Prices are squashed to [0, 1] with a min-max scaler, cut into fixed
//! lookback windows and fed to the stacked network in `lstm`. Forecasting
//! is autoregressive: each predicted value is appended to the window that
//! produces the next one, and values are mapped back to price scale at the
//! end.

use crate::data::TimeSeries;
use crate::error::{ForecastError, Result};
use crate::models::lstm::{LstmNetwork, TrainOptions};
use crate::models::{Forecast, ForecastingModel, TrainReport};
use crate::scaling::MinMaxScaler;
use crate::utils::split_index;
use log::debug;

/// Hyperparameters for the recurrent variant
#[derive(Debug, Clone)]
pub struct RecurrentConfig {
    /// Window length fed to the network
    pub lookback: usize,
    /// Hidden units per LSTM cell
    pub hidden: usize,
    /// Width of the dense head
    pub dense: usize,
    /// Dropout probability on recurrent outputs
    pub dropout: f64,
    pub epochs: usize,
    pub batch_size: usize,
    /// Epochs without improvement before training stops
    pub patience: usize,
    pub learning_rate: f64,
    /// Global gradient-norm ceiling
    pub clip_norm: f64,
    pub seed: u64,
}

impl Default for RecurrentConfig {
    fn default() -> Self {
        Self {
            lookback: 60,
            hidden: 50,
            dense: 25,
            dropout: 0.2,
            epochs: 50,
            batch_size: 32,
            patience: 5,
            learning_rate: 0.01,
            clip_norm: 5.0,
            seed: 42,
        }
    }
}

impl RecurrentConfig {
    fn validate(&self) -> Result<()> {
        if self.lookback == 0 || self.hidden == 0 || self.dense == 0 {
            return Err(ForecastError::InvalidParameter(
                "Lookback, hidden and dense sizes must be positive".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(ForecastError::InvalidParameter(format!(
                "Dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        if self.epochs == 0 || self.batch_size == 0 {
            return Err(ForecastError::InvalidParameter(
                "Epochs and batch size must be positive".to_string(),
            ));
        }
        if self.learning_rate <= 0.0 || !self.learning_rate.is_finite() {
            return Err(ForecastError::InvalidParameter(format!(
                "Learning rate must be positive, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }

    fn train_options(&self) -> TrainOptions {
        TrainOptions {
            epochs: self.epochs,
            batch_size: self.batch_size,
            learning_rate: self.learning_rate,
            patience: self.patience,
            clip_norm: self.clip_norm,
        }
    }
}

/// LSTM model variant.
#[derive(Debug)]
pub struct RecurrentModel {
    config: RecurrentConfig,
    network: Option<LstmNetwork>,
    loss_history: Vec<f64>,
}

impl RecurrentModel {
    pub fn new() -> Self {
        Self::with_config(RecurrentConfig::default())
    }

    pub fn with_config(config: RecurrentConfig) -> Self {
        Self {
            config,
            network: None,
            loss_history: Vec::new(),
        }
    }

    /// Per-epoch training loss of the latest fit
    pub fn loss_history(&self) -> &[f64] {
        &self.loss_history
    }

    /// Cut `scaled[range_start..range_end]` into (window, target) samples.
    /// The window for target `t` is the `lookback` values before it.
    fn samples(
        scaled: &[f64],
        lookback: usize,
        range_start: usize,
        range_end: usize,
    ) -> (Vec<Vec<f64>>, Vec<f64>) {
        let mut windows = Vec::new();
        let mut targets = Vec::new();
        for t in range_start.max(lookback)..range_end {
            windows.push(scaled[t - lookback..t].to_vec());
            targets.push(scaled[t]);
        }
        (windows, targets)
    }

    /// Fit the network on targets up to `fit_end` (exclusive).
    fn fit(&mut self, scaled: &[f64], fit_end: usize) -> Result<()> {
        self.config.validate()?;

        let (windows, targets) =
            Self::samples(scaled, self.config.lookback, 0, fit_end);
        if windows.is_empty() {
            return Err(ForecastError::FitError(format!(
                "Need more than {} observations for a lookback of {}",
                self.config.lookback, self.config.lookback
            )));
        }

        let mut network = LstmNetwork::new(
            self.config.hidden,
            self.config.dense,
            self.config.dropout,
            self.config.seed,
        );
        self.loss_history = network.train(&windows, &targets, &self.config.train_options());
        debug!(
            "LSTM trained on {} windows, {} epochs run",
            windows.len(),
            self.loss_history.len()
        );

        self.network = Some(network);
        Ok(())
    }
}

impl Default for RecurrentModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ForecastingModel for RecurrentModel {
    fn name(&self) -> &'static str {
        "LSTM"
    }

    fn train(&mut self, series: &TimeSeries, test_fraction: f64) -> Result<TrainReport> {
        let prices = series.prices();
        let lookback = self.config.lookback;
        if prices.len() <= lookback {
            return Err(ForecastError::FitError(format!(
                "Need more than {} observations for a lookback of {}",
                lookback, lookback
            )));
        }

        // The split is over the windowed samples, not the raw series, so the
        // first window of the held-out set still reaches back into training
        // history.
        let n_windows = prices.len() - lookback;
        let split = split_index(n_windows, test_fraction)?;
        let test_start = lookback + split;

        let scaler = MinMaxScaler::fit(&prices)?;
        let scaled = scaler.transform(&prices);

        self.fit(&scaled, test_start)?;
        let network = self
            .network
            .as_ref()
            .ok_or_else(|| ForecastError::FitError("Network missing after fit".to_string()))?;

        let (test_windows, _) = Self::samples(&scaled, lookback, test_start, prices.len());
        let predicted: Vec<f64> = test_windows
            .iter()
            .map(|w| scaler.inverse_one(network.predict_one(w)))
            .collect();

        Ok(TrainReport {
            actual: prices[test_start..].to_vec(),
            predicted,
        })
    }

    fn predict(&mut self, series: &TimeSeries, horizon: usize) -> Result<Forecast> {
        let prices = series.prices();
        let scaler = MinMaxScaler::fit(&prices)?;
        let scaled = scaler.transform(&prices);

        self.fit(&scaled, prices.len())?;
        let network = self
            .network
            .as_ref()
            .ok_or_else(|| ForecastError::FitError("Network missing after fit".to_string()))?;

        let mut window = scaled[scaled.len() - self.config.lookback..].to_vec();
        let mut values = Vec::with_capacity(horizon);
        for _ in 0..horizon {
            let next = network.predict_one(&window);
            values.push(scaler.inverse_one(next));
            window.remove(0);
            window.push(next);
        }

        Forecast::new(values, horizon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn small_config() -> RecurrentConfig {
        RecurrentConfig {
            lookback: 8,
            hidden: 6,
            dense: 4,
            dropout: 0.0,
            epochs: 10,
            batch_size: 8,
            patience: 10,
            learning_rate: 0.05,
            clip_norm: 5.0,
            seed: 42,
        }
    }

    fn series(len: usize) -> TimeSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let prices: Vec<f64> = (0..len)
            .map(|i| 100.0 + (i as f64 * 0.3).sin() * 10.0)
            .collect();
        TimeSeries::from_daily_prices(start, &prices).unwrap()
    }

    #[test]
    fn train_covers_the_held_out_span() {
        let series = series(80);
        let mut model = RecurrentModel::with_config(small_config());

        // 72 windows of lookback 8; floor(72 * 0.8) = 57, so 15 held out
        let report = model.train(&series, 0.2).unwrap();
        assert_eq!(report.actual.len(), 15);
        assert_eq!(report.predicted.len(), 15);
        assert!(!model.loss_history().is_empty());
    }

    #[test]
    fn split_counts_windows_not_prices() {
        // 200 prices with a lookback of 60 leave 140 windows, so a 0.2
        // fraction holds out 28 windows, not 40 price points.
        let series = series(200);
        let mut model = RecurrentModel::with_config(RecurrentConfig {
            lookback: 60,
            epochs: 1,
            ..small_config()
        });

        let report = model.train(&series, 0.2).unwrap();
        assert_eq!(report.actual.len(), 28);
        assert_eq!(report.predicted.len(), 28);
    }

    #[test]
    fn forecast_values_stay_on_price_scale() {
        let series = series(60);
        let mut model = RecurrentModel::with_config(small_config());

        let forecast = model.predict(&series, 5).unwrap();
        assert_eq!(forecast.horizon(), 5);
        // Scaled outputs invert into the neighbourhood of the input range
        for v in forecast.values() {
            assert!(*v > 0.0 && *v < 300.0, "out-of-range forecast {}", v);
        }
    }

    #[test]
    fn lookback_longer_than_series_fails() {
        let series = series(10);
        let mut model = RecurrentModel::with_config(RecurrentConfig {
            lookback: 30,
            ..small_config()
        });
        assert!(model.predict(&series, 5).is_err());
    }

    #[test]
    fn zero_dropout_out_of_range_is_rejected() {
        let series = series(60);
        let mut model = RecurrentModel::with_config(RecurrentConfig {
            dropout: 1.0,
            ..small_config()
        });
        assert!(model.predict(&series, 5).is_err());
    }
}
