//! Forecasting models for price time series

use crate::data::TimeSeries;
use crate::error::{ForecastError, Result};
use serde::Serialize;
use std::fmt::Debug;

pub mod arima;
pub mod exponential_smoothing;
pub mod features;
pub mod forest;
pub mod lstm;
pub mod recurrent;
pub mod tree_ensemble;

pub use arima::{ArimaModel, ArimaOrder};
pub use recurrent::{RecurrentConfig, RecurrentModel};
pub use tree_ensemble::{TreeEnsembleConfig, TreeEnsembleModel};

/// Held-out backtest segment: actual prices alongside the model's
/// predictions for the same span.
#[derive(Debug, Clone)]
pub struct TrainReport {
    /// Actual held-out values, in chronological order
    pub actual: Vec<f64>,
    /// Model predictions for the same span
    pub predicted: Vec<f64>,
}

/// Ordered sequence of future prices. Index `i` represents day `i + 1`
/// after the last known date. Immutable once produced.
#[derive(Debug, Clone, Serialize)]
pub struct Forecast {
    values: Vec<f64>,
    horizon: usize,
}

impl Forecast {
    /// Create a new forecast, validating the value count against the horizon.
    pub fn new(values: Vec<f64>, horizon: usize) -> Result<Self> {
        if values.len() != horizon {
            return Err(ForecastError::ValidationError(format!(
                "Values length ({}) doesn't match horizon ({})",
                values.len(),
                horizon
            )));
        }

        Ok(Self { values, horizon })
    }

    /// Get the forecasted values
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Get the number of days forecasted
    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Final forecast value, used for end-of-period liquidation
    pub fn last(&self) -> Option<f64> {
        self.values.last().copied()
    }
}

/// Polymorphic capability set shared by every model variant.
///
/// `train` backtests: it fits on the leading `1 - test_fraction` of the
/// series and returns the held-out tail with the model's predictions for
/// it. `predict` refits on the entire series and projects `horizon` values
/// beyond the last known date. Each variant owns its fitted state; no state
/// is shared between variants.
pub trait ForecastingModel: Debug + Send {
    /// Stable display name of the model variant
    fn name(&self) -> &'static str;

    /// Backtest against the trailing `test_fraction` of the series.
    fn train(&mut self, series: &TimeSeries, test_fraction: f64) -> Result<TrainReport>;

    /// Forecast `horizon` values beyond the last known date.
    fn predict(&mut self, series: &TimeSeries, horizon: usize) -> Result<Forecast>;
}
