//! End-to-end pipeline: evaluate variants, forecast, simulate the strategy

use crate::data::TimeSeries;
use crate::error::{ForecastError, Result};
use crate::evaluation::{default_models, evaluate_models, EvaluationReport};
use crate::models::{Forecast, ForecastingModel};
use crate::strategy::{simulate_strategy, StrategyResult};
use crate::utils::future_dates;
use chrono::NaiveDate;
use log::info;

/// Knobs for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Trailing share of the series held out for the backtest
    pub test_fraction: f64,
    /// Days to forecast past the last known date
    pub horizon: usize,
    /// Seed shared by the seeded model variants
    pub seed: u64,
    /// Starting cash for the strategy simulation
    pub investment: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            horizon: 30,
            seed: 42,
            investment: 10_000.0,
        }
    }
}

/// Everything one run produces.
#[derive(Debug)]
pub struct PipelineOutcome {
    /// How the variants compared on the backtest
    pub report: EvaluationReport,
    /// Forecast from the winning variant, refitted on the full series
    pub forecast: Forecast,
    /// Calendar dates matching the forecast values
    pub forecast_dates: Vec<NaiveDate>,
    /// Simulated trading outcome over the forecast
    pub strategy: StrategyResult,
}

/// Refit the model on the whole series and project `horizon` days ahead.
pub fn generate_forecast(
    model: &mut dyn ForecastingModel,
    series: &TimeSeries,
    horizon: usize,
) -> Result<Forecast> {
    if horizon == 0 {
        return Err(ForecastError::InvalidParameter(
            "Forecast horizon must be positive".to_string(),
        ));
    }

    info!("Forecasting {} days with {}", horizon, model.name());
    model.predict(series, horizon)
}

/// Run the full pipeline with the standard model trio.
pub fn run_pipeline(series: &TimeSeries, config: &PipelineConfig) -> Result<PipelineOutcome> {
    run_pipeline_with_models(series, config, default_models(config.seed))
}

/// Run the full pipeline with caller-supplied model variants.
pub fn run_pipeline_with_models(
    series: &TimeSeries,
    config: &PipelineConfig,
    models: Vec<Box<dyn ForecastingModel>>,
) -> Result<PipelineOutcome> {
    let evaluation = evaluate_models(series, config.test_fraction, models)?;
    let mut best = evaluation.best;

    let forecast = generate_forecast(best.as_mut(), series, config.horizon)?;
    let forecast_dates = future_dates(series.last_date(), config.horizon);
    let strategy = simulate_strategy(forecast.values(), config.investment)?;

    info!(
        "Pipeline finished: {} trades, {:.2}% return",
        strategy.trade_count(),
        strategy.profit_percentage
    );

    Ok(PipelineOutcome {
        report: evaluation.report,
        forecast,
        forecast_dates,
        strategy,
    })
}
