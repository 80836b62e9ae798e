//! Backtests every model variant and selects the best by held-out RMSE
//!
//! Each variant trains against the same held-out span. A variant that fails
//! to train, or whose held-out span defeats a metric, is logged and skipped
//! rather than aborting the run. Selection only fails when no variant
//! survives.

use crate::data::TimeSeries;
use crate::error::{ForecastError, Result};
use crate::metrics::{evaluate_forecast, Metrics};
use crate::models::forest::ForestConfig;
use crate::models::{
    ArimaModel, ForecastingModel, RecurrentConfig, RecurrentModel, TreeEnsembleConfig,
    TreeEnsembleModel,
};
use log::{info, warn};
use rayon::prelude::*;
use serde::Serialize;

/// Held-out metrics for one surviving model variant.
#[derive(Debug, Clone, Serialize)]
pub struct ModelScore {
    pub name: String,
    pub metrics: Metrics,
}

/// Everything the evaluation learned, in variant order.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    /// Variants that trained and were scored
    pub scores: Vec<ModelScore>,
    /// Variants that failed to train or score, with the reason
    pub skipped: Vec<String>,
    pub best_name: String,
    pub best_metrics: Metrics,
}

/// Outcome of the evaluation: the winning model, still holding its fitted
/// state, plus the comparison report.
#[derive(Debug)]
pub struct Evaluation {
    pub best: Box<dyn ForecastingModel>,
    pub report: EvaluationReport,
}

/// The standard trio of variants, in fixed order: statistical, tree
/// ensemble, recurrent.
pub fn default_models(seed: u64) -> Vec<Box<dyn ForecastingModel>> {
    vec![
        Box::new(ArimaModel::new()),
        Box::new(TreeEnsembleModel::with_config(TreeEnsembleConfig {
            forest: ForestConfig {
                seed,
                ..Default::default()
            },
        })),
        Box::new(RecurrentModel::with_config(RecurrentConfig {
            seed,
            ..Default::default()
        })),
    ]
}

/// Train and score the given variants against a shared held-out span and
/// pick the one with the lowest RMSE. Ties keep the earlier variant.
pub fn evaluate_models(
    series: &TimeSeries,
    test_fraction: f64,
    models: Vec<Box<dyn ForecastingModel>>,
) -> Result<Evaluation> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(ForecastError::InvalidParameter(format!(
            "test_fraction must be in (0, 1), got {}",
            test_fraction
        )));
    }
    if models.is_empty() {
        return Err(ForecastError::NoUsableModel(
            "No model variants supplied".to_string(),
        ));
    }

    // Variants are independent, so backtests run in parallel;
    // collect preserves the variant order.
    let outcomes: Vec<_> = models
        .into_par_iter()
        .map(|mut model| {
            let outcome = model.train(series, test_fraction);
            (model, outcome)
        })
        .collect();

    let mut survivors: Vec<(Box<dyn ForecastingModel>, Metrics)> = Vec::new();
    let mut skipped = Vec::new();

    for (model, outcome) in outcomes {
        let name = model.name();
        match outcome.and_then(|report| evaluate_forecast(&report.actual, &report.predicted)) {
            Ok(metrics) => {
                info!(
                    "{}: RMSE {:.4}, MAPE {:.2}%",
                    name, metrics.rmse, metrics.mape
                );
                survivors.push((model, metrics));
            }
            Err(e) => {
                warn!("Skipping {}: {}", name, e);
                skipped.push(format!("{}: {}", name, e));
            }
        }
    }

    if survivors.is_empty() {
        return Err(ForecastError::NoUsableModel(
            "Every model variant failed to train or score".to_string(),
        ));
    }

    let mut best_index = 0;
    for (i, (_, metrics)) in survivors.iter().enumerate() {
        if metrics.rmse < survivors[best_index].1.rmse {
            best_index = i;
        }
    }

    let scores: Vec<ModelScore> = survivors
        .iter()
        .map(|(model, metrics)| ModelScore {
            name: model.name().to_string(),
            metrics: *metrics,
        })
        .collect();

    let (best, best_metrics) = survivors.swap_remove(best_index);
    info!("Best model: {}", best.name());
    let best_name = best.name().to_string();

    Ok(Evaluation {
        best,
        report: EvaluationReport {
            scores,
            skipped,
            best_name,
            best_metrics,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Forecast, TrainReport};
    use chrono::NaiveDate;

    /// Stub variant with a canned backtest error of known size.
    #[derive(Debug)]
    struct StubModel {
        name: &'static str,
        error: f64,
        fail: bool,
    }

    impl StubModel {
        fn boxed(name: &'static str, error: f64) -> Box<dyn ForecastingModel> {
            Box::new(Self {
                name,
                error,
                fail: false,
            })
        }

        fn failing(name: &'static str) -> Box<dyn ForecastingModel> {
            Box::new(Self {
                name,
                error: 0.0,
                fail: true,
            })
        }
    }

    impl ForecastingModel for StubModel {
        fn name(&self) -> &'static str {
            self.name
        }

        fn train(&mut self, _series: &TimeSeries, _test_fraction: f64) -> Result<TrainReport> {
            if self.fail {
                return Err(ForecastError::FitError("stub failure".to_string()));
            }
            let actual = vec![100.0, 101.0, 102.0];
            let predicted = actual.iter().map(|v| v + self.error).collect();
            Ok(TrainReport { actual, predicted })
        }

        fn predict(&mut self, _series: &TimeSeries, horizon: usize) -> Result<Forecast> {
            Forecast::new(vec![100.0; horizon], horizon)
        }
    }

    fn series() -> TimeSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let prices: Vec<f64> = (0..50).map(|i| 100.0 + i as f64).collect();
        TimeSeries::from_daily_prices(start, &prices).unwrap()
    }

    #[test]
    fn lowest_rmse_wins() {
        let models = vec![
            StubModel::boxed("first", 4.0),
            StubModel::boxed("second", 2.5),
            StubModel::boxed("third", 9.9),
        ];

        let evaluation = evaluate_models(&series(), 0.2, models).unwrap();
        assert_eq!(evaluation.report.best_name, "second");
        assert_eq!(evaluation.best.name(), "second");
        assert_eq!(evaluation.report.scores.len(), 3);
    }

    #[test]
    fn failed_variants_are_skipped_not_fatal() {
        let models = vec![
            StubModel::failing("first"),
            StubModel::boxed("survivor", 1.0),
            StubModel::failing("third"),
        ];

        let evaluation = evaluate_models(&series(), 0.2, models).unwrap();
        assert_eq!(evaluation.report.best_name, "survivor");
        assert_eq!(evaluation.report.scores.len(), 1);
        assert_eq!(evaluation.report.skipped.len(), 2);
    }

    #[test]
    fn all_variants_failing_is_an_error() {
        let models = vec![StubModel::failing("a"), StubModel::failing("b")];
        let result = evaluate_models(&series(), 0.2, models);
        assert!(matches!(result, Err(ForecastError::NoUsableModel(_))));
    }

    #[test]
    fn ties_keep_the_earlier_variant() {
        let models = vec![
            StubModel::boxed("first", 1.5),
            StubModel::boxed("second", 1.5),
        ];

        let evaluation = evaluate_models(&series(), 0.2, models).unwrap();
        assert_eq!(evaluation.report.best_name, "first");
    }
}
