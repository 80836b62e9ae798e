//! Run the full forecasting pipeline on a synthetic price series.
//!
//! Set RUST_LOG=info to watch the evaluation progress.

use chrono::NaiveDate;
use stock_forecast::data::TimeSeries;
use stock_forecast::models::forest::ForestConfig;
use stock_forecast::models::{
    ArimaModel, ForecastingModel, RecurrentConfig, RecurrentModel, TreeEnsembleConfig,
    TreeEnsembleModel,
};
use stock_forecast::pipeline::{run_pipeline_with_models, PipelineConfig};

fn main() -> stock_forecast::Result<()> {
    env_logger::init();

    // Two trading years of synthetic prices: trend plus two cycles
    let start = NaiveDate::from_ymd_opt(2023, 1, 2).expect("valid date");
    let prices: Vec<f64> = (0..504)
        .map(|i| {
            let t = i as f64;
            180.0 + t * 0.08 + (t * 0.11).sin() * 9.0 + (t * 0.023).cos() * 14.0
        })
        .collect();
    let series = TimeSeries::from_daily_prices(start, &prices)?;

    let config = PipelineConfig {
        horizon: 30,
        investment: 10_000.0,
        ..Default::default()
    };

    // Compact network and forest so the demo finishes quickly
    let models: Vec<Box<dyn ForecastingModel>> = vec![
        Box::new(ArimaModel::new()),
        Box::new(TreeEnsembleModel::with_config(TreeEnsembleConfig {
            forest: ForestConfig {
                n_trees: 30,
                seed: config.seed,
                ..Default::default()
            },
        })),
        Box::new(RecurrentModel::with_config(RecurrentConfig {
            lookback: 20,
            hidden: 16,
            dense: 8,
            epochs: 15,
            seed: config.seed,
            ..Default::default()
        })),
    ];

    let outcome = run_pipeline_with_models(&series, &config, models)?;

    println!("Model comparison (held-out backtest):");
    for score in &outcome.report.scores {
        println!(
            "  {:<13} RMSE {:>8.4}  MAE {:>8.4}  MAPE {:>6.2}%  R2 {:>7.4}",
            score.name, score.metrics.rmse, score.metrics.mae, score.metrics.mape, score.metrics.r2
        );
    }
    for skipped in &outcome.report.skipped {
        println!("  skipped: {}", skipped);
    }
    println!("Best model: {}\n", outcome.report.best_name);

    println!("{}-day forecast:", outcome.forecast.horizon());
    for (date, value) in outcome.forecast_dates.iter().zip(outcome.forecast.values()) {
        println!("  {}  {:>9.2}", date, value);
    }

    println!("\nTrading simulation on ${:.2}:", outcome.strategy.initial_amount);
    if outcome.strategy.trades.is_empty() {
        println!("  no favourable extrema found, holding cash");
    } else {
        for trade in &outcome.strategy.trades {
            println!(
                "  day {:>2}: {} {:.4} shares at {:.2}",
                trade.day, trade.action, trade.shares, trade.price
            );
        }
    }
    println!(
        "  final amount {:.2} ({:+.2}%)",
        outcome.strategy.final_amount, outcome.strategy.profit_percentage
    );

    Ok(())
}
