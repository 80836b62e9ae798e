//! # Stock Forecast
//!
//! A Rust library for stock price forecasting and forecast-driven trading
//! simulation.
//!
//! ## Features
//!
//! - Daily price series loading from CSV with column auto-detection
//! - Three forecasting model variants behind one trait:
//!   ARIMA with an ordered fallback chain, a random forest over engineered
//!   features, and a stacked LSTM network
//! - Backtest-driven model selection by held-out RMSE
//! - Long-only trading simulation over the forecast's local extrema
//!
//! ## Quick Start
//!
//! ```no_run
//! use stock_forecast::data::DataLoader;
//! use stock_forecast::pipeline::{run_pipeline, PipelineConfig};
//!
//! fn main() -> stock_forecast::Result<()> {
//!     // Load historical prices
//!     let series = DataLoader::from_csv("prices.csv")?;
//!
//!     // Evaluate the model variants, forecast with the winner and
//!     // simulate the trading strategy
//!     let outcome = run_pipeline(&series, &PipelineConfig::default())?;
//!
//!     println!("Best model: {}", outcome.report.best_name);
//!     for trade in &outcome.strategy.trades {
//!         println!("Day {}: {} at {:.2}", trade.day, trade.action, trade.price);
//!     }
//!     Ok(())
//! }
//! ```

pub mod data;
pub mod error;
pub mod evaluation;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod scaling;
pub mod strategy;
pub mod utils;

// Re-export commonly used types
pub use crate::data::{DataLoader, TimeSeries};
pub use crate::error::{ForecastError, Result};
pub use crate::evaluation::{default_models, evaluate_models, Evaluation};
pub use crate::metrics::Metrics;
pub use crate::models::{Forecast, ForecastingModel};
pub use crate::pipeline::{run_pipeline, PipelineConfig, PipelineOutcome};
pub use crate::strategy::{simulate_strategy, StrategyResult};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
