//! Price history handling for forecasting

use crate::error::{ForecastError, Result};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::Serialize;
use std::fs::File;
use std::path::Path;

/// A single observation: one calendar date, one positive price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PricePoint {
    /// Observation date
    pub date: NaiveDate,
    /// Closing price, must be positive
    pub price: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, price: f64) -> Self {
        Self { date, price }
    }
}

/// Ordered price history consumed by every forecasting model.
///
/// Validated on construction: non-empty, strictly increasing dates, positive
/// finite prices. Read-only once built; models never mutate the series.
#[derive(Debug, Clone)]
pub struct TimeSeries {
    points: Vec<PricePoint>,
}

impl TimeSeries {
    /// Create a validated time series from price points.
    pub fn new(points: Vec<PricePoint>) -> Result<Self> {
        if points.is_empty() {
            return Err(ForecastError::DataError(
                "Time series must not be empty".to_string(),
            ));
        }

        for point in &points {
            if !point.price.is_finite() || point.price <= 0.0 {
                return Err(ForecastError::DataError(format!(
                    "Non-positive price {} at {}",
                    point.price, point.date
                )));
            }
        }

        for pair in points.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(ForecastError::DataError(format!(
                    "Dates must be strictly increasing: {} followed by {}",
                    pair[0].date, pair[1].date
                )));
            }
        }

        Ok(Self { points })
    }

    /// Build a series from a start date and daily prices (handy in tests).
    pub fn from_daily_prices(start: NaiveDate, prices: &[f64]) -> Result<Self> {
        let points = prices
            .iter()
            .enumerate()
            .map(|(i, &price)| PricePoint::new(start + chrono::Days::new(i as u64), price))
            .collect();
        Self::new(points)
    }

    /// Get the price points
    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    /// Get the price values in chronological order
    pub fn prices(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.price).collect()
    }

    /// Get the length of the time series
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the time series is empty (cannot happen after validation)
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Last known price
    pub fn last_price(&self) -> f64 {
        self.points[self.points.len() - 1].price
    }

    /// Last known date
    pub fn last_date(&self) -> NaiveDate {
        self.points[self.points.len() - 1].date
    }
}

/// Loader turning tabular price data into a [`TimeSeries`].
///
/// Network acquisition is a collaborator concern; the core only accepts data
/// that is already on disk or in a DataFrame.
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load a time series from a CSV file with a date column and a price column.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<TimeSeries> {
        let file = File::open(path)?;
        let df = CsvReader::new(file)
            .infer_schema(None)
            .has_header(true)
            .finish()?;

        Self::from_dataframe(df)
    }

    /// Build a time series from an existing DataFrame.
    pub fn from_dataframe(df: DataFrame) -> Result<TimeSeries> {
        let date_column = Self::detect_date_column(&df)?;
        let price_column = Self::detect_price_column(&df)?;

        let dates = Self::dates(&df, &date_column)?;
        let prices = Self::prices(&df, &price_column)?;

        if dates.len() != prices.len() {
            return Err(ForecastError::DataError(format!(
                "Column lengths differ: {} dates vs {} prices (missing values?)",
                dates.len(),
                prices.len()
            )));
        }

        let points = dates
            .into_iter()
            .zip(prices)
            .map(|(date, price)| PricePoint::new(date, price))
            .collect();

        TimeSeries::new(points)
    }

    /// Detect the date column in a DataFrame
    fn detect_date_column(df: &DataFrame) -> Result<String> {
        for name in df.get_column_names() {
            let lower = name.to_lowercase();
            if lower.contains("date") || lower.contains("time") {
                return Ok(name.to_string());
            }
        }

        Err(ForecastError::DataError(
            "No date column found in data".to_string(),
        ))
    }

    /// Detect the price column in a DataFrame
    fn detect_price_column(df: &DataFrame) -> Result<String> {
        for name in df.get_column_names() {
            let lower = name.to_lowercase();
            if lower.contains("price") || lower.contains("close") {
                return Ok(name.to_string());
            }
        }

        Err(ForecastError::DataError(
            "No price column found in data".to_string(),
        ))
    }

    fn dates(df: &DataFrame, column: &str) -> Result<Vec<NaiveDate>> {
        let col = df.column(column)?;

        match col.dtype() {
            DataType::Utf8 => col
                .utf8()?
                .into_iter()
                .map(|opt| {
                    let raw = opt.ok_or_else(|| {
                        ForecastError::DataError(format!("Missing date in column '{}'", column))
                    })?;
                    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| {
                        ForecastError::DataError(format!("Unparseable date '{}': {}", raw, e))
                    })
                })
                .collect(),
            DataType::Date => col
                .date()?
                .into_iter()
                .map(|opt| {
                    let days = opt.ok_or_else(|| {
                        ForecastError::DataError(format!("Missing date in column '{}'", column))
                    })?;
                    NaiveDate::from_ymd_opt(1970, 1, 1)
                        .and_then(|epoch| {
                            // The offset is signed; pre-1970 dates are valid
                            epoch.checked_add_signed(chrono::Duration::days(i64::from(days)))
                        })
                        .ok_or_else(|| {
                            ForecastError::DataError(format!("Date out of range: {} days", days))
                        })
                })
                .collect(),
            other => Err(ForecastError::DataError(format!(
                "Unsupported date column type: {:?}",
                other
            ))),
        }
    }

    fn prices(df: &DataFrame, column: &str) -> Result<Vec<f64>> {
        let col = df.column(column)?;

        match col.dtype() {
            DataType::Float64 => Ok(col.f64()?.into_iter().flatten().collect()),
            DataType::Float32 => Ok(col
                .f32()?
                .into_iter()
                .flatten()
                .map(|v| v as f64)
                .collect()),
            DataType::Int64 => Ok(col
                .i64()?
                .into_iter()
                .flatten()
                .map(|v| v as f64)
                .collect()),
            DataType::Int32 => Ok(col
                .i32()?
                .into_iter()
                .flatten()
                .map(|v| v as f64)
                .collect()),
            other => Err(ForecastError::DataError(format!(
                "Price column '{}' has unsupported type {:?}",
                column, other
            ))),
        }
    }
}
