//! Utility functions for the stock_forecast crate

use crate::error::{ForecastError, Result};
use chrono::{Days, NaiveDate};

/// Index splitting `len` chronological observations into a leading training
/// segment and a trailing held-out segment of `test_fraction`.
///
/// Matches the original floor semantics: `split = len * (1 - f)` truncated.
pub fn split_index(len: usize, test_fraction: f64) -> Result<usize> {
    if !(0.0..=1.0).contains(&test_fraction) || test_fraction == 0.0 || test_fraction == 1.0 {
        return Err(ForecastError::InvalidParameter(format!(
            "test_fraction must be in (0, 1), got {}",
            test_fraction
        )));
    }

    let split = (len as f64 * (1.0 - test_fraction)) as usize;
    if split == 0 || split >= len {
        return Err(ForecastError::ValidationError(format!(
            "Series of length {} cannot be split with test_fraction {}",
            len, test_fraction
        )));
    }

    Ok(split)
}

/// Split values chronologically into (train, test) slices. No shuffling:
/// order matters for time series.
pub fn train_test_split(values: &[f64], test_fraction: f64) -> Result<(&[f64], &[f64])> {
    let split = split_index(values.len(), test_fraction)?;
    Ok((&values[..split], &values[split..]))
}

/// Calendar dates covered by a forecast: day 1 is the day after `last_date`.
pub fn future_dates(last_date: NaiveDate, horizon: usize) -> Vec<NaiveDate> {
    (1..=horizon)
        .map(|day| last_date + Days::new(day as u64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_floor_matches_original() {
        // int(10 * 0.8) == 8
        assert_eq!(split_index(10, 0.2).unwrap(), 8);
        // int(7 * 0.7) == 4
        assert_eq!(split_index(7, 0.3).unwrap(), 4);
    }

    #[test]
    fn split_rejects_degenerate_fractions() {
        assert!(split_index(10, 0.0).is_err());
        assert!(split_index(10, 1.0).is_err());
        assert!(split_index(10, -0.5).is_err());
        assert!(split_index(1, 0.2).is_err());
    }

    #[test]
    fn future_dates_start_tomorrow() {
        let last = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let dates = future_dates(last, 3);
        assert_eq!(dates[0], NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
        assert_eq!(dates[2], NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
    }
}
