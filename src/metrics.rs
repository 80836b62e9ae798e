//! Metrics for evaluating forecast performance

use crate::error::{ForecastError, Result};
use serde::Serialize;

/// Forecast quality metrics over one held-out segment.
///
/// RMSE is the sole model-selection criterion; the rest are reported to
/// collaborators for display and logging.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Metrics {
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Error
    pub mae: f64,
    /// Mean Absolute Percentage Error (in percent)
    pub mape: f64,
    /// Coefficient of determination
    pub r2: f64,
}

impl std::fmt::Display for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "  RMSE: {:.4}", self.rmse)?;
        writeln!(f, "  MAE:  {:.4}", self.mae)?;
        writeln!(f, "  MAPE: {:.2}%", self.mape)?;
        write!(f, "  R2:   {:.4}", self.r2)
    }
}

fn validate(actual: &[f64], predicted: &[f64]) -> Result<()> {
    if actual.len() != predicted.len() || actual.is_empty() {
        return Err(ForecastError::ValidationError(format!(
            "Actual and predicted values must have the same non-zero length ({} vs {})",
            actual.len(),
            predicted.len()
        )));
    }
    Ok(())
}

/// Mean Absolute Error
pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    validate(actual, predicted)?;
    let sum: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p).abs())
        .sum();
    Ok(sum / actual.len() as f64)
}

/// Root Mean Squared Error
pub fn root_mean_squared_error(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    validate(actual, predicted)?;
    let sum: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    Ok((sum / actual.len() as f64).sqrt())
}

/// Mean Absolute Percentage Error, in percent.
///
/// Undefined when any actual value is zero; that condition surfaces as
/// [`ForecastError::DegenerateMetric`] and the harness skips the model for
/// ranking. Prices are validated positive upstream, so this only fires on
/// synthetic inputs.
pub fn mean_absolute_percentage_error(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    validate(actual, predicted)?;
    if actual.iter().any(|&a| a == 0.0) {
        return Err(ForecastError::DegenerateMetric(
            "MAPE undefined: held-out segment contains a zero actual value".to_string(),
        ));
    }

    let sum: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| ((a - p) / a).abs())
        .sum();
    Ok(sum / actual.len() as f64 * 100.0)
}

/// Coefficient of determination. Defined as 0 when total variance is zero.
pub fn r_squared(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    validate(actual, predicted)?;
    let mean = actual.iter().sum::<f64>() / actual.len() as f64;

    let ss_res: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();

    if ss_tot == 0.0 {
        Ok(0.0)
    } else {
        Ok(1.0 - ss_res / ss_tot)
    }
}

/// Compute the full metric set for one (actual, predicted) pair.
pub fn evaluate_forecast(actual: &[f64], predicted: &[f64]) -> Result<Metrics> {
    Ok(Metrics {
        rmse: root_mean_squared_error(actual, predicted)?,
        mae: mean_absolute_error(actual, predicted)?,
        mape: mean_absolute_percentage_error(actual, predicted)?,
        r2: r_squared(actual, predicted)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn perfect_forecast_scores_perfectly() {
        let values = vec![10.0, 11.0, 12.5, 9.0];
        let metrics = evaluate_forecast(&values, &values).unwrap();

        assert_approx_eq!(metrics.rmse, 0.0);
        assert_approx_eq!(metrics.mae, 0.0);
        assert_approx_eq!(metrics.mape, 0.0);
        assert_approx_eq!(metrics.r2, 1.0);
    }

    #[test]
    fn constant_actuals_have_zero_r2() {
        let actual = vec![5.0, 5.0, 5.0];
        let predicted = vec![4.0, 5.0, 6.0];
        assert_eq!(r_squared(&actual, &predicted).unwrap(), 0.0);
    }

    #[test]
    fn zero_actual_makes_mape_degenerate() {
        let actual = vec![1.0, 0.0, 2.0];
        let predicted = vec![1.0, 1.0, 2.0];
        let err = mean_absolute_percentage_error(&actual, &predicted).unwrap_err();
        assert!(matches!(err, ForecastError::DegenerateMetric(_)));
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        assert!(evaluate_forecast(&[1.0, 2.0], &[1.0]).is_err());
        assert!(evaluate_forecast(&[], &[]).is_err());
    }
}
