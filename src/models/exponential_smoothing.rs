//! Additive-trend exponential smoothing (Holt's linear method)
//!
//! Final fallback of the statistical model's chain: always fits as long as
//! the series has at least two observations, and continues a clean linear
//! trend exactly.

use crate::error::{ForecastError, Result};

const SMOOTHING_GRID: [f64; 9] = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9];

/// Fitted Holt smoother: level and additive trend, no seasonal component.
#[derive(Debug, Clone, Copy)]
pub struct HoltLinear {
    alpha: f64,
    beta: f64,
    level: f64,
    trend: f64,
}

impl HoltLinear {
    /// Fit with fixed smoothing parameters. Both must lie in (0, 1).
    pub fn fit_with(values: &[f64], alpha: f64, beta: f64) -> Result<Self> {
        if !(0.0..1.0).contains(&alpha) || alpha == 0.0 {
            return Err(ForecastError::InvalidParameter(
                "Alpha must be between 0 and 1".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&beta) || beta == 0.0 {
            return Err(ForecastError::InvalidParameter(
                "Beta must be between 0 and 1".to_string(),
            ));
        }
        if values.len() < 2 {
            return Err(ForecastError::FitError(
                "Holt smoothing needs at least two observations".to_string(),
            ));
        }

        let (level, trend, _) = Self::run(values, alpha, beta);
        Ok(Self {
            alpha,
            beta,
            level,
            trend,
        })
    }

    /// Fit by grid search over (alpha, beta), minimizing one-step-ahead SSE.
    /// The first grid point reaching the minimum wins.
    pub fn fit(values: &[f64]) -> Result<Self> {
        if values.len() < 2 {
            return Err(ForecastError::FitError(
                "Holt smoothing needs at least two observations".to_string(),
            ));
        }

        let mut best: Option<(f64, f64, f64, f64, f64)> = None;
        for &alpha in &SMOOTHING_GRID {
            for &beta in &SMOOTHING_GRID {
                let (level, trend, sse) = Self::run(values, alpha, beta);
                if !sse.is_finite() {
                    continue;
                }
                let better = match best {
                    Some((_, _, _, _, best_sse)) => sse < best_sse,
                    None => true,
                };
                if better {
                    best = Some((alpha, beta, level, trend, sse));
                }
            }
        }

        let (alpha, beta, level, trend, _) = best.ok_or_else(|| {
            ForecastError::FitError("Holt smoothing produced no finite fit".to_string())
        })?;

        Ok(Self {
            alpha,
            beta,
            level,
            trend,
        })
    }

    /// One pass of the level/trend recursion; returns the final state and
    /// the one-step-ahead sum of squared errors.
    fn run(values: &[f64], alpha: f64, beta: f64) -> (f64, f64, f64) {
        let mut level = values[0];
        let mut trend = values[1] - values[0];
        let mut sse = 0.0;

        for &value in &values[1..] {
            let one_step = level + trend;
            sse += (value - one_step).powi(2);

            let next_level = alpha * value + (1.0 - alpha) * (level + trend);
            trend = beta * (next_level - level) + (1.0 - beta) * trend;
            level = next_level;
        }

        (level, trend, sse)
    }

    /// Smoothing parameter for the level
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Smoothing parameter for the trend
    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Project `horizon` steps ahead: level + h * trend.
    pub fn forecast(&self, horizon: usize) -> Vec<f64> {
        (1..=horizon)
            .map(|h| self.level + h as f64 * self.trend)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn continues_a_clean_linear_trend() {
        let values: Vec<f64> = (0..50).map(|i| 100.0 + 2.0 * i as f64).collect();
        let model = HoltLinear::fit(&values).unwrap();
        let forecast = model.forecast(5);

        for (h, value) in forecast.iter().enumerate() {
            let expected = 100.0 + 2.0 * (50 + h) as f64;
            assert_approx_eq!(value, &expected, 1e-6);
        }
    }

    #[test]
    fn rejects_too_short_series() {
        assert!(HoltLinear::fit(&[1.0]).is_err());
    }

    #[test]
    fn rejects_out_of_range_parameters() {
        let values = vec![1.0, 2.0, 3.0];
        assert!(HoltLinear::fit_with(&values, 0.0, 0.5).is_err());
        assert!(HoltLinear::fit_with(&values, 0.5, 1.0).is_err());
    }
}
