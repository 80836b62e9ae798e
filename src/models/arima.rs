//! Integrated autoregressive model with an ordered fallback chain
//!
//! Estimation is ordinary least squares on the differenced series (pure AR)
//! or the two-stage Hannan-Rissanen procedure when moving-average terms are
//! present. Multi-step forecasts apply the fitted recursion with future
//! shocks at zero, then integrate back; the model is never re-fitted per
//! step.

use crate::data::TimeSeries;
use crate::error::{ForecastError, Result};
use crate::models::exponential_smoothing::HoltLinear;
use crate::models::{Forecast, ForecastingModel, TrainReport};
use crate::utils::train_test_split;
use log::debug;
use nalgebra::{DMatrix, DVector};

/// ARIMA order (p, d, q)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArimaOrder {
    /// Autoregressive lags
    pub p: usize,
    /// Differencing passes
    pub d: usize,
    /// Moving-average terms
    pub q: usize,
}

impl ArimaOrder {
    /// Default order used on the first fitting attempt
    pub const DEFAULT: Self = Self { p: 5, d: 1, q: 0 };
    /// Minimal order used when the default fails to fit
    pub const MINIMAL: Self = Self { p: 1, d: 1, q: 1 };
}

impl std::fmt::Display for ArimaOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{},{})", self.p, self.d, self.q)
    }
}

/// Coefficients and state captured by one successful fit.
#[derive(Debug, Clone)]
struct FittedArima {
    order: ArimaOrder,
    ar: Vec<f64>,
    ma: Vec<f64>,
    constant: f64,
    /// Differenced training series
    differenced: Vec<f64>,
    /// Residuals aligned with `differenced` (zero before the usable span)
    residuals: Vec<f64>,
    /// Last observed value after k differencing passes, k = 0..d
    last_levels: Vec<f64>,
}

impl FittedArima {
    fn fit(prices: &[f64], order: ArimaOrder) -> Result<Self> {
        let n = prices.len();
        if n < order.p + order.d + order.q + 10 {
            return Err(ForecastError::FitError(format!(
                "Insufficient data for ARIMA{}: need at least {} observations, got {}",
                order,
                order.p + order.d + order.q + 10,
                n
            )));
        }

        let mut last_levels = Vec::with_capacity(order.d);
        let mut working = prices.to_vec();
        for _ in 0..order.d {
            last_levels.push(working[working.len() - 1]);
            working = difference(&working);
        }

        let (ar, ma, constant, residuals) = if order.q == 0 {
            estimate_ar(&working, order.p)?
        } else {
            estimate_arma(&working, order.p, order.q)?
        };

        if !constant.is_finite()
            || ar.iter().any(|c| !c.is_finite())
            || ma.iter().any(|c| !c.is_finite())
        {
            return Err(ForecastError::FitError(format!(
                "ARIMA{} produced non-finite coefficients",
                order
            )));
        }

        Ok(Self {
            order,
            ar,
            ma,
            constant,
            differenced: working,
            residuals,
            last_levels,
        })
    }

    /// Closed-form multi-step forecast: recursion with future shocks at zero
    /// on the differenced scale, then integration back to price scale.
    fn forecast(&self, horizon: usize) -> Vec<f64> {
        let mut extended = self.differenced.clone();
        let mut shocks = self.residuals.clone();
        let mut forecasts = Vec::with_capacity(horizon);

        for _ in 0..horizon {
            let mut value = self.constant;
            for (i, &phi) in self.ar.iter().enumerate() {
                value += phi * extended[extended.len() - 1 - i];
            }
            for (j, &theta) in self.ma.iter().enumerate() {
                value += theta * shocks[shocks.len() - 1 - j];
            }

            extended.push(value);
            // Expected future shocks are zero
            shocks.push(0.0);
            forecasts.push(value);
        }

        let mut result = forecasts;
        for &start in self.last_levels.iter().rev() {
            result = integrate(&result, start);
        }
        result
    }
}

/// Difference a series once
fn difference(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Invert one differencing pass: cumulative sum anchored at `start`
fn integrate(diffs: &[f64], start: f64) -> Vec<f64> {
    let mut cumulative = start;
    diffs
        .iter()
        .map(|&d| {
            cumulative += d;
            cumulative
        })
        .collect()
}

/// OLS regression of `y` on `x` via the normal equations. A singular system
/// is a fitting failure, not a panic.
fn solve_ols(x: DMatrix<f64>, y: DVector<f64>) -> Result<(DVector<f64>, Vec<f64>)> {
    let xtx = x.transpose() * &x;
    let xty = x.transpose() * &y;

    let inverse = xtx.try_inverse().ok_or_else(|| {
        ForecastError::FitError("Singular normal equations (collinear regressors)".to_string())
    })?;
    let beta = inverse * xty;

    let fitted = &x * &beta;
    let residuals: Vec<f64> = (y - fitted).iter().copied().collect();

    Ok((beta, residuals))
}

/// Estimate a pure AR(p) process with intercept by OLS.
///
/// Returns (ar, ma, constant, residuals-aligned-with-input).
fn estimate_ar(values: &[f64], p: usize) -> Result<(Vec<f64>, Vec<f64>, f64, Vec<f64>)> {
    let n = values.len();
    if n < 2 * p + 2 {
        return Err(ForecastError::FitError(format!(
            "Too few differenced observations ({}) for AR({})",
            n, p
        )));
    }

    let rows = n - p;
    let mut x_data = Vec::with_capacity(rows * (p + 1));
    for t in p..n {
        x_data.push(1.0);
        for i in 1..=p {
            x_data.push(values[t - i]);
        }
    }

    let x = DMatrix::from_row_slice(rows, p + 1, &x_data);
    let y = DVector::from_iterator(rows, values[p..].iter().copied());

    let (beta, raw_residuals) = solve_ols(x, y)?;

    let constant = beta[0];
    let ar: Vec<f64> = beta.iter().skip(1).copied().collect();

    let mut residuals = vec![0.0; n];
    residuals[p..].copy_from_slice(&raw_residuals);

    Ok((ar, Vec::new(), constant, residuals))
}

/// Two-stage Hannan-Rissanen estimate of an ARMA(p, q) process: a long AR
/// fit supplies approximate shocks, then AR and MA terms are estimated
/// jointly by OLS.
fn estimate_arma(values: &[f64], p: usize, q: usize) -> Result<(Vec<f64>, Vec<f64>, f64, Vec<f64>)> {
    let n = values.len();

    let long_order = (p + q).max(4).min(n / 4).max(1);
    let (_, _, _, shocks) = estimate_ar(values, long_order)?;

    let start = (long_order + q).max(p);
    if n <= start + p + q + 2 {
        return Err(ForecastError::FitError(format!(
            "Too few differenced observations ({}) for ARMA({},{})",
            n, p, q
        )));
    }

    let rows = n - start;
    let cols = p + q + 1;
    let mut x_data = Vec::with_capacity(rows * cols);
    for t in start..n {
        x_data.push(1.0);
        for i in 1..=p {
            x_data.push(values[t - i]);
        }
        for j in 1..=q {
            x_data.push(shocks[t - j]);
        }
    }

    let x = DMatrix::from_row_slice(rows, cols, &x_data);
    let y = DVector::from_iterator(rows, values[start..].iter().copied());

    let (beta, raw_residuals) = solve_ols(x, y)?;

    let constant = beta[0];
    let ar: Vec<f64> = beta.iter().skip(1).take(p).copied().collect();
    let ma: Vec<f64> = beta.iter().skip(1 + p).take(q).copied().collect();

    let mut residuals = vec![0.0; n];
    residuals[start..].copy_from_slice(&raw_residuals);

    Ok((ar, ma, constant, residuals))
}

/// Statistical autoregressive model with the ordered fallback chain
/// (default order, minimal order, then exponential smoothing for `predict`).
#[derive(Debug)]
pub struct ArimaModel {
    order: ArimaOrder,
    fitted: Option<FittedArima>,
}

impl ArimaModel {
    /// Create a model with the default (5,1,0) order
    pub fn new() -> Self {
        Self::with_order(ArimaOrder::DEFAULT)
    }

    /// Create a model with an explicit first-attempt order
    pub fn with_order(order: ArimaOrder) -> Self {
        Self {
            order,
            fitted: None,
        }
    }

    /// Order actually used by the latest successful ARIMA fit, if any
    pub fn fitted_order(&self) -> Option<ArimaOrder> {
        self.fitted.as_ref().map(|f| f.order)
    }

    /// Ordered fitting attempts: the configured order, then the minimal one.
    /// Each step runs only if the previous failed; the last error surfaces.
    fn fit_with_fallback(&mut self, prices: &[f64]) -> Result<&FittedArima> {
        self.fitted = None;

        let mut attempts = vec![self.order];
        if self.order != ArimaOrder::MINIMAL {
            attempts.push(ArimaOrder::MINIMAL);
        }

        let mut last_error = None;
        for order in attempts {
            match FittedArima::fit(prices, order) {
                Ok(fitted) => {
                    self.fitted = Some(fitted);
                    break;
                }
                Err(e) => {
                    debug!("ARIMA{} fit failed: {}", order, e);
                    last_error = Some(e);
                }
            }
        }

        match self.fitted.as_ref() {
            Some(fitted) => Ok(fitted),
            None => Err(last_error.unwrap_or_else(|| {
                ForecastError::FitError("No ARIMA order attempted".to_string())
            })),
        }
    }
}

impl Default for ArimaModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ForecastingModel for ArimaModel {
    fn name(&self) -> &'static str {
        "ARIMA"
    }

    fn train(&mut self, series: &TimeSeries, test_fraction: f64) -> Result<TrainReport> {
        let prices = series.prices();
        let (train, test) = train_test_split(&prices, test_fraction)?;

        let fitted = self.fit_with_fallback(train)?;
        let predicted = fitted.forecast(test.len());

        Ok(TrainReport {
            actual: test.to_vec(),
            predicted,
        })
    }

    fn predict(&mut self, series: &TimeSeries, horizon: usize) -> Result<Forecast> {
        let prices = series.prices();

        let values = match self.fit_with_fallback(&prices) {
            Ok(fitted) => fitted.forecast(horizon),
            Err(e) => {
                // Last resort: additive-trend smoothing with no seasonality.
                // Its failure is fatal for this variant.
                debug!("ARIMA fallback chain exhausted ({}), using Holt smoothing", e);
                HoltLinear::fit(&prices)?.forecast(horizon)
            }
        };

        Forecast::new(values, horizon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difference_and_integrate_round_trip() {
        let values = vec![3.0, 5.0, 4.0, 8.0];
        let diffs = difference(&values);
        assert_eq!(diffs, vec![2.0, -1.0, 4.0]);
        assert_eq!(integrate(&diffs, values[0]), vec![5.0, 4.0, 8.0]);
    }

    #[test]
    fn ar_estimate_recovers_a_stable_process() {
        use rand::{Rng, SeedableRng};
        use rand_chacha::ChaCha8Rng;

        // x_t = 2 + 0.6 x_{t-1} + e_t with small white noise
        let mut rng = ChaCha8Rng::seed_from_u64(17);
        let mut values = vec![5.0];
        for t in 1..400 {
            let noise = rng.gen_range(-0.1..0.1);
            let next = 2.0 + 0.6 * values[t - 1] + noise;
            values.push(next);
        }

        let (ar, _, constant, _) = estimate_ar(&values, 1).unwrap();
        assert!((ar[0] - 0.6).abs() < 0.15, "ar = {:?}", ar);
        assert!((constant - 2.0).abs() < 1.0, "constant = {}", constant);
    }

    #[test]
    fn constant_differences_are_singular() {
        // A noiseless linear trend differences to a constant series, which
        // is collinear with the intercept.
        let values: Vec<f64> = (0..100).map(|i| 10.0 + 0.5 * i as f64).collect();
        let diffs = difference(&values);
        assert!(estimate_ar(&diffs, 5).is_err());
    }
}
