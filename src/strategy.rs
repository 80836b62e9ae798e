//! Long-only trading simulation over a forecast
//!
//! Buy signals are strict local minima of the forecast, sell signals strict
//! local maxima; endpoints and plateaus produce no signal. The simulated
//! account is either fully in cash or fully in shares, and an open position
//! is liquidated at the final forecast value.

use crate::error::{ForecastError, Result};
use serde::Serialize;

/// What happened at one simulated trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TradeAction {
    Buy,
    Sell,
    /// Forced liquidation at the end of the forecast window
    EndOfPeriodSell,
}

impl std::fmt::Display for TradeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeAction::Buy => write!(f, "Buy"),
            TradeAction::Sell => write!(f, "Sell"),
            TradeAction::EndOfPeriodSell => write!(f, "Sell (end of period)"),
        }
    }
}

/// One executed trade. `day` is 1-based: day 1 is the first forecast day.
#[derive(Debug, Clone, Serialize)]
pub struct TradeEvent {
    pub day: usize,
    pub action: TradeAction,
    pub price: f64,
    pub shares: f64,
}

/// Outcome of simulating the strategy over one forecast.
#[derive(Debug, Clone, Serialize)]
pub struct StrategyResult {
    pub trades: Vec<TradeEvent>,
    /// Strict local minima as (day, price)
    pub buy_points: Vec<(usize, f64)>,
    /// Strict local maxima as (day, price)
    pub sell_points: Vec<(usize, f64)>,
    pub initial_amount: f64,
    pub final_amount: f64,
    pub total_profit: f64,
    pub profit_percentage: f64,
}

impl StrategyResult {
    pub fn trade_count(&self) -> usize {
        self.trades.len()
    }
}

/// Strict local extrema of the forecast, skipping both endpoints. Days are
/// 1-based forecast days.
pub fn find_local_extrema(forecast: &[f64]) -> (Vec<(usize, f64)>, Vec<(usize, f64)>) {
    let mut minima = Vec::new();
    let mut maxima = Vec::new();

    for i in 1..forecast.len().saturating_sub(1) {
        if forecast[i] < forecast[i - 1] && forecast[i] < forecast[i + 1] {
            minima.push((i + 1, forecast[i]));
        }
        if forecast[i] > forecast[i - 1] && forecast[i] > forecast[i + 1] {
            maxima.push((i + 1, forecast[i]));
        }
    }

    (minima, maxima)
}

/// Simulate the long-only extrema strategy with `investment` starting cash.
pub fn simulate_strategy(forecast: &[f64], investment: f64) -> Result<StrategyResult> {
    if forecast.is_empty() {
        return Err(ForecastError::ValidationError(
            "Cannot simulate a strategy over an empty forecast".to_string(),
        ));
    }
    if !investment.is_finite() || investment <= 0.0 {
        return Err(ForecastError::InvalidParameter(format!(
            "Investment amount must be positive, got {}",
            investment
        )));
    }
    if forecast.iter().any(|v| !v.is_finite()) {
        return Err(ForecastError::ValidationError(
            "Forecast contains non-finite values".to_string(),
        ));
    }

    let (buy_points, sell_points) = find_local_extrema(forecast);

    // Merge signals into one chronological stream
    let mut events: Vec<(usize, f64, TradeAction)> = Vec::new();
    for &(day, price) in &buy_points {
        events.push((day, price, TradeAction::Buy));
    }
    for &(day, price) in &sell_points {
        events.push((day, price, TradeAction::Sell));
    }
    events.sort_by_key(|e| e.0);

    let mut cash = investment;
    let mut shares = 0.0;
    let mut trades = Vec::new();

    for (day, price, action) in events {
        match action {
            // Cannot open a position at a non-positive price
            TradeAction::Buy if shares == 0.0 && price > 0.0 => {
                shares = cash / price;
                trades.push(TradeEvent {
                    day,
                    action: TradeAction::Buy,
                    price,
                    shares,
                });
                cash = 0.0;
            }
            TradeAction::Sell if shares > 0.0 => {
                cash = shares * price;
                trades.push(TradeEvent {
                    day,
                    action: TradeAction::Sell,
                    price,
                    shares,
                });
                shares = 0.0;
            }
            _ => {}
        }
    }

    // Liquidate anything still held at the last forecast value
    if shares > 0.0 {
        let price = forecast[forecast.len() - 1];
        cash = shares * price;
        trades.push(TradeEvent {
            day: forecast.len(),
            action: TradeAction::EndOfPeriodSell,
            price,
            shares,
        });
    }

    let final_amount = cash;
    let total_profit = final_amount - investment;

    Ok(StrategyResult {
        trades,
        buy_points,
        sell_points,
        initial_amount: investment,
        final_amount,
        total_profit,
        profit_percentage: total_profit / investment * 100.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    const FORECAST: [f64; 7] = [10.0, 8.0, 12.0, 7.0, 15.0, 15.0, 9.0];

    #[test]
    fn extrema_are_strict_and_interior() {
        let (minima, maxima) = find_local_extrema(&FORECAST);
        assert_eq!(minima, vec![(2, 8.0), (4, 7.0)]);
        // The 15.0 plateau produces no maximum
        assert_eq!(maxima, vec![(3, 12.0)]);
    }

    #[test]
    fn simulation_alternates_and_liquidates() {
        let result = simulate_strategy(&FORECAST, 1000.0).unwrap();

        let days: Vec<usize> = result.trades.iter().map(|t| t.day).collect();
        let actions: Vec<TradeAction> = result.trades.iter().map(|t| t.action).collect();
        assert_eq!(days, vec![2, 3, 4, 7]);
        assert_eq!(
            actions,
            vec![
                TradeAction::Buy,
                TradeAction::Sell,
                TradeAction::Buy,
                TradeAction::EndOfPeriodSell,
            ]
        );

        // 1000 -> 125 shares @8 -> 1500 @12 -> ~214.29 shares @7 -> @9
        let expected = 1000.0 / 8.0 * 12.0 / 7.0 * 9.0;
        assert_approx_eq!(result.final_amount, expected, 1e-9);
        assert_approx_eq!(result.total_profit, expected - 1000.0, 1e-9);
    }

    #[test]
    fn replaying_trades_reproduces_the_final_amount() {
        let result = simulate_strategy(&FORECAST, 500.0).unwrap();

        let mut cash = 500.0;
        for trade in &result.trades {
            match trade.action {
                TradeAction::Buy => {
                    assert_approx_eq!(trade.shares, cash / trade.price, 1e-9);
                    cash = 0.0;
                }
                TradeAction::Sell | TradeAction::EndOfPeriodSell => {
                    cash = trade.shares * trade.price;
                }
            }
        }
        assert_approx_eq!(cash, result.final_amount, 1e-9);
    }

    #[test]
    fn monotone_forecast_trades_nothing() {
        let forecast = [1.0, 2.0, 3.0, 4.0, 5.0];
        let result = simulate_strategy(&forecast, 1000.0).unwrap();

        assert!(result.trades.is_empty());
        assert_approx_eq!(result.final_amount, 1000.0);
        assert_approx_eq!(result.total_profit, 0.0);
    }

    #[test]
    fn bad_inputs_are_rejected() {
        assert!(simulate_strategy(&[], 1000.0).is_err());
        assert!(simulate_strategy(&FORECAST, 0.0).is_err());
        assert!(simulate_strategy(&FORECAST, -5.0).is_err());
        assert!(simulate_strategy(&[1.0, f64::NAN, 2.0], 100.0).is_err());
    }

    #[test]
    fn short_forecasts_have_no_extrema() {
        assert_eq!(find_local_extrema(&[5.0]), (vec![], vec![]));
        assert_eq!(find_local_extrema(&[5.0, 3.0]), (vec![], vec![]));
    }
}
