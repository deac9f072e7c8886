//! Forecast engine: order selection, fitting and prediction

use serde::Serialize;
use tracing::debug;

use super::arima::{select_differencing, ArimaOrder, FittedArima};
use super::optimizer::NelderMead;
use crate::config::EngineConfig;
use crate::error::{Error, Result};

/// Fewest observations the default engine accepts
pub const MIN_OBSERVATIONS: usize = 5;

/// How the model order is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSelection {
    Fixed(ArimaOrder),
    /// `d` up to `max_d` by variance reduction, then the lowest AICc over
    /// `0..=max_p` and `0..=max_q`
    Search {
        max_p: usize,
        max_d: usize,
        max_q: usize,
    },
}

/// One forecast step with its prediction interval
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub value: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Forecasts plus the model that produced them
#[derive(Debug, Clone, Serialize)]
pub struct ForecastOutput {
    pub model: FittedArima,
    pub points: Vec<ForecastPoint>,
}

impl ForecastOutput {
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }
}

/// Stateless ARIMA forecaster
///
/// ```no_run
/// use spendcast_core::forecast::Forecaster;
///
/// let monthly = [410.0, 395.0, 430.0, 420.0, 445.0, 438.0];
/// let next_three = Forecaster::new().forecast(&monthly, 3)?;
/// assert_eq!(next_three.len(), 3);
/// # Ok::<(), spendcast_core::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Forecaster {
    selection: OrderSelection,
    min_observations: usize,
    optimizer: NelderMead,
    confidence_z: f64,
}

impl Default for Forecaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Forecaster {
    /// Order search over p <= 3, d <= 2, q <= 3
    pub fn new() -> Self {
        Self::from_config(&EngineConfig::default())
    }

    /// Always fit `order`
    pub fn with_order(order: ArimaOrder) -> Self {
        Self {
            selection: OrderSelection::Fixed(order),
            ..Self::new()
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            selection: OrderSelection::Search {
                max_p: config.max_p,
                max_d: config.max_d,
                max_q: config.max_q,
            },
            min_observations: config.min_observations,
            optimizer: NelderMead::new(config.max_iterations),
            confidence_z: config.confidence_z,
        }
    }

    pub fn selection(&self) -> OrderSelection {
        self.selection
    }

    pub fn min_observations(&self) -> usize {
        self.min_observations
    }

    /// Fit a model to `series`
    pub fn fit(&self, series: &[f64]) -> Result<FittedArima> {
        if series.len() < self.min_observations {
            return Err(Error::InsufficientData {
                required: self.min_observations,
                actual: series.len(),
            });
        }
        if series.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidData(
                "Series contains non-finite values".to_string(),
            ));
        }

        if is_constant(series) {
            debug!(level = series[0], "Series is constant, skipping model fit");
            return Ok(FittedArima::constant_level(series));
        }

        match self.selection {
            OrderSelection::Fixed(order) => {
                let fitted = FittedArima::fit(series, order, &self.optimizer)?;
                debug!(order = %fitted.order, aic = fitted.aic, "Fitted ARIMA model");
                Ok(fitted)
            }
            OrderSelection::Search {
                max_p,
                max_d,
                max_q,
            } => self.search(series, max_p, max_d, max_q),
        }
    }

    fn search(
        &self,
        series: &[f64],
        max_p: usize,
        max_d: usize,
        max_q: usize,
    ) -> Result<FittedArima> {
        // Fit in units of the mean magnitude so optimizer tolerances see the same
        // numbers whatever the currency scale
        let scale = series.iter().map(|v| v.abs()).sum::<f64>() / series.len() as f64;
        let scale = if scale.is_finite() && scale > 0.0 { scale } else { 1.0 };
        let normalized: Vec<f64> = series.iter().map(|v| v / scale).collect();

        let d = select_differencing(&normalized, max_d);
        let candidates: Vec<ArimaOrder> = (0..=max_p)
            .flat_map(|p| (0..=max_q).map(move |q| ArimaOrder::new(p, d, q)))
            .filter(|order| order.min_observations() <= series.len())
            .collect();
        // Every candidate is scored on the residuals after the longest warm-up
        let scored_from = candidates.iter().map(|o| o.d + o.p).max().unwrap_or(d);
        debug!(d, scored_from, candidates = candidates.len(), "Searching ARIMA orders");

        let mut best: Option<FittedArima> = None;
        let mut last_error = None;

        for order in candidates {
            match FittedArima::fit_scored(&normalized, order, &self.optimizer, scored_from) {
                Ok(fitted) if fitted.aicc.is_finite() => {
                    // Strict comparison: on ties the simpler, earlier order wins
                    if best.as_ref().map_or(true, |b| fitted.aicc < b.aicc) {
                        best = Some(fitted);
                    }
                }
                Ok(fitted) => {
                    debug!(%order, n = fitted.n_residuals, "Too few residuals to rank candidate");
                }
                Err(e) => {
                    debug!(%order, error = %e, "Skipping candidate order");
                    last_error = Some(e);
                }
            }
        }

        match best {
            Some(fitted) => {
                let fitted = fitted.rescaled(scale);
                debug!(
                    order = %fitted.order,
                    aic = fitted.aic,
                    aicc = fitted.aicc,
                    "Selected ARIMA order"
                );
                Ok(fitted)
            }
            None => Err(last_error.unwrap_or_else(|| {
                Error::ModelFit("no candidate order could be fitted".to_string())
            })),
        }
    }

    /// Point forecasts for the next `horizon` periods, clamped at zero
    pub fn forecast(&self, series: &[f64], horizon: usize) -> Result<Vec<f64>> {
        let fitted = self.fit(series)?;
        Ok(fitted
            .predict(horizon)
            .into_iter()
            .map(|v| v.max(0.0))
            .collect())
    }

    /// Point forecasts with prediction intervals
    ///
    /// Bounds are `value +/- z * se`, where `se` comes from the psi weights
    /// of the fitted model. All three numbers are clamped at zero.
    pub fn forecast_with_intervals(&self, series: &[f64], horizon: usize) -> Result<ForecastOutput> {
        let model = self.fit(series)?;
        let raw = model.predict(horizon);
        let std_errors = model.forecast_std_errors(horizon);

        let points = raw
            .iter()
            .zip(&std_errors)
            .map(|(value, se)| {
                let margin = self.confidence_z * se;
                ForecastPoint {
                    value: value.max(0.0),
                    lower: (value - margin).max(0.0),
                    upper: (value + margin).max(0.0),
                }
            })
            .collect();

        Ok(ForecastOutput { model, points })
    }
}

/// Forecast `horizon` periods with the default engine
pub fn forecast(series: &[f64], horizon: usize) -> Result<Vec<f64>> {
    Forecaster::new().forecast(series, horizon)
}

fn is_constant(series: &[f64]) -> bool {
    let Some(&first) = series.first() else {
        return false;
    };
    let tolerance = 1e-9 * first.abs().max(1.0);
    series.iter().all(|v| (v - first).abs() <= tolerance)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic pseudo-noise in [-0.5, 0.5)
    fn noise(n: usize, seed: u64) -> Vec<f64> {
        let mut state = seed;
        (0..n)
            .map(|_| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                ((state >> 33) as f64 / (1u64 << 31) as f64) - 0.5
            })
            .collect()
    }

    fn seasonal_spending(months: usize) -> Vec<f64> {
        (0..months)
            .map(|i| {
                let t = i as f64;
                1200.0 + 15.0 * t + 150.0 * (t * std::f64::consts::PI / 6.0).sin()
                    + 40.0 * ((t * 1.7).cos())
            })
            .collect()
    }

    #[test]
    fn test_forecast_returns_horizon_non_negative_values() {
        let series = seasonal_spending(24);
        for horizon in [1, 3, 12] {
            let values = forecast(&series, horizon).unwrap();
            assert_eq!(values.len(), horizon);
            assert!(values.iter().all(|v| *v >= 0.0 && v.is_finite()));
        }
    }

    #[test]
    fn test_constant_series() {
        let values = forecast(&[250.0; 8], 4).unwrap();
        assert_eq!(values.len(), 4);
        for v in values {
            assert!((v - 250.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_constant_series_with_fixed_order() {
        let values = Forecaster::with_order(ArimaOrder::new(1, 1, 1))
            .forecast(&[80.0; 10], 2)
            .unwrap();
        assert!(values.iter().all(|v| (v - 80.0).abs() < 1e-6));
    }

    #[test]
    fn test_insufficient_data() {
        let result = forecast(&[1.0, 2.0, 3.0, 4.0], 3);
        assert!(matches!(
            result,
            Err(Error::InsufficientData {
                required: 5,
                actual: 4
            })
        ));
    }

    #[test]
    fn test_minimum_length_series_fits() {
        let values = forecast(&[100.0, 120.0, 90.0, 110.0, 105.0], 2).unwrap();
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn test_non_finite_rejected() {
        let result = forecast(&[1.0, 2.0, f64::NAN, 4.0, 5.0], 1);
        assert!(matches!(result, Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_forecasts_clamped_at_zero() {
        // Continuing the last slope (-15) goes below zero on the first step
        let series = [500.0, 400.0, 300.0, 200.0, 100.0, 50.0, 20.0, 5.0];
        let values = Forecaster::with_order(ArimaOrder::new(0, 2, 0))
            .forecast(&series, 5)
            .unwrap();
        assert_eq!(values, vec![0.0; 5]);
    }

    #[test]
    fn test_fixed_order_is_respected() {
        let series = seasonal_spending(30);
        let order = ArimaOrder::new(1, 0, 0);
        let model = Forecaster::with_order(order).fit(&series).unwrap();
        assert_eq!(model.order, order);
    }

    #[test]
    fn test_fixed_order_too_long_for_series() {
        let series = seasonal_spending(6);
        let result = Forecaster::with_order(ArimaOrder::new(3, 2, 3)).fit(&series);
        assert!(matches!(result, Err(Error::InsufficientData { .. })));
    }

    #[test]
    fn test_search_stays_within_grid() {
        let config = EngineConfig {
            max_p: 1,
            max_d: 1,
            max_q: 0,
            ..Default::default()
        };
        let model = Forecaster::from_config(&config)
            .fit(&seasonal_spending(18))
            .unwrap();
        assert!(model.order.p <= 1 && model.order.d <= 1 && model.order.q == 0);
        assert!(model.aic.is_finite());
    }

    #[test]
    fn test_intervals_widen_with_horizon() {
        let output = Forecaster::with_order(ArimaOrder::new(0, 1, 0))
            .forecast_with_intervals(&seasonal_spending(20), 4)
            .unwrap();
        assert_eq!(output.points.len(), 4);
        for point in &output.points {
            assert!(point.lower <= point.value && point.value <= point.upper);
            assert!(point.lower >= 0.0);
        }
        let width = |p: &ForecastPoint| p.upper - p.lower;
        assert!(width(&output.points[3]) > width(&output.points[0]));
    }

    #[test]
    fn test_budget_exhaustion_surfaces_model_fit_error() {
        let config = EngineConfig {
            max_iterations: 1,
            ..Default::default()
        };
        let forecaster = Forecaster {
            selection: OrderSelection::Fixed(ArimaOrder::new(1, 0, 1)),
            ..Forecaster::from_config(&config)
        };
        let result = forecaster.fit(&seasonal_spending(20));
        assert!(matches!(result, Err(Error::ModelFit(_))));
    }

    #[test]
    fn test_selected_order_does_not_depend_on_units() {
        for seed in [1, 2] {
            let series: Vec<f64> = noise(12, seed).iter().map(|v| 1000.0 + 200.0 * v).collect();
            let base = Forecaster::new().fit(&series).unwrap();

            for factor in [100.0, 0.001] {
                let scaled: Vec<f64> = series.iter().map(|v| v * factor).collect();
                let model = Forecaster::new().fit(&scaled).unwrap();
                assert_eq!(model.order, base.order, "seed {} x{}", seed, factor);
            }
        }

        let trend: Vec<f64> = noise(24, 1)
            .iter()
            .enumerate()
            .map(|(i, v)| 1000.0 + 50.0 * i as f64 + 100.0 * v)
            .collect();
        let cents: Vec<f64> = trend.iter().map(|v| v * 100.0).collect();
        assert_eq!(
            Forecaster::new().fit(&cents).unwrap().order,
            Forecaster::new().fit(&trend).unwrap().order
        );
    }

    #[test]
    fn test_rescaled_forecasts_match_units() {
        let series: Vec<f64> = noise(12, 2).iter().map(|v| 1000.0 + 200.0 * v).collect();
        let scaled: Vec<f64> = series.iter().map(|v| v * 100.0).collect();

        let base = Forecaster::new().forecast(&series, 3).unwrap();
        let cents = Forecaster::new().forecast(&scaled, 3).unwrap();
        for (a, b) in base.iter().zip(&cents) {
            assert!((a * 100.0 - b).abs() < 1e-3 * b.abs().max(1.0), "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_white_noise_is_not_differenced() {
        for seed in [2, 4, 5] {
            let series: Vec<f64> = noise(12, seed).iter().map(|v| 1000.0 + 200.0 * v).collect();
            let model = Forecaster::new().fit(&series).unwrap();
            assert_eq!(model.order.d, 0, "seed {} chose {}", seed, model.order);
        }
    }

    #[test]
    fn test_trend_is_differenced_once() {
        let series: Vec<f64> = noise(24, 2)
            .iter()
            .enumerate()
            .map(|(i, v)| 1000.0 + 50.0 * i as f64 + 100.0 * v)
            .collect();
        let model = Forecaster::new().fit(&series).unwrap();
        assert_eq!(model.order.d, 1);
    }
}
