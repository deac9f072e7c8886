//! ARIMA(p,d,q) estimation by conditional sum of squares
//!
//! The series is differenced `d` times, then an ARMA(p,q) model is fitted to
//! the differenced values `w`:
//!
//! ```text
//! w_t - mu = sum_i phi_i (w_{t-i} - mu) + e_t + sum_j theta_j e_{t-j}
//! ```
//!
//! `mu` is only estimated when `d == 0`. Residuals before index `p` are zero.
//!
//! Fits are scored with the Gaussian log-likelihood of the residuals, so the
//! information criteria of candidates scored on the same window compare
//! regardless of the units of the series.

use serde::{Deserialize, Serialize};

use super::optimizer::NelderMead;
use crate::error::{Error, Result};

/// Model order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
}

impl ArimaOrder {
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        Self { p, d, q }
    }

    pub fn has_constant(&self) -> bool {
        self.d == 0
    }

    /// Estimated parameters, counting the innovation variance
    pub fn parameter_count(&self) -> usize {
        self.p + self.q + usize::from(self.has_constant()) + 1
    }

    /// Shortest series this order can be fitted to
    ///
    /// At least one residual more than there are estimated parameters must
    /// remain after differencing and the AR warm-up.
    pub fn min_observations(&self) -> usize {
        self.d + self.p + self.parameter_count() + 1
    }
}

impl std::fmt::Display for ArimaOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ARIMA({},{},{})", self.p, self.d, self.q)
    }
}

/// A fitted model, ready to forecast
#[derive(Debug, Clone, Serialize)]
pub struct FittedArima {
    pub order: ArimaOrder,
    pub ar: Vec<f64>,
    pub ma: Vec<f64>,
    /// Mean of the differenced series (zero when `d > 0`)
    pub constant: f64,
    /// Residual variance
    pub sigma2: f64,
    pub aic: f64,
    /// Small-sample corrected AIC, infinite when too few residuals were scored
    pub aicc: f64,
    /// Number of residuals the fit was scored on
    pub n_residuals: usize,
    #[serde(skip)]
    history: Vec<f64>,
    #[serde(skip)]
    differenced: Vec<f64>,
    #[serde(skip)]
    residuals: Vec<f64>,
}

/// Apply first differences `d` times
pub fn difference(series: &[f64], d: usize) -> Vec<f64> {
    let mut result = series.to_vec();
    for _ in 0..d {
        result = result.windows(2).map(|w| w[1] - w[0]).collect();
    }
    result
}

/// Population variance, zero for an empty slice
fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}

/// Number of differences that make `series` stationary, at most `max_d`
///
/// Differencing continues while it lowers the variance: a trending or
/// wandering series gets calmer when differenced, while differencing white
/// noise doubles its variance. A further difference is only considered while
/// `ARIMA(0,d+1,0)` could still be fitted to the series.
pub fn select_differencing(series: &[f64], max_d: usize) -> usize {
    let mut d = 0;
    let mut current = series.to_vec();
    while d < max_d && ArimaOrder::new(0, d + 1, 0).min_observations() <= series.len() {
        let next = difference(&current, 1);
        if variance(&next) >= variance(&current) {
            break;
        }
        current = next;
        d += 1;
    }
    d
}

/// Undo `d` rounds of differencing for values that continue `history`
///
/// Each level is rebuilt from the last observed value at that level, so
/// `d = 2` continues both the level and the slope of the history.
pub fn integrate(history: &[f64], forecasts: &[f64], d: usize) -> Vec<f64> {
    let levels: Vec<Vec<f64>> = (0..d).map(|k| difference(history, k)).collect();

    let mut result = forecasts.to_vec();
    for level in levels.iter().rev() {
        let mut prev = level.last().copied().unwrap_or(0.0);
        for value in result.iter_mut() {
            prev += *value;
            *value = prev;
        }
    }
    result
}

/// Yule-Walker AR estimates via the Levinson-Durbin recursion
///
/// Partial autocorrelations are kept strictly inside (-1, 1) so the
/// returned coefficients are always stationary.
pub fn yule_walker(series: &[f64], p: usize) -> Vec<f64> {
    if p == 0 || series.is_empty() {
        return vec![0.0; p];
    }

    let n = series.len();
    let mean = series.iter().sum::<f64>() / n as f64;
    let centered: Vec<f64> = series.iter().map(|x| x - mean).collect();
    let autocov: Vec<f64> = (0..=p)
        .map(|k| {
            if k >= n {
                return 0.0;
            }
            (k..n).map(|i| centered[i] * centered[i - k]).sum::<f64>() / n as f64
        })
        .collect();

    let mut phi = vec![0.0; p];
    let mut variance = autocov[0];
    if variance <= f64::EPSILON {
        return phi;
    }

    for k in 0..p {
        let mut acc = autocov[k + 1];
        for j in 0..k {
            acc -= phi[j] * autocov[k - j];
        }
        let reflection = (acc / variance).clamp(-0.99, 0.99);

        let previous = phi.clone();
        for j in 0..k {
            phi[j] = previous[j] - reflection * previous[k - 1 - j];
        }
        phi[k] = reflection;

        variance *= 1.0 - reflection * reflection;
        if variance <= f64::EPSILON {
            break;
        }
    }

    phi
}

/// True if `1 - sum phi_i B^i` has all roots outside the unit circle
///
/// Runs the Levinson recursion backwards; the model is stationary exactly
/// when every recovered partial autocorrelation has magnitude below one.
pub fn is_stationary(phi: &[f64]) -> bool {
    let mut a = phi.to_vec();
    while let Some(&reflection) = a.last() {
        if !reflection.is_finite() || reflection.abs() >= 1.0 {
            return false;
        }
        let m = a.len();
        let scale = 1.0 - reflection * reflection;
        a = (0..m - 1)
            .map(|j| (a[j] + reflection * a[m - 2 - j]) / scale)
            .collect();
    }
    true
}

/// True if `1 + sum theta_j B^j` has all roots outside the unit circle
pub fn is_invertible(theta: &[f64]) -> bool {
    let negated: Vec<f64> = theta.iter().map(|t| -t).collect();
    is_stationary(&negated)
}

/// Residuals of an ARMA model on `w`
fn residuals(w: &[f64], constant: f64, ar: &[f64], ma: &[f64]) -> Vec<f64> {
    let p = ar.len();
    let mut e = vec![0.0; w.len()];
    for t in p..w.len() {
        let mut predicted = constant;
        for (i, phi) in ar.iter().enumerate() {
            predicted += phi * (w[t - 1 - i] - constant);
        }
        for (j, theta) in ma.iter().enumerate() {
            if t > j {
                predicted += theta * e[t - 1 - j];
            }
        }
        e[t] = w[t] - predicted;
    }
    e
}

/// Gaussian AIC and its small-sample correction for `k` parameters
fn information_criteria(sigma2: f64, n: usize, k: usize) -> (f64, f64) {
    let n_f = n as f64;
    let k_f = k as f64;
    let aic = n_f * ((2.0 * std::f64::consts::PI * sigma2.max(1e-300)).ln() + 1.0) + 2.0 * k_f;
    let aicc = if n > k + 1 {
        aic + 2.0 * k_f * (k_f + 1.0) / (n_f - k_f - 1.0)
    } else {
        f64::INFINITY
    };
    (aic, aicc)
}

struct Params<'a> {
    constant: f64,
    ar: &'a [f64],
    ma: &'a [f64],
}

fn unpack(x: &[f64], order: ArimaOrder) -> Params<'_> {
    let (constant, rest) = if order.has_constant() {
        (x[0], &x[1..])
    } else {
        (0.0, x)
    };
    Params {
        constant,
        ar: &rest[..order.p],
        ma: &rest[order.p..order.p + order.q],
    }
}

impl FittedArima {
    /// Fit `order` to `series` by minimising the conditional sum of squares
    pub fn fit(series: &[f64], order: ArimaOrder, optimizer: &NelderMead) -> Result<Self> {
        Self::fit_scored(series, order, optimizer, order.d + order.p)
    }

    /// Fit `order`, scoring residuals from position `scored_from` of `series`
    ///
    /// Candidates fitted with the same `scored_from` are scored on the same
    /// observations, so their AIC values can be compared. The window never
    /// starts before the AR warm-up of `order`.
    pub fn fit_scored(
        series: &[f64],
        order: ArimaOrder,
        optimizer: &NelderMead,
        scored_from: usize,
    ) -> Result<Self> {
        let required = order.min_observations();
        if series.len() < required {
            return Err(Error::InsufficientData {
                required,
                actual: series.len(),
            });
        }
        if series.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidData(
                "Series contains non-finite values".to_string(),
            ));
        }

        let w = difference(series, order.d);
        let n = w.len();
        let first = scored_from.saturating_sub(order.d).max(order.p);
        let n_residuals = n.saturating_sub(first);
        let k = order.parameter_count();
        if n_residuals <= k {
            return Err(Error::InsufficientData {
                required: first + order.d + k + 1,
                actual: series.len(),
            });
        }

        let mean = w.iter().sum::<f64>() / n as f64;
        let spread = variance(&w).sqrt();

        let mut start = Vec::with_capacity(k);
        let mut steps = Vec::with_capacity(k);
        if order.has_constant() {
            start.push(mean);
            steps.push((0.1 * spread).max(0.05 * mean.abs()).max(1e-3));
        }
        for phi in yule_walker(&w, order.p) {
            start.push(phi);
            steps.push(0.1);
        }
        for _ in 0..order.q {
            start.push(0.0);
            steps.push(0.1);
        }

        let objective = |x: &[f64]| {
            let params = unpack(x, order);
            if !is_stationary(params.ar) || !is_invertible(params.ma) {
                return f64::INFINITY;
            }
            residuals(&w, params.constant, params.ar, params.ma)[first..]
                .iter()
                .map(|e| e * e)
                .sum::<f64>()
        };

        let minimum = optimizer
            .minimize(objective, &start, &steps)
            .map_err(|e| match e {
                Error::ModelFit(msg) => Error::ModelFit(format!("{}: {}", order, msg)),
                other => other,
            })?;

        let params = unpack(&minimum.point, order);
        let resid = residuals(&w, params.constant, params.ar, params.ma);
        let sigma2 = minimum.value / n_residuals as f64;
        let (aic, aicc) = information_criteria(sigma2, n_residuals, k);

        if !aic.is_finite() {
            return Err(Error::ModelFit(format!("{}: AIC is not finite", order)));
        }

        Ok(Self {
            order,
            ar: params.ar.to_vec(),
            ma: params.ma.to_vec(),
            constant: params.constant,
            sigma2,
            aic,
            aicc,
            n_residuals,
            history: series.to_vec(),
            differenced: w,
            residuals: resid,
        })
    }

    /// The same model for the series multiplied by `factor`
    ///
    /// Coefficients are unit-free; the level, the residuals and the
    /// likelihood move with the scale.
    pub fn rescaled(mut self, factor: f64) -> Self {
        if !(factor.is_finite() && factor > 0.0) || factor == 1.0 {
            return self;
        }
        self.constant *= factor;
        self.sigma2 *= factor * factor;
        for value in self
            .history
            .iter_mut()
            .chain(self.differenced.iter_mut())
            .chain(self.residuals.iter_mut())
        {
            *value *= factor;
        }
        let shift = 2.0 * self.n_residuals as f64 * factor.ln();
        self.aic += shift;
        self.aicc += shift;
        self
    }

    /// A model for a series with no variation: every forecast is `level`
    pub fn constant_level(series: &[f64]) -> Self {
        let level = series.first().copied().unwrap_or(0.0);
        Self {
            order: ArimaOrder::new(0, 0, 0),
            ar: Vec::new(),
            ma: Vec::new(),
            constant: level,
            sigma2: 0.0,
            aic: f64::NEG_INFINITY,
            aicc: f64::NEG_INFINITY,
            n_residuals: series.len(),
            history: series.to_vec(),
            differenced: series.to_vec(),
            residuals: vec![0.0; series.len()],
        }
    }

    /// Point forecasts on the original scale, before any clamping
    pub fn predict(&self, horizon: usize) -> Vec<f64> {
        let mut w = self.differenced.clone();
        let mut e = self.residuals.clone();

        for _ in 0..horizon {
            let t = w.len();
            let mut next = self.constant;
            for (i, phi) in self.ar.iter().enumerate() {
                if t > i {
                    next += phi * (w[t - 1 - i] - self.constant);
                }
            }
            for (j, theta) in self.ma.iter().enumerate() {
                if t > j {
                    next += theta * e[t - 1 - j];
                }
            }
            w.push(next);
            e.push(0.0);
        }

        let forecasts = &w[w.len() - horizon..];
        integrate(&self.history, forecasts, self.order.d)
    }

    /// Psi weights of the model on the original (undifferenced) scale
    pub fn psi_weights(&self, count: usize) -> Vec<f64> {
        // Coefficients of (1 - sum phi_i B^i)(1 - B)^d
        let mut poly = vec![1.0];
        poly.extend(self.ar.iter().map(|phi| -phi));
        for _ in 0..self.order.d {
            let mut next = vec![0.0; poly.len() + 1];
            for (i, c) in poly.iter().enumerate() {
                next[i] += c;
                next[i + 1] -= c;
            }
            poly = next;
        }
        let ar_full: Vec<f64> = poly[1..].iter().map(|c| -c).collect();

        let mut psi = Vec::with_capacity(count);
        for j in 0..count {
            if j == 0 {
                psi.push(1.0);
                continue;
            }
            let mut value = if j <= self.ma.len() {
                self.ma[j - 1]
            } else {
                0.0
            };
            for (i, a) in ar_full.iter().enumerate() {
                let lag = i + 1;
                if lag > j {
                    break;
                }
                value += a * psi[j - lag];
            }
            psi.push(value);
        }
        psi
    }

    /// Forecast standard error for each of the next `horizon` steps
    pub fn forecast_std_errors(&self, horizon: usize) -> Vec<f64> {
        let psi = self.psi_weights(horizon);
        let mut cumulative = 0.0;
        psi.iter()
            .map(|w| {
                cumulative += w * w;
                (self.sigma2 * cumulative).sqrt()
            })
            .collect()
    }

    /// Residuals from the fit, aligned with the differenced series
    pub fn residuals(&self) -> &[f64] {
        &self.residuals
    }
}
