//! Request-level forecast policy
//!
//! The engine only knows about numbers. The planner decides whether a user's
//! history is good enough to forecast from, how far to forecast, and how to
//! turn monthly predictions into a single bounded spending estimate.

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::arima::ArimaOrder;
use super::engine::Forecaster;
use crate::config::{ForecastConfig, PlannerConfig};
use crate::error::{Error, Result};
use crate::models::{Expense, Granularity};
use crate::series::{self, TimeSeries};
use crate::store::ExpenseStore;

/// Furthest a year request may reach past the newest month of history
pub const MAX_YEAR_HORIZON_MONTHS: usize = 60;

/// What the user asked to forecast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "lowercase")]
pub enum ForecastRequest {
    /// Total spending over the next `n` months (1 to 12)
    Months(u32),
    /// Total spending for a calendar year (current or future)
    Year(i32),
}

impl ForecastRequest {
    /// Build a request from a mode name ("months" or "year") and its value
    pub fn from_parts(mode: &str, value: i64) -> Result<Self> {
        match mode.to_lowercase().as_str() {
            "months" | "month" => {
                if value <= 0 {
                    return Err(Error::InvalidData(
                        "Number of months must be positive".to_string(),
                    ));
                }
                if value > 12 {
                    return Err(Error::InvalidData(
                        "Cannot forecast more than 12 months ahead".to_string(),
                    ));
                }
                Ok(Self::Months(value as u32))
            }
            "year" => i32::try_from(value)
                .map(Self::Year)
                .map_err(|_| Error::InvalidData(format!("Invalid year: {}", value))),
            _ => Err(Error::InvalidData(format!(
                "Invalid mode '{}'. Use 'months' or 'year'",
                mode
            ))),
        }
    }
}

impl std::fmt::Display for ForecastRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Months(n) => write!(f, "next {} month(s)", n),
            Self::Year(y) => write!(f, "year {}", y),
        }
    }
}

/// One predicted month
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyForecast {
    pub period: NaiveDate,
    pub label: String,
    pub value: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Everything a client needs to show a forecast
#[derive(Debug, Clone, Serialize)]
pub struct ForecastSummary {
    pub request: ForecastRequest,
    pub order: ArimaOrder,
    pub aic: f64,
    /// Monthly history the model was fitted on (before outlier removal)
    pub history: TimeSeries,
    pub predictions: Vec<MonthlyForecast>,
    /// Spending in the completed months of the requested year, for current-year requests
    pub year_to_date: Option<f64>,
    pub outliers_removed: usize,
    /// Sum of predictions (plus year to date) before capping
    pub uncapped_total: f64,
    /// Final estimate after the cap and floor
    pub total: f64,
    pub lower_total: f64,
    pub upper_total: f64,
}

/// Applies forecast policy on top of the engine
#[derive(Debug, Clone)]
pub struct ForecastPlanner {
    policy: PlannerConfig,
    forecaster: Forecaster,
}

impl Default for ForecastPlanner {
    fn default() -> Self {
        Self::new(&ForecastConfig::default())
    }
}

impl ForecastPlanner {
    pub fn new(config: &ForecastConfig) -> Self {
        Self {
            policy: config.planner.clone(),
            forecaster: Forecaster::from_config(&config.engine),
        }
    }

    /// Forecast for `owner`, reading their expenses from `store`
    pub fn plan<S: ExpenseStore + ?Sized>(
        &self,
        store: &S,
        owner: &str,
        request: ForecastRequest,
        today: NaiveDate,
    ) -> Result<ForecastSummary> {
        let expenses = store.list_expenses(owner)?;
        let summary = self.plan_from_expenses(&expenses, request, today)?;
        info!(
            owner,
            request = %request,
            order = %summary.order,
            total = summary.total,
            "Forecast computed"
        );
        Ok(summary)
    }

    /// Forecast from an already-loaded expense list
    pub fn plan_from_expenses(
        &self,
        expenses: &[Expense],
        request: ForecastRequest,
        today: NaiveDate,
    ) -> Result<ForecastSummary> {
        let full_history = series::aggregate(
            expenses
                .iter()
                .filter(|e| e.amount > 0.0)
                .map(|e| (e.date, e.amount)),
            Granularity::Monthly,
        )?
        .trim_leading_zeros();

        self.check_quality(&full_history)?;
        self.check_staleness(&full_history, today)?;

        // Year requests forecast from the current month (or January) onward, so
        // the model only sees the months before it
        let first_target = match request {
            ForecastRequest::Months(_) => None,
            ForecastRequest::Year(year) => Some(first_forecast_month(year, today)?),
        };
        let history = match first_target {
            Some(first) => full_history.before(first),
            None => full_history,
        };

        self.validate(request, history.len())?;
        let horizon = match request {
            ForecastRequest::Months(n) => n as usize,
            ForecastRequest::Year(year) => months_through_year_end(&history, year)?,
        };

        let values = history.values();
        let (clean, outliers_removed) = self.remove_outliers(&values);

        let output = self.forecaster.forecast_with_intervals(&clean, horizon)?;

        let year_to_date = match (request, first_target) {
            (ForecastRequest::Year(year), Some(first)) if year == today.year() => Some(
                expenses
                    .iter()
                    .filter(|e| e.amount > 0.0 && e.date.year() == year && e.date < first)
                    .map(|e| e.amount)
                    .sum::<f64>(),
            ),
            _ => None,
        };

        let predictions: Vec<MonthlyForecast> = history
            .future_periods(horizon)
            .into_iter()
            .zip(&output.points)
            .filter(|((period, _), _)| first_target.map_or(true, |first| *period >= first))
            .map(|((period, label), point)| MonthlyForecast {
                period,
                label,
                value: point.value,
                lower: point.lower,
                upper: point.upper,
            })
            .collect();

        let ytd = year_to_date.unwrap_or(0.0);
        let uncapped_total = ytd + predictions.iter().map(|p| p.value).sum::<f64>();
        let lower_total = ytd + predictions.iter().map(|p| p.lower).sum::<f64>();
        let upper_total = ytd + predictions.iter().map(|p| p.upper).sum::<f64>();
        let total = self.bound_total(uncapped_total, &values);

        debug!(
            order = %output.model.order,
            horizon,
            kept = predictions.len(),
            outliers_removed,
            uncapped_total,
            total,
            "Forecast planned"
        );

        Ok(ForecastSummary {
            request,
            order: output.model.order,
            aic: output.model.aic,
            history,
            predictions,
            year_to_date,
            outliers_removed,
            uncapped_total,
            total,
            lower_total,
            upper_total,
        })
    }

    /// Reject histories that are mostly empty months
    fn check_quality(&self, history: &TimeSeries) -> Result<()> {
        if history.is_empty() {
            return Ok(());
        }
        let zeros = history.points.iter().filter(|p| p.total == 0.0).count();
        let ratio = zeros as f64 / history.len() as f64;
        if ratio > self.policy.max_zero_ratio {
            return Err(Error::DataQuality(format!(
                "Too many months without spending ({} of {})",
                zeros,
                history.len()
            )));
        }
        Ok(())
    }

    /// Check the request against the available history
    fn validate(&self, request: ForecastRequest, past_months: usize) -> Result<()> {
        let required = match request {
            ForecastRequest::Months(n) => {
                if n == 0 {
                    return Err(Error::InvalidData(
                        "Number of months must be positive".to_string(),
                    ));
                }
                if n > 12 {
                    return Err(Error::InvalidData(
                        "Cannot forecast more than 12 months ahead".to_string(),
                    ));
                }
                if n > 6 {
                    self.policy.long_horizon_history
                } else if n <= 3 {
                    self.policy.short_horizon_history
                } else {
                    0
                }
            }
            ForecastRequest::Year(_) => self.policy.year_history,
        };

        let required = required.max(self.forecaster.min_observations());
        if past_months < required {
            return Err(Error::InsufficientData {
                required,
                actual: past_months,
            });
        }
        Ok(())
    }

    /// Reject histories whose newest month ended too long ago
    fn check_staleness(&self, history: &TimeSeries, today: NaiveDate) -> Result<()> {
        let Some(last) = history.last_period() else {
            return Ok(());
        };
        let month_end = last
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .unwrap_or(last);
        let days = (today - month_end).num_days();
        if days > self.policy.stale_after_days {
            return Err(Error::StaleData { days });
        }
        Ok(())
    }

    /// Drop observations beyond `outlier_sigma` sample standard deviations,
    /// unless that would remove too much of the series
    fn remove_outliers(&self, values: &[f64]) -> (Vec<f64>, usize) {
        if values.len() < 2 {
            return (values.to_vec(), 0);
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let std = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt();
        let threshold = self.policy.outlier_sigma * std;

        let clean: Vec<f64> = values
            .iter()
            .copied()
            .filter(|v| (v - mean).abs() <= threshold)
            .collect();

        let kept_fraction = clean.len() as f64 / n;
        if kept_fraction < 1.0 - self.policy.max_outlier_fraction {
            return (values.to_vec(), 0);
        }
        let removed = values.len() - clean.len();
        (clean, removed)
    }

    /// Cap at min(k1 x max, k2 x mean), then floor at k3 x mean
    fn bound_total(&self, total: f64, history: &[f64]) -> f64 {
        if history.is_empty() {
            return total.max(0.0);
        }
        let mean = history.iter().sum::<f64>() / history.len() as f64;
        let max = history.iter().copied().fold(f64::MIN, f64::max);
        let cap = (self.policy.cap_max_multiplier * max)
            .min(self.policy.cap_mean_multiplier * mean);
        total.min(cap).max(self.policy.floor_mean_multiplier * mean)
    }
}

/// First month a year request forecasts: the current month for this year,
/// January for a later one
fn first_forecast_month(year: i32, today: NaiveDate) -> Result<NaiveDate> {
    if year < today.year() {
        return Err(Error::InvalidData(
            "Cannot forecast for past years".to_string(),
        ));
    }
    let first = if year == today.year() {
        today.with_day(1)
    } else {
        NaiveDate::from_ymd_opt(year, 1, 1)
    };
    first.ok_or_else(|| Error::InvalidData(format!("Invalid year: {}", year)))
}

/// Months after the end of `history` up to and including December of `year`
fn months_through_year_end(history: &TimeSeries, year: i32) -> Result<usize> {
    let Some(last) = history.last_period() else {
        return Err(Error::EmptySeries);
    };
    let months = (i64::from(year) - i64::from(last.year())) * 12 + 12 - i64::from(last.month());
    if months > MAX_YEAR_HORIZON_MONTHS as i64 {
        return Err(Error::InvalidData(format!(
            "Cannot forecast more than {} months ahead",
            MAX_YEAR_HORIZON_MONTHS
        )));
    }
    Ok(months.max(0) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn expense(date: NaiveDate, amount: f64) -> Expense {
        Expense {
            id: 0,
            owner: "alice".to_string(),
            date,
            amount,
            category: "Food".to_string(),
            description: None,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    /// One expense on the 10th of each month, ending in `last`
    fn monthly_history(last: NaiveDate, amounts: &[f64]) -> Vec<Expense> {
        let n = amounts.len() as u32;
        amounts
            .iter()
            .enumerate()
            .map(|(i, amount)| {
                let month = last
                    .with_day(10)
                    .unwrap()
                    .checked_sub_months(Months::new(n - 1 - i as u32))
                    .unwrap();
                expense(month, *amount)
            })
            .collect()
    }

    fn wavy(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 1000.0 + 100.0 * ((i as f64) * 1.3).sin() + 5.0 * i as f64)
            .collect()
    }

    #[test]
    fn test_request_from_parts() {
        assert_eq!(
            ForecastRequest::from_parts("months", 3).unwrap(),
            ForecastRequest::Months(3)
        );
        assert_eq!(
            ForecastRequest::from_parts("Year", 2025).unwrap(),
            ForecastRequest::Year(2025)
        );
        assert!(ForecastRequest::from_parts("months", 0).is_err());
        assert!(ForecastRequest::from_parts("months", 13).is_err());
        assert!(ForecastRequest::from_parts("weeks", 2).is_err());
    }

    #[test]
    fn test_months_forecast() {
        let today = d(2024, 6, 15);
        let expenses = monthly_history(d(2024, 6, 1), &wavy(12));
        let summary = ForecastPlanner::default()
            .plan_from_expenses(&expenses, ForecastRequest::Months(3), today)
            .unwrap();

        assert_eq!(summary.predictions.len(), 3);
        assert_eq!(summary.predictions[0].label, "2024-07");
        assert_eq!(summary.predictions[2].label, "2024-09");
        assert_eq!(summary.history.len(), 12);
        assert!(summary.year_to_date.is_none());
        assert!(summary.total > 0.0);
        assert!(summary.lower_total <= summary.uncapped_total);
        assert!(summary.uncapped_total <= summary.upper_total);
    }

    #[test]
    fn test_short_horizon_needs_six_months() {
        let today = d(2024, 6, 15);
        let expenses = monthly_history(d(2024, 6, 1), &wavy(5));
        let err = ForecastPlanner::default()
            .plan_from_expenses(&expenses, ForecastRequest::Months(2), today)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientData {
                required: 6,
                actual: 5
            }
        ));
    }

    #[test]
    fn test_mid_horizon_only_needs_engine_minimum() {
        let today = d(2024, 6, 15);
        let expenses = monthly_history(d(2024, 6, 1), &wavy(5));
        let summary = ForecastPlanner::default()
            .plan_from_expenses(&expenses, ForecastRequest::Months(5), today)
            .unwrap();
        assert_eq!(summary.predictions.len(), 5);
    }

    #[test]
    fn test_long_horizon_needs_twelve_months() {
        let today = d(2024, 6, 15);
        let expenses = monthly_history(d(2024, 6, 1), &wavy(11));
        let err = ForecastPlanner::default()
            .plan_from_expenses(&expenses, ForecastRequest::Months(7), today)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientData {
                required: 12,
                actual: 11
            }
        ));
    }

    #[test]
    fn test_no_expenses() {
        let err = ForecastPlanner::default()
            .plan_from_expenses(&[], ForecastRequest::Months(5), d(2024, 6, 1))
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientData { actual: 0, .. }));
    }

    #[test]
    fn test_past_year_rejected() {
        let today = d(2024, 6, 15);
        let expenses = monthly_history(d(2024, 6, 1), &wavy(12));
        let err = ForecastPlanner::default()
            .plan_from_expenses(&expenses, ForecastRequest::Year(2023), today)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)));
    }

    #[test]
    fn test_current_year_forecasts_remaining_months() {
        let today = d(2024, 10, 20);
        let expenses = monthly_history(d(2024, 10, 1), &wavy(12));
        let summary = ForecastPlanner::default()
            .plan_from_expenses(&expenses, ForecastRequest::Year(2024), today)
            .unwrap();

        let labels: Vec<&str> = summary.predictions.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["2024-10", "2024-11", "2024-12"]);
        // October is forecast, not counted as spent
        assert_eq!(summary.history.last_period(), Some(d(2024, 9, 1)));

        let ytd: f64 = expenses
            .iter()
            .filter(|e| e.date.year() == 2024 && e.date.month() < 10)
            .map(|e| e.amount)
            .sum();
        assert_eq!(summary.year_to_date, Some(ytd));
        let predicted: f64 = summary.predictions.iter().map(|p| p.value).sum();
        assert!((summary.uncapped_total - ytd - predicted).abs() < 1e-9);
    }

    #[test]
    fn test_future_year_forecasts_its_twelve_months() {
        let today = d(2024, 10, 20);
        let expenses = monthly_history(d(2024, 10, 1), &wavy(12));
        let summary = ForecastPlanner::default()
            .plan_from_expenses(&expenses, ForecastRequest::Year(2025), today)
            .unwrap();

        let labels: Vec<String> = summary.predictions.iter().map(|p| p.label.clone()).collect();
        let expected: Vec<String> = (1..=12).map(|m| format!("2025-{:02}", m)).collect();
        assert_eq!(labels, expected);
        assert!(summary.year_to_date.is_none());
        // The whole history is used, including the current month
        assert_eq!(summary.history.last_period(), Some(d(2024, 10, 1)));
    }

    #[test]
    fn test_later_year_skips_the_gap() {
        let today = d(2024, 10, 20);
        let expenses = monthly_history(d(2024, 10, 1), &wavy(12));
        let summary = ForecastPlanner::default()
            .plan_from_expenses(&expenses, ForecastRequest::Year(2026), today)
            .unwrap();

        assert_eq!(summary.predictions.len(), 12);
        assert_eq!(summary.predictions[0].label, "2026-01");
        assert_eq!(summary.predictions[11].label, "2026-12");
        let predicted: f64 = summary.predictions.iter().map(|p| p.value).sum();
        assert!((summary.uncapped_total - predicted).abs() < 1e-9);
    }

    #[test]
    fn test_distant_year_rejected() {
        let today = d(2024, 10, 20);
        let expenses = monthly_history(d(2024, 10, 1), &wavy(12));
        let err = ForecastPlanner::default()
            .plan_from_expenses(&expenses, ForecastRequest::Year(2035), today)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)));
    }

    #[test]
    fn test_stale_history_rejected() {
        // Last month ends 2024-03-31; more than 60 days before June 15
        let expenses = monthly_history(d(2024, 3, 1), &wavy(12));
        let err = ForecastPlanner::default()
            .plan_from_expenses(&expenses, ForecastRequest::Months(3), d(2024, 6, 15))
            .unwrap_err();
        assert!(matches!(err, Error::StaleData { days: 76 }));
    }

    #[test]
    fn test_mostly_zero_history_rejected() {
        let mut amounts = vec![0.0; 12];
        amounts[0] = 100.0;
        amounts[5] = 80.0;
        amounts[11] = 90.0;
        // 9 of 12 months are zero
        let expenses: Vec<Expense> = monthly_history(d(2024, 6, 1), &amounts)
            .into_iter()
            .filter(|e| e.amount > 0.0)
            .collect();
        let err = ForecastPlanner::default()
            .plan_from_expenses(&expenses, ForecastRequest::Months(3), d(2024, 6, 15))
            .unwrap_err();
        assert!(matches!(err, Error::DataQuality(_)));
    }

    #[test]
    fn test_outlier_removed() {
        let planner = ForecastPlanner::default();
        let mut values = vec![100.0; 20];
        values[7] = 5000.0;
        let (clean, removed) = planner.remove_outliers(&values);
        assert_eq!(removed, 1);
        assert_eq!(clean.len(), 19);
    }

    #[test]
    fn test_outliers_kept_when_too_many() {
        let config = ForecastConfig {
            planner: PlannerConfig {
                outlier_sigma: 0.5,
                ..Default::default()
            },
            ..Default::default()
        };
        let planner = ForecastPlanner::new(&config);
        // Half the points sit far from the mean
        let values = vec![0.0, 0.0, 0.0, 100.0, 100.0, 100.0];
        let (clean, removed) = planner.remove_outliers(&values);
        assert_eq!(removed, 0);
        assert_eq!(clean, values);
    }

    #[test]
    fn test_total_is_capped_and_floored() {
        let planner = ForecastPlanner::default();
        let history = [100.0, 200.0, 300.0];
        // cap = min(3 * 300, 24 * 200) = 900
        assert_eq!(planner.bound_total(5000.0, &history), 900.0);
        // floor = 0.1 * 200 = 20
        assert_eq!(planner.bound_total(1.0, &history), 20.0);
        assert_eq!(planner.bound_total(450.0, &history), 450.0);
    }
}
