//! Gap-filled time series of per-period spending totals
//!
//! Expenses are bucketed by the start of their period (the day itself, the
//! Monday of the ISO week, or the first of the month). Every period between the
//! first and last bucket is present, with zero for periods without spending.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::Granularity;

/// One period of a time series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// First day of the period
    pub period: NaiveDate,
    /// Display label ("2024-01-31", "2024-W05", "2024-01")
    pub label: String,
    pub total: f64,
}

/// Ordered, contiguous per-period totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub granularity: Granularity,
    pub points: Vec<SeriesPoint>,
}

impl TimeSeries {
    pub fn empty(granularity: Granularity) -> Self {
        Self {
            granularity,
            points: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.total).collect()
    }

    pub fn labels(&self) -> Vec<String> {
        self.points.iter().map(|p| p.label.clone()).collect()
    }

    /// (label, total) pairs, ready for the chart renderer
    pub fn to_pairs(&self) -> Vec<(String, f64)> {
        self.points
            .iter()
            .map(|p| (p.label.clone(), p.total))
            .collect()
    }

    pub fn first_period(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.period)
    }

    pub fn last_period(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.period)
    }

    /// Drop leading periods whose total is zero
    pub fn trim_leading_zeros(mut self) -> Self {
        let start = self
            .points
            .iter()
            .position(|p| p.total != 0.0)
            .unwrap_or(self.points.len());
        self.points.drain(..start);
        self
    }

    /// The `count` periods following the last one, as (period, label) pairs
    pub fn future_periods(&self, count: usize) -> Vec<(NaiveDate, String)> {
        let mut out = Vec::with_capacity(count);
        let Some(mut period) = self.last_period() else {
            return out;
        };
        for _ in 0..count {
            let Some(next) = next_period(period, self.granularity) else {
                break;
            };
            period = next;
            out.push((period, period_label(period, self.granularity)));
        }
        out
    }

    /// Only the periods starting before `period`
    pub fn before(mut self, period: NaiveDate) -> Self {
        self.points.retain(|p| p.period < period);
        self
    }
}

/// Earliest year an expense may be dated in
pub const MIN_YEAR: i32 = 1900;
/// Latest year an expense may be dated in
pub const MAX_YEAR: i32 = 9999;
/// Most periods a single series may hold
pub const MAX_PERIODS: usize = 100_000;

/// Reject dates outside the years `MIN_YEAR..=MAX_YEAR`
pub fn check_date(date: NaiveDate) -> Result<()> {
    if (MIN_YEAR..=MAX_YEAR).contains(&date.year()) {
        Ok(())
    } else {
        Err(Error::InvalidData(format!(
            "Date {} is outside the supported range ({} to {})",
            date, MIN_YEAR, MAX_YEAR
        )))
    }
}

/// Start of the period containing `date`, if representable
pub fn period_start(date: NaiveDate, granularity: Granularity) -> Option<NaiveDate> {
    match granularity {
        Granularity::Daily => Some(date),
        Granularity::Weekly => date.checked_sub_signed(Duration::days(
            date.weekday().num_days_from_monday() as i64,
        )),
        Granularity::Monthly => date.with_day(1),
    }
}

/// Start of the period after the one starting at `start`, if representable
pub fn next_period(start: NaiveDate, granularity: Granularity) -> Option<NaiveDate> {
    match granularity {
        Granularity::Daily => start.succ_opt(),
        Granularity::Weekly => start.checked_add_signed(Duration::days(7)),
        Granularity::Monthly => start.checked_add_months(Months::new(1)),
    }
}

/// Display label for the period starting at `start`
pub fn period_label(start: NaiveDate, granularity: Granularity) -> String {
    match granularity {
        Granularity::Daily => start.format("%Y-%m-%d").to_string(),
        Granularity::Weekly => {
            let week = start.iso_week();
            format!("{}-W{:02}", week.year(), week.week())
        }
        Granularity::Monthly => start.format("%Y-%m").to_string(),
    }
}

fn checked_start(date: NaiveDate, granularity: Granularity) -> Result<NaiveDate> {
    period_start(date, granularity).ok_or_else(|| {
        Error::InvalidData(format!("No {} period contains {}", granularity.as_str(), date))
    })
}

fn bucket<I>(entries: I, granularity: Granularity) -> Result<BTreeMap<NaiveDate, f64>>
where
    I: IntoIterator<Item = (NaiveDate, f64)>,
{
    let mut buckets = BTreeMap::new();
    for (date, amount) in entries {
        *buckets
            .entry(checked_start(date, granularity)?)
            .or_insert(0.0) += amount;
    }
    Ok(buckets)
}

fn fill(
    buckets: &BTreeMap<NaiveDate, f64>,
    granularity: Granularity,
    first: NaiveDate,
    last: NaiveDate,
) -> Result<TimeSeries> {
    let mut points = Vec::new();
    let mut period = Some(first);
    while let Some(start) = period.filter(|p| *p <= last) {
        if points.len() == MAX_PERIODS {
            return Err(Error::InvalidData(format!(
                "Range {} to {} spans more than {} {} periods",
                first,
                last,
                MAX_PERIODS,
                granularity.as_str()
            )));
        }
        points.push(SeriesPoint {
            period: start,
            label: period_label(start, granularity),
            total: buckets.get(&start).copied().unwrap_or(0.0),
        });
        period = next_period(start, granularity);
    }
    Ok(TimeSeries { granularity, points })
}

/// Sum (date, amount) entries per period, from the first to the last period present
///
/// Fails when the entries span more than `MAX_PERIODS` periods.
pub fn aggregate<I>(entries: I, granularity: Granularity) -> Result<TimeSeries>
where
    I: IntoIterator<Item = (NaiveDate, f64)>,
{
    let buckets = bucket(entries, granularity)?;
    match (buckets.keys().next(), buckets.keys().next_back()) {
        (Some(&first), Some(&last)) => fill(&buckets, granularity, first, last),
        _ => Ok(TimeSeries::empty(granularity)),
    }
}

/// Sum entries per period over the inclusive range `from..=to`
///
/// Every period touching the range is present. Entries dated outside the
/// range are ignored.
pub fn aggregate_between<I>(
    entries: I,
    granularity: Granularity,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<TimeSeries>
where
    I: IntoIterator<Item = (NaiveDate, f64)>,
{
    if from > to {
        return Err(Error::InvalidData(format!(
            "Range start {} is after range end {}",
            from, to
        )));
    }

    let in_range = entries
        .into_iter()
        .filter(|(date, _)| *date >= from && *date <= to);
    let buckets = bucket(in_range, granularity)?;

    fill(
        &buckets,
        granularity,
        checked_start(from, granularity)?,
        checked_start(to, granularity)?,
    )
}
