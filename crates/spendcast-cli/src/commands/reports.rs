//! Report command implementations (series, stats, forecast)

use std::path::Path;

use anyhow::{bail, Result};
use chrono::{Datelike, NaiveDate};
use spendcast_core::config::ForecastConfig;
use spendcast_core::db::{Database, ExpenseFilter};
use spendcast_core::forecast::{ForecastPlanner, ForecastRequest, ForecastSummary};
use spendcast_core::models::Granularity;
use spendcast_core::series::{self, TimeSeries};

use super::parse_date_arg;

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

fn month_name(month: u32) -> &'static str {
    MONTH_NAMES
        .get(month.saturating_sub(1) as usize)
        .copied()
        .unwrap_or("?")
}

/// Build the owner's gap-filled series, optionally over an explicit range
pub fn build_series(
    db: &Database,
    owner: &str,
    granularity: Granularity,
    from: Option<String>,
    to: Option<String>,
) -> Result<TimeSeries> {
    let from = parse_date_arg(from.as_deref(), "from")?;
    let to = parse_date_arg(to.as_deref(), "to")?;

    let expenses = db.list_expenses_filtered(ExpenseFilter::new(owner), None, 0)?;
    let entries = expenses.iter().map(|e| (e.date, e.amount));

    match (from, to) {
        (Some(from), Some(to)) => Ok(series::aggregate_between(entries, granularity, from, to)?),
        (None, None) => Ok(series::aggregate(entries, granularity)?),
        _ => bail!("Provide both --from and --to, or neither"),
    }
}

pub fn cmd_series(
    db: &Database,
    owner: &str,
    granularity: Granularity,
    from: Option<String>,
    to: Option<String>,
) -> Result<()> {
    let series = build_series(db, owner, granularity, from, to)?;

    println!();
    println!("📈 Spending ({})", granularity.as_str());
    println!("   ─────────────────────────────");

    if series.is_empty() {
        println!("   No expenses recorded yet.");
        return Ok(());
    }

    for point in &series.points {
        println!("   {:12} │ {:>10.2}", point.label, point.total);
    }

    Ok(())
}

pub fn cmd_stats(db: &Database, owner: &str, year: Option<i32>, today: NaiveDate) -> Result<()> {
    let year = year.unwrap_or_else(|| today.year());
    let dashboard = db.get_dashboard_stats(owner, today)?;
    let yearly = db.get_yearly_stats(owner, year)?;
    let breakdown = db.get_category_breakdown(owner, year)?;

    println!();
    println!("📊 Spending Overview");
    println!("   ─────────────────────────────");
    println!("   All-time total:  {:.2}", dashboard.total_expenses);
    println!("   This month:      {:.2}", dashboard.this_month);
    println!("   Average per day: {:.2}", dashboard.average_daily);
    println!("   Categories used: {}", dashboard.categories_used);

    println!();
    println!("📅 {}", year);
    println!("   ─────────────────────────────");
    if yearly.total_amount == 0.0 {
        println!("   No expenses recorded in {}.", year);
        return Ok(());
    }
    println!("   Total:           {:.2}", yearly.total_amount);
    println!("   Monthly average: {:.2}", yearly.average_amount);
    if let (Some(month), Some(amount)) = (yearly.max_month, yearly.max_amount) {
        println!("   Highest month:   {} ({:.2})", month_name(month), amount);
    }
    if let (Some(month), Some(amount)) = (yearly.min_month, yearly.min_amount) {
        println!("   Lowest month:    {} ({:.2})", month_name(month), amount);
    }

    println!();
    println!(
        "   {:20} │ {:>10} │ {:>5} │ {:>8}",
        "Category", "Amount", "Count", "Average"
    );
    println!("   ─────────────────────┼────────────┼───────┼──────────");
    for row in breakdown {
        println!(
            "   {:20} │ {:>10.2} │ {:>5} │ {:>8.2}",
            row.category, row.amount, row.transaction_count, row.average
        );
    }

    Ok(())
}

/// Plan a forecast for `owner` using the config at `config_path` (or defaults)
pub fn run_forecast(
    db: &Database,
    owner: &str,
    mode: &str,
    value: i64,
    config_path: Option<&Path>,
    today: NaiveDate,
) -> Result<ForecastSummary> {
    let config = ForecastConfig::load(config_path)?;
    let planner = ForecastPlanner::new(&config);
    let request = ForecastRequest::from_parts(mode, value)?;
    Ok(planner.plan(db, owner, request, today)?)
}

pub fn cmd_forecast(
    db: &Database,
    owner: &str,
    mode: &str,
    value: i64,
    config_path: Option<&Path>,
    today: NaiveDate,
    json: bool,
) -> Result<()> {
    let summary = run_forecast(db, owner, mode, value, config_path, today)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!();
    println!("🔮 Forecast: {}", summary.request);
    println!(
        "   Model: {} (AIC {:.1}), {} months of history",
        summary.order,
        summary.aic,
        summary.history.len()
    );
    if summary.outliers_removed > 0 {
        println!("   Outliers dampened: {}", summary.outliers_removed);
    }
    println!("   ─────────────────────────────────────────────");

    for month in &summary.predictions {
        println!(
            "   {:10} │ {:>10.2}   ({:.2} - {:.2})",
            month.label, month.value, month.lower, month.upper
        );
    }

    println!("   ─────────────────────────────────────────────");
    if let Some(ytd) = summary.year_to_date {
        println!("   Spent so far:    {:.2}", ytd);
    }
    println!(
        "   Expected total:  {:.2}   ({:.2} - {:.2})",
        summary.total, summary.lower_total, summary.upper_total
    );
    if summary.uncapped_total > summary.total {
        println!(
            "   ⚠️  Capped from {:.2} to stay near past spending",
            summary.uncapped_total
        );
    }

    Ok(())
}
